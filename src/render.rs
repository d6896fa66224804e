//! Plain-text renderers for the dashboard sections.
//!
//! Every function here is a pure function of state. A section shows a
//! skeleton while its data is loading, an error banner when its payload was
//! rejected, the payload once known, and an empty-state line when the
//! stream completed without anything for it.

use std::fmt::Write;

use crate::envelope::SectionKey;
use crate::models::{AnomalyRisk, EsgRisk, NewsFeed, NewsSentiment, OverallRisk, QuantitativeRisk};
use crate::poller::PriceView;
use crate::section::{RiskSections, SectionState, StreamPhase};

fn render_section<T>(
    key: SectionKey,
    state: &SectionState<T>,
    finished: bool,
    empty: &str,
    body: impl Fn(&T) -> Option<String>,
) -> String {
    let title = key.title();
    if state.loading && !finished {
        return format!("{}: loading...", title);
    }
    if let Some(error) = &state.error {
        return format!("{}: error: {}", title, error);
    }
    match state.value.as_ref().and_then(body) {
        Some(text) => format!("{}: {}", title, text),
        None => format!("{}: {}", title, empty),
    }
}

fn metric(out: &mut Vec<String>, label: &str, value: Option<f64>, decimals: usize) {
    if let Some(v) = value {
        out.push(format!("{} {:.*}", label, decimals, v));
    }
}

fn percent(out: &mut Vec<String>, label: &str, value: Option<f64>) {
    if let Some(v) = value {
        out.push(format!("{} {:.1}%", label, v * 100.0));
    }
}

pub fn render_news(state: &SectionState<NewsFeed>, finished: bool) -> String {
    render_section(SectionKey::NewsArticles, state, finished, "no recent articles", |feed| {
        if feed.articles.is_empty() {
            return None;
        }
        let mut text = format!("{} articles", feed.articles.len());
        for article in &feed.articles {
            let _ = write!(text, "\n  - {}", article.title);
            if let Some(source) = &article.source {
                let _ = write!(text, " ({})", source);
            }
        }
        Some(text)
    })
}

pub fn render_sentiment(state: &SectionState<NewsSentiment>, finished: bool) -> String {
    render_section(SectionKey::NewsSentiment, state, finished, "no sentiment available", |s| {
        let mut text = format!("{} ({:+.2})", s.sentiment_label, s.sentiment_score);
        if let Some(count) = s.article_count {
            let _ = write!(text, " across {} articles", count);
        }
        Some(text)
    })
}

pub fn render_quantitative(state: &SectionState<QuantitativeRisk>, finished: bool) -> String {
    render_section(SectionKey::QuantitativeRisk, state, finished, "no quantitative metrics", |q| {
        let mut parts = Vec::new();
        percent(&mut parts, "volatility", q.volatility);
        metric(&mut parts, "beta", q.beta, 2);
        metric(&mut parts, "sharpe", q.sharpe_ratio, 2);
        percent(&mut parts, "max drawdown", q.max_drawdown);
        percent(&mut parts, "VaR", q.value_at_risk);
        if let Some(score) = q.risk_score {
            parts.push(format!("score {:.1}/10", score));
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    })
}

pub fn render_esg(state: &SectionState<EsgRisk>, finished: bool) -> String {
    render_section(SectionKey::EsgRisk, state, finished, "no ESG rating", |e| {
        let mut parts = Vec::new();
        metric(&mut parts, "E", e.environmental_score, 1);
        metric(&mut parts, "S", e.social_score, 1);
        metric(&mut parts, "G", e.governance_score, 1);
        metric(&mut parts, "total", e.total_esg_score, 1);
        if let Some(level) = &e.esg_risk_level {
            parts.push(format!("({})", level));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    })
}

pub fn render_anomalies(state: &SectionState<AnomalyRisk>, finished: bool) -> String {
    render_section(SectionKey::AnomalyRisk, state, finished, "no anomalies detected", |a| {
        if a.anomalies.is_empty() {
            return None;
        }
        let mut text = format!("{} flagged", a.anomalies.len());
        if let Some(score) = a.anomaly_score {
            let _ = write!(text, " (score {:.2})", score);
        }
        for anomaly in &a.anomalies {
            text.push_str("\n  - ");
            if let Some(date) = &anomaly.date {
                let _ = write!(text, "{}: ", date);
            }
            text.push_str(&anomaly.description);
            if let Some(severity) = &anomaly.severity {
                let _ = write!(text, " [{}]", severity);
            }
        }
        Some(text)
    })
}

pub fn render_overall(state: &SectionState<OverallRisk>, finished: bool) -> String {
    render_section(SectionKey::OverallRisk, state, finished, "not rated", |o| {
        let mut text = format!("{:.1}/10 ({})", o.overall_risk_score, o.risk_level);
        if let Some(summary) = &o.summary {
            let _ = write!(text, "\n  {}", summary);
        }
        Some(text)
    })
}

/// `"50.00 $"`, followed by the change versus previous close when known.
pub fn render_price(view: &PriceView) -> String {
    let snap = &view.snapshot;
    let mut text = format!("{} {:.2} {}", view.ticker, snap.last_price, snap.currency)
        .trim_end()
        .to_string();
    if let Some((delta, pct)) = snap.change() {
        let _ = write!(text, " {:+.2} ({:+.2}%)", delta, pct);
    }
    if let Some(error) = &view.error {
        let _ = write!(text, "\n  price refresh failed: {}", error);
    }
    text
}

/// Full risk panel: header, stream status and every section.
pub fn render_dashboard(state: &RiskSections) -> String {
    // a failed stream leaves unfilled sections loading
    let finished = state.phase == StreamPhase::Done;
    let mut lines = vec![format!("== Risk analysis: {} ==", state.ticker)];

    match (state.phase, &state.error) {
        (StreamPhase::Idle, _) => lines.push("Risk analysis not started".to_string()),
        (_, Some(error)) => lines.push(format!("Error: {}", error)),
        _ if state.loading => lines.push("Loading risk analysis...".to_string()),
        _ => {}
    }

    lines.push(render_overall(&state.overall, finished));
    lines.push(render_quantitative(&state.quantitative, finished));
    lines.push(render_esg(&state.esg, finished));
    lines.push(render_anomalies(&state.anomalies, finished));
    lines.push(render_sentiment(&state.sentiment, finished));
    lines.push(render_news(&state.news, finished));
    lines.join("\n")
}
