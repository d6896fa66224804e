//! Per-section state of one risk-stream mount and the reducer that folds
//! stream events into it.

use tracing::{debug, warn};

use crate::envelope::{SectionKey, StreamMessage};
use crate::models::{AnomalyRisk, EsgRisk, NewsFeed, NewsSentiment, OverallRisk, QuantitativeRisk};

/// Latest known value for one analysis category.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionState<T> {
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> SectionState<T> {
    pub fn loading() -> Self {
        Self {
            value: None,
            loading: true,
            error: None,
        }
    }

    pub fn idle() -> Self {
        Self {
            value: None,
            loading: false,
            error: None,
        }
    }

    fn fill(&mut self, value: Option<T>) {
        self.value = value;
        self.loading = false;
        self.error = None;
    }

    fn fail(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }
}

impl<T> Default for SectionState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Streaming,
    Done,
    Failed,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Done | StreamPhase::Failed)
    }
}

/// Input to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message(StreamMessage),
    /// A known section arrived with a payload that could not be decoded.
    SectionFailed(SectionKey, String),
    TransportError(String),
}

/// Everything one risk-stream mount displays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RiskSections {
    pub ticker: String,
    pub phase: StreamPhase,
    pub loading: bool,
    pub error: Option<String>,
    pub news: SectionState<NewsFeed>,
    pub sentiment: SectionState<NewsSentiment>,
    pub quantitative: SectionState<QuantitativeRisk>,
    pub esg: SectionState<EsgRisk>,
    pub anomalies: SectionState<AnomalyRisk>,
    pub overall: SectionState<OverallRisk>,
}

impl RiskSections {
    /// State of a mount that has not opened a stream.
    pub fn idle(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    /// Reset state at stream start: every slot loading, nothing known.
    pub fn streaming(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            phase: StreamPhase::Streaming,
            loading: true,
            error: None,
            news: SectionState::loading(),
            sentiment: SectionState::loading(),
            quantitative: SectionState::loading(),
            esg: SectionState::loading(),
            anomalies: SectionState::loading(),
            overall: SectionState::loading(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Loading flag and error of one slot, without its payload.
    pub fn status(&self, key: SectionKey) -> (bool, Option<&str>) {
        fn pick<T>(s: &SectionState<T>) -> (bool, Option<&str>) {
            (s.loading, s.error.as_deref())
        }
        match key {
            SectionKey::NewsArticles => pick(&self.news),
            SectionKey::NewsSentiment => pick(&self.sentiment),
            SectionKey::QuantitativeRisk => pick(&self.quantitative),
            SectionKey::EsgRisk => pick(&self.esg),
            SectionKey::AnomalyRisk => pick(&self.anomalies),
            SectionKey::OverallRisk => pick(&self.overall),
        }
    }

    /// Pure form of [`RiskSections::apply`].
    pub fn reduce(mut self, event: StreamEvent) -> Self {
        self.apply(event);
        self
    }

    /// Fold one event into the state. Events after `Done` or `Failed` are
    /// ignored.
    pub fn apply(&mut self, event: StreamEvent) {
        if self.phase.is_terminal() {
            debug!(ticker = %self.ticker, ?event, "dropping event after stream end");
            return;
        }

        match event {
            StreamEvent::Message(message) => self.apply_message(message),
            StreamEvent::SectionFailed(key, message) => {
                warn!(ticker = %self.ticker, section = %key, "section payload rejected: {}", message);
                match key {
                    SectionKey::NewsArticles => self.news.fail(message),
                    SectionKey::NewsSentiment => self.sentiment.fail(message),
                    SectionKey::QuantitativeRisk => self.quantitative.fail(message),
                    SectionKey::EsgRisk => self.esg.fail(message),
                    SectionKey::AnomalyRisk => self.anomalies.fail(message),
                    SectionKey::OverallRisk => self.overall.fail(message),
                }
            }
            StreamEvent::TransportError(message) => {
                warn!(ticker = %self.ticker, "risk stream failed: {}", message);
                self.error = Some(message);
                self.loading = false;
                self.phase = StreamPhase::Failed;
            }
        }
    }

    fn apply_message(&mut self, message: StreamMessage) {
        if let Some(key) = message.section() {
            debug!(ticker = %self.ticker, section = %key, "section updated");
        }
        match message {
            StreamMessage::NewsArticles(v) => self.news.fill(v),
            StreamMessage::NewsSentiment(v) => self.sentiment.fill(v),
            StreamMessage::QuantitativeRisk(v) => self.quantitative.fill(v),
            StreamMessage::EsgRisk(v) => self.esg.fill(v),
            StreamMessage::AnomalyRisk(v) => self.anomalies.fill(v),
            StreamMessage::OverallRisk(v) => self.overall.fill(v),
            StreamMessage::Complete => {
                self.loading = false;
                self.phase = StreamPhase::Done;
            }
            StreamMessage::Unknown(kind) => {
                warn!(ticker = %self.ticker, "ignoring unknown message type {:?}", kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    fn quant(score: f64) -> StreamMessage {
        StreamMessage::QuantitativeRisk(Some(QuantitativeRisk {
            risk_score: Some(score),
            ..QuantitativeRisk::default()
        }))
    }

    fn overall(score: f64) -> StreamMessage {
        StreamMessage::OverallRisk(Some(OverallRisk {
            overall_risk_score: score,
            risk_level: RiskLevel::High,
            summary: None,
        }))
    }

    fn sentiment(score: f64) -> StreamMessage {
        StreamMessage::NewsSentiment(Some(NewsSentiment {
            sentiment_score: score,
            sentiment_label: "Neutral".to_string(),
            article_count: None,
            summary: None,
        }))
    }

    #[test]
    fn streaming_resets_every_slot() {
        let state = RiskSections::streaming("ACME");
        assert!(state.loading);
        assert_eq!(state.phase, StreamPhase::Streaming);
        for key in SectionKey::ALL {
            assert_eq!(state.status(key), (true, None));
        }
    }

    #[test]
    fn last_message_of_each_type_wins_and_slots_are_independent() {
        let messages = vec![
            quant(1.0),
            overall(3.0),
            sentiment(0.1),
            quant(2.0),
            StreamMessage::EsgRisk(None),
            overall(7.2),
            sentiment(-0.4),
        ];
        let state = messages
            .into_iter()
            .fold(RiskSections::streaming("ACME"), |s, m| {
                s.reduce(StreamEvent::Message(m))
            });

        assert_eq!(state.quantitative.value.as_ref().unwrap().risk_score, Some(2.0));
        assert_eq!(state.overall.value.as_ref().unwrap().overall_risk_score, 7.2);
        assert_eq!(state.sentiment.value.as_ref().unwrap().sentiment_score, -0.4);
        assert_eq!(state.esg.value, None);
        assert!(!state.esg.loading);

        // untouched slots keep their reset state
        assert_eq!(state.news, SectionState::loading());
        assert_eq!(state.anomalies, SectionState::loading());
        assert!(state.loading);
    }

    #[test]
    fn single_message_touches_only_its_slot() {
        let before = RiskSections::streaming("ACME");
        let after = before.clone().reduce(StreamEvent::Message(sentiment(0.3)));
        assert_ne!(after.sentiment, before.sentiment);
        assert_eq!(after.news, before.news);
        assert_eq!(after.quantitative, before.quantitative);
        assert_eq!(after.esg, before.esg);
        assert_eq!(after.anomalies, before.anomalies);
        assert_eq!(after.overall, before.overall);
    }

    #[test]
    fn complete_is_terminal() {
        let mut state = RiskSections::streaming("ACME");
        state.apply(StreamEvent::Message(StreamMessage::Complete));
        assert_eq!(state.phase, StreamPhase::Done);
        assert!(!state.loading);

        let frozen = state.clone();
        state.apply(StreamEvent::Message(quant(9.0)));
        state.apply(StreamEvent::TransportError("late".to_string()));
        state.apply(StreamEvent::SectionFailed(SectionKey::EsgRisk, "x".to_string()));
        assert_eq!(state, frozen);
    }

    #[test]
    fn transport_error_is_terminal() {
        let mut state = RiskSections::streaming("ACME");
        state.apply(StreamEvent::TransportError("connection reset".to_string()));
        let frozen = state.clone();
        state.apply(StreamEvent::Message(overall(1.0)));
        state.apply(StreamEvent::Message(StreamMessage::Complete));
        assert_eq!(state, frozen);
        assert_eq!(state.phase, StreamPhase::Failed);
    }

    #[test]
    fn transport_error_preserves_partial_results() {
        let state = RiskSections::streaming("ACME")
            .reduce(StreamEvent::Message(quant(4.2)))
            .reduce(StreamEvent::TransportError("connection reset".to_string()));

        assert_eq!(state.quantitative.value.as_ref().unwrap().risk_score, Some(4.2));
        assert!(!state.quantitative.loading);
        assert_eq!(state.error.as_deref(), Some("connection reset"));
        assert!(!state.loading);
        for key in [
            SectionKey::NewsArticles,
            SectionKey::NewsSentiment,
            SectionKey::EsgRisk,
            SectionKey::AnomalyRisk,
            SectionKey::OverallRisk,
        ] {
            assert_eq!(state.status(key), (true, None), "{key} changed");
        }
    }

    #[test]
    fn section_failure_is_local() {
        let state = RiskSections::streaming("ACME").reduce(StreamEvent::SectionFailed(
            SectionKey::EsgRisk,
            "missing field".to_string(),
        ));
        assert_eq!(state.status(SectionKey::EsgRisk), (false, Some("missing field")));
        assert_eq!(state.phase, StreamPhase::Streaming);
        assert!(state.loading);

        // a later good payload clears the section error
        let state = state.reduce(StreamEvent::Message(StreamMessage::EsgRisk(Some(
            EsgRisk::default(),
        ))));
        assert_eq!(state.status(SectionKey::EsgRisk), (false, None));
    }

    #[test]
    fn unknown_messages_change_nothing() {
        let before = RiskSections::streaming("ACME");
        let after = before
            .clone()
            .reduce(StreamEvent::Message(StreamMessage::Unknown("options_flow".into())));
        assert_eq!(before, after);
    }

    mod generated {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Quant(f64),
            Overall(f64),
            Sentiment(f64),
            Unknown,
            Complete,
            Dropped,
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                4 => (-10.0..10.0f64).prop_map(Step::Quant),
                4 => (0.0..10.0f64).prop_map(Step::Overall),
                4 => (-1.0..1.0f64).prop_map(Step::Sentiment),
                1 => Just(Step::Unknown),
                1 => Just(Step::Complete),
                1 => Just(Step::Dropped),
            ]
        }

        fn to_event(step: &Step) -> StreamEvent {
            match step {
                Step::Quant(v) => StreamEvent::Message(quant(*v)),
                Step::Overall(v) => StreamEvent::Message(overall(*v)),
                Step::Sentiment(v) => StreamEvent::Message(sentiment(*v)),
                Step::Unknown => StreamEvent::Message(StreamMessage::Unknown("options_flow".into())),
                Step::Complete => StreamEvent::Message(StreamMessage::Complete),
                Step::Dropped => StreamEvent::TransportError("connection reset".to_string()),
            }
        }

        fn is_end(step: &Step) -> bool {
            matches!(step, Step::Complete | Step::Dropped)
        }

        proptest! {
            #[test]
            fn last_value_before_the_end_wins(steps in prop::collection::vec(step(), 0..40)) {
                let state = steps
                    .iter()
                    .fold(RiskSections::streaming("ACME"), |s, step| s.reduce(to_event(step)));
                let live: Vec<&Step> = steps.iter().take_while(|s| !is_end(s)).collect();

                let last_quant = live.iter().rev().find_map(|s| match s {
                    Step::Quant(v) => Some(*v),
                    _ => None,
                });
                let last_overall = live.iter().rev().find_map(|s| match s {
                    Step::Overall(v) => Some(*v),
                    _ => None,
                });
                let last_sentiment = live.iter().rev().find_map(|s| match s {
                    Step::Sentiment(v) => Some(*v),
                    _ => None,
                });

                prop_assert_eq!(state.quantitative.value.as_ref().and_then(|q| q.risk_score), last_quant);
                prop_assert_eq!(state.quantitative.loading, last_quant.is_none());
                prop_assert_eq!(
                    state.overall.value.as_ref().map(|o| o.overall_risk_score),
                    last_overall
                );
                prop_assert_eq!(state.overall.loading, last_overall.is_none());
                prop_assert_eq!(
                    state.sentiment.value.as_ref().map(|s| s.sentiment_score),
                    last_sentiment
                );
                prop_assert_eq!(state.sentiment.loading, last_sentiment.is_none());

                prop_assert_eq!(&state.news, &SectionState::loading());
                prop_assert_eq!(&state.esg, &SectionState::loading());
                prop_assert_eq!(&state.anomalies, &SectionState::loading());

                match steps.iter().find(|s| is_end(s)) {
                    None => {
                        prop_assert_eq!(state.phase, StreamPhase::Streaming);
                        prop_assert!(state.loading);
                        prop_assert!(state.error.is_none());
                    }
                    Some(Step::Complete) => {
                        prop_assert_eq!(state.phase, StreamPhase::Done);
                        prop_assert!(!state.loading);
                        prop_assert!(state.error.is_none());
                    }
                    Some(_) => {
                        prop_assert_eq!(state.phase, StreamPhase::Failed);
                        prop_assert!(!state.loading);
                        prop_assert_eq!(state.error.as_deref(), Some("connection reset"));
                    }
                }
            }
        }
    }
}
