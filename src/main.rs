use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use risk_dashboard::config::QuoteSourceKind;
use risk_dashboard::render::{render_dashboard, render_price};
use risk_dashboard::{
    BackendClient, BackendQuoteSource, DashboardConfig, PricePoller, PriceSnapshot, PriceView,
    QuoteSource, RiskAnalysisPanel, RiskSections, RiskStreamClient, YahooQuoteSource,
};

/// Terminal view of the risk dashboard for one ticker
#[derive(Parser, Debug)]
#[command(name = "risk-dashboard", version)]
struct Args {
    /// Ticker to analyse
    ticker: String,

    /// Do not open the risk-analysis stream (asset not tracked)
    #[arg(long)]
    no_stream: bool,

    /// Do not poll the price
    #[arg(long)]
    no_price: bool,

    /// Price shown before the first refresh and after failed ones
    #[arg(long)]
    initial_price: Option<f64>,

    /// Previous close matching --initial-price
    #[arg(long, requires = "initial_price")]
    prev_close: Option<f64>,

    /// Currency label matching --initial-price
    #[arg(long, default_value = "$")]
    currency: String,

    /// Exit once the risk stream has finished
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = DashboardConfig::from_env().context("Failed to load configuration")?;
    info!("Loaded configuration: {:?}", config);

    let backend = BackendClient::from_config(&config).context("Failed to create HTTP client")?;

    let mut panel = RiskAnalysisPanel::new(RiskStreamClient::new(backend.clone()), config.idle_timeout());
    let mut stream_rx = panel
        .mount(&args.ticker, !args.no_stream)
        .await
        .map(|mount| mount.subscribe());

    let poller = if args.no_price {
        None
    } else {
        let source: Arc<dyn QuoteSource> = match config.poller.source {
            QuoteSourceKind::Backend => Arc::new(BackendQuoteSource::new(backend.clone())),
            QuoteSourceKind::Yahoo => Arc::new(
                YahooQuoteSource::new(config.poller.yahoo_base_url.clone(), config.request_timeout())
                    .context("Failed to create Yahoo client")?,
            ),
        };
        let initial = args
            .initial_price
            .map(|price| PriceSnapshot::new(price, args.prev_close, args.currency.clone()));
        PricePoller::launch(source, &args.ticker, initial, config.poll_interval()).await
    };
    let mut price_rx = poller.as_ref().map(PricePoller::subscribe);

    let mut risk: Option<RiskSections> = panel.snapshot();
    let mut price: Option<PriceView> = poller.as_ref().map(PricePoller::snapshot);
    print_screen(risk.as_ref(), price.as_ref());

    loop {
        if stream_rx.is_none() && price_rx.is_none() {
            break;
        }

        tokio::select! {
            next = next_state(&mut stream_rx) => match next {
                Some(state) => {
                    let finished = state.is_finished();
                    risk = Some(state);
                    print_screen(risk.as_ref(), price.as_ref());
                    if finished && args.once {
                        break;
                    }
                }
                None => stream_rx = None,
            },
            next = next_state(&mut price_rx) => match next {
                Some(view) => {
                    price = Some(view);
                    print_screen(risk.as_ref(), price.as_ref());
                    if args.once && stream_rx.is_none() && risk.is_none() {
                        break;
                    }
                }
                None => price_rx = None,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    if let Some(last) = panel.unmount().await {
        info!(ticker = %last.ticker, phase = ?last.phase, "risk stream closed");
    }
    if let Some(poller) = poller {
        let last = poller.stop().await;
        if let Some(e) = last.error {
            warn!("Last price refresh failed: {}", e);
        }
    }
    Ok(())
}

/// Next state published on `rx`; `None` once its producer is gone. Never
/// resolves when there is no receiver.
async fn next_state<T: Clone>(rx: &mut Option<watch::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

fn print_screen(risk: Option<&RiskSections>, price: Option<&PriceView>) {
    let mut blocks = Vec::new();
    if let Some(view) = price {
        blocks.push(render_price(view));
    }
    if let Some(state) = risk {
        blocks.push(render_dashboard(state));
    }
    if !blocks.is_empty() {
        println!("{}\n", blocks.join("\n\n"));
    }
}
