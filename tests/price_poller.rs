mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{spawn_backend, sse, Reply, Seen};
use risk_dashboard::render::{render_dashboard, render_price};
use risk_dashboard::{
    BackendClient, BackendQuoteSource, DashboardError, PricePoller, PriceSnapshot, QuoteSource,
    RiskAnalysisPanel, RiskStreamClient, StreamPhase, YahooQuoteSource,
};

fn quote_source(base_url: &str) -> BackendQuoteSource {
    BackendQuoteSource::new(BackendClient::new(base_url, Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn backend_fast_quote() {
    let mut backend = spawn_backend(vec![Reply::Status(
        200,
        r#"{"lastPrice":105.0,"prevClose":100.0,"currency":"USD"}"#.to_string(),
    )])
    .await;

    let snapshot = quote_source(&backend.url()).fetch_quote("acme").await.unwrap();
    assert_eq!(snapshot.last_price, 105.0);
    assert_eq!(snapshot.prev_close, Some(100.0));
    assert_eq!(snapshot.currency, "USD");
    assert!(snapshot.fetched_at.is_some());

    assert!(matches!(
        backend.next_seen().await,
        Seen::Request { path, .. } if path == "/fast-quote/ACME"
    ));
}

#[tokio::test]
async fn backend_error_status_is_reported() {
    let backend = spawn_backend(vec![Reply::Status(503, r#"{"detail":"busy"}"#.to_string())]).await;
    let err = quote_source(&backend.url()).fetch_quote("ACME").await.unwrap_err();
    assert!(matches!(err, DashboardError::Status { .. }), "{err}");
}

#[tokio::test]
async fn yahoo_quote() {
    let mut backend = spawn_backend(vec![Reply::Status(
        200,
        r#"{"quoteResponse":{"result":[{"symbol":"ACME","regularMarketPrice":50.0,"regularMarketPreviousClose":48.0,"currency":"USD"}]}}"#
            .to_string(),
    )])
    .await;

    let source = YahooQuoteSource::new(backend.url(), Duration::from_secs(5)).unwrap();
    let snapshot = source.fetch_quote("ACME").await.unwrap();
    assert_eq!(snapshot.last_price, 50.0);
    assert_eq!(snapshot.prev_close, Some(48.0));

    assert!(matches!(
        backend.next_seen().await,
        Seen::Request { path, .. } if path == "/v7/finance/quote?symbols=ACME"
    ));
}

#[tokio::test]
async fn poller_rolls_back_to_initial_price_over_http() {
    let backend = spawn_backend(vec![
        Reply::Status(200, r#"{"lastPrice":105.0,"prevClose":100.0,"currency":"$"}"#.to_string()),
        Reply::Status(500, "boom".to_string()),
    ])
    .await;
    let source: Arc<dyn QuoteSource> = Arc::new(quote_source(&backend.url()));

    let mut poller = PricePoller::start(
        source,
        "ACME",
        PriceSnapshot::new(100.0, None, "$"),
        Duration::from_millis(100),
    );

    assert!(tokio::time::timeout(Duration::from_secs(5), poller.changed()).await.unwrap());
    assert_eq!(poller.snapshot().snapshot.last_price, 105.0);

    assert!(tokio::time::timeout(Duration::from_secs(5), poller.changed()).await.unwrap());
    let view = poller.snapshot();
    assert_eq!(view.snapshot.last_price, 100.0);
    assert!(view.error.is_some());
    assert!(render_price(&view).starts_with("ACME 100.00 $"));

    poller.stop().await;
}

#[tokio::test]
async fn quote_outage_leaves_the_risk_stream_running() {
    let mut backend = spawn_backend(vec![
        Reply::Status(500, r#"{"detail":"quote service down"}"#.to_string()),
        Reply::EventsThenHold(vec![
            sse(r#"{"type":"overall_risk","data":{"overall_risk_score":7.2,"risk_level":"High"}}"#),
            sse(r#"{"type":"complete"}"#),
        ]),
    ])
    .await;
    let backend_client = BackendClient::new(&backend.url(), Duration::from_secs(5)).unwrap();
    let source: Arc<dyn QuoteSource> = Arc::new(BackendQuoteSource::new(backend_client.clone()));

    let poller = PricePoller::launch(source, "ACME", None, Duration::from_millis(100)).await;
    assert!(poller.is_none());
    assert!(matches!(
        backend.next_seen().await,
        Seen::Request { path, .. } if path == "/fast-quote/ACME"
    ));

    let mut panel = RiskAnalysisPanel::new(RiskStreamClient::new(backend_client), None);
    let mount = panel.mount("ACME", true).await.unwrap();
    let state = tokio::time::timeout(Duration::from_secs(5), mount.wait_finished())
        .await
        .unwrap();
    assert_eq!(state.phase, StreamPhase::Done);
    assert!(render_dashboard(&state).contains("Overall risk: 7.2/10 (High)"));

    panel.unmount().await;
}
