use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use mockito::Matcher;
use pulsetrade::dispatch::{Dispatcher, WebhookNotifier};
use pulsetrade::feed::CandleBuffer;
use pulsetrade::scanner::ScanLoop;
use pulsetrade::sentiment::FixedSentiment;
use pulsetrade::strategy::{Strategy, TaSentimentStrategy};
use pulsetrade::Decision;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Long sell-off followed by a two-minute bounce, one tick per minute
fn feed_selloff_and_bounce(buffer: &CandleBuffer, instrument: &str) {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap();
    let mut closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64 * 2.0).collect();
    closes.extend([121.0, 122.5]);

    for (i, close) in closes.into_iter().enumerate() {
        buffer
            .record_tick(instrument, close, 100.0, start + ChronoDuration::minutes(i as i64))
            .unwrap();
    }
}

#[tokio::test]
async fn test_ticks_to_dispatched_signal() {
    let buffer = CandleBuffer::new(60);
    feed_selloff_and_bounce(&buffer, "NSE_EQ|RELIANCE.NS");

    // a young series stays below the history threshold
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap();
    for i in 0..10 {
        buffer
            .record_tick("NSE_EQ|TCS.NS", 3900.0, 5.0, start + ChronoDuration::minutes(i))
            .unwrap();
    }

    let mut server = mockito::Server::new_async().await;
    let push = server
        .mock("POST", "/api/signals/push")
        .match_body(Matcher::PartialJson(json!({
            "signal": {
                "symbol": "RELIANCE",
                "decision": "BUY",
                "qty": 1,
                "modelConfidence": 0.0,
                "rationale": "TA+VADER BUY"
            }
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let strategy = Arc::new(TaSentimentStrategy::default());
    let webhook = WebhookNotifier::new(
        format!("{}/api/signals/push", server.url()),
        strategy.name(),
    )
    .unwrap();
    let unreachable = WebhookNotifier::new("http://127.0.0.1:9/push", strategy.name()).unwrap();
    let dispatcher = Dispatcher::new()
        .with_sink(Arc::new(webhook))
        .with_sink(Arc::new(unreachable));

    let scan = ScanLoop::new(
        buffer.clone(),
        strategy,
        Arc::new(FixedSentiment(0.1)),
        dispatcher,
        Duration::from_secs(5),
    );

    let report = scan.run_cycle().await.unwrap();

    push.assert_async().await;
    assert_eq!(report.skipped, 1);
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.dispatch.delivered, 1);
    assert_eq!(report.dispatch.failed, 1);

    let signal = &report.signals[0];
    assert_eq!(signal.instrument, "NSE_EQ|RELIANCE.NS");
    assert_eq!(signal.decision, Decision::Buy);
    assert_eq!(signal.entry_price, 122.5);
    assert!(signal.stop_loss < signal.entry_price);
    assert!(signal.take_profit > signal.entry_price);
    // ATR-based bounds keep the 1.5 : 2.0 ratio
    let risk = signal.entry_price - signal.stop_loss;
    let reward = signal.take_profit - signal.entry_price;
    assert!((reward / risk - 2.0 / 1.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_negative_sentiment_vetoes_buy() {
    let buffer = CandleBuffer::new(60);
    feed_selloff_and_bounce(&buffer, "INFY.NS");

    let scan = ScanLoop::new(
        buffer,
        Arc::new(TaSentimentStrategy::default()),
        Arc::new(FixedSentiment(-0.5)),
        Dispatcher::new(),
        Duration::from_secs(5),
    );

    let report = scan.run_cycle().await.unwrap();
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].decision, Decision::Hold);
}

#[tokio::test]
async fn test_ingestion_and_scan_run_concurrently() {
    let buffer = CandleBuffer::new(60);
    let writer = buffer.clone();
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap();

    let ingest = tokio::spawn(async move {
        for i in 0..600i64 {
            let at = start + ChronoDuration::seconds(i * 7);
            writer
                .record_tick("SBIN.NS", 600.0 + (i % 13) as f64, 1.0, at)
                .unwrap();
            if i % 50 == 0 {
                tokio::task::yield_now().await;
            }
        }
    });

    let scan = ScanLoop::new(
        buffer.clone(),
        Arc::new(TaSentimentStrategy::default()),
        Arc::new(FixedSentiment(0.0)),
        Dispatcher::new(),
        Duration::from_millis(1),
    );
    for _ in 0..5 {
        scan.run_cycle().await.unwrap();
        tokio::task::yield_now().await;
    }
    ingest.await.unwrap();

    let candles = buffer.get_candles("SBIN.NS").unwrap();
    assert_eq!(candles.len(), 70);
    assert!(candles.windows(2).all(|w| w[0].bucket_start < w[1].bucket_start));
    assert!(candles
        .iter()
        .all(|c| c.low <= c.open.min(c.close) && c.high >= c.open.max(c.close)));
}
