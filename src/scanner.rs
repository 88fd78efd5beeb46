use crate::db::PostgresPersistence;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::feed::{CandleBuffer, FeedStatus};
use crate::models::{plain_symbol, Heartbeat, Signal};
use crate::sentiment::SentimentSource;
use crate::strategy::Strategy;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Pause after a failed cycle before the next attempt
const ERROR_BACKOFF: Duration = Duration::from_secs(2);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

pub const SIGNAL_QUANTITY: i32 = 1;
pub const SIGNAL_CONFIDENCE: f64 = 0.0;

/// What one scan cycle produced
#[derive(Debug, Default)]
pub struct CycleReport {
    pub signals: Vec<Signal>,
    /// Instruments below the minimum history length
    pub skipped: usize,
    pub dispatch: DispatchReport,
}

struct HeartbeatTarget {
    db: Arc<PostgresPersistence>,
    worker_id: String,
    feed_status: watch::Receiver<FeedStatus>,
}

/// Health record for a completed cycle
pub fn heartbeat_for(
    worker_id: &str,
    feed_status: FeedStatus,
    report: &CycleReport,
    elapsed: Duration,
) -> Heartbeat {
    Heartbeat {
        worker_id: worker_id.to_string(),
        ws_status: feed_status.as_str().to_string(),
        model_local: false,
        backend_ok: report.dispatch.all_delivered(),
        latency_ms: i32::try_from(elapsed.as_millis()).unwrap_or(i32::MAX),
    }
}

/// Periodic decision loop over every tracked instrument
pub struct ScanLoop {
    buffer: CandleBuffer,
    strategy: Arc<dyn Strategy>,
    sentiment: Arc<dyn SentimentSource>,
    dispatcher: Dispatcher,
    interval: Duration,
    heartbeat: Option<HeartbeatTarget>,
}

impl ScanLoop {
    pub fn new(
        buffer: CandleBuffer,
        strategy: Arc<dyn Strategy>,
        sentiment: Arc<dyn SentimentSource>,
        dispatcher: Dispatcher,
        interval: Duration,
    ) -> Self {
        Self {
            buffer,
            strategy,
            sentiment,
            dispatcher,
            interval,
            heartbeat: None,
        }
    }

    /// Write a worker health row after every successful cycle
    pub fn with_heartbeat(
        mut self,
        db: Arc<PostgresPersistence>,
        worker_id: impl Into<String>,
        feed_status: watch::Receiver<FeedStatus>,
    ) -> Self {
        self.heartbeat = Some(HeartbeatTarget {
            db,
            worker_id: worker_id.into(),
            feed_status,
        });
        self
    }

    /// Evaluate and dispatch every instrument with enough history
    ///
    /// Works on a copy of the candle store, so ingestion is never blocked by
    /// the network calls made here.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let snapshot = self.buffer.snapshot()?;
        let min_candles = self.strategy.min_candles_required();
        let mut report = CycleReport::default();

        for (instrument, candles) in snapshot {
            if candles.len() < min_candles {
                tracing::debug!(
                    instrument = %instrument,
                    "Skipping: {}/{} candles",
                    candles.len(),
                    min_candles
                );
                report.skipped += 1;
                continue;
            }

            let symbol = plain_symbol(&instrument);
            let sentiment = match self.sentiment.score(&symbol).await {
                Ok(score) if score.is_finite() => score,
                Ok(_) => 0.0,
                Err(e) => {
                    tracing::warn!(symbol = %symbol, "Sentiment unavailable, using neutral: {:#}", e);
                    0.0
                }
            };

            let evaluation = self.strategy.evaluate(&candles, sentiment)?;
            let signal = Signal {
                instrument,
                decision: evaluation.decision,
                entry_price: evaluation.entry_price,
                stop_loss: evaluation.bounds.stop_loss,
                take_profit: evaluation.bounds.take_profit,
                sentiment_score: sentiment,
                confidence: SIGNAL_CONFIDENCE,
                quantity: SIGNAL_QUANTITY,
                generated_at: Utc::now(),
            };

            tracing::info!(
                instrument = %signal.instrument,
                decision = %signal.decision,
                "  @ {:.2} (SL {:.2}, TP {:.2}, RSI {:?}, sentiment {:.3})",
                signal.entry_price,
                signal.stop_loss,
                signal.take_profit,
                evaluation.snapshot.rsi_14,
                sentiment
            );

            let dispatched = self.dispatcher.dispatch(&signal).await;
            report.dispatch.delivered += dispatched.delivered;
            report.dispatch.failed += dispatched.failed;
            report.signals.push(signal);
        }

        Ok(report)
    }

    async fn write_heartbeat(&self, report: &CycleReport, elapsed: Duration) {
        let Some(target) = &self.heartbeat else {
            return;
        };

        let status = *target.feed_status.borrow();
        let heartbeat = heartbeat_for(&target.worker_id, status, report, elapsed);
        match tokio::time::timeout(HEARTBEAT_TIMEOUT, target.db.record_heartbeat(&heartbeat)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to record heartbeat: {}", e),
            Err(_) => tracing::warn!("Heartbeat write timed out after {:?}", HEARTBEAT_TIMEOUT),
        }
    }

    /// Run cycles forever; a failed cycle is logged and retried after a short backoff
    pub async fn run(&self) {
        tracing::info!(
            "💹 Scan loop starting ({}, every {}s)",
            self.strategy.name(),
            self.interval.as_secs()
        );

        loop {
            let started = Instant::now();
            match self.run_cycle().await {
                Ok(report) => {
                    tracing::debug!(
                        "Cycle done: {} signals, {} skipped, {} dispatch failures",
                        report.signals.len(),
                        report.skipped,
                        report.dispatch.failed
                    );
                    self.write_heartbeat(&report, started.elapsed()).await;
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => {
                    tracing::error!("Scan cycle failed: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }
}
