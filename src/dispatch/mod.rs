// Best-effort fan-out of signals to persistence and notification sinks
pub mod webhook;

pub use webhook::WebhookNotifier;

use crate::models::Signal;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single sink attempt
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(15);

/// Destination for produced signals
#[async_trait]
pub trait SignalSink: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one signal, single attempt
    async fn publish(&self, signal: &Signal) -> Result<()>;
}

/// Outcome counts of one `dispatch` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn SignalSink>>,
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            sinks: Vec::new(),
            timeout: DEFAULT_SINK_TIMEOUT,
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every sink attempt; an attempt that runs longer counts as failed
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SignalSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Publish to every sink concurrently; failures are logged, never returned
    pub async fn dispatch(&self, signal: &Signal) -> DispatchReport {
        let timeout = self.timeout;
        let results = join_all(self.sinks.iter().map(|sink| async move {
            let result = match tokio::time::timeout(timeout, sink.publish(signal)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", timeout)),
            };
            (sink.name(), result)
        }))
        .await;

        let mut report = DispatchReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        sink = name,
                        instrument = %signal.instrument,
                        decision = %signal.decision,
                        "Dispatch failed: {:#}",
                        e
                    );
                }
            }
        }
        report
    }
}
