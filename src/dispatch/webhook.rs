use super::SignalSink;
use crate::models::Signal;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct PushBody<'a> {
    signal: PushSignal<'a>,
}

#[derive(Debug, Serialize)]
struct PushSignal<'a> {
    symbol: String,
    decision: &'a str,
    score: f64,
    #[serde(rename = "modelConfidence")]
    model_confidence: f64,
    qty: i32,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
    rationale: String,
}

impl<'a> PushSignal<'a> {
    fn from_signal(signal: &'a Signal, strategy: &str) -> Self {
        Self {
            symbol: signal.plain_symbol(),
            decision: signal.decision.as_str(),
            score: signal.sentiment_score,
            model_confidence: signal.confidence,
            qty: signal.quantity,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            rationale: format!("{} {}", strategy, signal.decision),
        }
    }
}

/// Posts signals to the app's push endpoint as `{"signal": {...}}`
pub struct WebhookNotifier {
    client: Client,
    url: String,
    strategy: String,
}

impl WebhookNotifier {
    /// # Arguments
    /// * `url` - Push endpoint
    /// * `strategy` - Strategy name, prefixed to the decision in the rationale
    pub fn new(url: impl Into<String>, strategy: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            strategy: strategy.into(),
        })
    }
}

#[async_trait]
impl SignalSink for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, signal: &Signal) -> Result<()> {
        let body = PushBody {
            signal: PushSignal::from_signal(signal, &self.strategy),
        };

        self.client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .context("Push endpoint rejected signal")?;

        tracing::debug!(symbol = %body.signal.symbol, decision = body.signal.decision, "Pushed signal");
        Ok(())
    }
}
