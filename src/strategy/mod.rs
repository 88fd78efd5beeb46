// Trading strategy module
pub mod signals;

use crate::indicators::IndicatorSnapshot;
use crate::models::{Candle, Decision};
use crate::Result;
use signals::{generate_decision, RiskBounds, SignalConfig};

/// Outcome of evaluating one candle series
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: Decision,
    pub entry_price: f64,
    pub bounds: RiskBounds,
    pub snapshot: IndicatorSnapshot,
}

/// Base trait for decision engines run by the scan loop
pub trait Strategy: Send + Sync {
    /// Evaluate a full candle series together with a sentiment score
    fn evaluate(&self, candles: &[Candle], sentiment: f64) -> Result<Evaluation>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required before the strategy is consulted
    fn min_candles_required(&self) -> usize;
}

/// Technical indicators gated by headline sentiment
#[derive(Debug, Clone, Default)]
pub struct TaSentimentStrategy {
    config: SignalConfig,
}

impl TaSentimentStrategy {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }
}

impl Strategy for TaSentimentStrategy {
    fn evaluate(&self, candles: &[Candle], sentiment: f64) -> Result<Evaluation> {
        let snapshot = IndicatorSnapshot::compute(candles).ok_or("Cannot evaluate empty series")?;

        let decision = generate_decision(&snapshot, sentiment, &self.config);
        let entry_price = snapshot.close;
        let bounds = RiskBounds::compute(entry_price, snapshot.atr_14, &self.config);

        Ok(Evaluation {
            decision,
            entry_price,
            bounds,
            snapshot,
        })
    }

    fn name(&self) -> &str {
        "TA+VADER"
    }

    fn min_candles_required(&self) -> usize {
        self.config.min_candles
    }
}
