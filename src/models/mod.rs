use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV aggregate over one fixed-width time bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub bucket_start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Fresh candle for the first tick of a bucket
    pub fn open_at(bucket_start: DateTime<Utc>, open: f64, price: f64, volume: f64) -> Self {
        Self {
            bucket_start,
            open,
            high: price.max(open),
            low: price.min(open),
            close: price,
            volume,
        }
    }

    /// Fold another tick of the same bucket into this candle
    pub fn apply(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }
}

/// A single price observation for one instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub instrument: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// Trading decision produced by a scan cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::Sell => "SELL",
            Decision::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision for one instrument with entry price and risk bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub instrument: String,
    pub decision: Decision,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub sentiment_score: f64,
    pub confidence: f64,
    pub quantity: i32,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// Instrument symbol with provider prefix and exchange suffix stripped
    ///
    /// `NSE_EQ|RELIANCE.NS` and `RELIANCE.NS` both become `RELIANCE`.
    pub fn plain_symbol(&self) -> String {
        plain_symbol(&self.instrument)
    }
}

pub fn plain_symbol(instrument: &str) -> String {
    instrument
        .rsplit('|')
        .next()
        .unwrap_or(instrument)
        .replace(".NS", "")
}

/// Worker health record written after each scan cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub worker_id: String,
    pub ws_status: String,
    pub model_local: bool,
    pub backend_ok: bool,
    pub latency_ms: i32,
}
