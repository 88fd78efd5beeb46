use crate::api::upstox::MapBy;
use crate::feed::poller::BucketClock;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SYMBOLS: &str = "RELIANCE.NS,TCS.NS,INFY.NS";
pub const DEFAULT_INSTRUMENTS_CSV_URL: &str = "https://api.upstox.com/v2/instruments";
pub const DEFAULT_SIGNALS_PUSH_URL: &str = "https://pulsetrade.vercel.app/api/signals/push";
pub const DEFAULT_WORKER_ID: &str = "render-worker-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
    #[error("CANDLE_SECONDS must be greater than zero")]
    ZeroCandleWidth,
    #[error("SYMBOLS must name at least one instrument")]
    NoSymbols,
    #[error("unknown UPSTOX_MAP_BY value `{0}` (expected `tradingsymbol` or `isin`)")]
    UnknownMapBy(String),
    #[error("unknown POLL_BUCKET_CLOCK value `{0}` (expected `fetch` or `bar`)")]
    UnknownBucketClock(String),
}

/// Flat view of the environment, one field per variable
#[derive(Debug, Deserialize)]
struct RawSettings {
    symbols: String,
    interval_seconds: u64,
    candle_seconds: u64,
    min_candles: usize,
    upstox_ws_url: Option<String>,
    upstox_ws_token: Option<String>,
    upstox_ws_mode: String,
    upstox_instrument_keys: Option<String>,
    upstox_instruments_csv_url: String,
    upstox_map_by: String,
    yf_poll_seconds: u64,
    poll_bucket_clock: String,
    vercel_signals_push_url: Option<String>,
    supabase_db_url: Option<String>,
    worker_id: String,
}

/// Streaming session parameters, present only when both URL and token are set
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub url: String,
    pub token: String,
    pub mode: String,
    /// Pre-resolved instrument keys; empty means "map from the reference table"
    pub instrument_keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub symbols: Vec<String>,
    pub scan_interval: Duration,
    pub candle_seconds: u64,
    pub min_candles: usize,
    pub stream: Option<StreamSettings>,
    pub instruments_csv_url: String,
    pub map_by: MapBy,
    pub poll_interval: Duration,
    pub poll_bucket_clock: BucketClock,
    pub signals_push_url: Option<String>,
    pub database_url: Option<String>,
    pub worker_id: String,
}

impl Settings {
    /// Load settings from process environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(config::Config::builder().add_source(Environment::default()))
    }

    /// Load settings from an arbitrary builder, layering the defaults underneath
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder
            .set_default("symbols", DEFAULT_SYMBOLS)?
            .set_default("interval_seconds", 5)?
            .set_default("candle_seconds", 60)?
            .set_default("min_candles", 25)?
            .set_default("upstox_ws_mode", "ltp")?
            .set_default("upstox_instruments_csv_url", DEFAULT_INSTRUMENTS_CSV_URL)?
            .set_default("upstox_map_by", "tradingsymbol")?
            .set_default("yf_poll_seconds", 5)?
            .set_default("poll_bucket_clock", "fetch")?
            .set_default("vercel_signals_push_url", DEFAULT_SIGNALS_PUSH_URL)?
            .set_default("worker_id", DEFAULT_WORKER_ID)?
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        if raw.candle_seconds == 0 {
            return Err(ConfigError::ZeroCandleWidth);
        }

        let symbols = split_list(&raw.symbols);
        if symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }

        let map_by = raw
            .upstox_map_by
            .parse()
            .map_err(|_| ConfigError::UnknownMapBy(raw.upstox_map_by.clone()))?;
        let poll_bucket_clock = raw
            .poll_bucket_clock
            .parse()
            .map_err(|_| ConfigError::UnknownBucketClock(raw.poll_bucket_clock.clone()))?;

        let stream = match (non_blank(raw.upstox_ws_url), non_blank(raw.upstox_ws_token)) {
            (Some(url), Some(token)) => Some(StreamSettings {
                url,
                token,
                mode: raw.upstox_ws_mode.trim().to_string(),
                instrument_keys: raw
                    .upstox_instrument_keys
                    .as_deref()
                    .map(split_list)
                    .unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            symbols,
            scan_interval: Duration::from_secs(raw.interval_seconds),
            candle_seconds: raw.candle_seconds,
            min_candles: raw.min_candles,
            stream,
            instruments_csv_url: raw.upstox_instruments_csv_url,
            map_by,
            poll_interval: Duration::from_secs(raw.yf_poll_seconds),
            poll_bucket_clock,
            signals_push_url: non_blank(raw.vercel_signals_push_url),
            database_url: non_blank(raw.supabase_db_url),
            worker_id: raw.worker_id,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
