use super::{CandleBuffer, FeedStatus};
use crate::api::{InstrumentMaster, MapBy};
use crate::config::StreamSettings;
use crate::models::Tick;
use crate::Result;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

pub const SUBSCRIPTION_GUID: &str = "pulsetrade-sub";
const PING_INTERVAL: Duration = Duration::from_secs(25);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Price fields in order of precedence
const PRICE_FIELDS: [&str; 3] = ["lastPrice", "ltp", "close"];

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("price field `{field}` is not numeric: {value}")]
    NonNumericPrice { field: &'static str, value: String },
}

/// Price update for one instrument, decoded from a feed message
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub instrument_key: String,
    pub price: f64,
}

/// Decode a `{data: {instrumentKey, lastPrice|ltp|close}}` message
///
/// Returns `Ok(None)` for every other shape. A price field only counts when it
/// is present and non-zero, so `ltp` is consulted when `lastPrice` is 0.
pub fn parse_quote(text: &str) -> std::result::Result<Option<Quote>, QuoteError> {
    let root: Value = serde_json::from_str(text)?;

    let Some(data) = root.get("data").filter(|d| d.is_object()) else {
        return Ok(None);
    };
    let instrument_key = match data.get("instrumentKey").and_then(Value::as_str) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => return Ok(None),
    };

    for field in PRICE_FIELDS {
        let price = match data.get(field) {
            Some(Value::Number(n)) => match n.as_f64() {
                Some(p) if p != 0.0 => p,
                _ => continue,
            },
            Some(Value::String(s)) if !s.trim().is_empty() => {
                let p = s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|p| p.is_finite())
                    .ok_or_else(|| QuoteError::NonNumericPrice {
                        field,
                        value: s.clone(),
                    })?;
                if p == 0.0 {
                    continue;
                }
                p
            }
            _ => continue,
        };
        return Ok(Some(Quote {
            instrument_key,
            price,
        }));
    }

    Ok(None)
}

/// Subscription request naming every instrument key and the quote mode
pub fn subscription_message(mode: &str, instrument_keys: &[String]) -> String {
    json!({
        "guid": SUBSCRIPTION_GUID,
        "method": "sub",
        "data": {
            "mode": mode,
            "instrumentKeys": instrument_keys,
        }
    })
    .to_string()
}

/// Source used to resolve instrument keys when none are configured
struct KeyResolver {
    master: InstrumentMaster,
    symbols: Vec<String>,
    map_by: MapBy,
}

/// Single long-lived quote subscription feeding the candle buffer
///
/// The session is not re-established after it ends; the caller decides what a
/// closed feed means for the process.
pub struct StreamFeed {
    settings: StreamSettings,
    buffer: CandleBuffer,
    resolver: Option<KeyResolver>,
    status: Option<watch::Sender<FeedStatus>>,
    ping_interval: Duration,
    pong_timeout: Duration,
}

impl StreamFeed {
    pub fn new(settings: StreamSettings, buffer: CandleBuffer) -> Self {
        Self {
            settings,
            buffer,
            resolver: None,
            status: None,
            ping_interval: PING_INTERVAL,
            pong_timeout: PONG_TIMEOUT,
        }
    }

    /// Override the ping cadence and how long to wait for the matching pong
    pub fn with_keep_alive(mut self, ping_interval: Duration, pong_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.pong_timeout = pong_timeout;
        self
    }

    /// Resolve `symbols` through the instrument master when no keys are configured
    pub fn with_instrument_master(
        mut self,
        master: InstrumentMaster,
        symbols: Vec<String>,
        map_by: MapBy,
    ) -> Self {
        self.resolver = Some(KeyResolver {
            master,
            symbols,
            map_by,
        });
        self
    }

    pub fn with_status(mut self, status: watch::Sender<FeedStatus>) -> Self {
        self.status = Some(status);
        self
    }

    fn set_status(&self, status: FeedStatus) {
        if let Some(tx) = &self.status {
            tx.send_replace(status);
        }
    }

    /// Record one inbound text frame; returns true when a tick was recorded
    pub fn handle_message(&self, text: &str) -> bool {
        match parse_quote(text) {
            Ok(Some(quote)) => {
                let tick = Tick {
                    instrument: quote.instrument_key,
                    price: quote.price,
                    volume: 0.0,
                    timestamp: Utc::now(),
                };
                match self.buffer.record(&tick) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(instrument = %tick.instrument, error = %e, "Failed to record tick");
                        false
                    }
                }
            }
            Ok(None) => {
                tracing::trace!("Ignoring non-quote message");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed feed message");
                false
            }
        }
    }

    async fn instrument_keys(&self) -> Result<Vec<String>> {
        if !self.settings.instrument_keys.is_empty() {
            return Ok(self.settings.instrument_keys.clone());
        }

        let resolver = self
            .resolver
            .as_ref()
            .ok_or("No instrument keys configured and no instrument master to map symbols")?;
        let keys = resolver
            .master
            .resolve(&resolver.symbols, resolver.map_by)
            .await?;
        Ok(keys)
    }

    /// Run the session until the server closes it or an error occurs
    pub async fn run(self) -> Result<()> {
        if self.settings.url.is_empty() || self.settings.token.is_empty() {
            self.set_status(FeedStatus::Disabled);
            return Ok(());
        }

        let keys = match self.instrument_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("Instrument master mapping failed: {}", e);
                self.set_status(FeedStatus::Disabled);
                return Ok(());
            }
        };
        for key in &keys {
            self.buffer.ensure(key)?;
        }

        self.set_status(FeedStatus::Connecting);
        let result = self.session(&keys).await;
        self.set_status(FeedStatus::Closed);

        match &result {
            Ok(()) => tracing::warn!("Quote stream closed; no reconnect is attempted"),
            Err(e) => tracing::error!("Quote stream failed: {}", e),
        }
        result
    }

    async fn session(&self, keys: &[String]) -> Result<()> {
        let mut request = self.settings.url.as_str().into_client_request()?;
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.settings.token))?,
        );

        tracing::info!(url = %self.settings.url, "Connecting to quote stream");
        let (ws_stream, _response) = connect_async(request).await?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(subscription_message(&self.settings.mode, keys)))
            .await?;
        self.set_status(FeedStatus::Subscribed);
        tracing::info!(mode = %self.settings.mode, "Subscribed to {} instruments: {:?}", keys.len(), keys);

        let mut keep_alive = interval(self.ping_interval);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        keep_alive.tick().await;
        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_message(&text);
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            self.handle_message(text);
                        }
                        Err(_) => tracing::debug!(len = bytes.len(), "Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Pong(_))) => pong_deadline = None,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Quote stream closed by server");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                },
                _ = keep_alive.tick() => {
                    write.send(Message::Ping(Vec::new())).await?;
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.pong_timeout);
                    }
                }
                _ = sleep_until(pong_deadline.unwrap_or_else(Instant::now)), if pong_deadline.is_some() => {
                    return Err("No pong received within keep-alive timeout".into());
                }
            }
        }
    }
}
