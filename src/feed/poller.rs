use super::{CandleBuffer, FeedStatus};
use crate::api::MarketDataSource;
use crate::models::Tick;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Which instant a polled bar is bucketed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketClock {
    /// Local time of the fetch
    #[default]
    Fetch,
    /// Timestamp reported with the bar
    Bar,
}

impl FromStr for BucketClock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch" => Ok(BucketClock::Fetch),
            "bar" => Ok(BucketClock::Bar),
            other => Err(format!("unknown bucket clock: {}", other)),
        }
    }
}

/// Periodically fetches the latest 1-minute bar of every symbol
pub struct PollingFeed {
    source: Arc<dyn MarketDataSource>,
    buffer: CandleBuffer,
    symbols: Vec<String>,
    interval: Duration,
    clock: BucketClock,
    status: Option<watch::Sender<FeedStatus>>,
}

impl PollingFeed {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        buffer: CandleBuffer,
        symbols: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            buffer,
            symbols,
            interval,
            clock: BucketClock::default(),
            status: None,
        }
    }

    pub fn with_clock(mut self, clock: BucketClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_status(mut self, status: watch::Sender<FeedStatus>) -> Self {
        self.status = Some(status);
        self
    }

    /// Poll every symbol once; returns how many ticks were recorded
    ///
    /// A symbol that fails is logged and skipped, the others are still polled.
    pub async fn poll_once(&self) -> usize {
        let mut recorded = 0;

        for symbol in &self.symbols {
            let bar = match self.source.latest_bar(symbol).await {
                Ok(bar) => bar,
                Err(e) => {
                    tracing::warn!(symbol = %symbol, "Poll failed: {}", e);
                    continue;
                }
            };

            let tick = Tick {
                instrument: symbol.clone(),
                price: bar.close,
                volume: bar.volume,
                timestamp: match self.clock {
                    BucketClock::Fetch => Utc::now(),
                    BucketClock::Bar => bar.timestamp,
                },
            };
            match self.buffer.record(&tick) {
                Ok(()) => recorded += 1,
                Err(e) => tracing::error!(symbol = %symbol, "Failed to record polled bar: {}", e),
            }
        }

        tracing::debug!("Polled {}/{} symbols", recorded, self.symbols.len());
        recorded
    }

    /// Poll forever at the configured interval
    pub async fn run(self) {
        if let Some(tx) = &self.status {
            tx.send_replace(FeedStatus::Polling);
        }
        tracing::info!(
            "📡 Polling {} symbols every {}s",
            self.symbols.len(),
            self.interval.as_secs()
        );

        loop {
            self.poll_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Bar;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};

    struct FakeSource {
        bar_time: DateTime<Utc>,
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn latest_bar(&self, symbol: &str) -> anyhow::Result<Bar> {
            match symbol {
                "RELIANCE.NS" => Ok(Bar {
                    timestamp: self.bar_time,
                    close: 2450.0,
                    volume: 1200.0,
                }),
                "TCS.NS" => Ok(Bar {
                    timestamp: self.bar_time,
                    close: 3900.0,
                    volume: 0.0,
                }),
                _ => anyhow::bail!("no chart data for {}", symbol),
            }
        }
    }

    fn feed(clock: BucketClock) -> (PollingFeed, CandleBuffer, DateTime<Utc>) {
        let bar_time = Utc.with_ymd_and_hms(2024, 1, 2, 9, 15, 0).unwrap();
        let buffer = CandleBuffer::new(60);
        let symbols = vec![
            "RELIANCE.NS".to_string(),
            "UNKNOWN.NS".to_string(),
            "TCS.NS".to_string(),
        ];
        let feed = PollingFeed::new(
            Arc::new(FakeSource { bar_time }),
            buffer.clone(),
            symbols,
            Duration::from_secs(5),
        )
        .with_clock(clock);
        (feed, buffer, bar_time)
    }

    #[test]
    fn test_bucket_clock_parse() {
        assert_eq!("fetch".parse::<BucketClock>().unwrap(), BucketClock::Fetch);
        assert_eq!(" BAR ".parse::<BucketClock>().unwrap(), BucketClock::Bar);
        assert!("exchange".parse::<BucketClock>().is_err());
    }

    #[tokio::test]
    async fn test_poll_once_skips_failing_symbols() {
        let (feed, buffer, _) = feed(BucketClock::Fetch);

        assert_eq!(feed.poll_once().await, 2);

        let reliance = buffer.get_candles("RELIANCE.NS").unwrap();
        assert_eq!(reliance.len(), 1);
        assert_eq!(reliance[0].close, 2450.0);
        assert_eq!(reliance[0].volume, 1200.0);
        assert_eq!(buffer.candle_count("UNKNOWN.NS").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bar_clock_uses_bar_timestamp() {
        let (feed, buffer, bar_time) = feed(BucketClock::Bar);

        feed.poll_once().await;
        feed.poll_once().await;

        // same bar twice lands in the same bucket
        let tcs = buffer.get_candles("TCS.NS").unwrap();
        assert_eq!(tcs.len(), 1);
        assert_eq!(tcs[0].bucket_start, bar_time);
    }
}
