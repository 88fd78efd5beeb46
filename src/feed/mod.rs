// Tick ingestion: candle store plus the streaming and polling strategies
pub mod candle_buffer;
pub mod poller;
pub mod stream;

pub use candle_buffer::CandleBuffer;
pub use poller::{BucketClock, PollingFeed};
pub use stream::{QuoteError, StreamFeed};

use std::fmt;

/// Lifecycle of the active ingestion strategy, reported in heartbeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Disabled,
    Connecting,
    Subscribed,
    Closed,
    Polling,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Disabled => "disabled",
            FeedStatus::Connecting => "connecting",
            FeedStatus::Subscribed => "subscribed",
            FeedStatus::Closed => "closed",
            FeedStatus::Polling => "polling",
        }
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
