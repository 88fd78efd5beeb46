pub mod upstox;
pub mod yahoo;

pub use upstox::{InstrumentMaster, MapBy};
pub use yahoo::{Bar, HeadlineSource, MarketDataSource, YahooClient};
