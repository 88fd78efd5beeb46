// Technical indicators module
// Implements EMA, RSI, MACD, Bollinger bands, ATR and VWAP over candle series

pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod snapshot;
pub mod vwap;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use macd::{calculate_macd, Macd};
pub use moving_average::{calculate_ema, calculate_sma, ema_series};
pub use rsi::calculate_rsi;
pub use snapshot::IndicatorSnapshot;
pub use vwap::calculate_vwap;
