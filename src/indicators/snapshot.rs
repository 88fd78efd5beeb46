use super::{calculate_atr, calculate_bollinger, calculate_ema, calculate_macd, calculate_rsi, calculate_vwap};
use crate::models::Candle;

pub const EMA_FAST_PERIOD: usize = 9;
pub const EMA_SLOW_PERIOD: usize = 21;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;

/// Indicator values at the latest candle of a series
///
/// Every indicator is `None` until the series is long enough to compute it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema_9: Option<f64>,
    pub ema_21: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr_14: Option<f64>,
    pub vwap: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute the latest indicator row over the whole series
    ///
    /// Returns None for an empty series.
    pub fn compute(candles: &[Candle]) -> Option<Self> {
        let close = candles.last()?.close;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let macd = calculate_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let bands = calculate_bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_STD_DEV);

        Some(Self {
            close,
            ema_9: calculate_ema(&closes, EMA_FAST_PERIOD),
            ema_21: calculate_ema(&closes, EMA_SLOW_PERIOD),
            rsi_14: calculate_rsi(&closes, RSI_PERIOD),
            macd: macd.map(|m| m.macd),
            macd_signal: macd.map(|m| m.signal),
            macd_hist: macd.map(|m| m.histogram),
            bb_mid: bands.map(|b| b.mid),
            bb_upper: bands.map(|b| b.upper),
            bb_lower: bands.map(|b| b.lower),
            atr_14: calculate_atr(candles, ATR_PERIOD),
            vwap: calculate_vwap(candles),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                bucket_start: start + Duration::minutes(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_empty_series() {
        assert!(IndicatorSnapshot::compute(&[]).is_none());
    }

    #[test]
    fn test_short_series_leaves_slow_indicators_empty() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64).collect();
        let snap = IndicatorSnapshot::compute(&series(&closes)).unwrap();

        assert_eq!(snap.close, 124.0);
        assert!(snap.ema_9.is_some());
        assert!(snap.ema_21.is_some());
        assert!(snap.rsi_14.is_some());
        assert!(snap.bb_mid.is_some());
        assert!(snap.atr_14.is_some());
        assert!(snap.vwap.is_some());
        // MACD signal line needs 34 closes
        assert!(snap.macd.is_none());
        assert!(snap.macd_signal.is_none());
    }

    #[test]
    fn test_full_series() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let snap = IndicatorSnapshot::compute(&series(&closes)).unwrap();

        assert!(snap.macd.is_some() && snap.macd_signal.is_some() && snap.macd_hist.is_some());
        let (lower, mid, upper) = (
            snap.bb_lower.unwrap(),
            snap.bb_mid.unwrap(),
            snap.bb_upper.unwrap(),
        );
        assert!(lower <= mid && mid <= upper);
        assert!(snap.atr_14.unwrap() > 0.0);
    }
}
