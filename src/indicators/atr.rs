/// Average True Range (ATR) indicator
///
/// Measures market volatility by calculating the average of true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Uses Wilder's smoothing (same as RSI) for the moving average.

use crate::models::Candle;

/// Calculate ATR for the given candles
///
/// Returns the current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|w| {
            let (prev_close, high, low) = (w[0].close, w[1].high, w[1].low);
            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect();

    // First ATR is simple average of first 'period' true ranges
    let first_atr: f64 = true_ranges.iter().take(period).sum::<f64>() / period as f64;

    // Apply Wilder's smoothing for subsequent values
    let atr = true_ranges[period..].iter().fold(first_atr, |atr, tr| {
        (atr * (period as f64 - 1.0) + tr) / period as f64
    });

    Some(atr)
}
