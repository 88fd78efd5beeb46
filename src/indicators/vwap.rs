use crate::models::Candle;

/// Session VWAP anchored at the UTC day of the latest candle
///
/// Uses the typical price `(high + low + close) / 3`. Returns None when the
/// session has no volume, which is the case for price-only streaming feeds.
pub fn calculate_vwap(candles: &[Candle]) -> Option<f64> {
    let session = candles.last()?.bucket_start.date_naive();

    let (pv, volume) = candles
        .iter()
        .rev()
        .take_while(|c| c.bucket_start.date_naive() == session)
        .fold((0.0, 0.0), |(pv, vol), c| {
            let typical = (c.high + c.low + c.close) / 3.0;
            (pv + typical * c.volume, vol + c.volume)
        });

    if volume > 0.0 {
        Some(pv / volume)
    } else {
        None
    }
}
