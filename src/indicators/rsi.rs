/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions. Average gain and loss are seeded with
/// a simple mean over the first `period` changes, then Wilder-smoothed.
///
/// Values:
/// - RSI > 65: Overbought (SELL side of the decision rule)
/// - RSI < 35: Oversold (BUY side)
///
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;

    let smoothing = period as f64;
    for &change in &changes[period..] {
        avg_gain = (avg_gain * (smoothing - 1.0) + gain(change)) / smoothing;
        avg_loss = (avg_loss * (smoothing - 1.0) + loss(change)) / smoothing;
    }

    if avg_loss == 0.0 {
        // flat series carries no momentum either way
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}
