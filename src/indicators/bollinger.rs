use super::moving_average::calculate_sma;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

/// Bollinger bands over the last `period` prices (population standard deviation)
pub fn calculate_bollinger(prices: &[f64], period: usize, std_dev: f64) -> Option<BollingerBands> {
    let mid = calculate_sma(prices, period)?;
    let window = &prices[prices.len() - period..];
    let variance = window.iter().map(|p| (p - mid).powi(2)).sum::<f64>() / period as f64;
    let width = std_dev * variance.sqrt();

    Some(BollingerBands {
        upper: mid + width,
        mid,
        lower: mid - width,
    })
}
