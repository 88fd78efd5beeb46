use super::moving_average::ema_series;

/// Latest MACD row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Moving Average Convergence Divergence
///
/// MACD line is EMA(fast) - EMA(slow); the signal line is an EMA of the MACD
/// line. Needs `slow + signal - 1` prices before the signal line exists.
pub fn calculate_macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || slow <= fast || signal == 0 {
        return None;
    }

    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .filter_map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let macd = *macd_line.last()?;
    let signal_value = ema_series(&macd_line, signal).last().copied().flatten()?;

    Some(Macd {
        macd,
        signal: signal_value,
        histogram: macd - signal_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend(len: usize, step: f64) -> Vec<f64> {
        (0..len).map(|i| 100.0 + i as f64 * step).collect()
    }

    #[test]
    fn test_macd_needs_enough_history() {
        assert!(calculate_macd(&trend(33, 1.0), 12, 26, 9).is_none());
        assert!(calculate_macd(&trend(34, 1.0), 12, 26, 9).is_some());
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let macd = calculate_macd(&trend(60, 1.0), 12, 26, 9).unwrap();
        assert!(macd.macd > 0.0);
        assert!((macd.histogram - (macd.macd - macd.signal)).abs() < 1e-12);
    }

    #[test]
    fn test_macd_turns_below_signal_after_reversal() {
        let mut prices = trend(50, 1.0);
        let top = *prices.last().unwrap();
        prices.extend((1..=8).map(|i| top - i as f64 * 3.0));

        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!(macd.macd < macd.signal);
    }

    #[test]
    fn test_macd_rejects_bad_periods() {
        assert!(calculate_macd(&trend(60, 1.0), 26, 12, 9).is_none());
        assert!(calculate_macd(&trend(60, 1.0), 12, 26, 0).is_none());
    }
}
