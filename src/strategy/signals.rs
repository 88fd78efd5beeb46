use crate::indicators::IndicatorSnapshot;
use crate::models::Decision;

/// Neutral values substituted for indicators that are not available yet
pub const NEUTRAL_RSI: f64 = 50.0;
pub const NEUTRAL_MACD: f64 = 0.0;

/// Thresholds for the decision rule and risk bounds
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub atr_stop_multiplier: f64,
    pub atr_target_multiplier: f64,
    pub fallback_stop_pct: f64,
    pub fallback_target_pct: f64,
    pub min_candles: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            atr_stop_multiplier: 1.5,
            atr_target_multiplier: 2.0,
            fallback_stop_pct: 0.02,
            fallback_target_pct: 0.02,
            min_candles: 25,
        }
    }
}

/// Map the latest indicator row and a sentiment score to a decision
///
/// BUY needs oversold RSI, MACD above its signal line and non-negative
/// sentiment; SELL is the mirror image. Missing indicators read as neutral
/// (RSI 50, MACD = signal = 0), which always lands on HOLD.
pub fn generate_decision(
    snapshot: &IndicatorSnapshot,
    sentiment: f64,
    config: &SignalConfig,
) -> Decision {
    let rsi = snapshot.rsi_14.unwrap_or(NEUTRAL_RSI);
    let macd = snapshot.macd.unwrap_or(NEUTRAL_MACD);
    let macd_signal = snapshot.macd_signal.unwrap_or(NEUTRAL_MACD);

    if rsi < config.rsi_oversold && macd > macd_signal && sentiment >= 0.0 {
        return Decision::Buy;
    }
    if rsi > config.rsi_overbought && macd < macd_signal && sentiment <= 0.0 {
        return Decision::Sell;
    }
    Decision::Hold
}

/// Stop-loss and take-profit around an entry price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskBounds {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl RiskBounds {
    /// ATR-scaled bounds, or fixed percentages when ATR is missing or not positive
    pub fn compute(entry: f64, atr: Option<f64>, config: &SignalConfig) -> Self {
        match atr.filter(|a| *a > 0.0) {
            Some(atr) => Self {
                stop_loss: entry - config.atr_stop_multiplier * atr,
                take_profit: entry + config.atr_target_multiplier * atr,
            },
            None => Self {
                stop_loss: entry * (1.0 - config.fallback_stop_pct),
                take_profit: entry * (1.0 + config.fallback_target_pct),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(rsi: f64, macd: f64, macd_signal: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 100.0,
            rsi_14: Some(rsi),
            macd: Some(macd),
            macd_signal: Some(macd_signal),
            ..Default::default()
        }
    }

    fn decide(rsi: f64, macd: f64, macd_signal: f64, sentiment: f64) -> Decision {
        generate_decision(
            &snapshot(rsi, macd, macd_signal),
            sentiment,
            &SignalConfig::default(),
        )
    }

    #[test]
    fn test_decision_truth_table() {
        assert_eq!(decide(20.0, 5.0, 2.0, 0.0), Decision::Buy);
        assert_eq!(decide(80.0, 1.0, 3.0, 0.0), Decision::Sell);
        assert_eq!(decide(50.0, 0.0, 0.0, 0.0), Decision::Hold);
    }

    #[test]
    fn test_sentiment_veto() {
        assert_eq!(decide(20.0, 5.0, 2.0, -0.5), Decision::Hold);
        assert_eq!(decide(80.0, 1.0, 3.0, 0.4), Decision::Hold);
    }

    #[test]
    fn test_thresholds_are_strict() {
        assert_eq!(decide(35.0, 5.0, 2.0, 0.0), Decision::Hold);
        assert_eq!(decide(65.0, 1.0, 3.0, 0.0), Decision::Hold);
        assert_eq!(decide(20.0, 2.0, 2.0, 0.0), Decision::Hold);
    }

    #[test]
    fn test_missing_indicators_are_neutral() {
        let empty = IndicatorSnapshot {
            close: 100.0,
            ..Default::default()
        };
        let config = SignalConfig::default();

        assert_eq!(generate_decision(&empty, 1.0, &config), Decision::Hold);
        assert_eq!(generate_decision(&empty, -1.0, &config), Decision::Hold);

        // oversold RSI alone cannot buy while MACD defaults to its signal line
        let rsi_only = IndicatorSnapshot {
            rsi_14: Some(10.0),
            ..empty
        };
        assert_eq!(generate_decision(&rsi_only, 0.5, &config), Decision::Hold);
    }

    #[test]
    fn test_risk_bounds_from_atr() {
        let bounds = RiskBounds::compute(100.0, Some(2.0), &SignalConfig::default());
        assert!((bounds.stop_loss - 97.0).abs() < 1e-9);
        assert!((bounds.take_profit - 104.0).abs() < 1e-9);
    }

    #[test]
    fn test_risk_bounds_fallback() {
        let config = SignalConfig::default();
        for atr in [Some(0.0), Some(-1.0), None] {
            let bounds = RiskBounds::compute(100.0, atr, &config);
            assert!((bounds.stop_loss - 98.0).abs() < 1e-9);
            assert!((bounds.take_profit - 102.0).abs() < 1e-9);
        }
    }
}
