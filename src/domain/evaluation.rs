//! Per-instrument evaluation results.

use serde::{Deserialize, Serialize};

/// Normalize a possibly-absent metric: NaN and infinities become `None`
/// so they can never leak into means or serialized output.
pub fn clean_numeric(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Statistics reported by the backtest simulator for one instrument.
/// Every field is nullable; the simulator leaves a metric undefined when
/// it cannot compute it (for example profit factor with no losing trades).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetrics {
    pub roi_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub win_rate_pct: Option<f64>,
    pub profit_factor: Option<f64>,
    pub expectancy_pct: Option<f64>,
    pub num_trades: Option<i64>,
}

impl InstrumentMetrics {
    /// Scrub non-finite values from every numeric field.
    pub fn cleaned(self) -> Self {
        Self {
            roi_pct: clean_numeric(self.roi_pct),
            max_drawdown_pct: clean_numeric(self.max_drawdown_pct),
            sharpe_ratio: clean_numeric(self.sharpe_ratio),
            sortino_ratio: clean_numeric(self.sortino_ratio),
            win_rate_pct: clean_numeric(self.win_rate_pct),
            profit_factor: clean_numeric(self.profit_factor),
            expectancy_pct: clean_numeric(self.expectancy_pct),
            num_trades: self.num_trades,
        }
    }
}

/// Outcome of evaluating one strategy against one instrument.
///
/// Exactly one of `metrics` and `error` is populated; the constructors
/// are the only way the orchestrator builds these, which keeps the
/// invariant. Read-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub symbol: String,
    pub metrics: Option<InstrumentMetrics>,
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn success(symbol: impl Into<String>, metrics: InstrumentMetrics) -> Self {
        Self {
            symbol: symbol.into(),
            metrics: Some(metrics.cleaned()),
            error: None,
        }
    }

    pub fn failure(symbol: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            metrics: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.metrics.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_numeric_drops_non_finite() {
        assert_eq!(clean_numeric(Some(1.5)), Some(1.5));
        assert_eq!(clean_numeric(Some(f64::NAN)), None);
        assert_eq!(clean_numeric(Some(f64::INFINITY)), None);
        assert_eq!(clean_numeric(Some(f64::NEG_INFINITY)), None);
        assert_eq!(clean_numeric(None), None);
    }

    #[test]
    fn success_scrubs_metrics() {
        let result = EvaluationResult::success(
            "SPY",
            InstrumentMetrics {
                roi_pct: Some(12.0),
                profit_factor: Some(f64::INFINITY),
                sharpe_ratio: Some(f64::NAN),
                ..InstrumentMetrics::default()
            },
        );
        let metrics = result.metrics.as_ref().unwrap();
        assert_eq!(metrics.roi_pct, Some(12.0));
        assert_eq!(metrics.profit_factor, None);
        assert_eq!(metrics.sharpe_ratio, None);
        assert!(result.is_success());
        assert!(result.error.is_none());
    }

    #[test]
    fn failure_has_error_and_no_metrics() {
        let result = EvaluationResult::failure("BTC-USD", "insufficient data");
        assert!(!result.is_success());
        assert!(result.metrics.is_none());
        assert_eq!(result.error.as_deref(), Some("insufficient data"));
    }

    #[test]
    fn zero_trade_run_is_still_a_success() {
        let result = EvaluationResult::success(
            "QQQ",
            InstrumentMetrics {
                roi_pct: Some(0.0),
                win_rate_pct: Some(0.0),
                num_trades: Some(0),
                ..InstrumentMetrics::default()
            },
        );
        assert!(result.is_success());
    }
}
