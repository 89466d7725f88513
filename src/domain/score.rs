//! Composite ranking score.
//!
//! The score is derived, never stored authoritatively: it is recomputed
//! from a set of [`EvaluationResult`]s whenever it is needed, so two
//! aggregations over the same results are bit-identical.

use serde::Serialize;

use super::evaluation::{EvaluationResult, InstrumentMetrics};

const WEIGHT_SHARPE: f64 = 0.30;
const WEIGHT_ROI: f64 = 0.25;
const WEIGHT_WIN_RATE: f64 = 0.25;
const WEIGHT_PROFIT_FACTOR: f64 = 0.20;

/// Weighted scalar ranking one item, with the per-metric roll-ups that
/// went into it. `composite` keeps full precision; [`CompositeScore::rounded`]
/// is the 4-decimal display and storage form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    pub composite: f64,
    pub avg_sharpe: f64,
    pub avg_roi: f64,
    pub avg_win_rate: f64,
    pub avg_profit_factor: f64,
    pub instruments_passed: usize,
    pub instruments_failed: usize,
}

impl CompositeScore {
    pub fn rounded(&self) -> f64 {
        (self.composite * 10_000.0).round() / 10_000.0
    }
}

/// Mean of one metric across successful evaluations. A metric that is
/// null or non-finite on a given success is excluded from that metric's
/// mean, never counted as zero; the mean of an empty set is zero so the
/// term contributes nothing.
fn metric_mean<F>(successes: &[&InstrumentMetrics], pick: F) -> f64
where
    F: Fn(&InstrumentMetrics) -> Option<f64>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for metrics in successes {
        if let Some(value) = pick(metrics).filter(|v| v.is_finite()) {
            sum += value;
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Aggregate per-instrument results into one composite score.
///
/// Returns `None` when no instrument produced metrics: a fully-failed
/// item never receives a rank, and an absent score is not a zero score.
pub fn aggregate(results: &[EvaluationResult]) -> Option<CompositeScore> {
    let successes: Vec<&InstrumentMetrics> =
        results.iter().filter_map(|r| r.metrics.as_ref()).collect();
    let failed = results.len() - successes.len();

    if successes.is_empty() {
        return None;
    }

    let avg_sharpe = metric_mean(&successes, |m| m.sharpe_ratio);
    let avg_roi = metric_mean(&successes, |m| m.roi_pct);
    let avg_win_rate = metric_mean(&successes, |m| m.win_rate_pct);
    let avg_profit_factor = metric_mean(&successes, |m| m.profit_factor);

    let composite = WEIGHT_SHARPE * avg_sharpe
        + WEIGHT_ROI * (avg_roi / 100.0)
        + WEIGHT_WIN_RATE * (avg_win_rate / 100.0)
        + WEIGHT_PROFIT_FACTOR * (avg_profit_factor / 10.0);

    Some(CompositeScore {
        composite,
        avg_sharpe,
        avg_roi,
        avg_win_rate,
        avg_profit_factor,
        instruments_passed: successes.len(),
        instruments_failed: failed,
    })
}
