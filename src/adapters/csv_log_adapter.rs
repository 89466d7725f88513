//! CSV results log adapter.
//!
//! Appends one row per (item, instrument) to a local summary CSV; the
//! header is written once when the file is created.

use std::fs::OpenOptions;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::error::PinerankError;
use crate::domain::evaluation::EvaluationResult;
use crate::domain::score::CompositeScore;
use crate::domain::work_item::WorkItem;
use crate::ports::config_port::ConfigPort;
use crate::ports::sink_port::PersistencePort;

pub const DEFAULT_RESULTS_CSV: &str = "results/backtest_results.csv";

pub struct CsvLogAdapter {
    path: PathBuf,
}

#[derive(Serialize)]
struct ResultRow<'a> {
    script_name: &'a str,
    category: &'a str,
    instrument: &'a str,
    roi_pct: Option<f64>,
    max_drawdown_pct: Option<f64>,
    sharpe_ratio: Option<f64>,
    sortino_ratio: Option<f64>,
    expectancy_pct: Option<f64>,
    num_trades: Option<i64>,
    win_rate_pct: Option<f64>,
    profit_factor: Option<f64>,
    composite_score: Option<f64>,
    error: &'a str,
}

impl CsvLogAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let path = config
            .get_string("pipeline", "results_csv")
            .unwrap_or_else(|| DEFAULT_RESULTS_CSV.to_string());
        Self::new(path)
    }
}

impl PersistencePort for CsvLogAdapter {
    fn store(
        &self,
        item: &WorkItem,
        results: &[EvaluationResult],
        score: Option<&CompositeScore>,
    ) -> Result<(), PinerankError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PinerankError::Sync {
                    reason: format!("creating {}: {e}", parent.display()),
                })?;
            }
        }

        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PinerankError::Sync {
                reason: format!("opening {}: {e}", self.path.display()),
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);

        for result in results {
            let metrics = result.metrics.clone().unwrap_or_default();
            writer
                .serialize(ResultRow {
                    script_name: &item.item_id,
                    category: &item.category,
                    instrument: &result.symbol,
                    roi_pct: metrics.roi_pct,
                    max_drawdown_pct: metrics.max_drawdown_pct,
                    sharpe_ratio: metrics.sharpe_ratio,
                    sortino_ratio: metrics.sortino_ratio,
                    expectancy_pct: metrics.expectancy_pct,
                    num_trades: metrics.num_trades,
                    win_rate_pct: metrics.win_rate_pct,
                    profit_factor: metrics.profit_factor,
                    composite_score: score.map(|s| s.rounded()),
                    error: result.error.as_deref().unwrap_or(""),
                })
                .map_err(|e| PinerankError::Sync {
                    reason: format!("CSV write error: {e}"),
                })?;
        }

        writer.flush().map_err(|e| PinerankError::Sync {
            reason: format!("CSV flush error: {e}"),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evaluation::InstrumentMetrics;
    use crate::domain::score::aggregate;
    use tempfile::TempDir;

    fn item() -> WorkItem {
        WorkItem {
            item_id: "rsi-divergence".into(),
            category: "oscillators".into(),
            content_hash: "abc".into(),
        }
    }

    fn results() -> Vec<EvaluationResult> {
        vec![
            EvaluationResult::success(
                "SPY",
                InstrumentMetrics {
                    roi_pct: Some(10.0),
                    sharpe_ratio: Some(1.5),
                    win_rate_pct: Some(60.0),
                    profit_factor: Some(2.0),
                    num_trades: Some(12),
                    ..InstrumentMetrics::default()
                },
            ),
            EvaluationResult::failure("BTC-USD", "no data"),
        ]
    }

    #[test]
    fn writes_header_once_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        let adapter = CsvLogAdapter::new(&path);

        let results = results();
        let score = aggregate(&results);
        adapter.store(&item(), &results, score.as_ref()).unwrap();
        adapter.store(&item(), &results, score.as_ref()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        // one header plus two rows per store call
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("script_name,category,instrument"));
        assert!(lines[1].contains("rsi-divergence"));
        assert!(lines[1].contains("SPY"));
        assert!(lines[2].contains("no data"));
    }

    #[test]
    fn failure_rows_have_empty_metrics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        let adapter = CsvLogAdapter::new(&path);

        let failures = vec![EvaluationResult::failure("QQQ", "conversion failed")];
        adapter.store(&item(), &failures, None).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert!(row.contains("QQQ"));
        assert!(row.contains("conversion failed"));
        assert!(row.contains(",,,,")); // absent metrics stay empty
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/results/log.csv");
        let adapter = CsvLogAdapter::new(&path);
        adapter.store(&item(), &results(), None).unwrap();
        assert!(path.exists());
    }
}
