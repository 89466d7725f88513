//! PostgREST sync adapter.
//!
//! Uploads pipeline results to the remote datastore (Supabase) via its
//! PostgREST interface: one indicator row per item, one backtest row per
//! (item, instrument), both merge-duplicate upserts. Also serves the
//! rankings workflow: fetch by composite score, patch dense ranks back.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::PinerankError;
use crate::domain::evaluation::EvaluationResult;
use crate::domain::score::CompositeScore;
use crate::domain::work_item::WorkItem;
use crate::ports::config_port::ConfigPort;
use crate::ports::sink_port::PersistencePort;

const DEFAULT_TIMEOUT_SECS: i64 = 15;
const INDICATORS_TABLE: &str = "tv_indicators";
const BACKTESTS_TABLE: &str = "tv_backtests";

#[derive(Debug)]
pub struct PostgrestSyncAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct IndicatorRow<'a> {
    script_name: &'a str,
    category: &'a str,
    conversion_status: &'a str,
    composite_score: Option<f64>,
    avg_sharpe: Option<f64>,
    avg_roi: Option<f64>,
    avg_win_rate: Option<f64>,
    avg_profit_factor: Option<f64>,
    num_instruments_tested: usize,
}

#[derive(Deserialize)]
struct IndicatorRecord {
    id: i64,
}

#[derive(Serialize)]
struct BacktestRow<'a> {
    indicator_id: i64,
    script_name: &'a str,
    instrument: &'a str,
    roi_pct: Option<f64>,
    max_drawdown_pct: Option<f64>,
    sharpe_ratio: Option<f64>,
    sortino_ratio: Option<f64>,
    win_rate_pct: Option<f64>,
    profit_factor: Option<f64>,
    expectancy_pct: Option<f64>,
    num_trades: Option<i64>,
    error: Option<&'a str>,
}

/// Indicator row as returned by the rankings query.
#[derive(Debug, Deserialize)]
pub struct RankedIndicator {
    pub id: i64,
    pub script_name: String,
    pub category: String,
    pub composite_score: Option<f64>,
    pub avg_sharpe: Option<f64>,
    pub avg_roi: Option<f64>,
    #[serde(default)]
    pub rank: Option<i64>,
}

impl PostgrestSyncAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PinerankError> {
        let base_url = config.get_string("supabase", "url").ok_or_else(|| {
            PinerankError::ConfigMissing {
                section: "supabase".into(),
                key: "url".into(),
            }
        })?;
        let api_key = config
            .get_string("supabase", "service_key")
            .or_else(|| std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| PinerankError::ConfigMissing {
                section: "supabase".into(),
                key: "service_key".into(),
            })?;
        let timeout = config.get_int("supabase", "timeout_secs", DEFAULT_TIMEOUT_SECS) as u64;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| PinerankError::Sync {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, PinerankError> {
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| PinerankError::Sync {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PinerankError::Sync {
                reason: format!(
                    "PostgREST error ({status}): {}",
                    body.chars().take(500).collect::<String>()
                ),
            });
        }
        Ok(response)
    }

    fn upsert_indicator(
        &self,
        item: &WorkItem,
        status: &str,
        score: Option<&CompositeScore>,
        instruments_tested: usize,
    ) -> Result<i64, PinerankError> {
        let row = IndicatorRow {
            script_name: &item.item_id,
            category: &item.category,
            conversion_status: status,
            composite_score: score.map(|s| s.rounded()),
            avg_sharpe: score.map(|s| s.avg_sharpe),
            avg_roi: score.map(|s| s.avg_roi),
            avg_win_rate: score.map(|s| s.avg_win_rate),
            avg_profit_factor: score.map(|s| s.avg_profit_factor),
            num_instruments_tested: instruments_tested,
        };

        let url = format!("{}?on_conflict=script_name", self.rest_url(INDICATORS_TABLE));
        let response = self.send(
            self.client
                .post(url)
                .header("Prefer", "return=representation,resolution=merge-duplicates")
                .json(&row),
        )?;

        let rows: Vec<IndicatorRecord> = response.json().map_err(|e| PinerankError::Sync {
            reason: format!("invalid PostgREST response: {e}"),
        })?;
        rows.first()
            .map(|r| r.id)
            .ok_or_else(|| PinerankError::Sync {
                reason: format!("indicator upsert returned no row for {}", item.item_id),
            })
    }

    fn upsert_backtest(
        &self,
        indicator_id: i64,
        item: &WorkItem,
        result: &EvaluationResult,
    ) -> Result<(), PinerankError> {
        let metrics = result.metrics.clone().unwrap_or_default();
        let row = BacktestRow {
            indicator_id,
            script_name: &item.item_id,
            instrument: &result.symbol,
            roi_pct: metrics.roi_pct,
            max_drawdown_pct: metrics.max_drawdown_pct,
            sharpe_ratio: metrics.sharpe_ratio,
            sortino_ratio: metrics.sortino_ratio,
            win_rate_pct: metrics.win_rate_pct,
            profit_factor: metrics.profit_factor,
            expectancy_pct: metrics.expectancy_pct,
            num_trades: metrics.num_trades,
            error: result.error.as_deref(),
        };

        let url = format!(
            "{}?on_conflict=script_name,instrument",
            self.rest_url(BACKTESTS_TABLE)
        );
        self.send(
            self.client
                .post(url)
                .header("Prefer", "return=representation,resolution=merge-duplicates")
                .json(&row),
        )?;
        Ok(())
    }

    /// Fetch all indicators ordered by composite score, assign dense
    /// ranks, patch them back, and return the ranked list.
    pub fn update_rankings(&self) -> Result<Vec<RankedIndicator>, PinerankError> {
        let url = format!(
            "{}?select=id,script_name,category,composite_score,avg_sharpe,avg_roi\
             &order=composite_score.desc.nullslast",
            self.rest_url(INDICATORS_TABLE)
        );
        let response = self.send(self.client.get(url))?;
        let mut rows: Vec<RankedIndicator> =
            response.json().map_err(|e| PinerankError::Sync {
                reason: format!("invalid PostgREST response: {e}"),
            })?;

        for (index, row) in rows.iter_mut().enumerate() {
            let rank = (index + 1) as i64;
            let url = format!("{}?id=eq.{}", self.rest_url(INDICATORS_TABLE), row.id);
            self.send(
                self.client
                    .patch(url)
                    .json(&serde_json::json!({ "rank": rank })),
            )?;
            row.rank = Some(rank);
        }

        Ok(rows)
    }
}

impl PersistencePort for PostgrestSyncAdapter {
    fn store(
        &self,
        item: &WorkItem,
        results: &[EvaluationResult],
        score: Option<&CompositeScore>,
    ) -> Result<(), PinerankError> {
        let status = if results.iter().any(EvaluationResult::is_success) {
            "completed"
        } else {
            "error"
        };

        let indicator_id = self.upsert_indicator(item, status, score, results.len())?;
        for result in results {
            self.upsert_backtest(indicator_id, item, result)?;
        }
        Ok(())
    }
}
