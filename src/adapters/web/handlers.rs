//! HTTP request handlers for the API adapter.

use axum::{Json, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::evaluation::EvaluationResult;
use crate::domain::orchestrator::SubmitOutcome;
use crate::domain::work_item::{SourceLocator, source_name_from_url};

use super::{ApiError, AppState, client_key};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_runs: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_runs: state.admission.in_flight(),
    })
}

#[derive(Debug, Deserialize)]
pub struct BacktestRequest {
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InstrumentReport {
    pub instrument: String,
    pub roi_pct: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub win_rate_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub profit_factor: Option<f64>,
    pub num_trades: Option<i64>,
    pub error: Option<String>,
}

impl From<&EvaluationResult> for InstrumentReport {
    fn from(result: &EvaluationResult) -> Self {
        let metrics = result.metrics.clone().unwrap_or_default();
        Self {
            instrument: result.symbol.clone(),
            roi_pct: metrics.roi_pct,
            sharpe_ratio: metrics.sharpe_ratio,
            win_rate_pct: metrics.win_rate_pct,
            max_drawdown_pct: metrics.max_drawdown_pct,
            profit_factor: metrics.profit_factor,
            num_trades: metrics.num_trades,
            error: result.error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BacktestResponse {
    pub item_id: String,
    pub category: String,
    pub composite_score: Option<f64>,
    pub instruments: Vec<InstrumentReport>,
    pub duplicate_of: Option<String>,
}

pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BacktestRequest>,
) -> Result<Json<BacktestResponse>, ApiError> {
    let url = body.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::bad_request("url must not be empty"));
    }

    let key = client_key(&headers);
    let permit = state.admission.admit(&key).map_err(ApiError::from)?;

    let category = body
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| "custom".to_string());
    let source = SourceLocator::new(url.clone(), source_name_from_url(&url), category.clone());

    // the pipeline is synchronous and slow; keep it off the async workers
    let orchestrator = Arc::clone(&state.orchestrator);
    let outcome = tokio::task::spawn_blocking(move || orchestrator.submit(&source))
        .await
        .map_err(|e| ApiError::internal(format!("pipeline task failed: {e}")))?
        .map_err(ApiError::from)?;
    drop(permit);

    let response = match outcome {
        SubmitOutcome::Completed(report) => BacktestResponse {
            item_id: report.item.item_id,
            category: report.item.category,
            composite_score: report.score.as_ref().map(|s| s.rounded()),
            instruments: report.results.iter().map(InstrumentReport::from).collect(),
            duplicate_of: None,
        },
        SubmitOutcome::Duplicate {
            item_id,
            duplicate_of,
        } => BacktestResponse {
            item_id,
            category,
            composite_score: None,
            instruments: Vec::new(),
            duplicate_of: Some(duplicate_of),
        },
    };

    Ok(Json(response))
}

