//! HTTP API adapter.
//!
//! Exposes the interactive submit path as a small JSON API: one endpoint
//! that runs the full pipeline for a script URL and one health probe.
//! Admission control sits in front of the orchestrator here; batch
//! sweeps bypass it.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::*;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::domain::admission::AdmissionController;
use crate::domain::orchestrator::Orchestrator;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub admission: AdmissionController,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/backtest", post(handlers::run_backtest))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Client key for rate limiting: first hop of X-Forwarded-For when the
/// server sits behind a proxy. Key derivation is deliberately this
/// shallow; anything stronger belongs in the proxy.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
