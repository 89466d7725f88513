//! HTTP backtest evaluator adapter.
//!
//! The statistical simulator runs as a service; it executes the strategy
//! against cached market data for one instrument and reports statistics.
//! Anything the simulator itself could not handle (insufficient history,
//! unparseable strategy, runtime faults) arrives in the `error` field and
//! becomes a recorded failure result, never an `Err`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::PinerankError;
use crate::domain::evaluation::{EvaluationResult, InstrumentMetrics};
use crate::ports::config_port::ConfigPort;
use crate::ports::evaluate_port::EvaluatePort;

const DEFAULT_TIMEOUT_SECS: i64 = 300;

#[derive(Debug)]
pub struct BacktestHttpAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Serialize)]
struct EvaluateRequest<'a> {
    strategy: &'a str,
    instrument: &'a str,
}

#[derive(Deserialize)]
struct EvaluateResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    metrics: InstrumentMetrics,
}

impl BacktestHttpAdapter {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, PinerankError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PinerankError::Evaluation {
                symbol: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PinerankError> {
        let url = config.get_string("evaluator", "url").ok_or_else(|| {
            PinerankError::ConfigMissing {
                section: "evaluator".into(),
                key: "url".into(),
            }
        })?;
        let timeout = config.get_int("evaluator", "timeout_secs", DEFAULT_TIMEOUT_SECS) as u64;
        Self::new(url.trim_end_matches('/').to_string(), timeout)
    }
}

impl EvaluatePort for BacktestHttpAdapter {
    fn evaluate(
        &self,
        strategy_text: &str,
        symbol: &str,
    ) -> Result<EvaluationResult, PinerankError> {
        let response = self
            .client
            .post(format!("{}/backtest", self.base_url))
            .json(&EvaluateRequest {
                strategy: strategy_text,
                instrument: symbol,
            })
            .send()
            .map_err(|e| PinerankError::Evaluation {
                symbol: symbol.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PinerankError::Evaluation {
                symbol: symbol.into(),
                reason: format!("evaluation service returned {status}"),
            });
        }

        let body: EvaluateResponse =
            response.json().map_err(|e| PinerankError::Evaluation {
                symbol: symbol.into(),
                reason: format!("invalid evaluation response: {e}"),
            })?;

        Ok(match body.error {
            Some(error) => EvaluationResult::failure(symbol, error),
            None => EvaluationResult::success(symbol, body.metrics),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_requires_url() {
        struct EmptyConfig;
        impl ConfigPort for EmptyConfig {
            fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
                None
            }
            fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
                default
            }
            fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
                default
            }
            fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
                default
            }
        }

        match BacktestHttpAdapter::from_config(&EmptyConfig) {
            Err(PinerankError::ConfigMissing { section, key }) => {
                assert_eq!(section, "evaluator");
                assert_eq!(key, "url");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn response_deserializes_partial_metrics() {
        let body = r#"{"roi_pct": 12.5, "sharpe_ratio": 1.4, "num_trades": 18}"#;
        let parsed: EvaluateResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.error.is_none());
        assert_eq!(parsed.metrics.roi_pct, Some(12.5));
        assert_eq!(parsed.metrics.sharpe_ratio, Some(1.4));
        assert_eq!(parsed.metrics.num_trades, Some(18));
        assert_eq!(parsed.metrics.profit_factor, None);
    }

    #[test]
    fn response_deserializes_simulator_error() {
        let body = r#"{"error": "insufficient data for BTC-USD"}"#;
        let parsed: EvaluateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("insufficient data for BTC-USD"));
        assert_eq!(parsed.metrics, InstrumentMetrics::default());
    }
}
