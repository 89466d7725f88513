//! LLM transform adapter over the Anthropic Messages API.
//!
//! Converts raw Pine Script into a `backtesting.py`-style strategy file
//! the evaluation service can execute. On a retry the previous failure
//! is appended to the prompt so the model can correct itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::PinerankError;
use crate::ports::config_port::ConfigPort;
use crate::ports::transform_port::TransformPort;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_MAX_TOKENS: i64 = 4096;
const DEFAULT_TIMEOUT_SECS: i64 = 120;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The evaluation service loads the class by this name; output that
/// lacks it cannot run.
const STRATEGY_CLASS_MARKER: &str = "class TvStrategy";

const CONVERSION_PROMPT: &str = "You are a Pine Script to Python converter for algorithmic \
trading backtests. Given the Pine Script below, return a complete, runnable Python file \
using the backtesting.py library: import Backtest and Strategy from backtesting, use \
pandas_ta for indicator calculations, and define a Strategy subclass named TvStrategy \
with init() and next() methods. If the script is only an indicator, derive sensible \
entry and exit rules from its signals. Return only the Python code, with no markdown \
fences and no commentary.";

#[derive(Debug)]
pub struct ClaudeTransformAdapter {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: i64,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: i64,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ClaudeTransformAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PinerankError> {
        let api_key = config
            .get_string("transform", "api_key")
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| PinerankError::ConfigMissing {
                section: "transform".into(),
                key: "api_key".into(),
            })?;

        let api_url = config
            .get_string("transform", "api_url")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let model = config
            .get_string("transform", "model")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let max_tokens = config.get_int("transform", "max_tokens", DEFAULT_MAX_TOKENS);
        let timeout = config.get_int("transform", "timeout_secs", DEFAULT_TIMEOUT_SECS) as u64;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| PinerankError::Transform {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            max_tokens,
        })
    }

    fn build_prompt(raw_source: &str, previous_error: Option<&str>) -> String {
        let mut prompt = format!("{CONVERSION_PROMPT}\n\nPINE SCRIPT:\n{raw_source}");
        if let Some(error) = previous_error {
            prompt.push_str(&format!(
                "\n\nThe previous conversion attempt failed with:\n{error}\n\
                 Fix the problem and return the corrected code."
            ));
        }
        prompt
    }
}

impl TransformPort for ClaudeTransformAdapter {
    fn transform(
        &self,
        raw_source: &str,
        previous_error: Option<&str>,
    ) -> Result<String, PinerankError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: Self::build_prompt(raw_source, previous_error),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .map_err(|e| PinerankError::Transform {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PinerankError::Transform {
                reason: format!("conversion API returned {status}: {}", truncate(&body, 300)),
            });
        }

        let body: MessagesResponse = response.json().map_err(|e| PinerankError::Transform {
            reason: format!("invalid conversion API response: {e}"),
        })?;

        let text = body
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .ok_or_else(|| PinerankError::Transform {
                reason: "conversion API returned no text content".into(),
            })?;

        let code = strip_code_fences(text);
        if !code.contains(STRATEGY_CLASS_MARKER) {
            return Err(PinerankError::Transform {
                reason: "no TvStrategy class in converted output".into(),
            });
        }

        Ok(code)
    }
}

/// Models wrap code in markdown fences despite instructions; strip them.
fn strip_code_fences(code: &str) -> String {
    let trimmed = code.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("python").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
