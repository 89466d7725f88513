//! HTTP scraper source adapter.
//!
//! Interactive submissions carry a script URL; the browser-automation
//! scraper runs as a sidecar service and this adapter only speaks its
//! narrow contract: POST the URL, get back the script name and raw
//! source.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::PinerankError;
use crate::domain::work_item::{FetchedSource, SourceLocator, slugify};
use crate::ports::config_port::ConfigPort;
use crate::ports::source_port::SourcePort;

const DEFAULT_TIMEOUT_SECS: u64 = 90;

#[derive(Debug)]
pub struct ScraperHttpAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    name: String,
    source: String,
}

impl ScraperHttpAdapter {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, PinerankError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PinerankError::Fetch {
                locator: "scraper".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PinerankError> {
        let url = config.get_string("scraper", "url").ok_or_else(|| {
            PinerankError::ConfigMissing {
                section: "scraper".into(),
                key: "url".into(),
            }
        })?;
        let timeout = config.get_int("scraper", "timeout_secs", DEFAULT_TIMEOUT_SECS as i64) as u64;
        Self::new(url.trim_end_matches('/').to_string(), timeout)
    }
}

impl SourcePort for ScraperHttpAdapter {
    fn fetch(&self, source: &SourceLocator) -> Result<FetchedSource, PinerankError> {
        let response = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .json(&ScrapeRequest {
                url: &source.locator,
            })
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    PinerankError::SourceTimeout {
                        locator: source.locator.clone(),
                    }
                } else {
                    PinerankError::Fetch {
                        locator: source.locator.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        match status.as_u16() {
            404 => {
                return Err(PinerankError::SourceNotFound {
                    locator: source.locator.clone(),
                });
            }
            // closed-source scripts and auth failures both come back as
            // access denied; neither is retryable with the same input
            401 | 403 | 422 => {
                let reason = response.text().unwrap_or_default();
                return Err(PinerankError::SourceAccessDenied {
                    locator: source.locator.clone(),
                    reason: truncate(&reason, 200),
                });
            }
            408 | 504 => {
                return Err(PinerankError::SourceTimeout {
                    locator: source.locator.clone(),
                });
            }
            _ if !status.is_success() => {
                return Err(PinerankError::Fetch {
                    locator: source.locator.clone(),
                    reason: format!("scraper returned {status}"),
                });
            }
            _ => {}
        }

        let body: ScrapeResponse = response.json().map_err(|e| PinerankError::Fetch {
            locator: source.locator.clone(),
            reason: format!("invalid scraper response: {e}"),
        })?;

        let mut item_id = slugify(&body.name);
        if item_id.is_empty() {
            item_id = slugify(&source.name);
        }

        Ok(FetchedSource {
            item_id,
            name: body.name,
            raw: body.source.replace('\u{a0}', " "),
        })
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn from_config_requires_url() {
        match ScraperHttpAdapter::from_config(&EmptyConfig) {
            Err(PinerankError::ConfigMissing { section, key }) => {
                assert_eq!(section, "scraper");
                assert_eq!(key, "url");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn truncate_caps_length() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
