//! Telegram notification adapter.

use std::time::Duration;

use serde::Serialize;

use crate::domain::error::PinerankError;
use crate::ports::config_port::ConfigPort;
use crate::ports::sink_port::NotifyPort;

const TELEGRAM_API: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_SECS: i64 = 10;

#[derive(Debug)]
pub struct TelegramAdapter {
    client: reqwest::blocking::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PinerankError> {
        let bot_token = config
            .get_string("telegram", "bot_token")
            .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PinerankError::ConfigMissing {
                section: "telegram".into(),
                key: "bot_token".into(),
            })?;
        let chat_id = config
            .get_string("telegram", "chat_id")
            .or_else(|| std::env::var("TELEGRAM_CHAT_ID").ok())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PinerankError::ConfigMissing {
                section: "telegram".into(),
                key: "chat_id".into(),
            })?;
        let api_base = config
            .get_string("telegram", "api_base")
            .unwrap_or_else(|| TELEGRAM_API.to_string());
        let timeout = config.get_int("telegram", "timeout_secs", DEFAULT_TIMEOUT_SECS) as u64;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| PinerankError::Notify {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }
}

impl NotifyPort for TelegramAdapter {
    fn notify(&self, message: &str) -> Result<(), PinerankError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let response = self
            .client
            .post(url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: message,
                parse_mode: "HTML",
                disable_web_page_preview: true,
            })
            .send()
            .map_err(|e| PinerankError::Notify {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PinerankError::Notify {
                reason: format!("Telegram returned {status}"),
            });
        }
        Ok(())
    }
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
    fn from_config_requires_bot_token() {
        if std::env::var("TELEGRAM_BOT_TOKEN").is_err() {
            match TelegramAdapter::from_config(&EmptyConfig) {
                Err(PinerankError::ConfigMissing { section, key }) => {
                    assert_eq!(section, "telegram");
                    assert_eq!(key, "bot_token");
                }
                other => panic!("expected ConfigMissing, got {other:?}"),
            }
        }
    }
}
