//! The fixed instrument universe every strategy is evaluated against.

use std::collections::HashSet;

use super::error::PinerankError;

pub const DEFAULT_INSTRUMENTS: &[&str] = &["SPY", "BTC-USD", "QQQ"];

/// Parse a comma-separated instrument list from config.
pub fn parse_instruments(raw: &str) -> Result<Vec<String>, PinerankError> {
    let symbols: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    if symbols.is_empty() {
        return Err(PinerankError::ConfigInvalid {
            section: "pipeline".into(),
            key: "instruments".into(),
            reason: "no instruments configured".into(),
        });
    }

    let mut seen = HashSet::new();
    for symbol in &symbols {
        if !seen.insert(symbol.clone()) {
            return Err(PinerankError::ConfigInvalid {
                section: "pipeline".into(),
                key: "instruments".into(),
                reason: format!("duplicate instrument {symbol}"),
            });
        }
    }

    Ok(symbols)
}

pub fn default_instruments() -> Vec<String> {
    DEFAULT_INSTRUMENTS.iter().map(|s| s.to_string()).collect()
}
