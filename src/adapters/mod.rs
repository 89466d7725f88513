//! Concrete adapter implementations for ports.

pub mod backtest_http_adapter;
pub mod claude_transform_adapter;
pub mod csv_log_adapter;
pub mod file_config_adapter;
pub mod postgrest_sync_adapter;
pub mod scraper_http_adapter;
pub mod script_dir_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_state_adapter;
pub mod telegram_adapter;
#[cfg(feature = "web")]
pub mod web;
