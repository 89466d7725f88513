//! pinerank — community trading-script ranking pipeline.
//!
//! Scrapes indicator scripts, converts them into executable strategies,
//! backtests each across a fixed instrument set, and ranks them by a
//! composite score.
//!
//! Hexagonal architecture: pipeline logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
