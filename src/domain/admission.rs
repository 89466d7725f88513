//! Admission control for interactive pipeline runs.
//!
//! Two independent limits, both of which must pass: a global in-flight
//! ceiling and a per-client sliding-window rate limit. Rejection is
//! terminal for the caller; there is no internal queueing or backoff.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::error::PinerankError;

pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_MAX_PER_HOUR: usize = 20;
const RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Why an admission was refused. The two cases warrant different caller
/// retry policies, so they are never collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Concurrent { max: usize },
    RateWindow { max: usize },
}

impl From<Rejection> for PinerankError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Concurrent { max } => PinerankError::TooManyConcurrent { max },
            Rejection::RateWindow { max } => PinerankError::RateLimited { max },
        }
    }
}

#[derive(Default, Debug)]
struct Shared {
    in_flight: usize,
    windows: HashMap<String, Vec<Instant>>,
}

/// Shared admission state; clones observe the same counters.
#[derive(Clone)]
pub struct AdmissionController {
    max_concurrent: usize,
    max_per_window: usize,
    shared: Arc<Mutex<Shared>>,
}

impl AdmissionController {
    pub fn new(max_concurrent: usize, max_per_window: usize) -> Self {
        Self {
            max_concurrent,
            max_per_window,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Admit one interactive run for `client_key`, or reject with the
    /// limit that was hit. The returned permit releases the concurrency
    /// slot when dropped, whether the run succeeded or failed.
    pub fn admit(&self, client_key: &str) -> Result<Permit, Rejection> {
        self.admit_at(client_key, Instant::now())
    }

    fn admit_at(&self, client_key: &str, now: Instant) -> Result<Permit, Rejection> {
        let mut shared = self.shared.lock().expect("admission state poisoned");

        if shared.in_flight >= self.max_concurrent {
            return Err(Rejection::Concurrent {
                max: self.max_concurrent,
            });
        }

        // lazy eviction: drop timestamps older than the window on every check
        let window = shared.windows.entry(client_key.to_string()).or_default();
        window.retain(|t| now.saturating_duration_since(*t) < RATE_WINDOW);

        if window.len() >= self.max_per_window {
            return Err(Rejection::RateWindow {
                max: self.max_per_window,
            });
        }

        window.push(now);
        shared.in_flight += 1;
        Ok(Permit {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.shared.lock().expect("admission state poisoned").in_flight
    }
}

/// RAII concurrency slot; dropping it decrements the in-flight count.
#[derive(Debug)]
pub struct Permit {
    shared: Arc<Mutex<Shared>>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut shared = self.shared.lock().expect("admission state poisoned");
        shared.in_flight = shared.in_flight.saturating_sub(1);
    }
}
