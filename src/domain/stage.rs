//! Stage execution with bounded retry.
//!
//! A stage is one call to an external collaborator. The executor retries
//! a failed attempt at most once; only the transform stage gets the prior
//! failure fed back as a hint, since its collaborator is an LLM that can
//! act on it. Fetch and evaluate retry with identical input.

use super::error::PinerankError;

pub const MAX_STAGE_ATTEMPTS: usize = 2;

/// The closed set of pipeline stages, selected by pipeline position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transform,
    Evaluate,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Evaluate => "evaluate",
        }
    }

    fn carries_feedback(self) -> bool {
        matches!(self, Stage::Transform)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one stage with up to `max_attempts` attempts.
///
/// The attempt closure receives the previous failure's message when the
/// stage carries feedback, `None` otherwise. After the final attempt the
/// last error is returned verbatim; nothing outside this function retries
/// a stage.
pub fn run<T, F>(stage: Stage, max_attempts: usize, mut attempt: F) -> Result<T, PinerankError>
where
    F: FnMut(Option<&str>) -> Result<T, PinerankError>,
{
    let mut hint: Option<String> = None;
    let mut attempts = 0usize;
    loop {
        attempts += 1;
        let feedback = if stage.carries_feedback() {
            hint.as_deref()
        } else {
            None
        };
        match attempt(feedback) {
            Ok(value) => return Ok(value),
            Err(err) if attempts < max_attempts => {
                tracing::warn!(
                    stage = stage.name(),
                    attempt = attempts,
                    error = %err,
                    "stage attempt failed, retrying",
                );
                hint = Some(err.to_string());
            }
            Err(err) => return Err(err),
        }
    }
}
