//! Strategy evaluation port trait.

use crate::domain::error::PinerankError;
use crate::domain::evaluation::EvaluationResult;

/// Runs one strategy against one instrument.
///
/// Simulator-detected problems (insufficient history, unparseable
/// strategy text, runtime faults during simulation) come back uniformly
/// as a failure [`EvaluationResult`]; an `Err` means the collaborator
/// itself could not be reached and is subject to stage retry.
pub trait EvaluatePort: Send + Sync {
    fn evaluate(
        &self,
        strategy_text: &str,
        symbol: &str,
    ) -> Result<EvaluationResult, PinerankError>;
}
