//! Side-effect sink port traits.

use crate::domain::error::PinerankError;
use crate::domain::evaluation::EvaluationResult;
use crate::domain::score::CompositeScore;
use crate::domain::work_item::WorkItem;

/// Durable bulk storage for pipeline results.
///
/// Called after an item reaches a terminal state; failures are logged by
/// the caller and never block pipeline progress. The composite score is
/// recomputable from the results and is passed along so bulk views can
/// rank without re-aggregating.
pub trait PersistencePort: Send + Sync {
    fn store(
        &self,
        item: &WorkItem,
        results: &[EvaluationResult],
        score: Option<&CompositeScore>,
    ) -> Result<(), PinerankError>;
}

/// Fire-and-forget delivery of a pre-formatted alert.
pub trait NotifyPort: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), PinerankError>;
}
