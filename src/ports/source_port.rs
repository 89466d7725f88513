//! Source fetch port trait.

use crate::domain::error::PinerankError;
use crate::domain::work_item::{FetchedSource, SourceLocator};

/// Fetches raw script source from wherever it lives.
///
/// Failures follow the fetch error family: `SourceNotFound`,
/// `SourceAccessDenied`, `SourceTimeout`, or a generic `Fetch` for
/// transport faults. Implementations are called from worker threads and
/// must be safe to share.
pub trait SourcePort: Send + Sync {
    fn fetch(&self, source: &SourceLocator) -> Result<FetchedSource, PinerankError>;
}
