//! Source-to-strategy transform port trait.

use crate::domain::error::PinerankError;

/// Converts raw indicator source into executable strategy text.
///
/// `previous_error` carries the prior attempt's failure when the stage
/// executor retries; implementations must tolerate being re-invoked with
/// the same input plus that hint.
pub trait TransformPort: Send + Sync {
    fn transform(
        &self,
        raw_source: &str,
        previous_error: Option<&str>,
    ) -> Result<String, PinerankError>;
}
