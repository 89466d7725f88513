//! Domain error types.

/// Top-level error type for pinerank.
///
/// Duplicate content and an undefined composite score are outcomes, not
/// errors; they are modelled as [`crate::domain::dedup::HashClaim`] and
/// `Option<CompositeScore>` respectively.
#[derive(Debug, thiserror::Error)]
pub enum PinerankError {
    #[error("source not found: {locator}")]
    SourceNotFound { locator: String },

    #[error("source access denied for {locator}: {reason}")]
    SourceAccessDenied { locator: String, reason: String },

    #[error("source fetch timed out: {locator}")]
    SourceTimeout { locator: String },

    #[error("fetch failed for {locator}: {reason}")]
    Fetch { locator: String, reason: String },

    #[error("transform failed: {reason}")]
    Transform { reason: String },

    #[error("evaluation failed for {symbol}: {reason}")]
    Evaluation { symbol: String, reason: String },

    #[error("too many concurrent runs (max {max})")]
    TooManyConcurrent { max: usize },

    #[error("rate limit exceeded ({max} per hour)")]
    RateLimited { max: usize },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("sync failed: {reason}")]
    Sync { reason: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error("pipeline error: {reason}")]
    Pipeline { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PinerankError {
    /// True for the fetch-stage error family of the source port contract.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            PinerankError::SourceNotFound { .. }
                | PinerankError::SourceAccessDenied { .. }
                | PinerankError::SourceTimeout { .. }
                | PinerankError::Fetch { .. }
        )
    }
}

impl From<&PinerankError> for std::process::ExitCode {
    fn from(err: &PinerankError) -> Self {
        let code: u8 = match err {
            PinerankError::Io(_) | PinerankError::Pipeline { .. } => 1,
            PinerankError::ConfigParse { .. }
            | PinerankError::ConfigMissing { .. }
            | PinerankError::ConfigInvalid { .. } => 2,
            PinerankError::Database { .. } | PinerankError::DatabaseQuery { .. } => 3,
            PinerankError::SourceNotFound { .. }
            | PinerankError::SourceAccessDenied { .. }
            | PinerankError::SourceTimeout { .. }
            | PinerankError::Fetch { .. } => 4,
            PinerankError::Transform { .. } | PinerankError::Evaluation { .. } => 5,
            PinerankError::TooManyConcurrent { .. } | PinerankError::RateLimited { .. } => 6,
            PinerankError::Sync { .. } | PinerankError::Notify { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
