//! Per-item pipeline progress records.

use chrono::{DateTime, Utc};

/// Pipeline progress for one work item.
///
/// `evaluated`, `skipped` and `failed` are terminal. Status only moves
/// forward within a run; the one sanctioned backward transition is
/// [`PipelineRecord::reset`] when a caller forces reprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageStatus {
    Pending,
    Fetched,
    Transformed,
    Evaluated,
    Skipped,
    Failed,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Fetched => "fetched",
            StageStatus::Transformed => "transformed",
            StageStatus::Evaluated => "evaluated",
            StageStatus::Skipped => "skipped",
            StageStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<StageStatus> {
        match value {
            "pending" => Some(StageStatus::Pending),
            "fetched" => Some(StageStatus::Fetched),
            "transformed" => Some(StageStatus::Transformed),
            "evaluated" => Some(StageStatus::Evaluated),
            "skipped" => Some(StageStatus::Skipped),
            "failed" => Some(StageStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageStatus::Evaluated | StageStatus::Skipped | StageStatus::Failed
        )
    }

    fn rank(self) -> u8 {
        match self {
            StageStatus::Pending => 0,
            StageStatus::Fetched => 1,
            StageStatus::Transformed => 2,
            StageStatus::Evaluated => 3,
            StageStatus::Skipped | StageStatus::Failed => 4,
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRecord {
    pub item_id: String,
    pub category: String,
    pub status: StageStatus,
    pub content_hash: Option<String>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRecord {
    pub fn new(item_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            category: category.into(),
            status: StageStatus::Pending,
            content_hash: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Move the record forward; backward transitions are ignored.
    pub fn advance(&mut self, status: StageStatus) {
        if status.rank() > self.status.rank() {
            self.status = status;
            if status == StageStatus::Evaluated {
                self.last_error = None;
            }
            self.touch();
        }
    }

    /// Terminal failure; the error text is kept verbatim.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StageStatus::Failed;
        self.last_error = Some(error.into());
        self.touch();
    }

    /// Terminal duplicate-content outcome. Not an error.
    pub fn skip(&mut self) {
        self.status = StageStatus::Skipped;
        self.last_error = None;
        self.touch();
    }

    /// Put the record back to pending for forced reprocessing.
    pub fn reset(&mut self) {
        self.status = StageStatus::Pending;
        self.last_error = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
