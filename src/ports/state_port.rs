//! Durable pipeline state port trait.

use std::collections::HashMap;

use crate::domain::dedup::HashClaim;
use crate::domain::error::PinerankError;
use crate::domain::record::PipelineRecord;

/// Durable ledger of pipeline records plus the content-hash set.
///
/// Both survive process restarts. Every record mutation is a full
/// read-modify-write keyed by item id; concurrent writers to distinct
/// items are safe, concurrent writers to the same item must be prevented
/// operationally (single-writer-per-item), not by this port. Hash claims
/// are atomic so parallel workers cannot both claim one hash.
pub trait StatePort: Send + Sync {
    fn load_records(&self) -> Result<HashMap<String, PipelineRecord>, PinerankError>;

    fn get_record(&self, item_id: &str) -> Result<Option<PipelineRecord>, PinerankError>;

    fn upsert_record(&self, record: &PipelineRecord) -> Result<(), PinerankError>;

    /// Item id that already owns this hash, if any.
    fn lookup_hash(&self, content_hash: &str) -> Result<Option<String>, PinerankError>;

    /// Atomically record the hash for `item_id` unless already present.
    fn claim_hash(&self, content_hash: &str, item_id: &str) -> Result<HashClaim, PinerankError>;
}
