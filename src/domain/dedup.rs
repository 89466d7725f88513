//! Content-address deduplication.
//!
//! Duplicate detection is exact-content only: two sources differing by a
//! single byte are distinct items. Near-duplicate detection is a separate
//! text-similarity problem and deliberately out of scope.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::error::PinerankError;
use crate::ports::state_port::StatePort;

/// Result of an atomic hash claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashClaim {
    /// Hash was new and is now recorded for this item.
    Claimed,
    /// Hash was already recorded for this same item (reprocessing).
    Owned,
    /// Hash belongs to another item; this one is a duplicate.
    Duplicate { owner: String },
}

/// Hex SHA-256 digest of raw source text. No normalization beyond what
/// the fetch stage already applied.
pub fn content_digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Exact-content duplicate detector over the durable hash ledger.
pub struct ContentAddressStore {
    ledger: Arc<dyn StatePort>,
}

impl ContentAddressStore {
    pub fn new(ledger: Arc<dyn StatePort>) -> Self {
        Self { ledger }
    }

    pub fn is_duplicate(&self, raw: &str) -> Result<bool, PinerankError> {
        Ok(self.ledger.lookup_hash(&content_digest(raw))?.is_some())
    }

    pub fn record(&self, raw: &str, item_id: &str) -> Result<(), PinerankError> {
        self.ledger.claim_hash(&content_digest(raw), item_id)?;
        Ok(())
    }

    /// Check and record in one atomic step; the claim outcome tells the
    /// caller whether to proceed or skip.
    pub fn claim(&self, raw: &str, item_id: &str) -> Result<HashClaim, PinerankError> {
        self.ledger.claim_hash(&content_digest(raw), item_id)
    }
}
