//! SQLite pipeline state adapter.
//!
//! Backs both the pipeline record ledger and the content-hash set in one
//! database file so a restarted sweep resumes with full history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::dedup::HashClaim;
use crate::domain::error::PinerankError;
use crate::domain::record::{PipelineRecord, StageStatus};
use crate::ports::config_port::ConfigPort;
use crate::ports::state_port::StatePort;

pub struct SqliteStateAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStateAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PinerankError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PinerankError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;
        Self::build(SqliteConnectionManager::file(&db_path), pool_size)
    }

    pub fn from_path(path: &str) -> Result<Self, PinerankError> {
        Self::build(SqliteConnectionManager::file(path), 4)
    }

    pub fn in_memory() -> Result<Self, PinerankError> {
        Self::build(SqliteConnectionManager::memory(), 1)
    }

    fn build(manager: SqliteConnectionManager, pool_size: u32) -> Result<Self, PinerankError> {
        // workers upserting distinct items share this file; wait out the
        // write lock instead of surfacing SQLITE_BUSY
        let manager =
            manager.with_init(|conn| conn.busy_timeout(std::time::Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| PinerankError::Database {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), PinerankError> {
        let conn = self.conn()?;

        // journal_mode returns a row, so it cannot ride in execute_batch
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pipeline_records (
                item_id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                content_hash TEXT,
                last_error TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS content_hashes (
                content_hash TEXT PRIMARY KEY,
                item_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_records_status ON pipeline_records(status);",
        )
        .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, PinerankError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PinerankError::Database {
                reason: e.to_string(),
            })
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PipelineRecord> {
    let status_str: String = row.get(2)?;
    let status = StageStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown stage status: {status_str}").into(),
        )
    })?;
    let updated_str: String = row.get(5)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

    Ok(PipelineRecord {
        item_id: row.get(0)?,
        category: row.get(1)?,
        status,
        content_hash: row.get(3)?,
        last_error: row.get(4)?,
        updated_at,
    })
}

impl StatePort for SqliteStateAdapter {
    fn load_records(&self) -> Result<HashMap<String, PipelineRecord>, PinerankError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT item_id, category, status, content_hash, last_error, updated_at
                 FROM pipeline_records",
            )
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], row_to_record)
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut records = HashMap::new();
        for row in rows {
            let record = row.map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;
            records.insert(record.item_id.clone(), record);
        }

        Ok(records)
    }

    fn get_record(&self, item_id: &str) -> Result<Option<PipelineRecord>, PinerankError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT item_id, category, status, content_hash, last_error, updated_at
                 FROM pipeline_records WHERE item_id = ?1",
            )
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut rows = stmt.query_map(params![item_id], row_to_record).map_err(
            |e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            },
        )?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e: rusqlite::Error| {
                PinerankError::DatabaseQuery {
                    reason: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    fn upsert_record(&self, record: &PipelineRecord) -> Result<(), PinerankError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT OR REPLACE INTO pipeline_records
                 (item_id, category, status, content_hash, last_error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.item_id,
                record.category,
                record.status.as_str(),
                record.content_hash,
                record.last_error,
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn lookup_hash(&self, content_hash: &str) -> Result<Option<String>, PinerankError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT item_id FROM content_hashes WHERE content_hash = ?1")
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut rows = stmt
            .query_map(params![content_hash], |row| row.get::<_, String>(0))
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e: rusqlite::Error| {
                PinerankError::DatabaseQuery {
                    reason: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    fn claim_hash(&self, content_hash: &str, item_id: &str) -> Result<HashClaim, PinerankError> {
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "INSERT INTO content_hashes (content_hash, item_id) VALUES (?1, ?2)
                 ON CONFLICT(content_hash) DO NOTHING",
                params![content_hash, item_id],
            )
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        if changed == 1 {
            return Ok(HashClaim::Claimed);
        }

        let owner: String = conn
            .query_row(
                "SELECT item_id FROM content_hashes WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .map_err(|e: rusqlite::Error| PinerankError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        if owner == item_id {
            Ok(HashClaim::Owned)
        } else {
            Ok(HashClaim::Duplicate { owner })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn adapter() -> SqliteStateAdapter {
        let adapter = SqliteStateAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteStateAdapter::from_config(&EmptyConfig) {
            Err(PinerankError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn record_round_trip() {
        let adapter = adapter();

        let mut record = PipelineRecord::new("rsi-divergence", "oscillators");
        record.content_hash = Some("abc123".into());
        record.advance(StageStatus::Fetched);
        adapter.upsert_record(&record).unwrap();

        let loaded = adapter.get_record("rsi-divergence").unwrap().unwrap();
        assert_eq!(loaded.item_id, "rsi-divergence");
        assert_eq!(loaded.category, "oscillators");
        assert_eq!(loaded.status, StageStatus::Fetched);
        assert_eq!(loaded.content_hash.as_deref(), Some("abc123"));
        assert!(loaded.last_error.is_none());
    }

    #[test]
    fn upsert_overwrites_existing_record() {
        let adapter = adapter();

        let mut record = PipelineRecord::new("a", "top");
        adapter.upsert_record(&record).unwrap();
        record.fail("transform failed: bad output");
        adapter.upsert_record(&record).unwrap();

        let loaded = adapter.get_record("a").unwrap().unwrap();
        assert_eq!(loaded.status, StageStatus::Failed);
        assert_eq!(
            loaded.last_error.as_deref(),
            Some("transform failed: bad output")
        );
        assert_eq!(adapter.load_records().unwrap().len(), 1);
    }

    #[test]
    fn load_records_returns_all_keyed_by_item() {
        let adapter = adapter();
        for name in ["a", "b", "c"] {
            adapter
                .upsert_record(&PipelineRecord::new(name, "top"))
                .unwrap();
        }
        let records = adapter.load_records().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.contains_key("b"));
    }

    #[test]
    fn get_record_missing_is_none() {
        let adapter = adapter();
        assert!(adapter.get_record("nope").unwrap().is_none());
    }

    #[test]
    fn claim_hash_is_first_writer_wins() {
        let adapter = adapter();
        assert_eq!(adapter.claim_hash("h1", "a").unwrap(), HashClaim::Claimed);
        assert_eq!(adapter.claim_hash("h1", "a").unwrap(), HashClaim::Owned);
        assert_eq!(
            adapter.claim_hash("h1", "b").unwrap(),
            HashClaim::Duplicate { owner: "a".into() }
        );
        assert_eq!(adapter.lookup_hash("h1").unwrap().as_deref(), Some("a"));
        assert!(adapter.lookup_hash("h2").unwrap().is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("state.db").display().to_string();

        {
            let adapter = SqliteStateAdapter::from_path(&db_path).unwrap();
            adapter.initialize_schema().unwrap();
            let mut record = PipelineRecord::new("survivor", "top");
            record.advance(StageStatus::Evaluated);
            adapter.upsert_record(&record).unwrap();
            adapter.claim_hash("deadbeef", "survivor").unwrap();
        }

        let reopened = SqliteStateAdapter::from_path(&db_path).unwrap();
        reopened.initialize_schema().unwrap();
        let record = reopened.get_record("survivor").unwrap().unwrap();
        assert_eq!(record.status, StageStatus::Evaluated);
        assert_eq!(
            reopened.lookup_hash("deadbeef").unwrap().as_deref(),
            Some("survivor")
        );
    }
}
