//! AuditStore — redb-backed log of fired elections.
//!
//! Every time this node dispatches a scaling action the decision, the vote
//! counts, and the table it was computed from are appended here. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::ELECTIONS;
use crate::types::ElectionRecord;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe audit store backed by redb.
#[derive(Clone)]
pub struct AuditStore {
    db: Arc<Database>,
    /// Disambiguates records written within the same millisecond.
    seq: Arc<AtomicU64>,
}

impl AuditStore {
    /// Open (or create) a persistent audit store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::from_db(db);
        store.ensure_tables()?;
        debug!(?path, "audit store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory audit store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::from_db(db);
        store.ensure_tables()?;
        debug!("in-memory audit store opened");
        Ok(store)
    }

    fn from_db(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(ELECTIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Append an election record. Returns the key it was stored under.
    pub fn append_election(&self, record: &ElectionRecord) -> StateResult<String> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = format!("{:020}:{:010}", record.epoch_millis, seq);
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ELECTIONS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, action = %record.action, "election recorded");
        Ok(key)
    }

    /// The most recent `limit` elections, newest first.
    pub fn list_elections(&self, limit: usize) -> StateResult<Vec<ElectionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ELECTIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))?.rev().take(limit) {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ElectionRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    pub fn latest_election(&self) -> StateResult<Option<ElectionRecord>> {
        Ok(self.list_elections(1)?.into_iter().next())
    }
}
