//! # LedgerDb: Persistent World State
//!
//! sled-backed implementation of [`WorldState`]. All on-disk ledger data
//! flows through this module.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                  | Value                      |
//! |------------|----------------------|----------------------------|
//! | `state`    | state key (UTF-8)    | `bincode(VersionedValue)`  |
//! | `metadata` | key (UTF-8)          | value (bytes)              |
//!
//! ## Atomicity
//!
//! A commit writes every staged key and the new `latest_version` inside one
//! sled multi-tree transaction. Either the whole commit lands on disk or
//! none of it does; a crash can never leave balances from a half-applied
//! transfer behind.

use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::collections::BTreeMap;
use std::path::Path;

use super::state::{StateError, Version, VersionedValue, WorldState};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction aborted: {0}")]
    Transaction(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for StateError {
    fn from(err: DbError) -> Self {
        StateError::Unavailable(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the latest committed version.
const META_LATEST_VERSION: &[u8] = b"latest_version";

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent world state.
///
/// Cheap to clone; sled handles are reference counted and safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    /// The underlying sled database handle.
    db: Db,
    /// World-state entries.
    state: Tree,
    /// Commit bookkeeping.
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let state = db.open_tree("state")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            state,
            metadata,
        })
    }

    /// Reads one entry.
    pub fn get_entry(&self, key: &str) -> DbResult<Option<VersionedValue>> {
        match self.state.get(key.as_bytes())? {
            Some(bytes) => {
                let entry: VersionedValue = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Latest committed version, `0` for a fresh database.
    pub fn get_latest_version(&self) -> DbResult<Version> {
        match self.metadata.get(META_LATEST_VERSION)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| DbError::Serialization("invalid version bytes".to_string()))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Writes `writes` under `version` in a single multi-tree transaction
    /// and flushes.
    pub fn put_commit(&self, writes: &BTreeMap<String, Vec<u8>>, version: Version) -> DbResult<()> {
        let mut encoded = Vec::with_capacity(writes.len());
        for (key, value) in writes {
            let entry = VersionedValue {
                value: value.clone(),
                version,
            };
            let bytes =
                bincode::serialize(&entry).map_err(|e| DbError::Serialization(e.to_string()))?;
            encoded.push((key.as_bytes().to_vec(), bytes));
        }
        let version_bytes = version.to_be_bytes().to_vec();

        (&self.state, &self.metadata)
            .transaction(|(state, metadata)| {
                for (key, bytes) in &encoded {
                    state.insert(key.as_slice(), bytes.as_slice())?;
                }
                metadata.insert(META_LATEST_VERSION, version_bytes.as_slice())?;
                Ok(())
            })
            .map_err(|e: TransactionError<()>| DbError::Transaction(format!("{:?}", e)))?;

        self.db.flush()?;
        Ok(())
    }

    /// Every entry in key order.
    pub fn all_entries(&self) -> DbResult<Vec<(String, VersionedValue)>> {
        let mut entries = Vec::with_capacity(self.state.len());
        for item in self.state.iter() {
            let (key, bytes) = item?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let entry: VersionedValue = bincode::deserialize(&bytes)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            entries.push((key, entry));
        }
        Ok(entries)
    }

    /// Number of world-state keys on disk.
    pub fn entry_count(&self) -> usize {
        self.state.len()
    }
}

impl WorldState for LedgerDb {
    fn get(&self, key: &str) -> Result<Option<VersionedValue>, StateError> {
        Ok(self.get_entry(key)?)
    }

    fn latest_version(&self) -> Result<Version, StateError> {
        Ok(self.get_latest_version()?)
    }

    fn apply(&self, writes: &BTreeMap<String, Vec<u8>>, version: Version) -> Result<(), StateError> {
        Ok(self.put_commit(writes, version)?)
    }

    fn entries(&self) -> Result<Vec<(String, VersionedValue)>, StateError> {
        Ok(self.all_entries()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::state::{state_root, Committer, MemoryWorldState, StateAccessor, TxSimulator};
    use std::sync::Arc;

    fn writes(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn open_temporary_database() {
        let db = LedgerDb::open_temporary().expect("should create temp db");
        assert_eq!(db.entry_count(), 0);
        assert_eq!(db.get_latest_version().unwrap(), 0);
    }

    #[test]
    fn commit_persists_entries_and_version() {
        let db = LedgerDb::open_temporary().unwrap();
        db.put_commit(&writes(&[("alice", "100"), ("TOTAL_SUPPLY", "100")]), 1)
            .unwrap();

        let alice = db.get_entry("alice").unwrap().unwrap();
        assert_eq!(alice.value, b"100");
        assert_eq!(alice.version, 1);
        assert_eq!(db.get_latest_version().unwrap(), 1);
        assert_eq!(db.entry_count(), 2);
    }

    #[test]
    fn missing_key_returns_none() {
        let db = LedgerDb::open_temporary().unwrap();
        assert!(db.get_entry("nobody").unwrap().is_none());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = LedgerDb::open(dir.path()).expect("should open db");
            db.put_commit(&writes(&[("alice", "42")]), 1).unwrap();
        }

        let db = LedgerDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db.get_entry("alice").unwrap().unwrap().value, b"42");
        assert_eq!(db.get_latest_version().unwrap(), 1);
    }

    #[test]
    fn composite_keys_roundtrip() {
        let db = LedgerDb::open_temporary().unwrap();
        let key = crate::storage::keys::create_composite_key("APPROVAL", &["a", "b"]).unwrap();
        db.put_commit(&writes(&[(key.as_str(), "{}")]), 1).unwrap();

        let entries = db.all_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, key);
    }

    #[test]
    fn committer_works_over_sled() {
        let db = Arc::new(LedgerDb::open_temporary().unwrap());
        let committer = Committer::new(Arc::clone(&db));

        let mut sim = TxSimulator::new(db.as_ref(), "tx-1");
        sim.put_state("alice", b"5".to_vec()).unwrap();
        assert_eq!(committer.commit(&sim.into_rwset()).unwrap(), 1);

        let mut sim = TxSimulator::new(db.as_ref(), "tx-2");
        assert_eq!(sim.get_state("alice").unwrap(), Some(b"5".to_vec()));
        sim.put_state("alice", b"6".to_vec()).unwrap();
        assert_eq!(committer.commit(&sim.into_rwset()).unwrap(), 2);

        assert_eq!(db.get_entry("alice").unwrap().unwrap().version, 2);
    }

    #[test]
    fn state_root_matches_memory_backend() {
        let db = LedgerDb::open_temporary().unwrap();
        let memory = MemoryWorldState::new();
        let batch = writes(&[("alice", "1"), ("bob", "2")]);

        db.apply(&batch, 1).unwrap();
        memory.apply(&batch, 1).unwrap();

        assert_eq!(state_root(&db).unwrap(), state_root(&memory).unwrap());
    }
}
