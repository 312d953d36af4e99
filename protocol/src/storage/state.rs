//! # World State & Transaction Simulation
//!
//! The ledger's world state is a flat, versioned key-value map. Contracts
//! never touch it directly: every invocation runs against a
//! [`TxSimulator`], which
//!
//! 1. records the committed version of every key it reads (the read set),
//! 2. stages every write in memory (the write set), and
//! 3. serves reads of keys it already wrote from the write set
//!    (read-your-writes), so a debit followed by a credit on the same
//!    account composes.
//!
//! The resulting [`ReadWriteSet`] is handed to a [`Committer`], which
//! validates it with optimistic concurrency control:
//!
//! ```text
//! for (key, read_version) in read_set:
//!     if world.version(key) != read_version: reject (MVCC read conflict)
//! version = latest + 1
//! apply(write_set, version)          // all keys or none
//! ```
//!
//! Simulations may run concurrently; validate-and-apply is serialised by
//! the committer.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::keys::{self, display_key};
use crate::crypto::hash::{blake3_hash_multi, merkle_root};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by state access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The backing store failed. Possibly transient.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// A key was malformed (empty, or contains the composite delimiter).
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Errors raised when committing a read/write set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// A key in the read set was changed by another commit after it was read.
    #[error("MVCC read conflict on {key}: read at {read:?}, now at {current:?}")]
    MvccReadConflict {
        /// Display form of the conflicting key.
        key: String,
        /// Version observed during simulation (`None` = absent).
        read: Option<Version>,
        /// Version present at commit time (`None` = absent).
        current: Option<Version>,
    },

    /// The store failed while validating or applying.
    #[error(transparent)]
    Store(#[from] StateError),
}

// ---------------------------------------------------------------------------
// Versioned values
// ---------------------------------------------------------------------------

/// Commit sequence number. Every successful commit with at least one write
/// produces the next version; `0` is the empty genesis state.
pub type Version = u64;

/// A stored value together with the version of the commit that wrote it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    /// Raw value bytes.
    pub value: Vec<u8>,
    /// Version of the commit that last wrote this key.
    pub version: Version,
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// A committed, versioned key-value store.
///
/// Implementations must make [`apply`](WorldState::apply) atomic: either
/// every write lands under `version`, or none does.
pub trait WorldState: Send + Sync {
    /// Reads the committed value of `key`.
    fn get(&self, key: &str) -> Result<Option<VersionedValue>, StateError>;

    /// Version of the most recent commit.
    fn latest_version(&self) -> Result<Version, StateError>;

    /// Applies all writes under `version` and advances `latest_version`.
    fn apply(&self, writes: &BTreeMap<String, Vec<u8>>, version: Version) -> Result<(), StateError>;

    /// Every committed entry, in key order.
    fn entries(&self) -> Result<Vec<(String, VersionedValue)>, StateError>;
}

/// Merkle root over every committed entry.
///
/// ```text
/// leaves = [ BLAKE3(key || value) for (key, value) in sorted(entries) ]
/// root   = merkle_root(leaves)
/// ```
///
/// Two replicas that applied the same commits in the same order produce the
/// same root. Versions are excluded so the root depends only on content.
pub fn state_root<W: WorldState + ?Sized>(world: &W) -> Result<[u8; 32], StateError> {
    let leaves: Vec<[u8; 32]> = world
        .entries()?
        .iter()
        .map(|(key, entry)| blake3_hash_multi(&[key.as_bytes(), entry.value.as_slice()]))
        .collect();
    Ok(merkle_root(&leaves))
}

/// In-memory world state. Used by tests and by ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryWorldState {
    inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: BTreeMap<String, VersionedValue>,
    latest: Version,
}

impl MemoryWorldState {
    /// Creates an empty world state at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns `true` if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

impl WorldState for MemoryWorldState {
    fn get(&self, key: &str) -> Result<Option<VersionedValue>, StateError> {
        Ok(self.inner.read().entries.get(key).cloned())
    }

    fn latest_version(&self) -> Result<Version, StateError> {
        Ok(self.inner.read().latest)
    }

    fn apply(&self, writes: &BTreeMap<String, Vec<u8>>, version: Version) -> Result<(), StateError> {
        let mut inner = self.inner.write();
        for (key, value) in writes {
            inner.entries.insert(
                key.clone(),
                VersionedValue {
                    value: value.clone(),
                    version,
                },
            );
        }
        inner.latest = version;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, VersionedValue)>, StateError> {
        Ok(self
            .inner
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// StateAccessor
// ---------------------------------------------------------------------------

/// The narrow state interface contracts are written against.
pub trait StateAccessor {
    /// Reads the current value of `key`, as seen by this transaction.
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Stages a write. Nothing is visible outside this transaction until
    /// it commits.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateError>;

    /// Builds a composite key. See [`keys::create_composite_key`].
    fn create_composite_key(&self, namespace: &str, components: &[&str]) -> Result<String, StateError> {
        keys::create_composite_key(namespace, components)
    }
}

// ---------------------------------------------------------------------------
// Read/write sets
// ---------------------------------------------------------------------------

/// The outcome of simulating one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadWriteSet {
    /// Transaction that produced this set.
    pub tx_id: String,
    /// Committed version observed for each key read (`None` = absent).
    pub reads: BTreeMap<String, Option<Version>>,
    /// Staged writes.
    pub writes: BTreeMap<String, Vec<u8>>,
}

impl ReadWriteSet {
    /// Returns `true` if the transaction staged no writes.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Simulates one transaction against a world state.
pub struct TxSimulator<'w, W: WorldState + ?Sized> {
    world: &'w W,
    rwset: ReadWriteSet,
}

impl<'w, W: WorldState + ?Sized> TxSimulator<'w, W> {
    /// Starts a simulation for transaction `tx_id`.
    pub fn new(world: &'w W, tx_id: impl Into<String>) -> Self {
        Self {
            world,
            rwset: ReadWriteSet {
                tx_id: tx_id.into(),
                ..Default::default()
            },
        }
    }

    /// The transaction ID this simulation belongs to.
    pub fn tx_id(&self) -> &str {
        &self.rwset.tx_id
    }

    /// Finishes the simulation and yields its read/write set.
    pub fn into_rwset(self) -> ReadWriteSet {
        self.rwset
    }
}

impl<W: WorldState + ?Sized> StateAccessor for TxSimulator<'_, W> {
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        if key.is_empty() {
            return Err(StateError::InvalidKey("key must not be empty".into()));
        }
        if let Some(staged) = self.rwset.writes.get(key) {
            return Ok(Some(staged.clone()));
        }

        let committed = self.world.get(key)?;
        // First observation wins: a later re-read must not mask a change.
        self.rwset
            .reads
            .entry(key.to_string())
            .or_insert_with(|| committed.as_ref().map(|v| v.version));
        Ok(committed.map(|v| v.value))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateError> {
        if key.is_empty() {
            return Err(StateError::InvalidKey("key must not be empty".into()));
        }
        tracing::trace!(tx_id = %self.rwset.tx_id, key = %display_key(key), "staged write");
        self.rwset.writes.insert(key.to_string(), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Committer
// ---------------------------------------------------------------------------

/// Validates and applies read/write sets against a world state, one at a
/// time.
pub struct Committer<W: WorldState + ?Sized> {
    world: Arc<W>,
    commit_lock: Mutex<()>,
}

impl<W: WorldState + ?Sized> Committer<W> {
    /// Creates a committer over `world`.
    pub fn new(world: Arc<W>) -> Self {
        Self {
            world,
            commit_lock: Mutex::new(()),
        }
    }

    /// The world state this committer writes to.
    pub fn world(&self) -> &Arc<W> {
        &self.world
    }

    /// Validates `rwset` and applies its writes atomically.
    ///
    /// Returns the version of the world state after the commit. Read-only
    /// sets are still validated but produce no new version.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::MvccReadConflict`] if any key read during
    /// simulation has since changed, [`CommitError::Store`] if the backend
    /// fails. In both cases nothing is written.
    pub fn commit(&self, rwset: &ReadWriteSet) -> Result<Version, CommitError> {
        let _guard = self.commit_lock.lock();

        for (key, read_version) in &rwset.reads {
            let current = self.world.get(key)?.map(|v| v.version);
            if current != *read_version {
                tracing::debug!(
                    tx_id = %rwset.tx_id,
                    key = %display_key(key),
                    read = ?read_version,
                    current = ?current,
                    "mvcc read conflict"
                );
                return Err(CommitError::MvccReadConflict {
                    key: display_key(key),
                    read: *read_version,
                    current,
                });
            }
        }

        let latest = self.world.latest_version()?;
        if rwset.is_read_only() {
            return Ok(latest);
        }

        let version = latest + 1;
        self.world.apply(&rwset.writes, version)?;
        tracing::debug!(
            tx_id = %rwset.tx_id,
            version,
            writes = rwset.writes.len(),
            "committed"
        );
        Ok(version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
