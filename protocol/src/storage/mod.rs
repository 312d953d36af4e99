//! # Storage Module
//!
//! The versioned world state the ledger runs on, and the machinery that
//! turns one contract invocation into one atomic commit.
//!
//! ## Architecture
//!
//! ```text
//! keys.rs  : composite-key construction and validation
//! state.rs : WorldState trait, in-memory backend, TxSimulator, Committer
//! db.rs    : sled-backed persistent WorldState
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! contract ──get/put──▶ TxSimulator ──ReadWriteSet──▶ Committer ──apply──▶ WorldState
//!                           │                                                 ▲
//!                           └──────────── versioned reads ────────────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Optimistic concurrency.** No locks are held while a contract runs.
//!    Conflicts are detected at commit by comparing read versions.
//!
//! 2. **Bincode on disk.** Compact and deterministic. The values inside are
//!    whatever the contracts chose (decimal strings and JSON); the envelope
//!    carrying the version is bincode.

pub mod db;
pub mod keys;
pub mod state;

pub use db::LedgerDb;
pub use keys::{
    create_composite_key, display_key, is_composite_key, split_composite_key, validate_simple_key,
};
pub use state::{
    state_root, CommitError, Committer, MemoryWorldState, ReadWriteSet, StateAccessor,
    StateError, TxSimulator, Version, VersionedValue, WorldState,
};
