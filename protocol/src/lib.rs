// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Hashlock Protocol: Host Platform
//!
//! Everything the ledger contracts need from the platform they run on, and
//! nothing more:
//!
//! - **storage**: versioned world state, transaction simulation with
//!   read/write sets, and an MVCC committer. In-memory and sled backends.
//! - **identity**: the invoking client's ID and attributes, plus pure
//!   authorization checks over them.
//! - **crypto**: SHA-256 hash locks and BLAKE3 state roots.
//! - **config**: reserved keys, namespaces and sizes.
//!
//! Consensus, ordering and replication are someone else's problem. This
//! crate gives a single process the same contract a replicated ledger
//! would: deterministic reads, staged writes, all-or-nothing commits.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod storage;
