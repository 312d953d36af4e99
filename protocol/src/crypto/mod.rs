//! # Cryptographic Primitives
//!
//! Thin wrappers over audited hash implementations. Nothing here is
//! hand-rolled; if you need a new primitive, add a wrapper, not an algorithm.

pub mod hash;

pub use hash::{blake3_hash, hash_lock, merkle_root, sha256, transaction_id, verify_preimage};
