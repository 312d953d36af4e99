//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256**: the hash-lock function. Escrow locks commit to
//!   `SHA-256(secret)` so the same secret can release a matching HTLC on
//!   Bitcoin or Ethereum. Interop decides this one, not speed.
//!
//! - **BLAKE3**: everything internal: world-state Merkle roots and
//!   transaction IDs. Nobody outside the ledger ever has to recompute these.

use sha2::{Digest, Sha256};

use crate::config::HASH_LOCK_LENGTH;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use hashlock_protocol::crypto::sha256;
///
/// let hash = sha256(b"hashlock");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the hash lock for a secret: `SHA-256(preimage)`.
pub fn hash_lock(preimage: &[u8]) -> [u8; HASH_LOCK_LENGTH] {
    sha256(preimage)
}

/// Returns `true` if `preimage` opens `lock`.
///
/// The comparison folds over every byte so timing does not leak the length
/// of the matching prefix.
pub fn verify_preimage(preimage: &[u8], lock: &[u8; HASH_LOCK_LENGTH]) -> bool {
    let digest = hash_lock(preimage);
    digest
        .iter()
        .zip(lock.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// Used for transaction IDs so they can never collide with a state-root
/// leaf built from the same bytes.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Domain tag for transaction IDs.
const TX_ID_CONTEXT: &str = "hashlock 2026-01 transaction id";

/// Derives a transaction ID from the submitting identity and a fresh nonce,
/// Fabric style: the ID commits to who submitted the invocation.
pub fn transaction_id(creator: &str, nonce: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(creator.len() + nonce.len() + 1);
    data.extend_from_slice(creator.as_bytes());
    data.push(0);
    data.extend_from_slice(nonce);
    domain_separated_hash(TX_ID_CONTEXT, &data)
}

/// Compute a binary Merkle root over leaf hashes using BLAKE3.
///
/// An odd node at any level is paired with itself. A single leaf is also
/// paired with itself so the root is always a hash output. Empty input
/// returns all zeros.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<[u8; 32]> = leaves.to_vec();

    if current_level.len() == 1 {
        return blake3_hash_multi(&[current_level[0].as_slice(), current_level[0].as_slice()]);
    }

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);

        for chunk in current_level.chunks(2) {
            let left = &chunk[0];
            let right = if chunk.len() == 2 { &chunk[1] } else { &chunk[0] };
            next_level.push(blake3_hash_multi(&[left.as_slice(), right.as_slice()]));
        }

        current_level = next_level;
    }

    current_level[0]
}
