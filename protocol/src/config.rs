//! # Ledger Constants
//!
//! Every reserved key, namespace and size the ledger depends on lives here.
//! These values are part of the persisted data layout: changing one after
//! data has been written orphans every record stored under the old value.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string of the ledger data layout.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Reserved Keys & Namespaces
// ---------------------------------------------------------------------------

/// Simple key holding the global token supply as a decimal string.
pub const TOTAL_SUPPLY_KEY: &str = "TOTAL_SUPPLY";

/// Composite-key namespace for `(sender, receiver)` approval records.
pub const APPROVAL_NAMESPACE: &str = "APPROVAL";

/// Composite-key namespace for `(sender, receiver, nonce)` escrow locks.
pub const HTLC_NAMESPACE: &str = "HTLC";

/// Composite-key namespace for the per-pair lock nonce counter.
pub const HTLC_NONCE_NAMESPACE: &str = "HTLC_NONCE";

/// Delimiter used between composite-key parts. Same as Fabric's, so no
/// composite key can ever collide with a plain account ID.
pub const COMPOSITE_KEY_DELIMITER: char = '\u{0}';

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Attribute that grants mint and burn rights when present and not `"false"`.
pub const MINTER_ATTRIBUTE: &str = "minter";

// ---------------------------------------------------------------------------
// Hash Lock Parameters
// ---------------------------------------------------------------------------

/// The hash function committing an escrow lock to its secret. SHA-256 is
/// what Bitcoin and Ethereum HTLCs use, so the same secret can unlock both
/// legs of a cross-ledger swap.
pub const HASH_LOCK_FUNCTION: &str = "SHA-256";

/// Length in bytes of a hash-lock digest.
pub const HASH_LOCK_LENGTH: usize = 32;

/// Upper bound on a redeem preimage. Anything longer is rejected before
/// hashing.
pub const MAX_PREIMAGE_LENGTH: usize = 1024;
