//! # Hashed Time-Lock Escrow
//!
//! A sender locks tokens for a receiver behind a SHA-256 hash lock and an
//! expiry. The lifecycle is:
//!
//! 1. **Lock**: the amount leaves the sender's balance immediately and is
//!    held by the lock record. No account owns it while the lock is pending.
//! 2. **Redeem**: anyone presenting the preimage before expiry releases
//!    the amount to the receiver. Knowledge of the secret is the only
//!    authorization.
//! 3. **Refund**: at or after expiry, the sender (and only the sender)
//!    takes the amount back.
//!
//! Exactly one of Redeem or Refund ever applies: both require the lock to
//! be `Pending`, and both leave it in a terminal state. The redemption
//! window is half-open, `[created_at, expiry)`; refund opens at `expiry`.
//! Time is always the transaction timestamp.
//!
//! ## Storage
//!
//! ```text
//! \0HTLC\0<sender>\0<receiver>\0<nonce>\0   → lock record (JSON)
//! \0HTLC_NONCE\0<sender>\0<receiver>\0      → next nonce for the pair
//! ```
//!
//! The per-pair nonce lets the same two accounts hold any number of locks
//! at once.

use chrono::{DateTime, Utc};
use hashlock_protocol::config::{HASH_LOCK_LENGTH, HTLC_NAMESPACE, HTLC_NONCE_NAMESPACE, MAX_PREIMAGE_LENGTH};
use hashlock_protocol::crypto::verify_preimage;
use hashlock_protocol::storage::{display_key, StateAccessor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{positive_amount, read_json, read_u64, write_json, write_u64};
use crate::context::TransactionContext;
use crate::error::{ContractError, ContractResult};
use crate::ledger::{account_key, credit, debit, require_balance};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a lock is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    /// Funds held, awaiting redeem or refund.
    Pending,
    /// Released to the receiver. Terminal.
    Redeemed,
    /// Returned to the sender. Terminal.
    Refunded,
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockStatus::Pending => write!(f, "Pending"),
            LockStatus::Redeemed => write!(f, "Redeemed"),
            LockStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

/// Identifies a lock: the pair it runs between and its nonce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockId {
    pub sender: String,
    pub receiver: String,
    pub nonce: u64,
}

impl LockId {
    fn storage_key(&self, stub: &dyn StateAccessor) -> ContractResult<String> {
        account_key(&self.sender)?;
        account_key(&self.receiver)?;
        let nonce = self.nonce.to_string();
        Ok(stub.create_composite_key(HTLC_NAMESPACE, &[&self.sender, &self.receiver, &nonce])?)
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}#{}", self.sender, self.receiver, self.nonce)
    }
}

/// A persisted escrow lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTimeLock {
    pub sender: String,
    pub receiver: String,
    pub nonce: u64,
    /// Tokens held. Always positive.
    pub amount: u64,
    /// Hex-encoded SHA-256 digest the preimage must hash to.
    pub hash_lock: String,
    /// Redeem is allowed strictly before this instant, refund at or after.
    pub expiry: DateTime<Utc>,
    pub status: LockStatus,
    /// Transaction time of the Lock invocation.
    pub created_at: DateTime<Utc>,
    /// Transaction time of the Redeem or Refund that closed the lock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
    /// Hex-encoded secret, published by a successful redeem so the sender
    /// can reuse it on the other leg of a swap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preimage: Option<String>,
}

impl HashTimeLock {
    pub fn id(&self) -> LockId {
        LockId {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            nonce: self.nonce,
        }
    }

    fn hash_lock_bytes(&self, key: &str) -> ContractResult<[u8; HASH_LOCK_LENGTH]> {
        let bytes = hex::decode(&self.hash_lock).map_err(|e| ContractError::CorruptState {
            key: display_key(key),
            reason: e.to_string(),
        })?;
        bytes.try_into().map_err(|_| ContractError::CorruptState {
            key: display_key(key),
            reason: "stored hash lock has wrong length".into(),
        })
    }

    fn ensure_pending(&self) -> ContractResult<()> {
        match self.status {
            LockStatus::Pending => Ok(()),
            status => Err(ContractError::LockNotPending {
                id: self.id().to_string(),
                status: status.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn next_nonce(stub: &mut dyn StateAccessor, sender: &str, receiver: &str) -> ContractResult<u64> {
    let key = stub.create_composite_key(HTLC_NONCE_NAMESPACE, &[sender, receiver])?;
    let nonce = read_u64(stub, &key)?.unwrap_or(0);
    let next = nonce.checked_add(1).ok_or(ContractError::Overflow)?;
    write_u64(stub, &key, next)?;
    Ok(nonce)
}

fn load(stub: &mut dyn StateAccessor, id: &LockId) -> ContractResult<(String, HashTimeLock)> {
    let key = id.storage_key(stub)?;
    let lock = read_json::<HashTimeLock>(stub, &key)?
        .ok_or_else(|| ContractError::LockNotFound(id.to_string()))?;
    Ok((key, lock))
}

/// Moves `amount` from the caller into a new lock for `receiver`.
///
/// # Errors
///
/// In check order: [`ContractError::InvalidAmount`],
/// [`ContractError::InvalidExpiry`] unless `expiry` is strictly after the
/// transaction time, [`ContractError::InvalidHashLock`] unless `hash_lock`
/// is 32 bytes, [`ContractError::AccountNotFound`] for sender then receiver,
/// [`ContractError::InsufficientBalance`].
pub fn lock(
    ctx: &mut TransactionContext<'_>,
    receiver: &str,
    amount: i64,
    expiry: DateTime<Utc>,
    hash_lock: &[u8],
) -> ContractResult<LockId> {
    let amount = positive_amount(amount)?;
    let now = ctx.timestamp();
    if expiry <= now {
        return Err(ContractError::InvalidExpiry(expiry.to_rfc3339()));
    }
    if hash_lock.len() != HASH_LOCK_LENGTH {
        return Err(ContractError::InvalidHashLock(format!(
            "expected {HASH_LOCK_LENGTH} bytes, got {}",
            hash_lock.len()
        )));
    }

    let sender = ctx.caller_id();
    let tx_id = ctx.tx_id().to_string();
    let stub = ctx.stub();

    require_balance(stub, sender)?;
    require_balance(stub, receiver)?;
    debit(stub, sender, amount)?;

    let nonce = next_nonce(stub, sender, receiver)?;
    let record = HashTimeLock {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        nonce,
        amount,
        hash_lock: hex::encode(hash_lock),
        expiry,
        status: LockStatus::Pending,
        created_at: now,
        settled_at: None,
        preimage: None,
    };
    let id = record.id();
    let key = id.storage_key(stub)?;
    write_json(stub, &key, &record)?;

    info!(%tx_id, lock = %id, amount, expiry = %expiry, "lock created");
    Ok(id)
}

/// Releases a pending lock to its receiver. Callable by anyone who knows
/// the preimage.
///
/// # Errors
///
/// In check order: [`ContractError::LockNotFound`],
/// [`ContractError::LockNotPending`], [`ContractError::Expired`] at or after
/// expiry, [`ContractError::HashMismatch`] if the preimage does not hash to
/// the lock (or is longer than any secret this ledger accepts).
pub fn redeem(ctx: &mut TransactionContext<'_>, id: &LockId, preimage: &[u8]) -> ContractResult<HashTimeLock> {
    let now = ctx.timestamp();
    let tx_id = ctx.tx_id().to_string();
    let stub = ctx.stub();

    let (key, mut record) = load(stub, id)?;
    record.ensure_pending()?;
    if now >= record.expiry {
        return Err(ContractError::Expired(id.to_string()));
    }
    let digest = record.hash_lock_bytes(&key)?;
    if preimage.len() > MAX_PREIMAGE_LENGTH || !verify_preimage(preimage, &digest) {
        return Err(ContractError::HashMismatch(id.to_string()));
    }

    credit(stub, &record.receiver, record.amount)?;
    record.status = LockStatus::Redeemed;
    record.settled_at = Some(now);
    record.preimage = Some(hex::encode(preimage));
    write_json(stub, &key, &record)?;

    info!(%tx_id, lock = %id, amount = record.amount, "lock redeemed");
    Ok(record)
}

/// Returns an expired pending lock to its sender.
///
/// # Errors
///
/// In check order: [`ContractError::LockNotFound`],
/// [`ContractError::Unauthorized`] unless the caller is the sender,
/// [`ContractError::LockNotPending`], [`ContractError::NotYetExpired`]
/// before expiry.
pub fn refund(ctx: &mut TransactionContext<'_>, id: &LockId) -> ContractResult<HashTimeLock> {
    let now = ctx.timestamp();
    let caller = ctx.caller_id();
    let tx_id = ctx.tx_id().to_string();
    let stub = ctx.stub();

    let (key, mut record) = load(stub, id)?;
    if caller != record.sender {
        return Err(ContractError::Unauthorized(format!(
            "only {} may refund lock {id}",
            record.sender
        )));
    }
    record.ensure_pending()?;
    if now < record.expiry {
        return Err(ContractError::NotYetExpired(id.to_string()));
    }

    credit(stub, &record.sender, record.amount)?;
    record.status = LockStatus::Refunded;
    record.settled_at = Some(now);
    write_json(stub, &key, &record)?;

    info!(%tx_id, lock = %id, amount = record.amount, "lock refunded");
    Ok(record)
}

/// Reads a lock record.
pub fn get_lock(ctx: &mut TransactionContext<'_>, id: &LockId) -> ContractResult<HashTimeLock> {
    let (key, record) = load(ctx.stub(), id)?;
    debug!(key = %display_key(&key), status = %record.status, "lock read");
    Ok(record)
}
