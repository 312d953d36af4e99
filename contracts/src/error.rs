//! Error type shared by every ledger operation.
//!
//! Each variant is a deterministic rejection except
//! [`ContractError::StoreUnavailable`]: replaying the same invocation
//! against the same state fails the same way, so nothing in this crate
//! retries.

use hashlock_protocol::storage::StateError;
use thiserror::Error;

/// Outcome of a rejected invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The caller lacks the capability the operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No balance record exists for the account.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Amounts must be strictly positive.
    #[error("invalid amount: {0} (must be positive)")]
    InvalidAmount(i64),

    /// The account cannot cover the requested amount.
    #[error("insufficient balance in {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Account being debited.
        account: String,
        /// Amount requested.
        requested: u64,
        /// Current balance.
        available: u64,
    },

    /// Transfer attempted without an approval for the pair.
    #[error("no approval from {sender} to {receiver}")]
    NoApproval {
        /// Approving account.
        sender: String,
        /// Approved account.
        receiver: String,
    },

    /// Transfer exceeds what is left of the approval.
    #[error("allowance exceeded: requested {requested}, remaining {remaining}")]
    AllowanceExceeded {
        /// Amount requested.
        requested: u64,
        /// Remaining allowance.
        remaining: u64,
    },

    /// Lock expiry is not strictly after the transaction time.
    #[error("invalid expiry: {0} is not in the future")]
    InvalidExpiry(String),

    /// Hash lock is not a 32-byte SHA-256 digest.
    #[error("invalid hash lock: {0}")]
    InvalidHashLock(String),

    /// No escrow lock under this ID.
    #[error("lock not found: {0}")]
    LockNotFound(String),

    /// The lock was already redeemed or refunded.
    #[error("lock {id} is {status}, not pending")]
    LockNotPending {
        /// Lock identifier.
        id: String,
        /// Terminal status it is in.
        status: String,
    },

    /// Redeem attempted at or after expiry.
    #[error("lock {0} has expired")]
    Expired(String),

    /// Refund attempted before expiry.
    #[error("lock {0} has not yet expired")]
    NotYetExpired(String),

    /// SHA-256 of the preimage does not match the hash lock.
    #[error("preimage does not match hash lock of {0}")]
    HashMismatch(String),

    /// Burning more than the recorded supply.
    #[error("supply underflow: burning {requested} from supply {supply}")]
    SupplyUnderflow {
        /// Amount requested.
        requested: u64,
        /// Recorded total supply.
        supply: u64,
    },

    /// A checked addition overflowed u64.
    #[error("arithmetic overflow")]
    Overflow,

    /// A stored value could not be decoded.
    #[error("corrupt state at {key}: {reason}")]
    CorruptState {
        /// Display form of the key.
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// An ID could not be turned into a storage key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The state accessor failed.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ContractError {
    /// Stable machine-readable code for wire responses and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            ContractError::Unauthorized(_) => "UNAUTHORIZED",
            ContractError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ContractError::InvalidAmount(_) => "INVALID_AMOUNT",
            ContractError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ContractError::NoApproval { .. } => "NO_APPROVAL",
            ContractError::AllowanceExceeded { .. } => "ALLOWANCE_EXCEEDED",
            ContractError::InvalidExpiry(_) => "INVALID_EXPIRY",
            ContractError::InvalidHashLock(_) => "INVALID_HASH_LOCK",
            ContractError::LockNotFound(_) => "LOCK_NOT_FOUND",
            ContractError::LockNotPending { .. } => "LOCK_NOT_PENDING",
            ContractError::Expired(_) => "EXPIRED",
            ContractError::NotYetExpired(_) => "NOT_YET_EXPIRED",
            ContractError::HashMismatch(_) => "HASH_MISMATCH",
            ContractError::SupplyUnderflow { .. } => "SUPPLY_UNDERFLOW",
            ContractError::Overflow => "OVERFLOW",
            ContractError::CorruptState { .. } => "CORRUPT_STATE",
            ContractError::InvalidKey(_) => "INVALID_KEY",
            ContractError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// `true` only for store failures; everything else recurs on replay.
    pub fn is_transient(&self) -> bool {
        matches!(self, ContractError::StoreUnavailable(_))
    }
}

impl From<StateError> for ContractError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Unavailable(msg) => ContractError::StoreUnavailable(msg),
            StateError::InvalidKey(msg) => ContractError::InvalidKey(msg),
        }
    }
}

/// Result alias for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;
