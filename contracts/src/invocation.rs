//! # Invocation Routing
//!
//! One [`Invocation`] per transaction. The dispatcher deserializes it from
//! the request body, hands it to [`execute`] with a fresh context, and
//! commits whatever the simulator staged if the call succeeds.
//!
//! ```json
//! {"function": "Lock", "receiver": "bob", "amount": 30,
//!  "expiry": "2026-01-01T00:01:40Z", "hash_lock": "9f86d0…"}
//! ```
//!
//! Amounts are signed on the wire so a negative amount reaches the ledger
//! and is rejected there with `InvalidAmount` rather than failing to parse.
//! Hash locks and preimages travel hex-encoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::TransactionContext;
use crate::error::{ContractError, ContractResult};
use crate::htlc::LockId;
use crate::{allowance, htlc, ledger};

/// A single ledger operation with its arguments. The caller is taken from
/// the transaction context, never from the arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function")]
pub enum Invocation {
    Mint { amount: i64 },
    Burn { amount: i64 },
    BalanceOf,
    BalanceOfAccount { account: String },
    TotalSupply,
    Approve { receiver: String, amount: i64 },
    Allowance { sender: String, receiver: String },
    Transfer { receiver: String, amount: i64 },
    Lock {
        receiver: String,
        amount: i64,
        expiry: DateTime<Utc>,
        hash_lock: String,
    },
    Redeem { lock_id: LockId, preimage: String },
    Refund { lock_id: LockId },
    GetLock { lock_id: LockId },
}

impl Invocation {
    /// Operation name, used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Invocation::Mint { .. } => "Mint",
            Invocation::Burn { .. } => "Burn",
            Invocation::BalanceOf => "BalanceOf",
            Invocation::BalanceOfAccount { .. } => "BalanceOfAccount",
            Invocation::TotalSupply => "TotalSupply",
            Invocation::Approve { .. } => "Approve",
            Invocation::Allowance { .. } => "Allowance",
            Invocation::Transfer { .. } => "Transfer",
            Invocation::Lock { .. } => "Lock",
            Invocation::Redeem { .. } => "Redeem",
            Invocation::Refund { .. } => "Refund",
            Invocation::GetLock { .. } => "GetLock",
        }
    }

    /// `true` for queries that never stage writes.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Invocation::BalanceOf
                | Invocation::BalanceOfAccount { .. }
                | Invocation::TotalSupply
                | Invocation::Allowance { .. }
                | Invocation::GetLock { .. }
        )
    }
}

fn to_value<T: Serialize>(value: &T) -> ContractResult<Value> {
    serde_json::to_value(value).map_err(|e| ContractError::CorruptState {
        key: "<result>".into(),
        reason: e.to_string(),
    })
}

/// Runs `invocation` against `ctx` and returns its JSON result.
///
/// # Errors
///
/// Whatever the routed operation returns. A hash lock that is not valid hex
/// is [`ContractError::InvalidHashLock`]; a preimage that is not valid hex
/// cannot match any lock and is [`ContractError::HashMismatch`].
pub fn execute(ctx: &mut TransactionContext<'_>, invocation: &Invocation) -> ContractResult<Value> {
    match invocation {
        Invocation::Mint { amount } => {
            let balance = ledger::mint(ctx, *amount)?;
            Ok(json!({ "balance": balance }))
        }
        Invocation::Burn { amount } => {
            let balance = ledger::burn(ctx, *amount)?;
            Ok(json!({ "balance": balance }))
        }
        Invocation::BalanceOf => {
            let balance = ledger::balance_of(ctx)?;
            Ok(json!({ "account": ctx.caller_id(), "balance": balance }))
        }
        Invocation::BalanceOfAccount { account } => {
            let balance = ledger::balance_of_account(ctx, account)?;
            Ok(json!({ "account": account, "balance": balance }))
        }
        Invocation::TotalSupply => {
            let supply = ledger::total_supply(ctx)?;
            Ok(json!({ "total_supply": supply }))
        }
        Invocation::Approve { receiver, amount } => {
            let remaining = allowance::approve(ctx, receiver, *amount)?;
            Ok(json!({ "allowance": remaining }))
        }
        Invocation::Allowance { sender, receiver } => {
            let remaining = allowance::allowance(ctx, sender, receiver)?;
            Ok(json!({ "allowance": remaining }))
        }
        Invocation::Transfer { receiver, amount } => {
            let remaining = allowance::transfer(ctx, receiver, *amount)?;
            Ok(json!({ "allowance": remaining }))
        }
        Invocation::Lock {
            receiver,
            amount,
            expiry,
            hash_lock,
        } => {
            let digest =
                hex::decode(hash_lock).map_err(|e| ContractError::InvalidHashLock(e.to_string()))?;
            let id = to_value(&htlc::lock(ctx, receiver, *amount, *expiry, &digest)?)?;
            Ok(json!({ "lock_id": id }))
        }
        Invocation::Redeem { lock_id, preimage } => {
            let secret =
                hex::decode(preimage).map_err(|_| ContractError::HashMismatch(lock_id.to_string()))?;
            to_value(&htlc::redeem(ctx, lock_id, &secret)?)
        }
        Invocation::Refund { lock_id } => to_value(&htlc::refund(ctx, lock_id)?),
        Invocation::GetLock { lock_id } => to_value(&htlc::get_lock(ctx, lock_id)?),
    }
}
