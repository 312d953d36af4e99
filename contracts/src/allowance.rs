//! # Allowance Registry & Transfer
//!
//! A sender approves a receiver for up to N tokens; the sender may then
//! transfer up to that many tokens to the receiver. Approvals accumulate
//! and are never deleted. A spent-out approval stays on the ledger with
//! zero remaining.
//!
//! ```text
//! \0APPROVAL\0<sender>\0<receiver>\0 → {"SenderID","ReceiverID","TokensToBeTransferred"}
//! ```
//!
//! Approve is a pre-flight affordability check only. No funds move until
//! [`transfer`], which re-checks the balance at that point.

use hashlock_protocol::config::APPROVAL_NAMESPACE;
use hashlock_protocol::storage::StateAccessor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{positive_amount, read_json, write_json};
use crate::context::TransactionContext;
use crate::error::{ContractError, ContractResult};
use crate::ledger::{account_key, credit, debit, ensure_account, require_balance};

/// Standing permission for `sender_id` to transfer up to `remaining`
/// tokens to `receiver_id`.
///
/// Field names on the wire match the ledger's historical JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    #[serde(rename = "SenderID")]
    pub sender_id: String,
    #[serde(rename = "ReceiverID")]
    pub receiver_id: String,
    #[serde(rename = "TokensToBeTransferred")]
    pub remaining: u64,
}

fn approval_key(stub: &dyn StateAccessor, sender: &str, receiver: &str) -> ContractResult<String> {
    account_key(sender)?;
    account_key(receiver)?;
    Ok(stub.create_composite_key(APPROVAL_NAMESPACE, &[sender, receiver])?)
}

/// Approves `receiver` to be sent up to `amount` more tokens by the caller.
/// Returns the cumulative allowance.
///
/// The receiver's account is created with a zero balance if absent.
///
/// # Errors
///
/// [`ContractError::InvalidAmount`] for non-positive amounts,
/// [`ContractError::AccountNotFound`] if the caller has no account,
/// [`ContractError::InsufficientBalance`] if `amount` exceeds the caller's
/// current balance, [`ContractError::Overflow`] if the allowance would
/// overflow.
pub fn approve(ctx: &mut TransactionContext<'_>, receiver: &str, amount: i64) -> ContractResult<u64> {
    let amount = positive_amount(amount)?;
    let sender = ctx.caller_id();
    let stub = ctx.stub();

    let balance = require_balance(stub, sender)?;
    if amount > balance {
        return Err(ContractError::InsufficientBalance {
            account: sender.to_string(),
            requested: amount,
            available: balance,
        });
    }

    ensure_account(stub, receiver)?;

    let key = approval_key(stub, sender, receiver)?;
    let approval = match read_json::<Approval>(stub, &key)? {
        Some(mut existing) => {
            existing.remaining = existing
                .remaining
                .checked_add(amount)
                .ok_or(ContractError::Overflow)?;
            existing
        }
        None => Approval {
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            remaining: amount,
        },
    };
    write_json(stub, &key, &approval)?;

    debug!(sender, receiver, amount, remaining = approval.remaining, "approve");
    Ok(approval.remaining)
}

/// Remaining allowance from `sender` to `receiver`; zero when no approval
/// exists.
pub fn allowance(ctx: &mut TransactionContext<'_>, sender: &str, receiver: &str) -> ContractResult<u64> {
    let stub = ctx.stub();
    let key = approval_key(stub, sender, receiver)?;
    Ok(read_json::<Approval>(stub, &key)?.map_or(0, |a| a.remaining))
}

/// Moves `amount` tokens from the caller to `receiver`, consuming allowance.
/// Returns the allowance left afterwards.
///
/// # Errors
///
/// In check order: [`ContractError::InvalidAmount`],
/// [`ContractError::AccountNotFound`] for sender then receiver,
/// [`ContractError::NoApproval`], [`ContractError::AllowanceExceeded`],
/// [`ContractError::InsufficientBalance`].
pub fn transfer(ctx: &mut TransactionContext<'_>, receiver: &str, amount: i64) -> ContractResult<u64> {
    let amount = positive_amount(amount)?;
    let sender = ctx.caller_id();
    let stub = ctx.stub();

    let sender_balance = require_balance(stub, sender)?;
    require_balance(stub, receiver)?;

    let key = approval_key(stub, sender, receiver)?;
    let mut approval: Approval = read_json(stub, &key)?.ok_or_else(|| ContractError::NoApproval {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
    })?;

    if amount > approval.remaining {
        return Err(ContractError::AllowanceExceeded {
            requested: amount,
            remaining: approval.remaining,
        });
    }
    if amount > sender_balance {
        return Err(ContractError::InsufficientBalance {
            account: sender.to_string(),
            requested: amount,
            available: sender_balance,
        });
    }

    debit(stub, sender, amount)?;
    credit(stub, receiver, amount)?;

    approval.remaining -= amount;
    write_json(stub, &key, &approval)?;

    debug!(sender, receiver, amount, remaining = approval.remaining, "transfer");
    Ok(approval.remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{balance_of_account, mint};
    use crate::testkit::{at, Harness};
    use hashlock_protocol::identity::ClientIdentity;

    fn funded(amount: i64) -> (Harness, ClientIdentity) {
        let mut h = Harness::new();
        let m = ClientIdentity::minter("sender");
        h.run(&m, at(0), |ctx| mint(ctx, amount)).unwrap();
        (h, m)
    }

    #[test]
    fn approve_creates_receiver_with_zero_balance() {
        let (mut h, m) = funded(50);
        h.run(&m, at(0), |ctx| approve(ctx, "receiver", 20)).unwrap();
        assert_eq!(h.run(&m, at(0), |ctx| balance_of_account(ctx, "receiver")).unwrap(), 0);
        assert_eq!(h.run(&m, at(0), |ctx| balance_of_account(ctx, "sender")).unwrap(), 50);
    }

    #[test]
    fn approvals_are_cumulative() {
        let (mut h, m) = funded(50);
        h.run(&m, at(0), |ctx| approve(ctx, "receiver", 5)).unwrap();
        assert_eq!(h.run(&m, at(0), |ctx| approve(ctx, "receiver", 3)).unwrap(), 8);
        assert_eq!(h.run(&m, at(0), |ctx| allowance(ctx, "sender", "receiver")).unwrap(), 8);
    }

    #[test]
    fn approve_is_a_preflight_check_per_call() {
        let (mut h, m) = funded(10);
        h.run(&m, at(0), |ctx| approve(ctx, "receiver", 10)).unwrap();
        // Each approval is checked against the balance alone, not the sum.
        assert_eq!(h.run(&m, at(0), |ctx| approve(ctx, "receiver", 10)).unwrap(), 20);
        let err = h.run(&m, at(0), |ctx| approve(ctx, "receiver", 11)).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
    }

    #[test]
    fn approve_failures() {
        let mut h = Harness::new();
        let nobody = ClientIdentity::new("nobody");
        assert_eq!(
            h.run(&nobody, at(0), |ctx| approve(ctx, "receiver", 1)),
            Err(ContractError::AccountNotFound("nobody".into()))
        );
        assert_eq!(
            h.run(&nobody, at(0), |ctx| approve(ctx, "receiver", 0)),
            Err(ContractError::InvalidAmount(0))
        );
    }

    #[test]
    fn allowance_defaults_to_zero() {
        let (mut h, m) = funded(1);
        assert_eq!(h.run(&m, at(0), |ctx| allowance(ctx, "x", "y")).unwrap(), 0);
    }

    #[test]
    fn transfer_moves_tokens_and_consumes_allowance() {
        let (mut h, m) = funded(100);
        h.run(&m, at(0), |ctx| approve(ctx, "receiver", 40)).unwrap();
        assert_eq!(h.run(&m, at(0), |ctx| transfer(ctx, "receiver", 25)).unwrap(), 15);
        assert_eq!(h.run(&m, at(0), |ctx| balance_of_account(ctx, "sender")).unwrap(), 75);
        assert_eq!(h.run(&m, at(0), |ctx| balance_of_account(ctx, "receiver")).unwrap(), 25);

        // Spending the rest leaves a zero record, not an absent one.
        assert_eq!(h.run(&m, at(0), |ctx| transfer(ctx, "receiver", 15)).unwrap(), 0);
        let err = h.run(&m, at(0), |ctx| transfer(ctx, "receiver", 1)).unwrap_err();
        assert_eq!(
            err,
            ContractError::AllowanceExceeded {
                requested: 1,
                remaining: 0
            }
        );
    }

    #[test]
    fn transfer_without_approval() {
        let (mut h, m) = funded(10);
        let r = ClientIdentity::minter("receiver");
        h.run(&r, at(0), |ctx| mint(ctx, 1)).unwrap();
        assert_eq!(
            h.run(&m, at(0), |ctx| transfer(ctx, "receiver", 1)).unwrap_err().code(),
            "NO_APPROVAL"
        );
    }

    #[test]
    fn transfer_to_unknown_receiver() {
        let (mut h, m) = funded(10);
        assert_eq!(
            h.run(&m, at(0), |ctx| transfer(ctx, "ghost", 1)),
            Err(ContractError::AccountNotFound("ghost".into()))
        );
    }

    #[test]
    fn transfer_rechecks_balance() {
        let (mut h, m) = funded(10);
        h.run(&m, at(0), |ctx| approve(ctx, "receiver", 10)).unwrap();
        h.run(&m, at(0), |ctx| approve(ctx, "receiver", 10)).unwrap();
        let err = h.run(&m, at(0), |ctx| transfer(ctx, "receiver", 15)).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
        assert_eq!(h.run(&m, at(0), |ctx| allowance(ctx, "sender", "receiver")).unwrap(), 20);
    }

    #[test]
    fn approval_record_keeps_historical_field_names() {
        let record = Approval {
            sender_id: "s".into(),
            receiver_id: "r".into(),
            remaining: 4,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"SenderID":"s","ReceiverID":"r","TokensToBeTransferred":4}"#);
    }
}
