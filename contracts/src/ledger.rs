//! # Account Ledger
//!
//! Balances and the total supply. Every other module moves tokens through
//! [`credit`] and [`debit`]; only [`mint`] and [`burn`] touch the supply.
//!
//! ## Storage
//!
//! ```text
//! <accountID>    → "<balance>"
//! TOTAL_SUPPLY   → "<supply>"
//! ```
//!
//! An account exists once it has a balance record, even a zero one. Records
//! are never deleted.

use hashlock_protocol::config::TOTAL_SUPPLY_KEY;
use hashlock_protocol::identity::is_authorized_minter;
use hashlock_protocol::storage::{validate_simple_key, StateAccessor};
use tracing::debug;

use crate::codec::{positive_amount, read_u64, write_u64};
use crate::context::TransactionContext;
use crate::error::{ContractError, ContractResult};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Checks that `id` can serve as a balance key.
///
/// Account IDs are stored as simple keys, so they must be non-empty, free of
/// the composite delimiter, and must not shadow the supply record.
pub fn account_key(id: &str) -> ContractResult<&str> {
    validate_simple_key(id)?;
    if id == TOTAL_SUPPLY_KEY {
        return Err(ContractError::InvalidKey(format!(
            "{id} is reserved and cannot name an account"
        )));
    }
    Ok(id)
}

/// Reads a balance, `None` if the account has no record.
pub fn read_balance(stub: &mut dyn StateAccessor, account: &str) -> ContractResult<Option<u64>> {
    read_u64(stub, account_key(account)?)
}

/// Reads a balance, failing if the account has no record.
pub fn require_balance(stub: &mut dyn StateAccessor, account: &str) -> ContractResult<u64> {
    read_balance(stub, account)?.ok_or_else(|| ContractError::AccountNotFound(account.to_string()))
}

/// Ensures `account` has a record, creating one with a zero balance.
pub fn ensure_account(stub: &mut dyn StateAccessor, account: &str) -> ContractResult<u64> {
    match read_balance(stub, account)? {
        Some(balance) => Ok(balance),
        None => {
            write_u64(stub, account, 0)?;
            debug!(account, "account created");
            Ok(0)
        }
    }
}

// ---------------------------------------------------------------------------
// Internal movements
// ---------------------------------------------------------------------------

/// Adds `amount` to `account`, creating the account if needed. Returns the
/// new balance.
///
/// # Errors
///
/// [`ContractError::Overflow`] if the balance would exceed `u64::MAX`.
pub fn credit(stub: &mut dyn StateAccessor, account: &str, amount: u64) -> ContractResult<u64> {
    let balance = read_balance(stub, account)?.unwrap_or(0);
    let updated = balance.checked_add(amount).ok_or(ContractError::Overflow)?;
    write_u64(stub, account, updated)?;
    debug!(account, amount, balance = updated, "credit");
    Ok(updated)
}

/// Removes `amount` from `account`. Returns the new balance.
///
/// # Errors
///
/// [`ContractError::AccountNotFound`] if the account has no record,
/// [`ContractError::InsufficientBalance`] if it holds less than `amount`.
pub fn debit(stub: &mut dyn StateAccessor, account: &str, amount: u64) -> ContractResult<u64> {
    let balance = require_balance(stub, account)?;
    let updated = balance
        .checked_sub(amount)
        .ok_or_else(|| ContractError::InsufficientBalance {
            account: account.to_string(),
            requested: amount,
            available: balance,
        })?;
    write_u64(stub, account, updated)?;
    debug!(account, amount, balance = updated, "debit");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn require_minter(ctx: &TransactionContext<'_>, action: &str) -> ContractResult<()> {
    if is_authorized_minter(ctx.identity()) {
        Ok(())
    } else {
        Err(ContractError::Unauthorized(format!(
            "client {} is not authorized to {action} new tokens",
            ctx.caller_id()
        )))
    }
}

/// Creates `amount` new tokens in the caller's account. Returns the
/// caller's new balance.
///
/// # Errors
///
/// [`ContractError::Unauthorized`] unless the caller carries the minter
/// attribute, [`ContractError::InvalidAmount`] for non-positive amounts,
/// [`ContractError::Overflow`] if balance or supply would overflow.
pub fn mint(ctx: &mut TransactionContext<'_>, amount: i64) -> ContractResult<u64> {
    require_minter(ctx, "mint")?;
    let amount = positive_amount(amount)?;
    let minter = ctx.caller_id();

    let balance = credit(ctx.stub(), minter, amount)?;

    let supply = read_u64(ctx.stub(), TOTAL_SUPPLY_KEY)?.unwrap_or(0);
    let supply = supply.checked_add(amount).ok_or(ContractError::Overflow)?;
    write_u64(ctx.stub(), TOTAL_SUPPLY_KEY, supply)?;

    debug!(tx_id = ctx.tx_id(), minter, amount, supply, "mint");
    Ok(balance)
}

/// Destroys `amount` tokens from the caller's account. Returns the caller's
/// new balance.
///
/// # Errors
///
/// [`ContractError::Unauthorized`], [`ContractError::InvalidAmount`],
/// [`ContractError::AccountNotFound`], [`ContractError::InsufficientBalance`],
/// or [`ContractError::SupplyUnderflow`] if the recorded supply is missing or
/// smaller than `amount`.
pub fn burn(ctx: &mut TransactionContext<'_>, amount: i64) -> ContractResult<u64> {
    require_minter(ctx, "burn")?;
    let amount = positive_amount(amount)?;
    let minter = ctx.caller_id();

    let balance = debit(ctx.stub(), minter, amount)?;

    let supply = read_u64(ctx.stub(), TOTAL_SUPPLY_KEY)?.unwrap_or(0);
    let supply = supply
        .checked_sub(amount)
        .ok_or(ContractError::SupplyUnderflow {
            requested: amount,
            supply,
        })?;
    write_u64(ctx.stub(), TOTAL_SUPPLY_KEY, supply)?;

    debug!(tx_id = ctx.tx_id(), minter, amount, supply, "burn");
    Ok(balance)
}

/// The caller's balance.
///
/// # Errors
///
/// [`ContractError::AccountNotFound`] if the caller has no record.
pub fn balance_of(ctx: &mut TransactionContext<'_>) -> ContractResult<u64> {
    let caller = ctx.caller_id();
    require_balance(ctx.stub(), caller)
}

/// The balance of an arbitrary account.
pub fn balance_of_account(ctx: &mut TransactionContext<'_>, account: &str) -> ContractResult<u64> {
    require_balance(ctx.stub(), account)
}

/// Total tokens in existence, including those held in escrow. Zero before
/// the first mint.
pub fn total_supply(ctx: &mut TransactionContext<'_>) -> ContractResult<u64> {
    Ok(read_u64(ctx.stub(), TOTAL_SUPPLY_KEY)?.unwrap_or(0))
}
