// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Hashlock Ledger Contracts
//!
//! Transaction handlers for a fungible token ledger with hashed time-lock
//! escrow. Every operation runs against a [`context::TransactionContext`]:
//! it reads and stages writes through the platform's state accessor, and
//! the platform commits the staged writes only if the operation returns
//! `Ok`.
//!
//! - **Ledger**: balances and total supply. Minting and burning are gated
//!   on the caller's `minter` attribute.
//! - **Allowance**: cumulative sender → receiver approvals and the
//!   transfers they permit.
//! - **HTLC**: lock tokens behind a SHA-256 hash and an expiry; redeem
//!   with the preimage before expiry, refund to the sender after.
//!
//! ## Design Principles
//!
//! 1. Every amount is checked: `checked_add` and `checked_sub`, never
//!    wrapping arithmetic.
//! 2. Lock lifecycles are enum states, and terminal states are final.
//! 3. Time comes from the transaction context, never the local clock.
//! 4. Supply is conserved: total supply equals the sum of all balances
//!    plus every pending lock.

pub mod allowance;
pub mod codec;
pub mod context;
pub mod error;
pub mod htlc;
pub mod invocation;
pub mod ledger;

#[cfg(test)]
mod testkit;

pub use context::TransactionContext;
pub use error::{ContractError, ContractResult};
pub use invocation::{execute, Invocation};
