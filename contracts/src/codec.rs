//! Value encoding for the world state.
//!
//! Balances, the total supply and lock nonces are stored as decimal strings
//! (`"100"`), records as JSON. Both are readable with any Fabric-era tool
//! that inspected the original ledger.

use hashlock_protocol::storage::{display_key, StateAccessor};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ContractError, ContractResult};

/// Converts a wire amount to a ledger amount. Zero and negatives are
/// rejected.
pub fn positive_amount(amount: i64) -> ContractResult<u64> {
    if amount <= 0 {
        return Err(ContractError::InvalidAmount(amount));
    }
    Ok(amount as u64)
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_string().into_bytes()
}

pub fn decode_u64(key: &str, bytes: &[u8]) -> ContractResult<u64> {
    std::str::from_utf8(bytes)
        .map_err(|e| corrupt(key, e))?
        .trim()
        .parse::<u64>()
        .map_err(|e| corrupt(key, e))
}

/// Reads a decimal integer, `None` when the key is absent.
pub fn read_u64(stub: &mut dyn StateAccessor, key: &str) -> ContractResult<Option<u64>> {
    match stub.get_state(key)? {
        Some(bytes) => decode_u64(key, &bytes).map(Some),
        None => Ok(None),
    }
}

pub fn write_u64(stub: &mut dyn StateAccessor, key: &str, value: u64) -> ContractResult<()> {
    stub.put_state(key, encode_u64(value))?;
    Ok(())
}

/// Reads a JSON record, `None` when the key is absent.
pub fn read_json<T: DeserializeOwned>(
    stub: &mut dyn StateAccessor,
    key: &str,
) -> ContractResult<Option<T>> {
    match stub.get_state(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| corrupt(key, e)),
        None => Ok(None),
    }
}

pub fn write_json<T: Serialize>(
    stub: &mut dyn StateAccessor,
    key: &str,
    record: &T,
) -> ContractResult<()> {
    let bytes = serde_json::to_vec(record).map_err(|e| corrupt(key, e))?;
    stub.put_state(key, bytes)?;
    Ok(())
}

fn corrupt(key: &str, err: impl std::fmt::Display) -> ContractError {
    ContractError::CorruptState {
        key: display_key(key),
        reason: err.to_string(),
    }
}
