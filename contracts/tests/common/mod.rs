//! Shared harness for the integration tests: an in-memory world state, a
//! committer, and helpers to read balances straight from committed state.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use hashlock_contracts::htlc::{HashTimeLock, LockStatus};
use hashlock_contracts::{execute, ContractResult, Invocation, TransactionContext};
use hashlock_protocol::config::{HTLC_NAMESPACE, TOTAL_SUPPLY_KEY};
use hashlock_protocol::identity::ClientIdentity;
use hashlock_protocol::storage::{
    is_composite_key, split_composite_key, Committer, MemoryWorldState, TxSimulator, WorldState,
};
use serde_json::Value;
use std::sync::Arc;

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + secs, 0).single().unwrap()
}

pub struct Ledger {
    pub committer: Committer<MemoryWorldState>,
    seq: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            committer: Committer::new(Arc::new(MemoryWorldState::new())),
            seq: 0,
        }
    }

    pub fn world(&self) -> &MemoryWorldState {
        self.committer.world()
    }

    /// Simulates and, on success, commits one invocation.
    pub fn invoke(
        &mut self,
        who: &ClientIdentity,
        now: DateTime<Utc>,
        invocation: Invocation,
    ) -> ContractResult<Value> {
        self.seq += 1;
        let tx_id = format!("tx-{}", self.seq);
        let world = Arc::clone(self.committer.world());
        let mut sim = TxSimulator::new(world.as_ref(), tx_id.as_str());
        let outcome = {
            let mut ctx = TransactionContext::new(&mut sim, who, now, tx_id.as_str());
            execute(&mut ctx, &invocation)
        };
        if outcome.is_ok() {
            self.committer.commit(&sim.into_rwset()).unwrap();
        }
        outcome
    }

    /// Committed balance of `account`, `None` if it has no record.
    pub fn balance(&self, account: &str) -> Option<u64> {
        self.world()
            .get(account)
            .unwrap()
            .map(|v| String::from_utf8(v.value).unwrap().parse().unwrap())
    }

    pub fn supply(&self) -> u64 {
        self.balance(TOTAL_SUPPLY_KEY).unwrap_or(0)
    }

    /// Every escrow lock record in committed state.
    pub fn locks(&self) -> Vec<HashTimeLock> {
        self.world()
            .entries()
            .unwrap()
            .into_iter()
            .filter(|(key, _)| is_composite_key(key))
            .filter(|(key, _)| split_composite_key(key).unwrap().0 == HTLC_NAMESPACE)
            .map(|(_, v)| serde_json::from_slice(&v.value).unwrap())
            .collect()
    }

    /// Sum of every plain account balance.
    pub fn sum_of_balances(&self) -> u64 {
        self.world()
            .entries()
            .unwrap()
            .into_iter()
            .filter(|(key, _)| !is_composite_key(key) && key != TOTAL_SUPPLY_KEY)
            .map(|(_, v)| String::from_utf8(v.value).unwrap().parse::<u64>().unwrap())
            .sum()
    }

    pub fn escrowed(&self) -> u64 {
        self.locks()
            .iter()
            .filter(|l| l.status == LockStatus::Pending)
            .map(|l| l.amount)
            .sum()
    }
}
