//! In-memory ledger for unit tests: simulate, then commit on success.

use chrono::{DateTime, TimeZone, Utc};
use hashlock_protocol::identity::ClientIdentity;
use hashlock_protocol::storage::{Committer, MemoryWorldState, TxSimulator};
use std::sync::Arc;

use crate::context::TransactionContext;
use crate::error::ContractResult;

/// Seconds after a fixed epoch, so tests read as `at(50)` rather than
/// carrying dates around.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + secs, 0)
        .single()
        .expect("valid timestamp")
}

pub struct Harness {
    committer: Committer<MemoryWorldState>,
    seq: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            committer: Committer::new(Arc::new(MemoryWorldState::new())),
            seq: 0,
        }
    }

    pub fn world(&self) -> &MemoryWorldState {
        self.committer.world()
    }

    /// Runs one operation as `who` at time `now`. Writes are committed only
    /// if the operation succeeds.
    pub fn run<T>(
        &mut self,
        who: &ClientIdentity,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut TransactionContext<'_>) -> ContractResult<T>,
    ) -> ContractResult<T> {
        self.seq += 1;
        let tx_id = format!("tx-{}", self.seq);
        let world = Arc::clone(self.committer.world());
        let mut sim = TxSimulator::new(world.as_ref(), tx_id.as_str());
        let outcome = {
            let mut ctx = TransactionContext::new(&mut sim, who, now, tx_id.as_str());
            op(&mut ctx)
        };
        if outcome.is_ok() {
            self.committer
                .commit(&sim.into_rwset())
                .expect("uncontended commit");
        }
        outcome
    }
}
