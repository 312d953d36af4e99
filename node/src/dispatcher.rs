//! # Transaction Dispatcher
//!
//! Turns one client request into one ledger transaction:
//!
//! ```text
//! resolve caller ─▶ assign tx_id + timestamp ─▶ simulate ─▶ commit (MVCC)
//! ```
//!
//! Simulation runs against a fresh [`TxSimulator`]; if the contract returns
//! an error the read/write set is dropped and nothing is written. Queries
//! are simulated the same way but never reach the committer. Commits
//! go through a single [`Committer`], which serialises validate-and-apply.
//! A transaction that loses an MVCC race is reported to the client, not
//! retried here.

use chrono::{DateTime, Utc};
use hashlock_contracts::{execute, ContractError, Invocation, TransactionContext};
use hashlock_protocol::crypto::transaction_id;
use hashlock_protocol::identity::ClientIdentity;
use hashlock_protocol::storage::{
    state_root, CommitError, Committer, StateError, TxSimulator, Version, WorldState,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::IdentityRegistry;
use crate::metrics::{outcome, SharedMetrics};

/// Why an invocation did not produce a commit.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The caller is not in the identity registry.
    #[error("unknown caller: {0}")]
    UnknownCaller(String),

    /// The contract rejected the invocation.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Validation or apply failed at commit.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl DispatchError {
    /// Stable code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownCaller(_) => "UNKNOWN_CALLER",
            DispatchError::Contract(e) => e.code(),
            DispatchError::Commit(CommitError::MvccReadConflict { .. }) => "MVCC_READ_CONFLICT",
            DispatchError::Commit(CommitError::Store(_)) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::UnknownCaller(_) => false,
            DispatchError::Contract(e) => e.is_transient(),
            DispatchError::Commit(_) => true,
        }
    }
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub tx_id: String,
    /// World-state version after the transaction. Unchanged for queries.
    pub version: Version,
    pub result: Value,
}

/// Snapshot for `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub version: Version,
    pub state_root: String,
    pub identities: usize,
}

pub struct Dispatcher {
    committer: Committer<dyn WorldState>,
    identities: IdentityRegistry,
    metrics: SharedMetrics,
}

impl Dispatcher {
    pub fn new(world: Arc<dyn WorldState>, identities: IdentityRegistry, metrics: SharedMetrics) -> Self {
        if let Ok(version) = world.latest_version() {
            metrics.committed_version.set(version as i64);
        }
        Self {
            committer: Committer::new(world),
            identities,
            metrics,
        }
    }

    /// Runs `invocation` on behalf of `caller` at the current time.
    ///
    /// The transaction ID commits to the caller's client ID and a random
    /// nonce, so two identical requests get distinct IDs.
    pub fn invoke(&self, caller: &str, invocation: &Invocation) -> Result<Receipt, DispatchError> {
        let identity = self.resolve(caller, invocation)?;
        let nonce = Uuid::new_v4();
        let tx_id = hex::encode(transaction_id(identity.id(), nonce.as_bytes()));
        self.invoke_as(identity, invocation, Utc::now(), tx_id)
    }

    /// Runs `invocation` as `identity` with an explicit timestamp and ID.
    pub fn invoke_as(
        &self,
        identity: &ClientIdentity,
        invocation: &Invocation,
        timestamp: DateTime<Utc>,
        tx_id: String,
    ) -> Result<Receipt, DispatchError> {
        let operation = invocation.name();
        let timer = self.metrics.invocation_latency_seconds.start_timer();

        let world = Arc::clone(self.committer.world());
        let mut sim = TxSimulator::new(world.as_ref(), tx_id.as_str());
        let executed = {
            let mut ctx = TransactionContext::new(&mut sim, identity, timestamp, tx_id.as_str());
            execute(&mut ctx, invocation)
        };

        let result = match executed {
            Ok(result) => result,
            Err(err) => {
                let label = if err.is_transient() {
                    outcome::FAILED
                } else {
                    outcome::REJECTED
                };
                self.metrics.record(operation, label);
                warn!(%tx_id, caller = identity.id(), operation, code = err.code(), error = %err, "invocation rejected");
                return Err(err.into());
            }
        };

        let rwset = sim.into_rwset();
        let is_query = invocation.is_query();
        let committed = if is_query {
            self.committer
                .world()
                .latest_version()
                .map_err(CommitError::from)
        } else {
            self.committer.commit(&rwset)
        };
        let version = match committed {
            Ok(version) => version,
            Err(err) => {
                let label = match &err {
                    CommitError::MvccReadConflict { .. } => {
                        self.metrics.mvcc_conflicts_total.inc();
                        outcome::CONFLICT
                    }
                    CommitError::Store(_) => outcome::FAILED,
                };
                self.metrics.record(operation, label);
                warn!(%tx_id, operation, error = %err, "commit failed");
                return Err(err.into());
            }
        };
        timer.observe_duration();

        if is_query {
            self.metrics.record(operation, outcome::QUERY);
        } else {
            self.metrics.record(operation, outcome::COMMITTED);
            self.metrics.committed_version.set(version as i64);
        }
        debug!(%tx_id, operation, version, reads = rwset.reads.len(), writes = rwset.writes.len(), "invocation committed");

        Ok(Receipt {
            tx_id,
            version,
            result,
        })
    }

    /// Runs a read-only invocation without a caller or commit. Used by the
    /// GET endpoints.
    pub fn query(&self, invocation: &Invocation) -> Result<Value, DispatchError> {
        let observer = ClientIdentity::new("query");
        let world = Arc::clone(self.committer.world());
        let mut sim = TxSimulator::new(world.as_ref(), "query");
        let mut ctx = TransactionContext::new(&mut sim, &observer, Utc::now(), "query");
        Ok(execute(&mut ctx, invocation)?)
    }

    pub fn status(&self) -> Result<LedgerStatus, StateError> {
        let world = self.committer.world();
        Ok(LedgerStatus {
            version: world.latest_version()?,
            state_root: hex::encode(state_root(world.as_ref())?),
            identities: self.identities.len(),
        })
    }

    fn resolve(&self, caller: &str, invocation: &Invocation) -> Result<&ClientIdentity, DispatchError> {
        self.identities.resolve(caller).ok_or_else(|| {
            self.metrics.record(invocation.name(), outcome::REJECTED);
            warn!(caller, operation = invocation.name(), "unknown caller");
            DispatchError::UnknownCaller(caller.to_string())
        })
    }
}
