//! Per-invocation context: who is calling, when, and through which state
//! accessor.

use chrono::{DateTime, Utc};
use hashlock_protocol::identity::ClientIdentity;
use hashlock_protocol::storage::StateAccessor;

/// Everything an operation may consult besides its own arguments.
///
/// The timestamp is assigned by the dispatcher before simulation. Expiry
/// checks compare against it and never against the local clock, so every
/// replica that replays the invocation reaches the same verdict.
pub struct TransactionContext<'a> {
    stub: &'a mut dyn StateAccessor,
    identity: &'a ClientIdentity,
    timestamp: DateTime<Utc>,
    tx_id: String,
}

impl<'a> TransactionContext<'a> {
    /// Binds an invocation to its state accessor, caller and time.
    pub fn new(
        stub: &'a mut dyn StateAccessor,
        identity: &'a ClientIdentity,
        timestamp: DateTime<Utc>,
        tx_id: impl Into<String>,
    ) -> Self {
        Self {
            stub,
            identity,
            timestamp,
            tx_id: tx_id.into(),
        }
    }

    /// State accessor for this transaction.
    pub fn stub(&mut self) -> &mut dyn StateAccessor {
        &mut *self.stub
    }

    /// The invoking client.
    pub fn identity(&self) -> &'a ClientIdentity {
        self.identity
    }

    /// Shorthand for `identity().id()`. Borrows the identity, not the
    /// context, so it can be held across state access.
    pub fn caller_id(&self) -> &'a str {
        self.identity.id()
    }

    /// Dispatcher-assigned transaction time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }
}
