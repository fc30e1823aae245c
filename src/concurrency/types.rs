use crate::common::ObjectKey;
use std::fmt;

/// Lifecycle of one transaction as tracked by whichever concurrency control
/// protocol is active. `Growing`/`Shrinking` only have meaning under 2PL;
/// the other protocols only ever use `Active`/`Committed`/`Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
}

/// The outcome of asking a protocol to grant access to an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResponse {
    /// Access granted. `effective` is false only for the timestamp-ordering
    /// protocol's Thomas Write Rule: the write was accepted but silently
    /// discarded because a younger transaction already wrote the object.
    Granted { effective: bool },
    /// The requester must block and retry; used by 2PL while a conflicting
    /// lock is held.
    Waiting,
    /// The request cannot be granted and the transaction must abort
    /// (obsolete read under TO, failed backward validation under OCC).
    Denied(String),
    /// 2PL only: granting this request would complete a cycle in the
    /// wait-for graph. The caller names which transaction should be the
    /// victim.
    Deadlock { victim: u64 },
}

impl fmt::Display for ValidationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationResponse::Granted { effective } => write!(f, "Granted(effective={effective})"),
            ValidationResponse::Waiting => write!(f, "Waiting"),
            ValidationResponse::Denied(reason) => write!(f, "Denied({reason})"),
            ValidationResponse::Deadlock { victim } => write!(f, "Deadlock(victim={victim})"),
        }
    }
}

/// One access a transaction wants to make against one object.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub tx_id: u64,
    pub object: ObjectKey,
    pub action: Action,
}

impl AccessRequest {
    pub fn new(tx_id: u64, object: ObjectKey, action: Action) -> Self {
        AccessRequest { tx_id, object, action }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlockVictimPolicy {
    /// The transaction whose request would close the wait-for cycle aborts.
    /// This is the default: it punishes the newest arrival rather than work
    /// that is already holding locks other transactions may depend on.
    Requester,
    /// The transaction that already holds the conflicting lock aborts
    /// instead, releasing its locks immediately. Kept as a documented
    /// alternative policy and exercised by tests, not used by default.
    Holder,
}

impl Default for DeadlockVictimPolicy {
    fn default() -> Self {
        DeadlockVictimPolicy::Requester
    }
}
