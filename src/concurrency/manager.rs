use super::optimistic_validation::OptimisticValidation;
use super::timestamp_ordering::TimestampOrdering;
use super::two_phase_locking::TwoPhaseLocking;
use super::types::{Action, DeadlockVictimPolicy, TransactionStatus, ValidationResponse};
use crate::common::{DbError, DbResult, ObjectKey};
use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

/// One audit-trail entry recorded by `log_object`. Not consulted by any
/// protocol; purely a record of "this object was touched by this
/// transaction" for diagnostics, kept bounded the same way the OCC
/// committed-set is capped to the most recent entries.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub object: ObjectKey,
    pub tx_id: u64,
}

const AUDIT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    TwoPhaseLocking,
    TimestampOrdering,
    OptimisticValidation,
}

/// A tagged-enum facade over the three protocols so the query processor can
/// depend on one type regardless of which protocol the server was started
/// with, the same way the teacher's `TnxManager` singleton presents one API
/// over its internal lock tables.
enum Inner {
    Tpl(TwoPhaseLocking),
    To(TimestampOrdering),
    Occ(OptimisticValidation),
}

pub struct ConcurrencyManager {
    inner: Inner,
    audit_log: Mutex<VecDeque<AuditEntry>>,
}

static MANAGER: OnceLock<ConcurrencyManager> = OnceLock::new();

impl ConcurrencyManager {
    fn build(kind: ProtocolKind) -> Self {
        let inner = match kind {
            ProtocolKind::TwoPhaseLocking => Inner::Tpl(TwoPhaseLocking::new(DeadlockVictimPolicy::default())),
            ProtocolKind::TimestampOrdering => Inner::To(TimestampOrdering::new()),
            ProtocolKind::OptimisticValidation => Inner::Occ(OptimisticValidation::new()),
        };
        ConcurrencyManager { inner, audit_log: Mutex::new(VecDeque::new()) }
    }

    /// Initializes the process-wide concurrency manager. Must be called
    /// exactly once, before any transaction begins; subsequent calls are
    /// no-ops, matching `TnxManager::init`'s idempotent singleton setup.
    pub fn init(kind: ProtocolKind) {
        MANAGER.get_or_init(|| ConcurrencyManager::build(kind));
    }

    pub fn global() -> &'static ConcurrencyManager {
        MANAGER.get_or_init(|| ConcurrencyManager::build(ProtocolKind::TwoPhaseLocking))
    }

    pub fn begin_transaction(&self, tx_id: u64) {
        match &self.inner {
            Inner::Tpl(p) => p.begin(tx_id),
            Inner::To(p) => p.begin(tx_id),
            Inner::Occ(p) => p.begin(tx_id),
        }
    }

    /// Requests access to `object` on behalf of `tx_id`. Under 2PL this
    /// acquires (or queues for) a lock; under TO it validates the access
    /// immediately against the object's read/write timestamps; under OCC it
    /// just records the access for later backward validation.
    pub fn validate_object(&self, tx_id: u64, object: ObjectKey, action: Action) -> ValidationResponse {
        match &self.inner {
            Inner::Tpl(p) => p.acquire(tx_id, object, action),
            Inner::To(p) => p.validate(tx_id, object, action),
            Inner::Occ(p) => p.record_access(tx_id, object, action),
        }
    }

    /// Records a non-authoritative audit entry of an object access.
    /// Never consulted by `validate_object`; purely a diagnostic trail, so
    /// a missed or dropped entry here is not a correctness bug.
    pub fn log_object(&self, object: ObjectKey, tx_id: u64) {
        let mut log = self.audit_log.lock().unwrap();
        if log.len() >= AUDIT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(AuditEntry { object, tx_id });
    }

    /// Snapshot of the audit trail, oldest first. For diagnostics/tests;
    /// not part of the correctness-bearing API.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.audit_log.lock().unwrap().iter().cloned().collect()
    }

    /// 2PL-only: marks the transaction as shrinking so it can no longer
    /// acquire new locks, a no-op under TO and OCC.
    pub fn begin_shrinking(&self, tx_id: u64) {
        if let Inner::Tpl(p) = &self.inner {
            p.begin_shrinking(tx_id);
        }
    }

    pub fn commit_transaction(&self, tx_id: u64) -> DbResult<()> {
        match &self.inner {
            Inner::Tpl(p) => {
                p.release_all(tx_id, TransactionStatus::Committed);
                Ok(())
            }
            Inner::To(p) => {
                p.end(tx_id, TransactionStatus::Committed);
                Ok(())
            }
            Inner::Occ(p) => p
                .validate_and_commit(tx_id)
                .map_err(DbError::ConflictAborted),
        }
    }

    pub fn abort_transaction(&self, tx_id: u64) {
        match &self.inner {
            Inner::Tpl(p) => p.release_all(tx_id, TransactionStatus::Aborted),
            Inner::To(p) => p.end(tx_id, TransactionStatus::Aborted),
            Inner::Occ(p) => p.abort(tx_id),
        }
    }

    pub fn get_transaction_status(&self, tx_id: u64) -> Option<TransactionStatus> {
        match &self.inner {
            Inner::Tpl(p) => p.status(tx_id),
            Inner::To(p) => p.status(tx_id),
            Inner::Occ(p) => p.status(tx_id),
        }
    }

    pub fn is_transaction_active(&self, tx_id: u64) -> bool {
        match &self.inner {
            Inner::Tpl(p) => p.is_active(tx_id),
            Inner::To(p) => p.is_active(tx_id),
            Inner::Occ(p) => p.is_active(tx_id),
        }
    }
}
