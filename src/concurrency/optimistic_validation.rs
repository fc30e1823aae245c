use super::types::{Action, TransactionStatus, ValidationResponse};
use crate::common::ObjectKey;
use crate::config::OCC_COMMITTED_HISTORY_CAP;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Validating,
    Writing,
}

struct TxWorkspace {
    phase: Phase,
    start_ts: u64,
    read_set: HashSet<ObjectKey>,
    write_set: HashSet<ObjectKey>,
}

struct CommittedEntry {
    finish_ts: u64,
    write_set: HashSet<ObjectKey>,
}

/// Optimistic concurrency control: transactions read and buffer writes
/// freely during the `Reading` phase, then backward-validate at commit time
/// against every transaction that finished after this one started. No
/// locking occurs until validation succeeds, at which point the (already
/// buffered) writes are applied during `Writing`.
pub struct OptimisticValidation {
    clock: AtomicU64,
    workspaces: Mutex<HashMap<u64, TxWorkspace>>,
    status: Mutex<HashMap<u64, TransactionStatus>>,
    committed_history: Mutex<Vec<CommittedEntry>>,
}

impl OptimisticValidation {
    pub fn new() -> Self {
        OptimisticValidation {
            clock: AtomicU64::new(1),
            workspaces: Mutex::new(HashMap::new()),
            status: Mutex::new(HashMap::new()),
            committed_history: Mutex::new(Vec::new()),
        }
    }

    pub fn begin(&self, tx_id: u64) {
        let start_ts = self.clock.fetch_add(1, Ordering::SeqCst);
        self.workspaces.lock().unwrap().insert(tx_id, TxWorkspace {
            phase: Phase::Reading,
            start_ts,
            read_set: HashSet::new(),
            write_set: HashSet::new(),
        });
        self.status.lock().unwrap().insert(tx_id, TransactionStatus::Active);
    }

    pub fn status(&self, tx_id: u64) -> Option<TransactionStatus> {
        self.status.lock().unwrap().get(&tx_id).copied()
    }

    pub fn is_active(&self, tx_id: u64) -> bool {
        self.status(tx_id) == Some(TransactionStatus::Active)
    }

    /// Records the access in the transaction's local read/write set. OCC
    /// never blocks here; all conflict detection happens at commit time.
    pub fn record_access(&self, tx_id: u64, object: ObjectKey, action: Action) -> ValidationResponse {
        let mut workspaces = self.workspaces.lock().unwrap();
        let ws = match workspaces.get_mut(&tx_id) {
            Some(ws) => ws,
            None => return ValidationResponse::Denied(format!("transaction {tx_id} has no workspace")),
        };
        match action {
            Action::Read => { ws.read_set.insert(object); }
            Action::Write => { ws.write_set.insert(object); }
        }
        ValidationResponse::Granted { effective: true }
    }

    /// Backward validation: this transaction's read set must be disjoint
    /// from the write set of every transaction that committed after it
    /// started. On success, its write set is appended to committed history.
    pub fn validate_and_commit(&self, tx_id: u64) -> Result<(), String> {
        let mut workspaces = self.workspaces.lock().unwrap();
        let ws = workspaces.get_mut(&tx_id).ok_or_else(|| format!("transaction {tx_id} has no workspace"))?;
        ws.phase = Phase::Validating;

        let history = self.committed_history.lock().unwrap();
        for committed in history.iter() {
            if committed.finish_ts <= ws.start_ts {
                continue;
            }
            if !ws.read_set.is_disjoint(&committed.write_set) {
                return Err(format!(
                    "transaction {tx_id} read an object written by a transaction that committed concurrently"
                ));
            }
        }
        drop(history);

        ws.phase = Phase::Writing;
        let finish_ts = self.clock.fetch_add(1, Ordering::SeqCst);
        let write_set = ws.write_set.clone();
        drop(workspaces);

        let mut history = self.committed_history.lock().unwrap();
        history.push(CommittedEntry { finish_ts, write_set });
        if history.len() > OCC_COMMITTED_HISTORY_CAP {
            let overflow = history.len() - OCC_COMMITTED_HISTORY_CAP;
            history.drain(0..overflow);
        }
        drop(history);

        self.status.lock().unwrap().insert(tx_id, TransactionStatus::Committed);
        Ok(())
    }

    pub fn abort(&self, tx_id: u64) {
        self.workspaces.lock().unwrap().remove(&tx_id);
        self.status.lock().unwrap().insert(tx_id, TransactionStatus::Aborted);
    }
}

impl Default for OptimisticValidation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RowId;

    fn row(slot: u16) -> ObjectKey {
        ObjectKey::row("t", &RowId::from_location(1, slot))
    }

    #[test]
    fn disjoint_read_write_sets_both_commit() {
        let occ = OptimisticValidation::new();
        occ.begin(1);
        occ.begin(2);
        occ.record_access(1, row(0), Action::Write);
        occ.record_access(2, row(1), Action::Write);
        assert!(occ.validate_and_commit(1).is_ok());
        assert!(occ.validate_and_commit(2).is_ok());
    }

    #[test]
    fn overlapping_read_after_concurrent_write_aborts() {
        let occ = OptimisticValidation::new();
        occ.begin(1);
        occ.begin(2);
        occ.record_access(1, row(0), Action::Read);
        occ.record_access(2, row(0), Action::Write);
        assert!(occ.validate_and_commit(2).is_ok());
        assert!(occ.validate_and_commit(1).is_err());
    }
}
