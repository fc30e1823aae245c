use super::types::{Action, DeadlockVictimPolicy, TransactionStatus, ValidationResponse};
use crate::common::ObjectKey;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

struct LockEntry {
    mode: LockMode,
    holders: HashSet<u64>,
}

/// Strict two-phase locking with row-granularity locks and true deadlock
/// detection via a wait-for graph, generalized from the teacher's
/// table-level `TnxManager` (which only offered timeout-based blocking).
/// Every transaction is either growing (may still acquire locks) or
/// shrinking (has released at least one lock and may only release more);
/// locks are all released together at commit/abort, giving strict 2PL.
pub struct TwoPhaseLocking {
    locks: Mutex<HashMap<ObjectKey, LockEntry>>,
    status: Mutex<HashMap<u64, TransactionStatus>>,
    /// waits_for[a] contains b if transaction a is blocked waiting on a lock
    /// held by transaction b.
    waits_for: Mutex<HashMap<u64, HashSet<u64>>>,
    held_by_tx: Mutex<HashMap<u64, HashSet<ObjectKey>>>,
    victim_policy: DeadlockVictimPolicy,
}

impl TwoPhaseLocking {
    pub fn new(victim_policy: DeadlockVictimPolicy) -> Self {
        TwoPhaseLocking {
            locks: Mutex::new(HashMap::new()),
            status: Mutex::new(HashMap::new()),
            waits_for: Mutex::new(HashMap::new()),
            held_by_tx: Mutex::new(HashMap::new()),
            victim_policy,
        }
    }

    pub fn begin(&self, tx_id: u64) {
        self.status.lock().unwrap().insert(tx_id, TransactionStatus::Growing);
        self.held_by_tx.lock().unwrap().entry(tx_id).or_default();
    }

    pub fn status(&self, tx_id: u64) -> Option<TransactionStatus> {
        self.status.lock().unwrap().get(&tx_id).copied()
    }

    pub fn is_active(&self, tx_id: u64) -> bool {
        matches!(
            self.status(tx_id),
            Some(TransactionStatus::Growing) | Some(TransactionStatus::Shrinking) | Some(TransactionStatus::Active)
        )
    }

    /// Attempts to acquire the lock implied by `action` on `object` for
    /// `tx_id`. Never blocks the caller: a conflict returns `Waiting` and
    /// the caller is expected to retry (e.g. after a short sleep or a
    /// condvar wake), matching the wire protocol's one-shot request model
    /// where the server cannot leave a client connection open indefinitely.
    pub fn acquire(&self, tx_id: u64, object: ObjectKey, action: Action) -> ValidationResponse {
        if self.status(tx_id) == Some(TransactionStatus::Shrinking) {
            return ValidationResponse::Denied(format!(
                "transaction {tx_id} is shrinking and cannot acquire new locks under strict 2PL"
            ));
        }
        let wanted = match action {
            Action::Read => LockMode::Shared,
            Action::Write => LockMode::Exclusive,
        };

        let mut locks = self.locks.lock().unwrap();
        let compatible = match locks.get(&object) {
            None => true,
            Some(entry) => {
                if entry.holders.contains(&tx_id) && entry.holders.len() == 1 {
                    true
                } else {
                    match (entry.mode, wanted) {
                        (LockMode::Shared, LockMode::Shared) => true,
                        _ => entry.holders.is_empty(),
                    }
                }
            }
        };

        if compatible {
            let entry = locks.entry(object.clone()).or_insert_with(|| LockEntry {
                mode: wanted,
                holders: HashSet::new(),
            });
            if entry.holders.is_empty() {
                entry.mode = wanted;
            } else if wanted == LockMode::Exclusive {
                entry.mode = LockMode::Exclusive;
            }
            entry.holders.insert(tx_id);
            drop(locks);
            self.held_by_tx.lock().unwrap().entry(tx_id).or_default().insert(object);
            self.waits_for.lock().unwrap().remove(&tx_id);
            return ValidationResponse::Granted { effective: true };
        }

        let holders: HashSet<u64> = locks.get(&object).map(|e| e.holders.clone()).unwrap_or_default();
        drop(locks);

        let mut waits_for = self.waits_for.lock().unwrap();
        waits_for.insert(tx_id, holders.iter().filter(|&&h| h != tx_id).copied().collect());
        if let Some(cycle_holder) = self.detect_cycle(tx_id, &waits_for) {
            waits_for.remove(&tx_id);
            let victim = match self.victim_policy {
                DeadlockVictimPolicy::Requester => tx_id,
                DeadlockVictimPolicy::Holder => cycle_holder,
            };
            return ValidationResponse::Deadlock { victim };
        }
        ValidationResponse::Waiting
    }

    /// Depth-first search for a cycle reachable from `start` in the
    /// wait-for graph. Returns one transaction on the cycle (distinct from
    /// `start`) to serve as the holder-policy victim candidate.
    fn detect_cycle(&self, start: u64, waits_for: &HashMap<u64, HashSet<u64>>) -> Option<u64> {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        let mut path = Vec::new();
        while let Some(node) = stack.pop() {
            if node == start && !path.is_empty() {
                return path.last().copied();
            }
            if !visited.insert(node) {
                continue;
            }
            path.push(node);
            if let Some(neighbors) = waits_for.get(&node) {
                for &next in neighbors {
                    if next == start {
                        return Some(node);
                    }
                    stack.push(next);
                }
            }
        }
        None
    }

    /// Releases every lock held by `tx_id` and marks it terminal. Any
    /// transaction recorded as waiting on an object `tx_id` held should be
    /// retried by the caller on its next request (we do not notify blocked
    /// clients directly, since the wire protocol has no persistent
    /// connection to push a wakeup through).
    pub fn release_all(&self, tx_id: u64, final_status: TransactionStatus) {
        let held = self.held_by_tx.lock().unwrap().remove(&tx_id).unwrap_or_default();
        let mut locks = self.locks.lock().unwrap();
        for object in held {
            if let Some(entry) = locks.get_mut(&object) {
                entry.holders.remove(&tx_id);
                if entry.holders.is_empty() {
                    locks.remove(&object);
                }
            }
        }
        drop(locks);
        self.waits_for.lock().unwrap().remove(&tx_id);
        self.status.lock().unwrap().insert(tx_id, final_status);
    }

    pub fn begin_shrinking(&self, tx_id: u64) {
        let mut status = self.status.lock().unwrap();
        if status.get(&tx_id) == Some(&TransactionStatus::Growing) {
            status.insert(tx_id, TransactionStatus::Shrinking);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RowId;

    fn row(table: &str, block: u64, slot: u16) -> ObjectKey {
        ObjectKey::row(table, &RowId::from_location(block, slot))
    }

    #[test]
    fn shared_locks_are_compatible() {
        let tpl = TwoPhaseLocking::new(DeadlockVictimPolicy::Requester);
        tpl.begin(1);
        tpl.begin(2);
        let obj = row("t", 1, 0);
        assert_eq!(tpl.acquire(1, obj.clone(), Action::Read), ValidationResponse::Granted { effective: true });
        assert_eq!(tpl.acquire(2, obj, Action::Read), ValidationResponse::Granted { effective: true });
    }

    #[test]
    fn exclusive_blocks_other_writers() {
        let tpl = TwoPhaseLocking::new(DeadlockVictimPolicy::Requester);
        tpl.begin(1);
        tpl.begin(2);
        let obj = row("t", 1, 0);
        assert_eq!(tpl.acquire(1, obj.clone(), Action::Write), ValidationResponse::Granted { effective: true });
        assert_eq!(tpl.acquire(2, obj, Action::Write), ValidationResponse::Waiting);
    }

    #[test]
    fn cycle_reports_deadlock_with_requester_as_default_victim() {
        let tpl = TwoPhaseLocking::new(DeadlockVictimPolicy::Requester);
        tpl.begin(1);
        tpl.begin(2);
        let a = row("t", 1, 0);
        let b = row("t", 1, 1);
        assert_eq!(tpl.acquire(1, a.clone(), Action::Write), ValidationResponse::Granted { effective: true });
        assert_eq!(tpl.acquire(2, b.clone(), Action::Write), ValidationResponse::Granted { effective: true });
        assert_eq!(tpl.acquire(2, a, Action::Write), ValidationResponse::Waiting);
        let response = tpl.acquire(1, b, Action::Write);
        assert_eq!(response, ValidationResponse::Deadlock { victim: 1 });
    }

    #[test]
    fn cycle_reports_holder_as_victim_under_holder_policy() {
        let tpl = TwoPhaseLocking::new(DeadlockVictimPolicy::Holder);
        tpl.begin(1);
        tpl.begin(2);
        let a = row("t", 1, 0);
        let b = row("t", 1, 1);
        tpl.acquire(1, a.clone(), Action::Write);
        tpl.acquire(2, b.clone(), Action::Write);
        tpl.acquire(2, a, Action::Write);
        let response = tpl.acquire(1, b, Action::Write);
        assert_eq!(response, ValidationResponse::Deadlock { victim: 2 });
    }

    #[test]
    fn release_all_frees_locks_for_waiters() {
        let tpl = TwoPhaseLocking::new(DeadlockVictimPolicy::Requester);
        tpl.begin(1);
        tpl.begin(2);
        let obj = row("t", 1, 0);
        tpl.acquire(1, obj.clone(), Action::Write);
        assert_eq!(tpl.acquire(2, obj.clone(), Action::Write), ValidationResponse::Waiting);
        tpl.release_all(1, TransactionStatus::Committed);
        assert_eq!(tpl.acquire(2, obj, Action::Write), ValidationResponse::Granted { effective: true });
    }
}
