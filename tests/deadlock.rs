mod common;

use common::{boot, ok};
use mdbms::common::DbError;
use mdbms::concurrency::ProtocolKind;

/// A classic two-transaction, two-row deadlock under 2PL: each transaction
/// holds the row the other wants. The second conflicting request detects
/// the wait-for cycle and is itself told to abort (the default
/// requester-as-victim policy), while the other side is left free to
/// proceed and commit — exactly one of the two commits.
#[test]
fn cycle_aborts_exactly_one_side() {
    let (processor, _dir) = boot(ProtocolKind::TwoPhaseLocking);
    ok(&processor, "CREATE TABLE accounts (id INT, balance FLOAT)", -1);
    ok(&processor, "INSERT INTO accounts (id, balance) VALUES (1, 100.0)", -1);
    ok(&processor, "INSERT INTO accounts (id, balance) VALUES (2, 200.0)", -1);

    let tx_a = ok(&processor, "BEGIN", -1).tx_id;
    let tx_b = ok(&processor, "BEGIN", -1).tx_id;

    ok(&processor, "UPDATE accounts SET balance = 1.0 WHERE id = 1", tx_a);
    ok(&processor, "UPDATE accounts SET balance = 2.0 WHERE id = 2", tx_b);

    // b wants a's row first: no cycle yet, just made to wait.
    let b_waits = processor.execute("UPDATE accounts SET balance = 3.0 WHERE id = 1", tx_b);
    assert!(b_waits.is_err());

    // a now wants b's row: completes the wait-for cycle. Under the default
    // requester-as-victim policy, a (the requester completing the cycle)
    // is the one forced to abort.
    let a_deadlocked = processor.execute("UPDATE accounts SET balance = 4.0 WHERE id = 2", tx_a);
    match a_deadlocked {
        Err(DbError::ConflictAborted(_)) => {}
        other => panic!("expected transaction a to be the deadlock victim, got {other:?}"),
    }

    // a's locks are now released; b's earlier wait can succeed on retry.
    let b_retry = ok(&processor, "UPDATE accounts SET balance = 3.0 WHERE id = 1", tx_b);
    assert_eq!(b_retry.affected, 1);
    let commit_b = ok(&processor, "COMMIT", tx_b);
    assert_eq!(commit_b.tx_id, -1);

    // a was already aborted by the deadlock; it cannot commit.
    let commit_a = processor.execute("COMMIT", tx_a);
    assert!(commit_a.is_err(), "the deadlock victim should no longer be an active transaction");

    let rows = ok(&processor, "SELECT * FROM accounts WHERE id = 1", -1);
    assert_eq!(rows.rows[0].get("balance"), Some(&mdbms::common::Value::Float32(3.0)));
    let untouched = ok(&processor, "SELECT * FROM accounts WHERE id = 2", -1);
    assert_eq!(untouched.rows[0].get("balance"), Some(&mdbms::common::Value::Float32(200.0)));
}
