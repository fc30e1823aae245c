mod common;

use common::{boot, ok};
use mdbms::concurrency::ProtocolKind;

/// Under 2PL, a transaction that tries to write a row already exclusively
/// locked by another active transaction is told to retry (`Waiting`,
/// surfaced to the caller as a `ProtocolError`) rather than being denied
/// outright. Once the lock holder commits, the same statement succeeds.
#[test]
fn blocked_writer_proceeds_after_holder_commits() {
    let (processor, _dir) = boot(ProtocolKind::TwoPhaseLocking);
    ok(&processor, "CREATE TABLE accounts (id INT, balance FLOAT)", -1);
    ok(&processor, "INSERT INTO accounts (id, balance) VALUES (1, 100.0)", -1);

    let tx_a = ok(&processor, "BEGIN", -1).tx_id;
    ok(&processor, "UPDATE accounts SET balance = 90.0 WHERE id = 1", tx_a);

    let tx_b = ok(&processor, "BEGIN", -1).tx_id;
    let blocked = processor.execute("UPDATE accounts SET balance = 50.0 WHERE id = 1", tx_b);
    assert!(blocked.is_err(), "expected the second writer to be told to wait");
    let message = blocked.unwrap_err().to_string();
    assert!(message.contains("retry") || message.contains("waiting"), "unexpected message: {message}");

    ok(&processor, "COMMIT", tx_a);

    // Same transaction, same statement, now succeeds since the lock freed.
    let retried = ok(&processor, "UPDATE accounts SET balance = 50.0 WHERE id = 1", tx_b);
    assert_eq!(retried.affected, 1);
    ok(&processor, "COMMIT", tx_b);

    let rows = ok(&processor, "SELECT * FROM accounts", -1);
    assert_eq!(rows.rows.len(), 1);
    assert_eq!(rows.rows[0].get("balance"), Some(&mdbms::common::Value::Float32(50.0)));
}
