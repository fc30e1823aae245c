mod common;

use common::{boot, ok};
use mdbms::common::DbError;
use mdbms::concurrency::ProtocolKind;

/// Under OCC, a transaction that read a row another transaction wrote and
/// committed in the meantime fails backward validation at commit time with
/// `ConflictAborted`, even though every individual statement it ran along
/// the way appeared to succeed.
#[test]
fn stale_read_aborts_at_commit() {
    let (processor, _dir) = boot(ProtocolKind::OptimisticValidation);
    ok(&processor, "CREATE TABLE accounts (id INT, balance FLOAT)", -1);
    ok(&processor, "INSERT INTO accounts (id, balance) VALUES (1, 100.0)", -1);

    let tx_a = ok(&processor, "BEGIN", -1).tx_id;
    let read = ok(&processor, "SELECT * FROM accounts WHERE id = 1", tx_a);
    assert_eq!(read.rows.len(), 1);

    // b reads and writes the same row, then commits first.
    let tx_b = ok(&processor, "BEGIN", -1).tx_id;
    ok(&processor, "UPDATE accounts SET balance = 50.0 WHERE id = 1", tx_b);
    let commit_b = ok(&processor, "COMMIT", tx_b);
    assert_eq!(commit_b.tx_id, -1);

    // a now tries to commit: its read set overlaps b's committed write set.
    let commit_a = processor.execute("COMMIT", tx_a);
    match commit_a {
        Err(DbError::ConflictAborted(_)) => {}
        other => panic!("expected a's commit to be rejected by backward validation, got {other:?}"),
    }

    let rows = ok(&processor, "SELECT * FROM accounts", -1);
    assert_eq!(rows.rows[0].get("balance"), Some(&mdbms::common::Value::Float32(50.0)));
}
