mod common;

use common::{boot, ok};
use mdbms::common::DbError;
use mdbms::concurrency::ProtocolKind;

/// Under Timestamp Ordering, a transaction that tries to read an object
/// already overwritten by a transaction with a younger timestamp is reading
/// an obsolete value and must abort immediately, rather than being allowed
/// to proceed on stale data.
#[test]
fn read_after_younger_write_aborts_immediately() {
    let (processor, _dir) = boot(ProtocolKind::TimestampOrdering);
    ok(&processor, "CREATE TABLE accounts (id INT, balance FLOAT)", -1);
    ok(&processor, "INSERT INTO accounts (id, balance) VALUES (1, 100.0)", -1);

    // tx_old gets the lower timestamp by beginning first.
    let tx_old = ok(&processor, "BEGIN", -1).tx_id;
    let tx_young = ok(&processor, "BEGIN", -1).tx_id;

    ok(&processor, "UPDATE accounts SET balance = 50.0 WHERE id = 1", tx_young);
    ok(&processor, "COMMIT", tx_young);

    let read = processor.execute("SELECT * FROM accounts WHERE id = 1", tx_old);
    match read {
        Err(DbError::ConflictAborted(_)) => {}
        other => panic!("expected the older reader to abort on an obsolete read, got {other:?}"),
    }

    // tx_old was forced to abort; it can no longer commit.
    let commit_old = processor.execute("COMMIT", tx_old);
    assert!(commit_old.is_err());

    let rows = ok(&processor, "SELECT * FROM accounts", -1);
    assert_eq!(rows.rows[0].get("balance"), Some(&mdbms::common::Value::Float32(50.0)));
}
