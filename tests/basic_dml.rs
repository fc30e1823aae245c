mod common;

use common::{boot, ok};
use mdbms::concurrency::ProtocolKind;

/// Simple insert/select/commit: a transaction inserts two rows and reads
/// them back before committing; a second, implicit-transaction query then
/// confirms the rows are visible after commit. Rollback is then checked on
/// a second table, and an implicit single-statement insert is checked on a
/// third, all against the one process-wide database this binary boots —
/// each test binary is its own process, so there's no cross-file state to
/// worry about, but every scenario in this file shares one `QueryProcessor`
/// and must therefore run in a single test function rather than risk
/// parallel `#[test]`s racing on the same tables.
#[test]
fn simple_transactions() {
    let (processor, _dir) = boot(ProtocolKind::TwoPhaseLocking);

    ok(&processor, "CREATE TABLE students (id INT, name VARCHAR(32), gpa FLOAT)", -1);

    let begin = ok(&processor, "BEGIN", -1);
    let tx = begin.tx_id;
    assert!(tx >= 0);

    ok(&processor, "INSERT INTO students (id, name, gpa) VALUES (1, 'Ada', 4.0)", tx);
    ok(&processor, "INSERT INTO students (id, name, gpa) VALUES (2, 'Grace', 3.9)", tx);

    let seen = ok(&processor, "SELECT * FROM students", tx);
    assert_eq!(seen.rows.len(), 2);

    let commit = ok(&processor, "COMMIT", tx);
    assert_eq!(commit.tx_id, -1);

    let after = ok(&processor, "SELECT * FROM students WHERE gpa > 3.8", -1);
    assert_eq!(after.rows.len(), 2);
    assert_eq!(after.tx_id, -1);

    // Implicit single-statement transaction: auto-begins and auto-commits.
    ok(&processor, "CREATE TABLE widgets (id INT, name VARCHAR(16))", -1);
    let outcome = ok(&processor, "INSERT INTO widgets (id, name) VALUES (1, 'a')", -1);
    assert_eq!(outcome.tx_id, -1);
    assert_eq!(outcome.affected, 1);
    let widget_rows = ok(&processor, "SELECT * FROM widgets", -1);
    assert_eq!(widget_rows.rows.len(), 1);

    // Rollback discards the write entirely.
    let begin2 = ok(&processor, "BEGIN", -1);
    let tx2 = begin2.tx_id;
    ok(&processor, "INSERT INTO widgets (id, name) VALUES (2, 'b')", tx2);
    let rollback = ok(&processor, "ROLLBACK", tx2);
    assert_eq!(rollback.tx_id, -1);
    let widget_rows_after = ok(&processor, "SELECT * FROM widgets", -1);
    assert_eq!(widget_rows_after.rows.len(), 1);
}
