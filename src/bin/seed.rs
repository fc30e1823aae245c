//! Minimal sample-data seeder. Talks to the storage/processor layer
//! in-process rather than over the wire, since it runs before any server is
//! listening.

use mdbms::concurrency::ProtocolKind;
use mdbms::processor::QueryProcessor;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE students (id INT, name VARCHAR(32), gpa FLOAT)",
    "INSERT INTO students (id, name, gpa) VALUES (1, 'Ada', 4.0)",
    "INSERT INTO students (id, name, gpa) VALUES (2, 'Grace', 3.9)",
    "INSERT INTO students (id, name, gpa) VALUES (3, 'Alan', 3.7)",
];

fn main() {
    mdbms::init_log();
    if let Err(e) = mdbms::init_database(ProtocolKind::TwoPhaseLocking) {
        eprintln!("mdbms-seed: failed to initialize database: {e}");
        std::process::exit(1);
    }

    let processor = QueryProcessor::global();
    for sql in STATEMENTS {
        match processor.execute(sql, -1) {
            Ok(outcome) => println!("OK: {sql} ({} affected)", outcome.affected),
            Err(e) => eprintln!("FAILED: {sql}: {e}"),
        }
    }
}
