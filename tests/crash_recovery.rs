mod common;

use common::{boot, ok};
use mdbms::buffer::BufferPool;
use mdbms::common::Value;
use mdbms::concurrency::ProtocolKind;
use mdbms::config::BUFFER_POOL_CAPACITY;
use mdbms::recovery::FailureRecoveryManager;
use mdbms::storage::{write_disk, Condition, Retrieval, StorageEngine};

/// Simulates a crash: a committed insert's write must be retained, and an
/// insert left active (begun but never committed) when the process
/// "crashes" must be undone. A fresh `BufferPool`, standing in for the one
/// a restarted process would open, is handed to `recover` and then read
/// from directly — mirroring how a real restart never reuses the dead
/// process's in-memory buffer cache.
#[test]
fn crash_recovery_undoes_uncommitted_writes() {
    let (processor, _dir) = boot(ProtocolKind::TwoPhaseLocking);
    ok(&processor, "CREATE TABLE accounts (id INT, balance FLOAT)", -1);
    ok(&processor, "INSERT INTO accounts (id, balance) VALUES (1, 100.0)", -1);

    let crashed_tx = ok(&processor, "BEGIN", -1).tx_id;
    ok(&processor, "INSERT INTO accounts (id, balance) VALUES (2, 200.0)", crashed_tx);
    // No COMMIT: the process is considered to have crashed here. Flush
    // whatever made it into the buffer pool to disk, since a real crash
    // could have already done so via background eviction before dying.
    for ((table, block_id), page) in processor.pool().flush_dirties() {
        write_disk(&table, block_id, &page).unwrap();
    }

    let fresh_pool = BufferPool::new(BUFFER_POOL_CAPACITY);
    FailureRecoveryManager::global().recover(&fresh_pool).unwrap();

    let rows = StorageEngine::global()
        .read_block(Retrieval { table: "accounts".to_string(), columns: None, condition: Condition::all() }, &fresh_pool)
        .unwrap();
    let balances: Vec<Option<&Value>> = rows.iter().map(|r| r.get("balance")).collect();
    assert!(balances.contains(&Some(&Value::Float32(100.0))), "the committed row must survive recovery");
    assert!(!balances.contains(&Some(&Value::Float32(200.0))), "the never-committed row must be undone");
}
