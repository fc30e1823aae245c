mod common;

use common::boot;
use mdbms::buffer::BufferPool;
use mdbms::common::Value;
use mdbms::concurrency::ProtocolKind;
use mdbms::storage::{Condition, DataWrite, Retrieval, StorageEngine};
use std::collections::HashMap;

/// A buffer pool far smaller than the table's block count still produces
/// correct reads: frames get evicted and reloaded from disk on demand, and
/// nothing written is lost even though it's never all resident at once.
#[test]
fn eviction_does_not_lose_writes() {
    // Only need the tempdir/chdir and table registry boot() sets up; the
    // tiny pool below, not the processor's own 100-frame pool, is what's
    // under test here.
    let (_processor, _dir) = boot(ProtocolKind::TwoPhaseLocking);
    let engine = StorageEngine::global();
    let small_pool = BufferPool::new(2);

    engine
        .create_table(
            mdbms::catalog::schema::TableSchema::new(
                "samples",
                vec![
                    mdbms::catalog::schema::ColumnDef {
                        name: "id".to_string(),
                        ty: mdbms::catalog::schema::ColumnType::Int32,
                        indexed: false,
                    },
                    mdbms::catalog::schema::ColumnDef {
                        name: "name".to_string(),
                        ty: mdbms::catalog::schema::ColumnType::Str(64),
                        indexed: false,
                    },
                ],
            )
            .unwrap(),
        )
        .unwrap();

    // A 64-byte string column keeps rows-per-block small, so inserting a
    // few dozen rows spans well more than the pool's 2 resident frames.
    for i in 0..60 {
        let mut values = HashMap::new();
        values.insert("id".to_string(), Value::Int32(i));
        values.insert("name".to_string(), Value::Str(format!("sample-{i}")));
        engine
            .add_block(DataWrite { table: "samples".to_string(), assignments: values, condition: Condition::all() }, &small_pool)
            .unwrap();
    }

    let rows = engine
        .read_block(Retrieval { table: "samples".to_string(), columns: None, condition: Condition::all() }, &small_pool)
        .unwrap();
    assert_eq!(rows.len(), 60);
    let ids: Vec<i32> = rows
        .iter()
        .map(|r| match r.get("id") {
            Some(Value::Int32(n)) => *n,
            other => panic!("expected Int32 id, got {other:?}"),
        })
        .collect();
    for expected in 0..60 {
        assert!(ids.contains(&expected), "missing row {expected} after eviction churn");
    }
}
