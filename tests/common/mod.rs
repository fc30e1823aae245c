use mdbms::concurrency::ProtocolKind;
use mdbms::processor::QueryProcessor;
use std::sync::Arc;
use tempfile::TempDir;

/// Boots a fresh database in a throwaway directory and returns the
/// `QueryProcessor` handle plus the `TempDir` guard (keep it alive for the
/// duration of the test, or the directory is deleted out from under the
/// running process). Each test binary is its own process, so the
/// process-wide singletons (`Catalog`, `StorageEngine`, `ConcurrencyManager`,
/// `QueryProcessor`) are safe to initialize once per file.
pub fn boot(protocol: ProtocolKind) -> (Arc<QueryProcessor>, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    std::env::set_current_dir(dir.path()).expect("chdir into tempdir");
    mdbms::init_database(protocol).expect("database init");
    (QueryProcessor::global(), dir)
}

pub fn ok(processor: &QueryProcessor, sql: &str, tx_id: i64) -> mdbms::processor::ExecutionOutcome {
    processor.execute(sql, tx_id).unwrap_or_else(|e| panic!("query failed: {sql}: {e}"))
}
