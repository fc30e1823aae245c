pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod config;
pub mod optimizer;
pub mod processor;
pub mod recovery;
pub mod server;
pub mod storage;
pub mod wire;

use std::fs;
use std::path;
use tracing::info;
use tracing_subscriber::prelude::*;

use crate::buffer::BufferPool;
use crate::common::DbResult;
use crate::concurrency::{ConcurrencyManager, ProtocolKind};
use crate::processor::QueryProcessor;
use crate::recovery::FailureRecoveryManager;

pub fn init_log() {
    let log_dir = path::Path::new(config::LOG_PATH).parent().unwrap();
    let log_filename = path::Path::new(config::LOG_PATH).file_name().unwrap().to_str().unwrap();
    fs::create_dir_all(log_dir).unwrap();

    let stdout_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_thread_names(true)
        .with_level(true);

    let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    Box::leak(Box::new(_guard));

    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_thread_names(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config::LOG_LEVEL))
        .with(stdout_log)
        .with(file_log)
        .init();
}

/// Runs WAL recovery against an ephemeral startup buffer pool, then hands
/// off the next free transaction id to the `QueryProcessor` it initializes.
/// `protocol` selects which of the three concurrency control protocols the
/// process runs under for its whole lifetime.
pub fn init_database(protocol: ProtocolKind) -> DbResult<()> {
    info!("initializing database");
    let tables = storage::discover_tables()?;
    info!(count = tables.len(), "loaded existing table schemas");
    let startup_pool = BufferPool::new(config::BUFFER_POOL_CAPACITY);
    let max_tx_id = FailureRecoveryManager::global().recover(&startup_pool)?;
    // Recovery's redo/undo passes wrote through `startup_pool`, which is
    // discarded once `QueryProcessor` opens its own long-lived pool; flush
    // what recovery left dirty so the fresh pool reads correct disk state.
    for ((table, block_id), page) in startup_pool.flush_dirties() {
        storage::write_disk(&table, block_id, &page)?;
    }
    ConcurrencyManager::init(protocol);
    QueryProcessor::init(max_tx_id + 1);
    info!("database initialized");
    Ok(())
}

pub fn run(host: &str, port: u16, protocol: ProtocolKind) {
    init_log();
    if let Err(e) = init_database(protocol) {
        panic!("database initialization failed: {e}");
    }
    if let Err(e) = server::serve(host, port) {
        panic!("server loop exited: {e}");
    }
}
