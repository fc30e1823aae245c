//! Tuning knobs for mdbms.
//! Caution: if you change the page size or header layout below, delete
//! old database files before starting the server, or recovery will fail.

pub const NAME: &str = "mdbms";
pub const VERSION: &str = "0.1.0";

pub const PORT: u16 = 5761;

pub const LOG_LEVEL: &str = "debug";
pub const LOG_PATH: &str = "./logs/server.log";

pub const DB_DIR: &str = "./data";
pub const LOG_DIR: &str = "./logs";
pub const WAL_FILE_NAME: &str = "mDBMS.log";

pub const MAX_COL_NAME_SIZE: usize = 64;
pub const MAX_TABLE_NAME_SIZE: usize = 64;

/// Page size in bytes. Every table block and the table header occupy exactly one page.
pub const PAGE_SIZE_BYTES: usize = 4096;

/// Default number of frames held by the process-wide buffer pool.
pub const BUFFER_POOL_CAPACITY: usize = 100;

/// Log buffer entry count at which data/Begin entries are flushed to disk.
pub const WAL_FLUSH_THRESHOLD: usize = 100;

/// Number of Commits between automatic checkpoints.
pub const CHECKPOINT_EVERY_N_COMMITS: u64 = 10;

/// 2PL lock wait timeout; a request that is still `Waiting` after this long
/// is treated as a cooperative back-off point by the caller, not a deadlock.
pub const LOCK_WAIT_TIMEOUT_MS: u64 = 5000;

/// Plan cache capacity (number of distinct canonical query signatures) and TTL.
pub const PLAN_CACHE_CAPACITY: usize = 256;
pub const PLAN_CACHE_TTL_MS: u64 = 60_000;

/// OCC committed-transaction history is trimmed to the most recent N entries.
pub const OCC_COMMITTED_HISTORY_CAP: usize = 100;

/// Per-connection receive timeout for the read phase of a request, per the
/// wire protocol's implicit cancellation deadline.
pub const CONNECTION_READ_TIMEOUT_MS: u64 = 1000;

/// Cost model constants (I/O + CPU; tuning knobs, not measured hardware costs).
pub const COST_IO_PER_BLOCK: f64 = 1.0;
pub const COST_CPU_PER_ROW: f64 = 0.01;
pub const COST_INDEX_BASE: f64 = 0.05;
pub const COST_HASH_BUILD_PER_ROW: f64 = 0.02;

/// Selectivity heuristics (fraction of rows a predicate class is assumed to pass).
pub const SELECTIVITY_RANGE: f64 = 0.3;
pub const SELECTIVITY_PATTERN: f64 = 0.1;
