pub mod image;
pub mod log_entry;
pub mod manager;
pub mod wal;

pub use log_entry::{LogEntry, LogKind};
pub use manager::FailureRecoveryManager;
pub use wal::Wal;
