pub mod manager;
pub mod optimistic_validation;
pub mod timestamp_ordering;
pub mod two_phase_locking;
pub mod types;

pub use manager::{ConcurrencyManager, ProtocolKind};
pub use types::{Action, DeadlockVictimPolicy, TransactionStatus, ValidationResponse};
