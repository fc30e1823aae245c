pub mod condition;
pub mod engine;
pub mod hash_index;
pub mod registry;
pub mod stats;
pub mod table_file;

pub use condition::{Comparison, CompareOp, Condition, Operand};
pub use engine::{write_disk, DataWrite, Deletion, Retrieval, StorageEngine};
pub use hash_index::HashIndex;
pub use registry::discover_tables;
pub use stats::TableStats;
