use crate::common::RowId;
use std::fmt;

/// A qualified database object key: `table`, `table.block`, or `table.block.row`.
/// This system uses row granularity everywhere a lock or timestamp table
/// is keyed, but the table/block forms exist for audit logging and for the
/// Storage Engine's block-level write_disk bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    Table(String),
    Block(String, u64),
    Row(String, RowId),
}

impl ObjectKey {
    pub fn table_name(&self) -> &str {
        match self {
            ObjectKey::Table(t) => t,
            ObjectKey::Block(t, _) => t,
            ObjectKey::Row(t, _) => t,
        }
    }

    pub fn row(table: &str, id: &RowId) -> Self {
        ObjectKey::Row(table.to_string(), id.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKey::Table(t) => write!(f, "{t}"),
            ObjectKey::Block(t, b) => write!(f, "{t}.{b}"),
            ObjectKey::Row(t, r) => write!(f, "{t}.{r}"),
        }
    }
}
