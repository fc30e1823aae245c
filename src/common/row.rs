use crate::common::Value;
use std::collections::HashMap;
use std::fmt;

/// Opaque, stable row identifier. The storage engine mints these from a
/// row's `(block_id, slot_id)` location; callers must not parse the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub String);

impl RowId {
    pub fn from_location(block_id: u64, slot_id: u16) -> Self {
        RowId(format!("{block_id}:{slot_id}"))
    }

    pub fn location(&self) -> Option<(u64, u16)> {
        let (b, s) = self.0.split_once(':')?;
        Some((b.parse().ok()?, s.parse().ok()?))
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tagged mapping from column name to value, tied to one table's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub columns: HashMap<String, Value>,
}

impl Row {
    pub fn new(id: RowId, columns: HashMap<String, Value>) -> Self {
        Row { id, columns }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }
}
