use crate::common::RowId;
use std::collections::HashMap;

/// A process-memory secondary index over one column of one table, built by
/// a full scan and rebuilt whenever the indexed column is touched by a
/// write. Keys are the `Display` text of the indexed `Value` rather than
/// the value itself, since `Value::Float32` is not `Eq`/`Hash`.
#[derive(Debug, Default)]
pub struct HashIndex {
    pub column: String,
    map: HashMap<String, Vec<RowId>>,
}

impl HashIndex {
    pub fn new(column: &str) -> Self {
        HashIndex { column: column.to_string(), map: HashMap::new() }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn insert(&mut self, key: &str, row: RowId) {
        self.map.entry(key.to_string()).or_default().push(row);
    }

    pub fn remove(&mut self, key: &str, row: &RowId) {
        if let Some(rows) = self.map.get_mut(key) {
            rows.retain(|r| r != row);
            if rows.is_empty() {
                self.map.remove(key);
            }
        }
    }

    pub fn lookup(&self, key: &str) -> &[RowId] {
        self.map.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.map.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut idx = HashIndex::new("id");
        idx.insert("1", RowId::from_location(0, 0));
        idx.insert("1", RowId::from_location(0, 1));
        assert_eq!(idx.lookup("1").len(), 2);
        assert!(idx.lookup("2").is_empty());
    }

    #[test]
    fn remove_drops_empty_bucket() {
        let mut idx = HashIndex::new("id");
        let row = RowId::from_location(0, 0);
        idx.insert("1", row.clone());
        idx.remove("1", &row);
        assert!(idx.lookup("1").is_empty());
        assert!(idx.is_empty());
    }
}
