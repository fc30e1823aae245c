use std::collections::HashMap;

/// Cardinality and layout statistics for one table, recomputed by a full
/// scan whenever the optimizer needs fresh numbers (no background
/// maintenance — this is a small single-node server, not a warehouse).
#[derive(Debug, Clone, Default)]
pub struct TableStats {
    pub tuple_count: u64,
    pub block_count: u64,
    pub tuple_size: usize,
    pub blocking_factor: usize,
    pub distinct_values: HashMap<String, usize>,
}

impl TableStats {
    pub fn new(tuple_size: usize, blocking_factor: usize) -> Self {
        TableStats {
            tuple_count: 0,
            block_count: 0,
            tuple_size,
            blocking_factor,
            distinct_values: HashMap::new(),
        }
    }

    /// Fraction of rows a single-column equality predicate is expected to
    /// pass, defaulting to a full table scan's worth if no stats are known.
    pub fn equality_selectivity(&self, column: &str) -> f64 {
        match self.distinct_values.get(column) {
            Some(&d) if d > 0 => 1.0 / d as f64,
            _ => 1.0,
        }
    }
}
