use crate::config::{
    COST_CPU_PER_ROW, COST_HASH_BUILD_PER_ROW, COST_INDEX_BASE, COST_IO_PER_BLOCK, SELECTIVITY_PATTERN,
    SELECTIVITY_RANGE,
};
use crate::storage::condition::{CompareOp, Comparison};
use crate::storage::TableStats;

pub fn table_scan_cost(stats: &TableStats) -> f64 {
    stats.block_count as f64 * COST_IO_PER_BLOCK + stats.tuple_count as f64 * COST_CPU_PER_ROW
}

pub fn index_seek_cost() -> f64 {
    COST_INDEX_BASE
}

pub fn index_scan_cost(stats: &TableStats, selectivity: f64) -> f64 {
    COST_INDEX_BASE + stats.tuple_count as f64 * selectivity * COST_CPU_PER_ROW
}

pub fn sort_cost(rows: f64) -> f64 {
    if rows <= 1.0 {
        0.0
    } else {
        rows * rows.log2().max(1.0) * COST_CPU_PER_ROW
    }
}

pub fn nested_loop_join_cost(left_rows: f64, right_rows: f64) -> f64 {
    left_rows * right_rows * COST_CPU_PER_ROW
}

pub fn hash_join_cost(left_rows: f64, right_rows: f64) -> f64 {
    left_rows * COST_HASH_BUILD_PER_ROW + right_rows * COST_CPU_PER_ROW
}

/// Merge join assumes unsorted inputs and pays to sort both sides first,
/// then a single linear merge pass.
pub fn merge_join_cost(left_rows: f64, right_rows: f64) -> f64 {
    sort_cost(left_rows) + sort_cost(right_rows) + (left_rows + right_rows) * COST_CPU_PER_ROW
}

pub fn aggregate_cost(rows: f64) -> f64 {
    rows * COST_CPU_PER_ROW
}

/// Heuristic selectivity for one comparison, used to estimate a filter's
/// output cardinality when no column statistics narrow it further.
pub fn comparison_selectivity(cmp: &Comparison, stats: &TableStats) -> f64 {
    match cmp.op {
        CompareOp::Eq => {
            if let crate::storage::condition::Operand::Column(col) = &cmp.left {
                stats.equality_selectivity(col)
            } else {
                SELECTIVITY_PATTERN
            }
        }
        CompareOp::Ne => 1.0 - SELECTIVITY_PATTERN,
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => SELECTIVITY_RANGE,
    }
}
