use crate::catalog::schema::{ColumnDef, TableSchema};
use crate::common::Value;
use crate::optimizer::query::AggregateExpr;
use crate::storage::condition::Condition;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAlgorithm {
    NestedLoop,
    Hash,
    Merge,
}

#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub right_table: String,
    pub left_column: String,
    pub right_column: String,
    pub algorithm: JoinAlgorithm,
}

/// A cost-annotated operator tree built bottom-up by the planner. Every
/// variant carries its own `node_cost` (this operator's contribution) so
/// `total_cost` can sum the tree without re-walking it, the same bottom-up
/// annotation style the teacher's `PlanNode` uses.
#[derive(Debug, Clone)]
pub enum PlanNode {
    TableScan { table: String, estimated_rows: f64, node_cost: f64 },
    IndexScan { table: String, column: String, estimated_rows: f64, node_cost: f64 },
    IndexSeek { table: String, column: String, value: Value, estimated_rows: f64, node_cost: f64 },
    Filter { input: Box<PlanNode>, condition: Condition, estimated_rows: f64, node_cost: f64 },
    Project { input: Box<PlanNode>, columns: Vec<String>, node_cost: f64 },
    Sort { input: Box<PlanNode>, column: String, ascending: bool, node_cost: f64 },
    Aggregate { input: Box<PlanNode>, group_by: Vec<String>, aggregates: Vec<AggregateExpr>, estimated_rows: f64, node_cost: f64 },
    Join { left: Box<PlanNode>, right: Box<PlanNode>, spec: JoinSpec, estimated_rows: f64, node_cost: f64 },
    Insert { table: String, values: HashMap<String, Value>, node_cost: f64 },
    Update { input: Box<PlanNode>, table: String, assignments: HashMap<String, Value>, node_cost: f64 },
    Delete { input: Box<PlanNode>, table: String, node_cost: f64 },
    CreateTable { schema: TableSchema, node_cost: f64 },
    Begin,
    Commit,
    Rollback,
}

impl PlanNode {
    pub fn node_cost(&self) -> f64 {
        match self {
            PlanNode::TableScan { node_cost, .. }
            | PlanNode::IndexScan { node_cost, .. }
            | PlanNode::IndexSeek { node_cost, .. }
            | PlanNode::Filter { node_cost, .. }
            | PlanNode::Project { node_cost, .. }
            | PlanNode::Sort { node_cost, .. }
            | PlanNode::Aggregate { node_cost, .. }
            | PlanNode::Join { node_cost, .. }
            | PlanNode::Insert { node_cost, .. }
            | PlanNode::Update { node_cost, .. }
            | PlanNode::Delete { node_cost, .. }
            | PlanNode::CreateTable { node_cost, .. } => *node_cost,
            PlanNode::Begin | PlanNode::Commit | PlanNode::Rollback => 0.0,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.node_cost() + self.children().iter().map(|c| c.total_cost()).sum::<f64>()
    }

    pub fn estimated_rows(&self) -> f64 {
        match self {
            PlanNode::TableScan { estimated_rows, .. }
            | PlanNode::IndexScan { estimated_rows, .. }
            | PlanNode::IndexSeek { estimated_rows, .. }
            | PlanNode::Filter { estimated_rows, .. }
            | PlanNode::Aggregate { estimated_rows, .. }
            | PlanNode::Join { estimated_rows, .. } => *estimated_rows,
            PlanNode::Project { input, .. } | PlanNode::Sort { input, .. } => input.estimated_rows(),
            _ => 0.0,
        }
    }

    fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Filter { input, .. } | PlanNode::Project { input, .. } | PlanNode::Sort { input, .. } | PlanNode::Aggregate { input, .. } => {
                vec![input.as_ref()]
            }
            PlanNode::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            PlanNode::Update { input, .. } | PlanNode::Delete { input, .. } => vec![input.as_ref()],
            _ => vec![],
        }
    }

    pub fn columns_for_create(&self) -> Option<&[ColumnDef]> {
        match self {
            PlanNode::CreateTable { schema, .. } => Some(&schema.columns),
            _ => None,
        }
    }
}
