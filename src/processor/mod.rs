use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::{DbError, DbResult, ObjectKey, Row, RowId, Value};
use crate::concurrency::{Action, ConcurrencyManager, ValidationResponse};
use crate::config::BUFFER_POOL_CAPACITY;
use crate::optimizer::plan::JoinSpec;
use crate::optimizer::query::{AggFunc, AggregateExpr};
use crate::optimizer::{build_plan, PlanCache, PlanNode, Query, QueryKind};
use crate::recovery::FailureRecoveryManager;
use crate::storage::{Condition, DataWrite, Retrieval, StorageEngine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// What executing one client statement produced. `tx_id` is `-1` when no
/// transaction remains open after the call (either there never was one, or
/// it was auto-committed/committed/rolled back by this call), matching the
/// wire protocol's "-1 means no active transaction" convention.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub tx_id: i64,
    pub rows: Vec<Row>,
    pub affected: usize,
    pub message: Option<String>,
}

/// Owns the single process-wide buffer pool and dispatches parsed
/// statements through planning, concurrency control, and storage. Exactly
/// one instance exists per server process; bound to a `'static` home via
/// `OnceLock` the same way `Catalog`/`StorageEngine` are.
pub struct QueryProcessor {
    pool: BufferPool,
    next_tx_id: AtomicU64,
}

static PROCESSOR: OnceLock<Arc<QueryProcessor>> = OnceLock::new();

impl QueryProcessor {
    pub fn init(starting_tx_id: u64) -> Arc<QueryProcessor> {
        PROCESSOR
            .get_or_init(|| {
                Arc::new(QueryProcessor {
                    pool: BufferPool::new(BUFFER_POOL_CAPACITY),
                    next_tx_id: AtomicU64::new(starting_tx_id),
                })
            })
            .clone()
    }

    pub fn global() -> Arc<QueryProcessor> {
        PROCESSOR.get().expect("QueryProcessor::init must run before global()").clone()
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    fn allocate_tx_id(&self) -> u64 {
        self.next_tx_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Parses and executes one statement. `tx_id` is `-1` for a
    /// connection with no open transaction, in which case a DML statement
    /// runs under an implicit single-statement transaction that commits
    /// (or aborts) before this call returns.
    pub fn execute(&self, sql: &str, tx_id: i64) -> DbResult<ExecutionOutcome> {
        let query = Query::parse(sql)?;

        match query.kind {
            QueryKind::Begin => {
                let id = self.allocate_tx_id();
                ConcurrencyManager::global().begin_transaction(id);
                FailureRecoveryManager::global().log_begin(id)?;
                Ok(ExecutionOutcome { tx_id: id as i64, rows: Vec::new(), affected: 0, message: Some("transaction started".to_string()) })
            }
            QueryKind::Commit => {
                let id = self.require_active(tx_id)?;
                ConcurrencyManager::global().begin_shrinking(id);
                match ConcurrencyManager::global().commit_transaction(id) {
                    Ok(()) => {
                        FailureRecoveryManager::global().log_commit(id, &self.pool)?;
                        Ok(ExecutionOutcome { tx_id: -1, rows: Vec::new(), affected: 0, message: Some("committed".to_string()) })
                    }
                    Err(e) => {
                        FailureRecoveryManager::global().undo_transaction(id, &self.pool)?;
                        FailureRecoveryManager::global().log_abort(id)?;
                        Err(e)
                    }
                }
            }
            QueryKind::Rollback => {
                let id = self.require_active(tx_id)?;
                FailureRecoveryManager::global().undo_transaction(id, &self.pool)?;
                ConcurrencyManager::global().abort_transaction(id);
                FailureRecoveryManager::global().log_abort(id)?;
                Ok(ExecutionOutcome { tx_id: -1, rows: Vec::new(), affected: 0, message: Some("rolled back".to_string()) })
            }
            _ => self.execute_dml(query, tx_id),
        }
    }

    fn execute_dml(&self, query: Query, tx_id: i64) -> DbResult<ExecutionOutcome> {
        let implicit = tx_id < 0;
        let id = if implicit {
            let auto = self.allocate_tx_id();
            ConcurrencyManager::global().begin_transaction(auto);
            FailureRecoveryManager::global().log_begin(auto)?;
            auto
        } else {
            self.require_active(tx_id)?
        };

        let signature = PlanCache::signature(&query);
        let plan = match PlanCache::global().get(&signature) {
            Some(p) => p,
            None => {
                let built = build_plan(&query, &self.pool)?;
                PlanCache::global().put(signature, built.clone());
                built
            }
        };

        let outcome = self.execute_plan(&plan, id, &self.pool);
        match outcome {
            Ok(mut result) => {
                if implicit {
                    ConcurrencyManager::global().begin_shrinking(id);
                    match ConcurrencyManager::global().commit_transaction(id) {
                        Ok(()) => {
                            FailureRecoveryManager::global().log_commit(id, &self.pool)?;
                            result.tx_id = -1;
                        }
                        Err(e) => {
                            FailureRecoveryManager::global().undo_transaction(id, &self.pool)?;
                            FailureRecoveryManager::global().log_abort(id)?;
                            return Err(e);
                        }
                    }
                } else {
                    result.tx_id = id as i64;
                }
                Ok(result)
            }
            Err(e) => Err(e),
        }
    }

    fn require_active(&self, tx_id: i64) -> DbResult<u64> {
        if tx_id < 0 {
            return Err(DbError::ProtocolError("no active transaction".to_string()));
        }
        let id = tx_id as u64;
        if !ConcurrencyManager::global().is_transaction_active(id) {
            return Err(DbError::ProtocolError(format!("transaction {id} is not active")));
        }
        Ok(id)
    }

    fn execute_plan(&self, plan: &PlanNode, tx_id: u64, pool: &BufferPool) -> DbResult<ExecutionOutcome> {
        match plan {
            PlanNode::Begin | PlanNode::Commit | PlanNode::Rollback => {
                Err(DbError::ProtocolError("transaction control statements cannot be nested in a plan".to_string()))
            }
            PlanNode::CreateTable { schema, .. } => {
                StorageEngine::global().create_table(schema.clone())?;
                Ok(ExecutionOutcome { tx_id: tx_id as i64, rows: Vec::new(), affected: 0, message: Some(format!("table '{}' created", schema.table_name)) })
            }
            PlanNode::Insert { table, values, .. } => {
                let id = StorageEngine::global().add_block(
                    DataWrite { table: table.clone(), assignments: values.clone(), condition: Condition::all() },
                    pool,
                )?;
                let row = Row::new(id.clone(), values.clone());
                // The lock is taken after the physical write since the row's
                // address isn't known beforehand; acceptable because a
                // freshly inserted row cannot yet be contended by a reader.
                let effective = self.validate_rows(tx_id, table, std::slice::from_ref(&row), Action::Write)?;
                if !effective[0] {
                    // Thomas Write Rule: a younger transaction already wrote
                    // this object (only possible via the same row id being
                    // recreated after a delete); discard the insert.
                    StorageEngine::global().delete_row_at(table, &row.id, pool)?;
                    return Ok(ExecutionOutcome { tx_id: tx_id as i64, rows: Vec::new(), affected: 0, message: None });
                }
                FailureRecoveryManager::global().log_insert(tx_id, table, &row)?;
                Ok(ExecutionOutcome { tx_id: tx_id as i64, rows: Vec::new(), affected: 1, message: None })
            }
            PlanNode::Update { input, table, assignments, .. } => {
                let candidates = self.rows_for(input, tx_id, pool)?;
                let effective = self.validate_rows(tx_id, table, &candidates, Action::Write)?;
                let mut affected = 0;
                for (row, is_effective) in candidates.iter().zip(effective) {
                    if !is_effective {
                        // Thomas Write Rule: a younger transaction already
                        // wrote this row; this write is obsolete and is
                        // silently skipped rather than applied.
                        continue;
                    }
                    let mut after = row.columns.clone();
                    for (k, v) in assignments {
                        after.insert(k.clone(), v.clone());
                    }
                    FailureRecoveryManager::global().log_update(tx_id, table, row.id.clone(), &row.columns, &after)?;
                    StorageEngine::global().put_row_at(table, &row.id, after, pool)?;
                    affected += 1;
                }
                Ok(ExecutionOutcome { tx_id: tx_id as i64, rows: Vec::new(), affected, message: None })
            }
            PlanNode::Delete { input, table, .. } => {
                let candidates = self.rows_for(input, tx_id, pool)?;
                let effective = self.validate_rows(tx_id, table, &candidates, Action::Write)?;
                let mut affected = 0;
                for (row, is_effective) in candidates.iter().zip(effective) {
                    if !is_effective {
                        continue;
                    }
                    FailureRecoveryManager::global().log_delete(tx_id, table, row.id.clone(), &row.columns)?;
                    StorageEngine::global().delete_row_at(table, &row.id, pool)?;
                    affected += 1;
                }
                Ok(ExecutionOutcome { tx_id: tx_id as i64, rows: Vec::new(), affected, message: None })
            }
            other => {
                let rows = self.rows_for(other, tx_id, pool)?;
                let affected = rows.len();
                Ok(ExecutionOutcome { tx_id: tx_id as i64, rows, affected, message: None })
            }
        }
    }

    /// Materializes the rows a read-only subtree produces, applying a
    /// `Read` lock/validation to every base-table row along the way.
    fn rows_for(&self, node: &PlanNode, tx_id: u64, pool: &BufferPool) -> DbResult<Vec<Row>> {
        match node {
            PlanNode::TableScan { table, .. } | PlanNode::IndexScan { table, .. } => {
                let rows = StorageEngine::global().read_block(
                    Retrieval { table: table.clone(), columns: None, condition: Condition::all() },
                    pool,
                )?;
                self.validate_rows(tx_id, table, &rows, Action::Read)?;
                Ok(rows)
            }
            PlanNode::IndexSeek { table, column, value, .. } => {
                let ids = StorageEngine::global()
                    .lookup_index(table, column, &value.to_string())
                    .unwrap_or_default();
                let mut rows = Vec::with_capacity(ids.len());
                for id in &ids {
                    if let Some(row) = StorageEngine::global().get_row(table, id, pool)? {
                        rows.push(row);
                    }
                }
                self.validate_rows(tx_id, table, &rows, Action::Read)?;
                Ok(rows)
            }
            PlanNode::Filter { input, condition, .. } => {
                let rows = self.rows_for(input, tx_id, pool)?;
                Ok(rows.into_iter().filter(|r| condition.eval(r).unwrap_or(false)).collect())
            }
            PlanNode::Join { left, right, spec, .. } => {
                let left_rows = self.rows_for(left, tx_id, pool)?;
                let right_rows = self.rows_for(right, tx_id, pool)?;
                Ok(join_rows(&left_rows, &right_rows, spec))
            }
            PlanNode::Aggregate { input, group_by, aggregates, .. } => {
                let rows = self.rows_for(input, tx_id, pool)?;
                Ok(aggregate_rows(&rows, group_by, aggregates))
            }
            PlanNode::Sort { input, column, ascending, .. } => {
                let mut rows = self.rows_for(input, tx_id, pool)?;
                rows.sort_by(|a, b| {
                    let ordering = match (a.get(column), b.get(column)) {
                        (Some(x), Some(y)) => x.partial_cmp_value(y).unwrap_or(std::cmp::Ordering::Equal),
                        _ => std::cmp::Ordering::Equal,
                    };
                    if *ascending { ordering } else { ordering.reverse() }
                });
                Ok(rows)
            }
            PlanNode::Project { input, columns, .. } => {
                let rows = self.rows_for(input, tx_id, pool)?;
                Ok(rows
                    .into_iter()
                    .map(|r| {
                        let filtered = r.columns.into_iter().filter(|(k, _)| columns.contains(k)).collect();
                        Row::new(r.id, filtered)
                    })
                    .collect())
            }
            _ => Err(DbError::ProtocolError("plan node does not produce rows".to_string())),
        }
    }

    /// Asks the active concurrency protocol to validate `action` against
    /// every row in `rows`, returning one `effective` flag per row in the
    /// same order. A `Denied` response aborts this transaction; a
    /// `Deadlock` response aborts whichever side the protocol's victim
    /// policy names (if that is some other transaction, this call still
    /// returns an error telling the caller to retry, since that
    /// transaction's locks are now released). `effective: false` only ever
    /// comes from Timestamp Ordering's Thomas Write Rule (a write made
    /// obsolete by a younger transaction's write to the same object); the
    /// caller must skip the physical write for that row rather than apply
    /// it, or it would overwrite a newer value with an older one.
    fn validate_rows(&self, tx_id: u64, table: &str, rows: &[Row], action: Action) -> DbResult<Vec<bool>> {
        let cm = ConcurrencyManager::global();
        let mut effective = Vec::with_capacity(rows.len());
        for row in rows {
            let object = ObjectKey::row(table, &row.id);
            cm.log_object(object.clone(), tx_id);
            match cm.validate_object(tx_id, object, action) {
                ValidationResponse::Granted { effective: is_effective } => effective.push(is_effective),
                ValidationResponse::Waiting => {
                    return Err(DbError::ProtocolError(
                        "waiting on a lock held by another transaction; retry the statement".to_string(),
                    ));
                }
                ValidationResponse::Denied(reason) => {
                    self.force_abort(tx_id, &reason)?;
                    return Err(DbError::ConflictAborted(reason));
                }
                ValidationResponse::Deadlock { victim } => {
                    let reason = format!("deadlock detected between transactions; {victim} chosen as victim");
                    self.force_abort(victim, &reason)?;
                    if victim == tx_id {
                        return Err(DbError::ConflictAborted(reason));
                    }
                    return Err(DbError::ProtocolError(
                        "waiting on a lock that was just released by a deadlock victim; retry".to_string(),
                    ));
                }
            }
        }
        Ok(effective)
    }

    fn force_abort(&self, tx_id: u64, reason: &str) -> DbResult<()> {
        FailureRecoveryManager::global().undo_transaction(tx_id, &self.pool)?;
        ConcurrencyManager::global().abort_transaction(tx_id);
        FailureRecoveryManager::global().log_abort(tx_id)?;
        tracing::warn!(tx_id, reason, "transaction forced to abort");
        Ok(())
    }

    pub fn validate_table_exists(&self, table: &str) -> DbResult<()> {
        if !Catalog::global().exists(table) {
            return Err(DbError::SchemaError(format!("unknown table '{table}'")));
        }
        Ok(())
    }
}

/// Executes a join the same way regardless of `spec.algorithm`: the
/// planner's choice between `NestedLoop`/`Hash`/`Merge` only changes the
/// estimated cost used to pick a plan, not how the chosen plan runs.
fn join_rows(left: &[Row], right: &[Row], spec: &JoinSpec) -> Vec<Row> {
    let mut out = Vec::new();
    for l in left {
        let Some(lv) = l.get(&spec.left_column) else { continue };
        for r in right {
            let Some(rv) = r.get(&spec.right_column) else { continue };
            if lv.partial_cmp_value(rv) == Some(std::cmp::Ordering::Equal) {
                let mut merged = l.columns.clone();
                for (k, v) in &r.columns {
                    merged.entry(format!("{}.{}", spec.right_table, k)).or_insert_with(|| v.clone());
                }
                out.push(Row::new(l.id.clone(), merged));
            }
        }
    }
    out
}

/// Groups `rows` by `group_by` (a single group for `rows.len() == 0` group
/// columns) and reduces each group through `aggregates`. Grouped rows get
/// no real `RowId` since they don't correspond to one on-disk row; callers
/// only ever read these back out through `Row::get`/the wire protocol, not
/// through `StorageEngine`, so the placeholder is never dereferenced.
fn aggregate_rows(rows: &[Row], group_by: &[String], aggregates: &[AggregateExpr]) -> Vec<Row> {
    let mut order: Vec<Vec<String>> = Vec::new();
    let mut groups: HashMap<Vec<String>, Vec<&Row>> = HashMap::new();
    for row in rows {
        let key: Vec<String> = group_by.iter().map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default()).collect();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }
    if groups.is_empty() && group_by.is_empty() {
        order.push(Vec::new());
        groups.insert(Vec::new(), Vec::new());
    }

    order
        .into_iter()
        .enumerate()
        .map(|(i, key)| {
            let members = groups.remove(&key).unwrap_or_default();
            let mut columns = HashMap::new();
            for col in group_by {
                let value = members.first().and_then(|r| r.get(col)).cloned().unwrap_or(Value::Null);
                columns.insert(col.clone(), value);
            }
            for agg in aggregates {
                columns.insert(agg.alias.clone(), compute_aggregate(agg, &members));
            }
            Row::new(RowId::from_location(0, i as u16), columns)
        })
        .collect()
}

fn compute_aggregate(agg: &AggregateExpr, members: &[&Row]) -> Value {
    if agg.func == AggFunc::Count {
        let count = match &agg.column {
            Some(col) => members.iter().filter(|r| !matches!(r.get(col), None | Some(Value::Null))).count(),
            None => members.len(),
        };
        return Value::Int32(count as i32);
    }
    let Some(column) = &agg.column else { return Value::Null };
    let values: Vec<&Value> = members.iter().filter_map(|r| r.get(column)).filter(|v| !matches!(v, Value::Null)).collect();
    if values.is_empty() {
        return Value::Null;
    }
    let all_int = values.iter().all(|v| matches!(v, Value::Int32(_)));
    let nums: Vec<f64> = values
        .iter()
        .map(|v| match v {
            Value::Int32(i) => *i as f64,
            Value::Float32(f) => *f as f64,
            _ => 0.0,
        })
        .collect();
    match agg.func {
        AggFunc::Sum => {
            let total = nums.iter().sum::<f64>();
            if all_int { Value::Int32(total as i32) } else { Value::Float32(total as f32) }
        }
        AggFunc::Avg => Value::Float32((nums.iter().sum::<f64>() / nums.len() as f64) as f32),
        AggFunc::Min => {
            let m = nums.iter().cloned().fold(f64::INFINITY, f64::min);
            if all_int { Value::Int32(m as i32) } else { Value::Float32(m as f32) }
        }
        AggFunc::Max => {
            let m = nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if all_int { Value::Int32(m as i32) } else { Value::Float32(m as f32) }
        }
        AggFunc::Count => unreachable!(),
    }
}
