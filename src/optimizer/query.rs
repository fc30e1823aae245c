use crate::catalog::schema::{ColumnDef, ColumnType};
use crate::common::{DbError, DbResult, Value};
use crate::storage::condition::{CompareOp, Comparison, Condition, Operand};
use sqlparser::ast::{
    BinaryOperator, CharacterLength, ColumnDef as SqlColumnDef, DataType, Expr, FromTable, Function,
    FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, OrderByKind, SelectItem, SetExpr,
    Statement, TableFactor, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::HashMap;

/// One of the aggregate functions recognized inside a projection item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// A single `FUNC(column)` or `FUNC(*)` projection item, resolved to the
/// column name the output row carries it under.
#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub func: AggFunc,
    pub column: Option<String>,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone)]
pub struct JoinClause {
    pub right_table: String,
    pub left_column: String,
    pub right_column: String,
}

/// The parsed, table-bound form of one client statement, built by walking
/// the `sqlparser` AST. Carries everything the planner needs without
/// re-touching the parse tree.
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryKind,
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub condition: Condition,
    pub assignments: HashMap<String, Value>,
    pub create_columns: Vec<ColumnDef>,
    pub order_by: Option<(String, bool)>,
    pub join: Option<JoinClause>,
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateExpr>,
}

impl Query {
    fn empty(kind: QueryKind) -> Self {
        Query {
            kind,
            table: String::new(),
            columns: None,
            condition: Condition::all(),
            assignments: HashMap::new(),
            create_columns: Vec::new(),
            order_by: None,
            join: None,
            group_by: Vec::new(),
            aggregates: Vec::new(),
        }
    }

    pub fn parse(sql: &str) -> DbResult<Query> {
        let dialect = GenericDialect {};
        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| DbError::SyntaxError(e.to_string()))?;
        let statement = statements
            .into_iter()
            .next()
            .ok_or_else(|| DbError::SyntaxError("empty statement".to_string()))?;
        Query::from_statement(statement)
    }

    fn from_statement(statement: Statement) -> DbResult<Query> {
        match statement {
            Statement::StartTransaction { .. } => Ok(Query::empty(QueryKind::Begin)),
            Statement::Commit { .. } => Ok(Query::empty(QueryKind::Commit)),
            Statement::Rollback { .. } => Ok(Query::empty(QueryKind::Rollback)),
            Statement::CreateTable(create_table) => {
                let mut q = Query::empty(QueryKind::CreateTable);
                q.table = create_table.name.to_string();
                q.create_columns = create_table
                    .columns
                    .into_iter()
                    .map(sql_column_def)
                    .collect::<DbResult<_>>()?;
                Ok(q)
            }
            Statement::Insert(insert) => {
                let mut q = Query::empty(QueryKind::Insert);
                q.table = insert.table.to_string();
                let col_names: Vec<String> = insert.columns.iter().map(|i| i.value.clone()).collect();
                if let Some(source) = insert.source {
                    if let SetExpr::Values(values) = *source.body {
                        let row = values
                            .rows
                            .into_iter()
                            .next()
                            .ok_or_else(|| DbError::SyntaxError("INSERT with no values".to_string()))?;
                        if !col_names.is_empty() && col_names.len() != row.len() {
                            return Err(DbError::SyntaxError(
                                "column list length does not match VALUES length".to_string(),
                            ));
                        }
                        for (i, expr) in row.into_iter().enumerate() {
                            let value = expr_to_literal(&expr)?;
                            let key = col_names.get(i).cloned().unwrap_or_else(|| i.to_string());
                            q.assignments.insert(key, value);
                        }
                    }
                }
                Ok(q)
            }
            Statement::Update(update) => {
                let mut q = Query::empty(QueryKind::Update);
                q.table = table_name_of(&update.table.relation)?;
                for assignment in update.assignments {
                    let col = assignment.target.to_string();
                    q.assignments.insert(col, expr_to_literal(&assignment.value)?);
                }
                if let Some(selection) = update.selection {
                    q.condition = expr_to_dnf(&selection)?;
                }
                Ok(q)
            }
            Statement::Delete(delete) => {
                let mut q = Query::empty(QueryKind::Delete);
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
                };
                let table = tables
                    .first()
                    .ok_or_else(|| DbError::SyntaxError("DELETE with no target table".to_string()))?;
                q.table = table_name_of(&table.relation)?;
                if let Some(selection) = delete.selection {
                    q.condition = expr_to_dnf(&selection)?;
                }
                Ok(q)
            }
            Statement::Query(query) => {
                let mut q = Query::empty(QueryKind::Select);
                if let SetExpr::Select(select) = *query.body {
                    let (columns, aggregates) = split_projection(&select.projection);
                    q.columns = columns;
                    q.aggregates = aggregates;
                    q.group_by = group_by_columns(&select.group_by);
                    let from = select
                        .from
                        .first()
                        .ok_or_else(|| DbError::SyntaxError("SELECT with no FROM".to_string()))?;
                    q.table = table_name_of(&from.relation)?;
                    for join in &from.joins {
                        q.join = Some(JoinClause {
                            right_table: table_name_of(&join.relation)?,
                            left_column: String::new(),
                            right_column: String::new(),
                        });
                        if let sqlparser::ast::JoinOperator::Inner(constraint) = &join.join_operator {
                            if let sqlparser::ast::JoinConstraint::On(expr) = constraint {
                                if let Some((l, r)) = equality_columns(expr) {
                                    if let Some(j) = q.join.as_mut() {
                                        j.left_column = l;
                                        j.right_column = r;
                                    }
                                }
                            }
                        }
                    }
                    if let Some(selection) = select.selection {
                        q.condition = expr_to_dnf(&selection)?;
                    }
                }
                if let Some(order_by) = query.order_by {
                    if let OrderByKind::Expressions(exprs) = order_by.kind {
                        if let Some(expr) = exprs.into_iter().next() {
                            if let Expr::Identifier(id) = expr.expr {
                                q.order_by = Some((id.value, expr.options.asc.unwrap_or(true)));
                            }
                        }
                    }
                }
                Ok(q)
            }
            other => Err(DbError::SyntaxError(format!("unsupported statement: {other}"))),
        }
    }
}

fn table_name_of(relation: &TableFactor) -> DbResult<String> {
    match relation {
        TableFactor::Table { name, .. } => Ok(name.to_string()),
        other => Err(DbError::SyntaxError(format!("unsupported table factor: {other}"))),
    }
}

/// Splits a projection into plain column references (`columns`, `None` for
/// a bare `*`) and aggregate function calls (`COUNT(*)`, `SUM(col)`, ...).
/// A query can mix both, e.g. `SELECT dept, COUNT(*) FROM t GROUP BY dept`.
fn split_projection(projection: &[SelectItem]) -> (Option<Vec<String>>, Vec<AggregateExpr>) {
    let mut names = Vec::new();
    let mut aggregates = Vec::new();
    for item in projection {
        match item {
            SelectItem::Wildcard(_) => return (None, Vec::new()),
            SelectItem::UnnamedExpr(Expr::Identifier(id)) => names.push(id.value.clone()),
            SelectItem::UnnamedExpr(Expr::CompoundIdentifier(parts)) => {
                if let Some(last) = parts.last() {
                    names.push(last.value.clone());
                }
            }
            SelectItem::UnnamedExpr(Expr::Function(func)) => {
                if let Some((agg_func, column)) = aggregate_call(func) {
                    let alias = default_alias(agg_func, column.as_deref());
                    aggregates.push(AggregateExpr { func: agg_func, column, alias });
                }
            }
            SelectItem::ExprWithAlias { expr: Expr::Function(func), alias } => {
                if let Some((agg_func, column)) = aggregate_call(func) {
                    aggregates.push(AggregateExpr { func: agg_func, column, alias: alias.value.clone() });
                }
            }
            _ => {}
        }
    }
    (Some(names), aggregates)
}

fn default_alias(func: AggFunc, column: Option<&str>) -> String {
    let name = match func {
        AggFunc::Count => "count",
        AggFunc::Sum => "sum",
        AggFunc::Avg => "avg",
        AggFunc::Min => "min",
        AggFunc::Max => "max",
    };
    match column {
        Some(c) => format!("{name}_{c}"),
        None => name.to_string(),
    }
}

fn aggregate_call(func: &Function) -> Option<(AggFunc, Option<String>)> {
    let agg_func = match func.name.to_string().to_uppercase().as_str() {
        "COUNT" => AggFunc::Count,
        "SUM" => AggFunc::Sum,
        "AVG" => AggFunc::Avg,
        "MIN" => AggFunc::Min,
        "MAX" => AggFunc::Max,
        _ => return None,
    };
    let column = match &func.args {
        FunctionArguments::List(list) => list.args.first().and_then(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => column_name(e),
            _ => None,
        }),
        _ => None,
    };
    Some((agg_func, column))
}

fn group_by_columns(group_by: &GroupByExpr) -> Vec<String> {
    match group_by {
        GroupByExpr::Expressions(exprs, _) => exprs.iter().filter_map(column_name).collect(),
        GroupByExpr::All(_) => Vec::new(),
    }
}

fn sql_column_def(col: SqlColumnDef) -> DbResult<ColumnDef> {
    let ty = match col.data_type {
        DataType::Int(_) | DataType::Integer(_) => ColumnType::Int32,
        DataType::Float(_) | DataType::Real | DataType::Double(_) => ColumnType::Float32,
        DataType::Varchar(len) | DataType::Char(len) => {
            let n = match len {
                Some(CharacterLength::IntegerLength { length, .. }) => length as usize,
                _ => 255,
            };
            ColumnType::Str(n)
        }
        other => return Err(DbError::SyntaxError(format!("unsupported column type: {other}"))),
    };
    Ok(ColumnDef { name: col.name.value, ty, indexed: false })
}

fn expr_to_literal(expr: &Expr) -> DbResult<Value> {
    match expr {
        Expr::Value(value_with_span) => match &value_with_span.value {
            SqlValue::Number(n, _) => {
                if let Ok(i) = n.parse::<i32>() {
                    Ok(Value::Int32(i))
                } else {
                    n.parse::<f32>().map(Value::Float32).map_err(|_| {
                        DbError::SyntaxError(format!("invalid numeric literal '{n}'"))
                    })
                }
            }
            SqlValue::SingleQuotedString(s) => Ok(Value::Str(s.clone())),
            SqlValue::Null => Ok(Value::Null),
            other => Err(DbError::SyntaxError(format!("unsupported literal expression: {other}"))),
        },
        Expr::UnaryOp { op: sqlparser::ast::UnaryOperator::Minus, expr } => match expr_to_literal(expr)? {
            Value::Int32(i) => Ok(Value::Int32(-i)),
            Value::Float32(f) => Ok(Value::Float32(-f)),
            other => Err(DbError::SyntaxError(format!("cannot negate {other}"))),
        },
        other => Err(DbError::SyntaxError(format!("unsupported literal expression: {other}"))),
    }
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(id) => Some(id.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|p| p.value.clone()),
        _ => None,
    }
}

fn equality_columns(expr: &Expr) -> Option<(String, String)> {
    if let Expr::BinaryOp { left, op: BinaryOperator::Eq, right } = expr {
        if let (Some(l), Some(r)) = (column_name(left), column_name(right)) {
            return Some((l, r));
        }
    }
    None
}

fn compare_op(op: &BinaryOperator) -> Option<CompareOp> {
    match op {
        BinaryOperator::Eq => Some(CompareOp::Eq),
        BinaryOperator::NotEq => Some(CompareOp::Ne),
        BinaryOperator::Lt => Some(CompareOp::Lt),
        BinaryOperator::LtEq => Some(CompareOp::Le),
        BinaryOperator::Gt => Some(CompareOp::Gt),
        BinaryOperator::GtEq => Some(CompareOp::Ge),
        _ => None,
    }
}

fn operand_of(expr: &Expr) -> DbResult<Operand> {
    if let Some(name) = column_name(expr) {
        return Ok(Operand::Column(name));
    }
    Ok(Operand::Literal(expr_to_literal(expr)?))
}

/// Converts a WHERE-clause expression tree into disjunctive normal form:
/// `OR`s at the top distribute, `AND`s multiply out across existing
/// disjuncts, comparisons become leaf `Comparison`s.
pub fn expr_to_dnf(expr: &Expr) -> DbResult<Condition> {
    match expr {
        Expr::Nested(inner) => expr_to_dnf(inner),
        Expr::BinaryOp { left, op: BinaryOperator::Or, right } => {
            let mut l = expr_to_dnf(left)?;
            let r = expr_to_dnf(right)?;
            l.0.extend(r.0);
            Ok(l)
        }
        Expr::BinaryOp { left, op: BinaryOperator::And, right } => {
            let l = expr_to_dnf(left)?;
            let r = expr_to_dnf(right)?;
            let mut combined = Vec::with_capacity(l.0.len() * r.0.len().max(1));
            if r.0.is_empty() {
                return Ok(l);
            }
            if l.0.is_empty() {
                return Ok(r);
            }
            for lc in &l.0 {
                for rc in &r.0 {
                    let mut conj = lc.clone();
                    conj.extend(rc.clone());
                    combined.push(conj);
                }
            }
            Ok(Condition(combined))
        }
        Expr::BinaryOp { left, op, right } => {
            let cmp_op = compare_op(op)
                .ok_or_else(|| DbError::SyntaxError(format!("unsupported operator: {op}")))?;
            let comparison = Comparison { left: operand_of(left)?, op: cmp_op, right: operand_of(right)? };
            Ok(Condition(vec![vec![comparison]]))
        }
        other => Err(DbError::SyntaxError(format!("unsupported predicate expression: {other}"))),
    }
}
