use crate::catalog::schema::TableSchema;
use crate::common::{DbError, DbResult, Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

impl Comparison {
    fn resolve(operand: &Operand, row: &Row) -> DbResult<Value> {
        match operand {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Column(name) => row
                .get(name)
                .cloned()
                .ok_or_else(|| DbError::SchemaError(format!("unknown column '{name}' in predicate"))),
        }
    }

    pub fn eval(&self, row: &Row) -> DbResult<bool> {
        let lhs = Self::resolve(&self.left, row)?;
        let rhs = Self::resolve(&self.right, row)?;
        let ordering = match lhs.partial_cmp_value(&rhs) {
            Some(o) => o,
            None => return Ok(self.op == CompareOp::Ne && lhs != rhs),
        };
        Ok(match self.op {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::Ne => ordering.is_ne(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
        })
    }

    /// If this comparison is an equality test against a literal on an
    /// indexed column, returns `(column, value)` — used by the optimizer to
    /// pick an `IndexSeek`.
    pub fn as_indexable_equality(&self) -> Option<(&str, &Value)> {
        match (&self.left, &self.op, &self.right) {
            (Operand::Column(c), CompareOp::Eq, Operand::Literal(v)) => Some((c, v)),
            (Operand::Literal(v), CompareOp::Eq, Operand::Column(c)) => Some((c, v)),
            _ => None,
        }
    }
}

/// A where-clause in disjunctive normal form: an outer OR of inner ANDs.
/// An empty outer list means "no predicate" (every row matches).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition(pub Vec<Vec<Comparison>>);

impl Condition {
    pub fn all() -> Self {
        Condition(Vec::new())
    }

    pub fn is_trivial(&self) -> bool {
        self.0.is_empty()
    }

    pub fn eval(&self, row: &Row) -> DbResult<bool> {
        if self.0.is_empty() {
            return Ok(true);
        }
        for conjunction in &self.0 {
            let mut all_true = true;
            for cmp in conjunction {
                if !cmp.eval(row)? {
                    all_true = false;
                    break;
                }
            }
            if all_true {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// A normalized textual signature used as a plan-cache key component:
    /// column lists sorted, whitespace-normalized.
    pub fn canonical_signature(&self) -> String {
        let mut conjuncts: Vec<String> = self
            .0
            .iter()
            .map(|conj| {
                let mut parts: Vec<String> = conj
                    .iter()
                    .map(|c| format!("{:?}{:?}{:?}", c.left, c.op, c.right))
                    .collect();
                parts.sort();
                parts.join("&")
            })
            .collect();
        conjuncts.sort();
        conjuncts.join("|")
    }

    pub fn validate_columns(&self, schema: &TableSchema) -> DbResult<()> {
        for conj in &self.0 {
            for cmp in conj {
                for op in [&cmp.left, &cmp.right] {
                    if let Operand::Column(name) = op {
                        if schema.column(name).is_none() {
                            return Err(DbError::SchemaError(format!(
                                "unknown column '{name}' in table '{}'", schema.table_name
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::common::RowId;

    fn row(id: i32, name: &str) -> Row {
        let mut cols = HashMap::new();
        cols.insert("id".to_string(), Value::Int32(id));
        cols.insert("name".to_string(), Value::Str(name.to_string()));
        Row::new(RowId::from_location(0, 0), cols)
    }

    #[test]
    fn dnf_matches_if_any_conjunct_true() {
        let cond = Condition(vec![
            vec![Comparison { left: Operand::Column("id".into()), op: CompareOp::Eq, right: Operand::Literal(Value::Int32(1)) }],
            vec![Comparison { left: Operand::Column("name".into()), op: CompareOp::Eq, right: Operand::Literal(Value::Str("bob".into())) }],
        ]);
        assert!(cond.eval(&row(1, "alice")).unwrap());
        assert!(cond.eval(&row(2, "bob")).unwrap());
        assert!(!cond.eval(&row(2, "alice")).unwrap());
    }

    #[test]
    fn empty_condition_matches_everything() {
        assert!(Condition::all().eval(&row(99, "x")).unwrap());
    }
}
