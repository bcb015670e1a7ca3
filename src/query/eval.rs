//! Reference semantics of the query IR.
//!
//! The in-memory backend filters with this module directly and the document
//! backend post-filters with it. The SQL translator is tested against it.
//!
//! Null handling:
//! - `eq null` is `is_null`; `ne null` is always true.
//! - `ne v` and `not_in [..]` match rows whose cell is null.
//! - `in` / `not_in` ignore `null` entries; `in []` matches nothing and
//!   `not_in []` matches everything.
//! - range operators and text operators are false on a null cell.

use std::cmp::Ordering;

use super::filter::{Direction, Groups, SortSpec, Where};
use super::predicate::{Operator, Predicate};
use crate::error::{AdapterError, Result};
use crate::record::{Record, Value};
use crate::schema::Table;

/// A where clause checked against a table, ready to filter rows.
#[derive(Debug)]
pub struct Evaluator<'a> {
    groups: Groups<'a>,
}

impl<'a> Evaluator<'a> {
    /// Range comparisons on array columns cannot be evaluated.
    pub fn new(table: &Table, filter: &'a Where, backend: &str) -> Result<Self> {
        for predicate in filter {
            let is_array = table
                .column(predicate.field())
                .map(|c| c.field_type.is_array())
                .unwrap_or(false);
            if is_array && predicate.operator().is_range() {
                return Err(AdapterError::UnsupportedOperator {
                    backend: backend.to_string(),
                    operator: predicate.operator().to_string(),
                    field: predicate.field().to_string(),
                });
            }
        }
        Ok(Self {
            groups: filter.groups(),
        })
    }

    pub fn matches(&self, row: &Record) -> bool {
        let Groups { all, any } = &self.groups;
        all.iter().all(|p| matches_predicate(row, p))
            && (any.is_empty() || any.iter().any(|p| matches_predicate(row, p)))
    }
}

pub fn matches_predicate(row: &Record, predicate: &Predicate) -> bool {
    let cell = row.get(predicate.field()).unwrap_or(&Value::Null);
    let value = predicate.value();

    match predicate.operator() {
        Operator::IsNull => cell.is_null(),
        Operator::IsNotNull => !cell.is_null(),
        Operator::Eq if value.is_null() => cell.is_null(),
        Operator::Eq => values_equal(cell, value),
        Operator::Ne if value.is_null() => true,
        Operator::Ne => cell.is_null() || !values_equal(cell, value),
        Operator::Lt => compare(cell, value) == Some(Ordering::Less),
        Operator::Lte => matches!(compare(cell, value), Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => compare(cell, value) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(cell, value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::In => {
            !cell.is_null() && predicate.list().into_iter().any(|v| values_equal(cell, v))
        }
        Operator::NotIn => {
            cell.is_null() || !predicate.list().into_iter().any(|v| values_equal(cell, v))
        }
        Operator::Contains => text(cell, value, |c, v| c.contains(v)),
        Operator::StartsWith => text(cell, value, |c, v| c.starts_with(v)),
        Operator::EndsWith => text(cell, value, |c, v| c.ends_with(v)),
    }
}

fn text(cell: &Value, value: &Value, op: impl Fn(&str, &str) -> bool) -> bool {
    match (cell, value) {
        (Value::String(c), Value::String(v)) => op(c, v),
        _ => false,
    }
}

/// Equality with numeric widening (`1 == 1.0`) and element-wise arrays.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(_), Value::Object(_)) => a == b,
        _ => compare(a, b) == Some(Ordering::Equal),
    }
}

/// Ordering between two non-null scalars of the same kind.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: nulls first, then by kind, then by value.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    kind_rank(a)
        .cmp(&kind_rank(b))
        .then_with(|| compare(a, b).unwrap_or(Ordering::Equal))
}

/// Stable sort; ties keep their natural order in both directions.
pub fn sort_rows(rows: &mut [Record], sort: &SortSpec) {
    rows.sort_by(|a, b| {
        let left = a.get(&sort.field).unwrap_or(&Value::Null);
        let right = b.get(&sort.field).unwrap_or(&Value::Null);
        match sort.direction {
            Direction::Asc => sort_order(left, right),
            Direction::Desc => sort_order(right, left),
        }
    });
}
