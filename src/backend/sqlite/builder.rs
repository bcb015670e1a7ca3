//! SQL text and parameters for the query IR.
//!
//! Identifiers are always quoted, values are always bound. The compiled
//! clauses reproduce [`crate::query::eval`] exactly, including its null
//! handling, so SQLite agrees with the in-memory reference row for row.

use rusqlite::types::Value as SqlValue;

use crate::error::{AdapterError, Result};
use crate::query::{Direction, Operator, Predicate, SortSpec, Where, Window};
use crate::record::{Record, Value};
use crate::schema::{FieldType, Table};

const BACKEND: &str = "sqlite";

/// A statement ready for `rusqlite`: SQL text plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Query {
    fn start(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    fn bind(&mut self, value: &Value) -> &mut Self {
        self.sql.push('?');
        self.params.push(to_sql(value));
        self
    }

    /// Bind a row count. SQLite takes `i64`; anything larger means "all".
    fn bind_count(&mut self, n: usize) -> &mut Self {
        self.sql.push('?');
        self.params.push(SqlValue::Integer(i64::try_from(n).unwrap_or(i64::MAX)));
        self
    }

    /// `SELECT *` with filter, sort and window. Ties and unsorted
    /// results follow insertion order (`rowid`).
    pub fn select(
        table: &Table,
        filter: &Where,
        sort: Option<&SortSpec>,
        window: Option<Window>,
    ) -> Result<Self> {
        let mut query = Self::start(format!("SELECT * FROM {}", ident(&table.name)));
        query.filter(table, filter)?;

        match sort {
            Some(sort) => {
                let dir = match sort.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                query.push(&format!(" ORDER BY {} {dir}, rowid ASC", ident(&sort.field)));
            }
            None => {
                query.push(" ORDER BY rowid ASC");
            }
        }

        if let Some(window) = window {
            query.push(" LIMIT ").bind_count(window.limit);
            query.push(" OFFSET ").bind_count(window.offset);
        }
        Ok(query)
    }

    /// Row id of the first match in insertion order.
    pub fn first_rowid(table: &Table, filter: &Where) -> Result<Self> {
        let mut query = Self::start(format!("SELECT rowid FROM {}", ident(&table.name)));
        query.filter(table, filter)?;
        query.push(" ORDER BY rowid ASC LIMIT 1");
        Ok(query)
    }

    pub fn by_rowid(table: &Table, rowid: i64) -> Self {
        let mut query = Self::start(format!("SELECT * FROM {} WHERE rowid = ", ident(&table.name)));
        query.bind(&Value::from(rowid));
        query
    }

    pub fn count(table: &Table, filter: &Where) -> Result<Self> {
        let mut query = Self::start(format!("SELECT COUNT(*) FROM {}", ident(&table.name)));
        query.filter(table, filter)?;
        Ok(query)
    }

    pub fn insert(table: &Table, row: &Record) -> Self {
        if row.is_empty() {
            return Self::start(format!("INSERT INTO {} DEFAULT VALUES", ident(&table.name)));
        }
        let columns: Vec<String> = row.keys().map(|k| ident(k)).collect();
        let mut query = Self::start(format!(
            "INSERT INTO {} ({}) VALUES (",
            ident(&table.name),
            columns.join(", ")
        ));
        for (i, value) in row.values().enumerate() {
            if i > 0 {
                query.push(", ");
            }
            query.bind(value);
        }
        query.push(")");
        query
    }

    /// `UPDATE .. SET .. WHERE <filter>`. An empty patch yields `None`.
    pub fn update(table: &Table, filter: &Where, patch: &Record) -> Result<Option<Self>> {
        let Some(mut query) = Self::set(table, patch) else {
            return Ok(None);
        };
        query.filter(table, filter)?;
        Ok(Some(query))
    }

    pub fn update_rowid(table: &Table, rowid: i64, patch: &Record) -> Option<Self> {
        let mut query = Self::set(table, patch)?;
        query.push(" WHERE rowid = ").bind(&Value::from(rowid));
        Some(query)
    }

    fn set(table: &Table, patch: &Record) -> Option<Self> {
        if patch.is_empty() {
            return None;
        }
        let mut query = Self::start(format!("UPDATE {} SET ", ident(&table.name)));
        for (i, (column, value)) in patch.iter().enumerate() {
            if i > 0 {
                query.push(", ");
            }
            query.push(&format!("{} = ", ident(column))).bind(value);
        }
        Some(query)
    }

    pub fn delete(table: &Table, filter: &Where) -> Result<Self> {
        let mut query = Self::start(format!("DELETE FROM {}", ident(&table.name)));
        query.filter(table, filter)?;
        Ok(query)
    }

    /// `CREATE TABLE IF NOT EXISTS` plus one unique index per unique column.
    pub fn create_table(table: &Table) -> Vec<String> {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let mut def = format!("{} {}", ident(&column.name), affinity(column.field_type));
                if column.name == table.id {
                    def.push_str(" PRIMARY KEY");
                }
                if column.required {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            ident(&table.name),
            columns.join(", ")
        )];
        for column in table.unique_columns().filter(|c| c.name != table.id) {
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                ident(&format!("idx_{}_{}_uq", table.name, column.name)),
                ident(&table.name),
                ident(&column.name)
            ));
        }
        statements
    }

    fn filter(&mut self, table: &Table, filter: &Where) -> Result<()> {
        if filter.is_empty() {
            return Ok(());
        }
        let groups = filter.groups();

        let mut all = Vec::with_capacity(groups.all.len());
        for predicate in &groups.all {
            all.push(condition(table, predicate)?);
        }
        let mut any = Vec::with_capacity(groups.any.len());
        for predicate in &groups.any {
            any.push(condition(table, predicate)?);
        }

        let mut parts: Vec<Query> = all;
        if !any.is_empty() {
            let mut joined = Self::start("(");
            for (i, clause) in any.into_iter().enumerate() {
                if i > 0 {
                    joined.push(" OR ");
                }
                joined.append(clause);
            }
            joined.push(")");
            parts.push(joined);
        }

        self.push(" WHERE ");
        for (i, clause) in parts.into_iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            self.append(clause);
        }
        Ok(())
    }

    fn append(&mut self, other: Query) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
    }
}

/// One predicate as a parenthesis-safe SQL condition.
fn condition(table: &Table, predicate: &Predicate) -> Result<Query> {
    let operator = predicate.operator();
    let value = predicate.value();
    let col = ident(predicate.field());

    let is_array = table
        .column(predicate.field())
        .is_some_and(|c| c.field_type.is_array());
    if is_array && operator.is_range() {
        return Err(AdapterError::UnsupportedOperator {
            backend: BACKEND.to_string(),
            operator: operator.to_string(),
            field: predicate.field().to_string(),
        });
    }

    let mut q = Query::start("");
    match operator {
        Operator::IsNull => {
            q.push(&format!("{col} IS NULL"));
        }
        Operator::IsNotNull => {
            q.push(&format!("{col} IS NOT NULL"));
        }
        Operator::Eq if value.is_null() => {
            q.push(&format!("{col} IS NULL"));
        }
        Operator::Ne if value.is_null() => {
            q.push("1 = 1");
        }
        Operator::Eq => {
            q.push(&format!("{col} = ")).bind(value);
        }
        Operator::Ne => {
            q.push(&format!("({col} IS NULL OR {col} <> ")).bind(value).push(")");
        }
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte if value.is_null() => {
            q.push("1 = 0");
        }
        Operator::Lt => {
            q.push(&format!("{col} < ")).bind(value);
        }
        Operator::Lte => {
            q.push(&format!("{col} <= ")).bind(value);
        }
        Operator::Gt => {
            q.push(&format!("{col} > ")).bind(value);
        }
        Operator::Gte => {
            q.push(&format!("{col} >= ")).bind(value);
        }
        Operator::In | Operator::NotIn => {
            let list = predicate.list();
            let negate = operator == Operator::NotIn;
            if list.is_empty() {
                q.push(if negate { "1 = 1" } else { "1 = 0" });
            } else {
                if negate {
                    q.push(&format!("({col} IS NULL OR {col} NOT IN ("));
                } else {
                    q.push(&format!("{col} IN ("));
                }
                for (i, item) in list.into_iter().enumerate() {
                    if i > 0 {
                        q.push(", ");
                    }
                    q.bind(item);
                }
                q.push(if negate { "))" } else { ")" });
            }
        }
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
            let Value::String(needle) = value else {
                return Err(AdapterError::InvalidPredicate {
                    field: predicate.field().to_string(),
                    reason: format!("{operator} needs a string value"),
                });
            };
            match operator {
                Operator::Contains => {
                    q.push(&format!("instr({col}, ")).bind(value).push(") > 0");
                }
                // substr(x, -0) is the whole string, so an empty suffix is special
                Operator::EndsWith if needle.is_empty() => {
                    q.push(&format!("{col} IS NOT NULL"));
                }
                Operator::EndsWith => {
                    q.push(&format!("substr({col}, -length("))
                        .bind(value)
                        .push(")) = ")
                        .bind(value);
                }
                _ => {
                    q.push(&format!("substr({col}, 1, length("))
                        .bind(value)
                        .push(")) = ")
                        .bind(value);
                }
            }
        }
    }
    Ok(q)
}

fn affinity(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Number => "NUMERIC",
        FieldType::Boolean => "INTEGER",
        FieldType::String | FieldType::Date | FieldType::StringArray | FieldType::NumberArray => {
            "TEXT"
        }
    }
}

/// Double-quoted identifier.
pub(crate) fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

pub(crate) fn from_sql(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
