use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};
use crate::record::{kind_of, Value};

/// Comparison operator of a predicate. A predicate without one means `eq`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
        }
    }

    /// `in` / `not_in`: the value must be an array.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// `contains` / `starts_with` / `ends_with`: string fields only.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }

    pub fn is_range(self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }

    /// `is_null` / `is_not_null`: the value is ignored.
    pub fn ignores_value(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a predicate joins the rest of the where clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connector {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// One filter condition.
///
/// Invariants hold from construction on: list operators always carry an
/// array, null checks never carry a value. Deserialized predicates go
/// through the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPredicate")]
pub struct Predicate {
    field: String,
    operator: Operator,
    value: Value,
    connector: Connector,
}

#[derive(Deserialize)]
struct RawPredicate {
    field: String,
    #[serde(default)]
    operator: Operator,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    connector: Connector,
}

impl TryFrom<RawPredicate> for Predicate {
    type Error = AdapterError;

    fn try_from(raw: RawPredicate) -> Result<Self> {
        Ok(Predicate::new(raw.field, raw.operator, raw.value)?.connector(raw.connector))
    }
}

impl Predicate {
    /// Validating constructor for operators chosen at runtime.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Result<Self> {
        let field = field.into();
        let value = value.into();

        if operator.takes_list() && !value.is_array() {
            return Err(AdapterError::InvalidPredicate {
                reason: format!("{operator} needs an array value, got {}", kind_of(&value)),
                field,
            });
        }

        let value = if operator.ignores_value() {
            Value::Null
        } else {
            value
        };

        Ok(Self {
            field,
            operator,
            value,
            connector: Connector::And,
        })
    }

    fn scalar(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            connector: Connector::And,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::scalar(field, Operator::Gte, value)
    }

    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::scalar(field, Operator::In, Value::Array(list))
    }

    pub fn not_in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::scalar(field, Operator::NotIn, Value::Array(list))
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::scalar(field, Operator::Contains, needle.into())
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::scalar(field, Operator::StartsWith, prefix.into())
    }

    pub fn ends_with(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::scalar(field, Operator::EndsWith, suffix.into())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::scalar(field, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::scalar(field, Operator::IsNotNull, Value::Null)
    }

    /// Put this predicate in the OR bucket.
    pub fn or(self) -> Self {
        self.connector(Connector::Or)
    }

    /// Put this predicate in the AND bucket (the default).
    pub fn and(self) -> Self {
        self.connector(Connector::And)
    }

    pub fn connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn connector_kind(&self) -> Connector {
        self.connector
    }

    pub fn is_or(&self) -> bool {
        self.connector == Connector::Or
    }

    /// List operand with `null` entries removed. Empty for non-list operators.
    pub fn list(&self) -> Vec<&Value> {
        match &self.value {
            Value::Array(items) if self.operator.takes_list() => {
                items.iter().filter(|v| !v.is_null()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Same operator and connector against a different field name / value.
    ///
    /// Used when logical names are mapped to storage names and values are
    /// coerced for a backend; list operators keep an array operand.
    pub(crate) fn rebind(&self, field: impl Into<String>, value: Value) -> Self {
        let value = match (self.operator.takes_list(), value) {
            (true, Value::Array(items)) => Value::Array(items),
            (true, other) => Value::Array(vec![other]),
            (false, _) if self.operator.ignores_value() => Value::Null,
            (false, other) => other,
        };
        Self {
            field: field.into(),
            operator: self.operator,
            value,
            connector: self.connector,
        }
    }
}
