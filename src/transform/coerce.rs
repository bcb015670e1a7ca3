//! Per-field value checks and backend capability coercion.

use crate::backend::Capabilities;
use crate::record::{kind_of, normalize_date, Value};
use crate::schema::FieldType;

/// Check `value` against `field_type` and bring it into canonical form:
/// dates become RFC 3339 millis UTC, integral floats become integers.
/// `null` passes through; callers decide whether it is allowed.
pub(crate) fn normalize(field_type: FieldType, value: Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(value);
    }
    match field_type {
        FieldType::String => match value {
            Value::String(_) => Ok(value),
            other => Err(mismatch(field_type, &other)),
        },
        FieldType::Number => number(value),
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value),
            other => Err(mismatch(field_type, &other)),
        },
        FieldType::Date => normalize_date(&value).map(Value::String),
        FieldType::StringArray | FieldType::NumberArray => match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Null => Err(format!("{field_type} cannot hold null")),
                    item => normalize(field_type.element(), item),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(mismatch(field_type, &other)),
        },
    }
}

fn number(value: Value) -> Result<Value, String> {
    let Value::Number(n) = &value else {
        return Err(mismatch(FieldType::Number, &value));
    };
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                return Ok(Value::from(f as i64));
            }
        }
    }
    Ok(value)
}

fn mismatch(expected: FieldType, got: &Value) -> String {
    format!("expected {expected}, got {}", kind_of(got))
}

/// Logical value to what the backend can store.
pub(crate) fn to_storage(field_type: FieldType, value: Value, caps: Capabilities) -> Value {
    match value {
        Value::Bool(b) if field_type == FieldType::Boolean && !caps.booleans => {
            Value::from(i64::from(b))
        }
        Value::Array(_) if field_type.is_array() && !caps.arrays => {
            Value::String(value.to_string())
        }
        other => other,
    }
}

/// Stored value back to its logical form.
pub(crate) fn from_storage(field_type: FieldType, value: Value) -> Value {
    match (field_type, value) {
        (FieldType::Boolean, Value::Number(n)) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        (t, Value::String(text)) if t.is_array() => match serde_json::from_str(&text) {
            Ok(Value::Array(items)) => Value::Array(items),
            _ => Value::String(text),
        },
        (_, other) => other,
    }
}
