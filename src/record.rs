//! Record representation shared by every backend.
//!
//! A record is an insertion-ordered JSON object. Dates travel as RFC 3339
//! strings in UTC with millisecond precision, so lexical and chronological
//! order agree on every backend.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
pub use serde_json::Value;

/// One row, keyed by logical (caller side) or storage (backend side) names.
pub type Record = serde_json::Map<String, Value>;

/// Build a [`Record`] with `serde_json::json!` object syntax.
///
/// ```
/// use sourced_adapter::record;
///
/// let user = record! { "email": "a@x.com", "emailVerified": false };
/// assert_eq!(user["email"], "a@x.com");
/// ```
#[macro_export]
macro_rules! record {
    ($($body:tt)*) => {
        match $crate::serde_json::json!({ $($body)* }) {
            $crate::serde_json::Value::Object(map) => map,
            _ => unreachable!("json object literal"),
        }
    };
}

/// Current time in the canonical date encoding.
pub fn now() -> Value {
    Value::String(format_date(Utc::now()))
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize a caller-supplied date (RFC 3339 string or epoch milliseconds).
pub(crate) fn normalize_date(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|parsed| format_date(parsed.with_timezone(&Utc)))
            .map_err(|e| format!("not an RFC 3339 date ({e})")),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| "epoch milliseconds must be an integer".to_string())?;
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(format_date)
                .ok_or_else(|| format!("{millis} is out of range"))
        }
        other => Err(format!("expected a date, got {}", kind_of(other))),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
