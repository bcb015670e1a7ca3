use thiserror::Error;

/// Error type shared by every layer of the adapter.
///
/// Backends report raw failures as [`AdapterError::Storage`]; the adapter
/// wraps those into [`AdapterError::Backend`] with the model and operation
/// that produced them. Every other variant is surfaced unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The model was never registered with the schema.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("field {field} not found on model {model}")]
    FieldNotFound { model: String, field: String },

    /// A translator received an operator it cannot express, even by emulation.
    #[error("backend {backend} cannot evaluate {operator} on field {field}")]
    UnsupportedOperator {
        backend: String,
        operator: String,
        field: String,
    },

    #[error("invalid predicate on field {field}: {reason}")]
    InvalidPredicate { field: String, reason: String },

    #[error("invalid value for {model}.{field}: {reason}")]
    InvalidValue {
        model: String,
        field: String,
        reason: String,
    },

    #[error("missing required field {model}.{field}")]
    MissingRequiredField { model: String, field: String },

    /// Uniqueness or foreign-key violation reported by the backend.
    #[error("constraint violation on {model}: {message}")]
    ConstraintViolation { model: String, message: String },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The operation's deadline elapsed before the backend answered.
    #[error("{operation} on {model} was cancelled")]
    Cancelled { operation: String, model: String },

    /// Raw storage failure, before the adapter attaches context.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("{backend} {operation} on {model} failed: {message}")]
    Backend {
        backend: String,
        operation: String,
        model: String,
        message: String,
    },
}

impl AdapterError {
    pub(crate) fn storage(err: impl ToString) -> Self {
        AdapterError::Storage(err.to_string())
    }

    /// Attach backend, operation and model to a raw storage error.
    pub(crate) fn in_context(self, backend: &str, operation: &str, model: &str) -> Self {
        match self {
            AdapterError::Storage(message) => AdapterError::Backend {
                backend: backend.to_string(),
                operation: operation.to_string(),
                model: model.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Returns true for a backend-reported uniqueness/foreign-key violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, AdapterError::ConstraintViolation { .. })
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;
