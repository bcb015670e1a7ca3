use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::record::{self, Value};

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "number[]")]
    NumberArray,
}

impl FieldType {
    pub fn is_array(self) -> bool {
        matches!(self, FieldType::StringArray | FieldType::NumberArray)
    }

    /// Element type of an array field, or the type itself for scalars.
    pub fn element(self) -> FieldType {
        match self {
            FieldType::StringArray => FieldType::String,
            FieldType::NumberArray => FieldType::Number,
            scalar => scalar,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::StringArray => "string[]",
            FieldType::NumberArray => "number[]",
        };
        f.write_str(name)
    }
}

/// Value applied on create when the caller omitted the field.
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    /// Computed once per create call.
    Generated(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn generated<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Generated(Arc::new(f))
    }

    /// The current time, evaluated at create time.
    pub fn now() -> Self {
        DefaultValue::generated(record::now)
    }

    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Generated(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

/// Foreign reference. Metadata only; no cascade logic runs in this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub model: String,
    pub field: String,
    #[serde(default)]
    pub on_delete: OnDelete,
}

/// One declared field of a model.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub(crate) name: String,
    pub(crate) storage_name: Option<String>,
    pub(crate) field_type: FieldType,
    pub(crate) required: bool,
    pub(crate) unique: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) references: Option<Reference>,
    pub(crate) returned: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            field_type,
            required: false,
            unique: false,
            default: None,
            references: None,
            returned: true,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn string_array(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::StringArray)
    }

    pub fn number_array(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::NumberArray)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Column / property name used by the backend.
    pub fn storage_name(mut self, name: impl Into<String>) -> Self {
        self.storage_name = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn default_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::generated(f));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::now());
        self
    }

    pub fn references(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
        self.references = Some(Reference {
            model: model.into(),
            field: field.into(),
            on_delete: OnDelete::default(),
        });
        self
    }

    pub fn on_delete(mut self, on_delete: OnDelete) -> Self {
        if let Some(reference) = self.references.as_mut() {
            reference.on_delete = on_delete;
        }
        self
    }

    /// Exclude the field from default output.
    pub fn hidden(mut self) -> Self {
        self.returned = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column(&self) -> &str {
        self.storage_name.as_deref().unwrap_or(&self.name)
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_returned(&self) -> bool {
        self.returned
    }

    pub fn default_rule(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.references.as_ref()
    }
}
