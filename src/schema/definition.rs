//! JSON form of the schema registry.
//!
//! ```json
//! {
//!   "user": {
//!     "modelName": "users",
//!     "fields": {
//!       "email": { "type": "string", "required": true, "unique": true },
//!       "emailVerified": { "type": "boolean", "defaultValue": false }
//!     }
//!   }
//! }
//! ```
//!
//! Model and field order follow the document. Only static defaults can be
//! expressed here; generated defaults need the programmatic builder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FieldDef, FieldType, ModelDef, Reference};
use crate::error::{AdapterError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelDefinition {
    #[serde(default)]
    pub model_name: Option<String>,
    /// Field name to definition, in declaration order.
    pub fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "returned_by_default")]
    pub returned: bool,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub references: Option<Reference>,
}

fn returned_by_default() -> bool {
    true
}

impl FieldDefinition {
    fn into_field(self, name: &str) -> FieldDef {
        let mut field = FieldDef::new(name, self.field_type);
        field.required = self.required;
        field.unique = self.unique;
        field.returned = self.returned;
        field.storage_name = self.field_name;
        field.references = self.references;
        if let Some(value) = self.default_value {
            field = field.default_value(value);
        }
        field
    }
}

pub(super) fn parse(json: &str) -> Result<Vec<ModelDef>> {
    let document: serde_json::Map<String, Value> = serde_json::from_str(json)
        .map_err(|e| AdapterError::InvalidSchema(format!("schema document: {e}")))?;

    let mut models = Vec::with_capacity(document.len());
    for (name, body) in document {
        let definition: ModelDefinition = serde_json::from_value(body)
            .map_err(|e| AdapterError::InvalidSchema(format!("model {name}: {e}")))?;

        let mut model = ModelDef::new(name.as_str());
        if let Some(storage) = definition.model_name {
            model = model.storage_name(storage);
        }
        for (field_name, field_body) in definition.fields {
            let field: FieldDefinition = serde_json::from_value(field_body).map_err(|e| {
                AdapterError::InvalidSchema(format!("field {name}.{field_name}: {e}"))
            })?;
            model = model.field(field.into_field(&field_name));
        }
        models.push(model);
    }
    Ok(models)
}
