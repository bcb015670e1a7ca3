//! Schema registry - the canonical map of logical models to field definitions.
//!
//! The registry is populated once at startup (by plugins, configuration or
//! [`builtin::auth_schema`]) and is read-only afterwards. Every other layer asks
//! it how a logical name maps to a storage name and which type a field has.
//!
//! ## Example
//!
//! ```
//! use sourced_adapter::{FieldDef, ModelDef, Schema};
//!
//! let schema = Schema::builder()
//!     .model(
//!         ModelDef::new("user")
//!             .field(FieldDef::string("email").required().unique())
//!             .field(FieldDef::boolean("emailVerified").default_value(false)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.resolve_field("user", "email").unwrap().column(), "email");
//! assert!(schema.model("organization").is_err());
//! ```

pub mod builtin;
mod definition;
mod field;

use std::collections::HashSet;

pub use definition::{FieldDefinition, ModelDefinition};
pub use field::{DefaultValue, FieldDef, FieldType, OnDelete, Reference};

use crate::error::{AdapterError, Result};

/// Logical name of the primary key every model carries.
pub const ID_FIELD: &str = "id";

/// A logical entity and its ordered fields.
#[derive(Debug, Clone)]
pub struct ModelDef {
    name: String,
    storage_name: Option<String>,
    fields: Vec<FieldDef>,
    table: Table,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            fields: Vec::new(),
            table: Table::default(),
        }
    }

    /// Table / collection name used by the backend.
    pub fn storage_name(mut self, name: impl Into<String>) -> Self {
        self.storage_name = Some(name.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields_from(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The `id` field. `None` until the model is registered with a schema.
    pub fn id_field(&self) -> Option<&FieldDef> {
        self.fields.first().filter(|f| f.name == ID_FIELD)
    }

    /// Storage view of this model, populated when the model is registered.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Resolve a logical field name, failing hard on unknown fields.
    pub fn resolve(&self, name: &str) -> Result<&FieldDef> {
        self.get_field(name)
            .ok_or_else(|| AdapterError::FieldNotFound {
                model: self.name.clone(),
                field: name.to_string(),
            })
    }

    fn finalize(&mut self, use_plural: bool) -> Result<()> {
        match self.fields.iter().position(|f| f.name == ID_FIELD) {
            Some(0) => {}
            Some(pos) => {
                let id = self.fields.remove(pos);
                self.fields.insert(0, id);
            }
            None => self.fields.insert(0, FieldDef::string(ID_FIELD)),
        }

        let id = &mut self.fields[0];
        if id.field_type != FieldType::String {
            return Err(AdapterError::InvalidSchema(format!(
                "{}.id must be a string field",
                self.name
            )));
        }
        id.required = true;
        id.unique = true;
        id.returned = true;

        let mut names = HashSet::new();
        let mut columns = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(AdapterError::InvalidSchema(format!(
                    "duplicate field {}.{}",
                    self.name, field.name
                )));
            }
            if !columns.insert(field.column()) {
                return Err(AdapterError::InvalidSchema(format!(
                    "duplicate storage column {}.{}",
                    self.name,
                    field.column()
                )));
            }
        }

        let table_name = match &self.storage_name {
            Some(name) => name.clone(),
            None if use_plural => format!("{}s", self.name),
            None => self.name.clone(),
        };
        self.table = Table {
            name: table_name,
            id: self.fields[0].column().to_string(),
            columns: self
                .fields
                .iter()
                .map(|f| Column {
                    name: f.column().to_string(),
                    field_type: f.field_type,
                    required: f.required,
                    unique: f.unique,
                })
                .collect(),
        };
        Ok(())
    }
}

/// Storage-named projection of a model, handed to backends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    /// Storage name of the primary key column.
    pub id: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns that must hold distinct non-null values, id included.
    pub fn unique_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.unique)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
}

/// Frozen registry of models.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: Vec<ModelDef>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Build a schema from the JSON definition format.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::builder().definition_json(json)?.build()
    }

    pub fn model(&self, name: &str) -> Result<&ModelDef> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AdapterError::ModelNotFound(name.to_string()))
    }

    pub fn resolve_field(&self, model: &str, field: &str) -> Result<&FieldDef> {
        self.model(model)?.resolve(field)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.iter()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.models.iter().map(|m| &m.table)
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    models: Vec<ModelDef>,
    use_plural: bool,
}

impl SchemaBuilder {
    pub fn model(mut self, model: ModelDef) -> Self {
        self.models.push(model);
        self
    }

    pub fn models(mut self, models: impl IntoIterator<Item = ModelDef>) -> Self {
        self.models.extend(models);
        self
    }

    /// Store models without an explicit storage name under `<name>s`.
    pub fn use_plural(mut self, use_plural: bool) -> Self {
        self.use_plural = use_plural;
        self
    }

    /// Add the models of a JSON definition document.
    pub fn definition_json(self, json: &str) -> Result<Self> {
        let models = definition::parse(json)?;
        Ok(self.models(models))
    }

    pub fn build(mut self) -> Result<Schema> {
        let mut names = HashSet::new();
        for model in &mut self.models {
            if !names.insert(model.name.clone()) {
                return Err(AdapterError::InvalidSchema(format!(
                    "model {} registered twice",
                    model.name
                )));
            }
            model.finalize(self.use_plural)?;
        }

        let mut tables = HashSet::new();
        for model in &self.models {
            if !tables.insert(model.table.name.as_str()) {
                return Err(AdapterError::InvalidSchema(format!(
                    "storage name {} used by more than one model",
                    model.table.name
                )));
            }
            for field in &model.fields {
                if let Some(reference) = &field.references {
                    let target = self.models.iter().find(|m| m.name == reference.model);
                    let resolved = target.and_then(|m| m.get_field(&reference.field));
                    if resolved.is_none() {
                        return Err(AdapterError::InvalidSchema(format!(
                            "{}.{} references unknown {}.{}",
                            model.name, field.name, reference.model, reference.field
                        )));
                    }
                }
            }
        }

        Ok(Schema {
            models: self.models,
        })
    }
}
