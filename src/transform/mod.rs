//! Field transform pipeline.
//!
//! Sits between the caller's logical view and a backend's storage view:
//! - input: id generation, defaults, required checks, value normalization,
//!   logical to storage names, capability coercion;
//! - where / sort: the same name mapping and value coercion;
//! - output: storage to logical names, reverse coercion, projection.

mod coerce;
mod id;

use tracing::trace;

pub use id::{IdGenerator, RandomId};

use crate::backend::Capabilities;
use crate::error::{AdapterError, Result};
use crate::query::{Operator, Predicate, Select, SortSpec, Where};
use crate::record::{Record, Value};
use crate::schema::{DefaultValue, FieldDef, ModelDef, ID_FIELD};

/// Transforms bound to one model and one backend.
#[derive(Debug, Clone, Copy)]
pub struct Transform<'a> {
    model: &'a ModelDef,
    caps: Capabilities,
}

impl<'a> Transform<'a> {
    pub fn new(model: &'a ModelDef, caps: Capabilities) -> Self {
        Self { model, caps }
    }

    /// Full storage row for a new record.
    ///
    /// Caller values win over defaults. `ids` is consulted only when the
    /// caller supplied no id; `None` disables generation.
    pub fn create(&self, mut data: Record, ids: Option<&dyn IdGenerator>) -> Result<Record> {
        let mut row = Record::new();
        for field in self.model.fields() {
            let supplied = data
                .remove(field.name())
                .filter(|v| !(v.is_null() && field.is_required()));
            let value = match supplied {
                Some(value) => Some(value),
                None if field.name() == ID_FIELD => {
                    ids.map(|ids| Value::String(ids.generate(self.model.name())))
                }
                None => field.default_rule().map(DefaultValue::resolve),
            };

            match value {
                Some(value) if !value.is_null() => {
                    let value = self.input_value(field, value)?;
                    row.insert(field.column().to_string(), value);
                }
                _ if field.is_required() => {
                    return Err(AdapterError::MissingRequiredField {
                        model: self.model.name().to_string(),
                        field: field.name().to_string(),
                    });
                }
                Some(_) => {
                    row.insert(field.column().to_string(), Value::Null);
                }
                None => {}
            }
        }
        self.drop_undeclared(data.keys());
        Ok(row)
    }

    /// Storage patch for an update: supplied declared fields only.
    pub fn update(&self, data: Record) -> Result<Record> {
        let mut patch = Record::new();
        for (name, value) in data {
            let Some(field) = self.model.get_field(&name) else {
                self.drop_undeclared(std::iter::once(&name));
                continue;
            };
            if field.name() == ID_FIELD {
                return Err(self.invalid(field, "the id of a record cannot be updated"));
            }
            let value = if value.is_null() {
                if field.is_required() {
                    return Err(self.invalid(field, "required field cannot be set to null"));
                }
                Value::Null
            } else {
                self.input_value(field, value)?
            };
            patch.insert(field.column().to_string(), value);
        }
        Ok(patch)
    }

    fn input_value(&self, field: &FieldDef, value: Value) -> Result<Value> {
        let value = coerce::normalize(field.field_type(), value)
            .map_err(|reason| self.invalid(field, &reason))?;
        Ok(coerce::to_storage(field.field_type(), value, self.caps))
    }

    fn invalid(&self, field: &FieldDef, reason: &str) -> AdapterError {
        AdapterError::InvalidValue {
            model: self.model.name().to_string(),
            field: field.name().to_string(),
            reason: reason.to_string(),
        }
    }

    fn drop_undeclared<'k>(&self, keys: impl Iterator<Item = &'k String>) {
        for key in keys {
            trace!(model = self.model.name(), field = %key, "dropping undeclared field");
        }
    }

    /// Where clause over storage names with coerced values.
    pub fn filter(&self, filter: &Where) -> Result<Where> {
        filter.iter().map(|p| self.predicate(p)).collect()
    }

    fn predicate(&self, predicate: &Predicate) -> Result<Predicate> {
        let field = self.model.resolve(predicate.field())?;
        let operator = predicate.operator();
        let field_type = field.field_type();

        if operator.is_text() {
            if field_type != crate::schema::FieldType::String {
                return Err(AdapterError::InvalidPredicate {
                    field: field.name().to_string(),
                    reason: format!("{operator} needs a string field, {} is {field_type}", field.name()),
                });
            }
            if !predicate.value().is_string() {
                return Err(AdapterError::InvalidPredicate {
                    field: field.name().to_string(),
                    reason: format!("{operator} needs a string value"),
                });
            }
        }

        // the backend reports these as unsupported; keep the value untouched
        if operator.is_range() && field_type.is_array() {
            return Ok(predicate.rebind(field.column(), predicate.value().clone()));
        }

        let value = match (operator, predicate.value()) {
            (Operator::IsNull | Operator::IsNotNull, _) => Value::Null,
            (_, Value::Null) => Value::Null,
            (Operator::In | Operator::NotIn, Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| self.where_value(field, item))
                    .collect::<Result<_>>()?,
            ),
            (_, value) => self.where_value(field, value)?,
        };
        Ok(predicate.rebind(field.column(), value))
    }

    fn where_value(&self, field: &FieldDef, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let value = coerce::normalize(field.field_type(), value.clone()).map_err(|reason| {
            AdapterError::InvalidPredicate {
                field: field.name().to_string(),
                reason,
            }
        })?;
        Ok(coerce::to_storage(field.field_type(), value, self.caps))
    }

    pub fn sort(&self, sort: &SortSpec) -> Result<SortSpec> {
        let field = self.model.resolve(&sort.field)?;
        Ok(SortSpec {
            field: field.column().to_string(),
            direction: sort.direction,
        })
    }

    /// Reject projections naming unknown fields before touching storage.
    pub fn check_select(&self, select: Option<&Select>) -> Result<()> {
        if let Some(select) = select {
            for name in &select.fields {
                self.model.resolve(name)?;
            }
        }
        Ok(())
    }

    /// Logical record for a stored row.
    ///
    /// Without a projection every returned field is emitted; with one, the
    /// selected fields plus the id (unless excluded), hidden fields included.
    /// Fields absent from the row come back as `null`.
    pub fn output(&self, mut row: Record, select: Option<&Select>) -> Record {
        let mut out = Record::new();
        for field in self.model.fields() {
            let wanted = match select {
                Some(select) if field.name() == ID_FIELD => {
                    !select.exclude_id || select.contains(ID_FIELD)
                }
                Some(select) => select.contains(field.name()),
                None => field.is_returned(),
            };
            if !wanted {
                continue;
            }
            let value = row.remove(field.column()).unwrap_or(Value::Null);
            out.insert(
                field.name().to_string(),
                coerce::from_storage(field.field_type(), value),
            );
        }
        out
    }
}
