//! ModelRepository - typed access to one model through an [`Adapter`].

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Adapter;
use crate::error::{AdapterError, Result};
use crate::query::{FindMany, Predicate, Where};
use crate::record::{Record, Value};

/// A Rust type stored as a registered model.
///
/// `Option` fields serialized as `null` are left out on create so the
/// model's defaults and id generation still apply.
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    /// Logical model name in the schema (e.g. `"user"`, `"rateLimit"`).
    const MODEL: &'static str;
}

/// Typed repository wrapper for accessing models of a specific type.
pub struct ModelRepository<'a, M> {
    adapter: &'a Adapter,
    _marker: PhantomData<M>,
}

impl<'a, M: Model> ModelRepository<'a, M> {
    pub fn new(adapter: &'a Adapter) -> Self {
        Self {
            adapter,
            _marker: PhantomData,
        }
    }

    /// Insert a new model and return it as stored.
    pub async fn create(&self, model: &M) -> Result<M> {
        let mut data = to_record(model)?;
        data.retain(|_, value| !value.is_null());
        let stored = self.adapter.create(M::MODEL, data).await?;
        from_record(stored)
    }

    /// Get a model by id.
    pub async fn get(&self, id: &str) -> Result<Option<M>> {
        self.find_one(&Predicate::eq("id", id).into()).await
    }

    pub async fn find_one(&self, filter: &Where) -> Result<Option<M>> {
        self.adapter
            .find_one(M::MODEL, filter, None)
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn find_many(&self, query: FindMany) -> Result<Vec<M>> {
        self.adapter
            .find_many(M::MODEL, query)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub async fn count(&self, filter: &Where) -> Result<u64> {
        self.adapter.count(M::MODEL, filter).await
    }

    /// Apply a partial update to the first match.
    pub async fn update(&self, filter: &Where, patch: Record) -> Result<Option<M>> {
        self.adapter
            .update(M::MODEL, filter, patch)
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn delete(&self, filter: &Where) -> Result<()> {
        self.adapter.delete(M::MODEL, filter).await
    }
}

fn to_record<M: Serialize>(model: &M) -> Result<Record> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(map),
        _ => Err(AdapterError::Serialization(
            "model must serialize to an object".to_string(),
        )),
    }
}

fn from_record<M: DeserializeOwned>(record: Record) -> Result<M> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Extension trait for typed model access on an adapter.
pub trait ModelsExt {
    /// Get a typed model repository.
    fn models<M: Model>(&self) -> ModelRepository<'_, M>;
}

impl ModelsExt for Adapter {
    fn models<M: Model>(&self) -> ModelRepository<'_, M> {
        ModelRepository::new(self)
    }
}
