//! Adapter - the uniform operation set business logic runs against.
//!
//! An [`Adapter`] owns one backend and applies the transform pipeline around
//! every call, so the same code behaves identically on every storage engine.
//!
//! ## Example
//!
//! ```
//! use sourced_adapter::{record, schema::builtin, Adapter, MemoryBackend, Predicate};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let adapter = Adapter::builder(builtin::auth_schema()?, MemoryBackend::new()).build();
//!
//! let user = adapter
//!     .create("user", record! { "name": "Ada", "email": "ada@x.com" })
//!     .await?;
//! let found = adapter
//!     .find_one("user", &Predicate::eq("email", "ada@x.com").into(), None)
//!     .await?;
//! assert_eq!(found.unwrap()["id"], user["id"]);
//! # Ok::<(), sourced_adapter::AdapterError>(())
//! # }).unwrap();
//! ```

mod factory;
pub mod singleton;
mod typed;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

pub use factory::{AdapterBuilder, AdapterOptions};
pub use typed::{Model, ModelRepository, ModelsExt};

use crate::backend::{self, Backend, Transaction};
use crate::error::{AdapterError, Result};
use crate::query::{FindMany, Select, Where};
use crate::record::Record;
use crate::schema::{ModelDef, Schema};
use crate::transform::{IdGenerator, Transform};

/// Handle to one backend plus the schema and transform pipeline.
///
/// Clones share everything; an adapter is never mutated after it is built.
#[derive(Clone)]
pub struct Adapter {
    schema: Arc<Schema>,
    backend: Arc<dyn Backend>,
    ids: Arc<dyn IdGenerator>,
    options: Arc<AdapterOptions>,
    timeout: Option<Duration>,
    in_transaction: bool,
}

impl Adapter {
    pub fn builder<B>(schema: impl Into<Arc<Schema>>, backend: B) -> AdapterBuilder
    where
        B: Backend + 'static,
    {
        AdapterBuilder::new(schema.into(), Arc::new(backend))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// True inside a native transaction opened by [`Adapter::run_in_transaction`].
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Same adapter with a per-operation deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self.clone()
        }
    }

    fn transform<'a>(&self, model: &'a ModelDef) -> Transform<'a> {
        Transform::new(model, self.backend.capabilities())
    }

    pub async fn create(&self, model: &str, data: Record) -> Result<Record> {
        self.run("create", model, async {
            let def = self.schema.model(model)?;
            let t = self.transform(def);
            let ids = (!self.options.disable_id_generation).then_some(self.ids.as_ref());
            let row = t.create(data, ids)?;
            let stored = self.backend.insert(def.table(), row).await?;
            Ok(t.output(stored, None))
        })
        .await
    }

    /// First match in natural order, or `None`.
    pub async fn find_one(
        &self,
        model: &str,
        filter: &Where,
        select: Option<&Select>,
    ) -> Result<Option<Record>> {
        self.run("find_one", model, async {
            let def = self.schema.model(model)?;
            let t = self.transform(def);
            t.check_select(select)?;
            let filter = t.filter(filter)?;
            let row = self.backend.select_one(def.table(), &filter).await?;
            Ok(row.map(|row| t.output(row, select)))
        })
        .await
    }

    pub async fn find_many(&self, model: &str, query: FindMany) -> Result<Vec<Record>> {
        self.run("find_many", model, async {
            let def = self.schema.model(model)?;
            let t = self.transform(def);
            t.check_select(query.select.as_ref())?;
            let filter = t.filter(&query.filter)?;
            let sort = query.sort_by.as_ref().map(|s| t.sort(s)).transpose()?;
            let window = query.page.resolve(self.options.default_limit);
            let rows = self
                .backend
                .select(def.table(), &filter, sort.as_ref(), window)
                .await?;
            Ok(rows
                .into_iter()
                .map(|row| t.output(row, query.select.as_ref()))
                .collect())
        })
        .await
    }

    pub async fn count(&self, model: &str, filter: &Where) -> Result<u64> {
        self.run("count", model, async {
            let def = self.schema.model(model)?;
            let filter = self.transform(def).filter(filter)?;
            self.backend.count(def.table(), &filter).await
        })
        .await
    }

    /// Update the first match and return it as stored afterwards.
    pub async fn update(&self, model: &str, filter: &Where, data: Record) -> Result<Option<Record>> {
        self.run("update", model, async {
            let def = self.schema.model(model)?;
            let t = self.transform(def);
            let filter = t.filter(filter)?;
            let patch = t.update(data)?;
            let row = self.backend.update_one(def.table(), &filter, patch).await?;
            Ok(row.map(|row| t.output(row, None)))
        })
        .await
    }

    pub async fn update_many(&self, model: &str, filter: &Where, data: Record) -> Result<u64> {
        self.run("update_many", model, async {
            let def = self.schema.model(model)?;
            let t = self.transform(def);
            let filter = t.filter(filter)?;
            let patch = t.update(data)?;
            self.backend.update_many(def.table(), &filter, patch).await
        })
        .await
    }

    /// Remove every match. Nothing matching is not an error.
    pub async fn delete(&self, model: &str, filter: &Where) -> Result<()> {
        self.run("delete", model, async {
            let def = self.schema.model(model)?;
            let filter = self.transform(def).filter(filter)?;
            self.backend.delete_many(def.table(), &filter).await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_many(&self, model: &str, filter: &Where) -> Result<u64> {
        self.run("delete_many", model, async {
            let def = self.schema.model(model)?;
            let filter = self.transform(def).filter(filter)?;
            self.backend.delete_many(def.table(), &filter).await
        })
        .await
    }

    /// Run `f` inside a native transaction when the backend has one.
    ///
    /// `Ok` commits and `Err` rolls back. Backends without transactions run
    /// `f` against this adapter directly; nested calls reuse the open
    /// transaction.
    ///
    /// Only the adapter handed to `f` sees the transaction. On SQLite the
    /// connection is pinned until `f` returns, so calls through `self` from
    /// inside `f` wait for it.
    pub async fn run_in_transaction<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Adapter) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AdapterError>,
    {
        if self.in_transaction {
            return f(self.clone()).await;
        }
        let backend = self.backend.id();
        let tx = self
            .backend
            .begin()
            .await
            .map_err(|err| err.in_context(backend, "begin", "*"))?;
        let Some(tx) = tx else {
            debug!(backend, "backend has no transactions, running without one");
            return f(self.clone()).await;
        };

        let scoped = Adapter {
            backend: tx.backend(),
            in_transaction: true,
            ..self.clone()
        };
        match f(scoped).await {
            Ok(value) => {
                finish(tx, true)
                    .await
                    .map_err(|err| err.in_context(backend, "commit", "*"))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = finish(tx, false).await {
                    warn!(backend, error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn run<T, Fut>(&self, operation: &'static str, model: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = match self.timeout {
            Some(limit) => {
                let id = backend::next_operation();
                match tokio::time::timeout(limit, backend::scoped(id, fut)).await {
                    Ok(result) => result,
                    Err(_) => {
                        self.backend.interrupt(id);
                        Err(AdapterError::Cancelled {
                            operation: operation.to_string(),
                            model: model.to_string(),
                        })
                    }
                }
            }
            None => fut.await,
        };
        let result = result.map_err(|err| err.in_context(self.backend.id(), operation, model));
        self.log(operation, model, started, &result);
        result
    }

    fn log<T>(&self, operation: &str, model: &str, started: Instant, result: &Result<T>) {
        let backend = self.backend.id();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match (result, self.options.debug_logs) {
            (Ok(_), true) => info!(backend, model, operation, elapsed_ms, "adapter operation"),
            (Ok(_), false) => trace!(backend, model, operation, elapsed_ms, "adapter operation"),
            (Err(err), true) => {
                info!(backend, model, operation, elapsed_ms, error = %err, "adapter operation failed")
            }
            (Err(err), false) => {
                debug!(backend, model, operation, elapsed_ms, error = %err, "adapter operation failed")
            }
        }
    }
}

async fn finish(tx: Box<dyn Transaction>, commit: bool) -> Result<()> {
    if commit {
        tx.commit().await
    } else {
        tx.rollback().await
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("backend", &self.backend.id())
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}
