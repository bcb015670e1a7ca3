//! Portable, schema-driven data access for auth services.
//!
//! Business logic talks to an [`Adapter`]; the adapter maps logical models
//! and fields onto whatever a [`Backend`] stores, and every backend honours
//! the same filter, sort and pagination semantics.

pub mod adapter;
pub mod backend;
mod config;
mod error;
mod flight;
pub mod query;
mod record;
pub mod schema;
mod transform;

pub use adapter::{
    Adapter, AdapterBuilder, AdapterOptions, Model, ModelRepository, ModelsExt,
};
#[cfg(feature = "document")]
pub use backend::DocumentBackend;
#[cfg(feature = "sqlite")]
pub use backend::SqliteBackend;
pub use backend::{Backend, Capabilities, MemoryBackend, Transaction};
pub use config::{AdapterConfig, BackendConfig};
pub use error::{AdapterError, Result};
pub use flight::{RetryPolicy, SingleFlight};
pub use query::{
    Connector, Direction, FindMany, Operator, Page, Predicate, Select, SortSpec, Where, Window,
};
pub use record::{format_date, now, Record, Value};
pub use schema::{
    Column, DefaultValue, FieldDef, FieldType, ModelDef, OnDelete, Reference, Schema,
    SchemaBuilder, Table,
};
pub use transform::{IdGenerator, RandomId, Transform};

// `record!` expands to `$crate::serde_json::json!`.
#[doc(hidden)]
pub use serde_json;
