//! Backend selection by configuration.
//!
//! ```
//! use sourced_adapter::{schema::builtin, AdapterConfig};
//!
//! let config = AdapterConfig::from_json_str(
//!     r#"{ "backend": { "kind": "memory" }, "options": { "default_limit": 20 } }"#,
//! )
//! .unwrap();
//! let adapter = config.connect(builtin::auth_schema().unwrap()).unwrap();
//! assert_eq!(adapter.backend_id(), "memory");
//! assert_eq!(adapter.options().default_limit, 20);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapter::{Adapter, AdapterOptions};
use crate::backend::MemoryBackend;
use crate::error::{AdapterError, Result};
use crate::schema::Schema;

/// Which storage engine to use. Without a `path`, file backends run in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    #[default]
    Memory,
    Sqlite {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Document {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub backend: BackendConfig,
    pub options: AdapterOptions,
}

impl AdapterConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AdapterError::Config(e.to_string()))
    }

    /// Open the configured backend (creating tables for `schema`) and build
    /// an adapter over it.
    pub fn connect(&self, schema: impl Into<Arc<Schema>>) -> Result<Adapter> {
        let schema = schema.into();
        let builder = match &self.backend {
            BackendConfig::Memory => Adapter::builder(schema, MemoryBackend::new()),
            #[cfg(feature = "sqlite")]
            BackendConfig::Sqlite { path } => {
                let backend = match path {
                    Some(path) => crate::backend::SqliteBackend::open(path, &schema)?,
                    None => crate::backend::SqliteBackend::open_in_memory(&schema)?,
                };
                Adapter::builder(schema, backend)
            }
            #[cfg(feature = "document")]
            BackendConfig::Document { path } => {
                let backend = match path {
                    Some(path) => crate::backend::DocumentBackend::open(path, &schema)?,
                    None => crate::backend::DocumentBackend::open_in_memory(&schema)?,
                };
                Adapter::builder(schema, backend)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(AdapterError::Config(format!(
                    "backend {other:?} is not compiled in"
                )))
            }
        };
        let adapter = builder.options(self.options.clone()).build();
        info!(backend = adapter.backend_id(), "adapter connected");
        Ok(adapter)
    }
}
