use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Adapter;
use crate::backend::Backend;
use crate::query::Page;
use crate::schema::Schema;
use crate::transform::{IdGenerator, RandomId};

/// Behaviour switches shared by every operation of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Log every operation at `info` instead of `trace`.
    pub debug_logs: bool,
    /// Leave id assignment to the caller; a create without id then fails.
    pub disable_id_generation: bool,
    /// `find_many` limit when the query has none.
    pub default_limit: usize,
    /// Deadline for each operation.
    pub timeout_ms: Option<u64>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            debug_logs: false,
            disable_id_generation: false,
            default_limit: Page::DEFAULT_LIMIT,
            timeout_ms: None,
        }
    }
}

/// Composes a schema, a backend and the transform pipeline into an [`Adapter`].
pub struct AdapterBuilder {
    schema: Arc<Schema>,
    backend: Arc<dyn Backend>,
    options: AdapterOptions,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl AdapterBuilder {
    pub(super) fn new(schema: Arc<Schema>, backend: Arc<dyn Backend>) -> Self {
        Self {
            schema,
            backend,
            options: AdapterOptions::default(),
            ids: None,
        }
    }

    pub fn options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn debug_logs(mut self, on: bool) -> Self {
        self.options.debug_logs = on;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Replace the default 32-character random ids.
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn build(self) -> Adapter {
        let timeout = self.options.timeout_ms.map(Duration::from_millis);
        Adapter {
            schema: self.schema,
            backend: self.backend,
            ids: self.ids.unwrap_or_else(|| Arc::new(RandomId::default())),
            options: Arc::new(self.options),
            timeout,
            in_transaction: false,
        }
    }
}
