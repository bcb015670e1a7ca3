//! Backend translators.
//!
//! A backend receives storage names only (tables, columns, already-coerced
//! values) and executes the query IR against one storage technology. The
//! adapter layers schema transforms on top, so every backend stays a thin
//! translator.
//!
//! - [`MemoryBackend`]: reference implementation, the conformance oracle.
//! - `SqliteBackend` (feature `sqlite`): compiles the IR into parameterized SQL.
//! - `DocumentBackend` (feature `document`): JSON documents in redb,
//!   post-filtered with [`crate::query::eval`].

#[cfg(feature = "document")]
mod document;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::query::{SortSpec, Where, Window};
use crate::record::Record;
use crate::schema::Table;

#[cfg(feature = "document")]
pub use document::DocumentBackend;
pub use memory::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::{Query, SqliteBackend};

tokio::task_local! {
    static OPERATION: u64;
}

static NEXT_OPERATION: AtomicU64 = AtomicU64::new(1);

/// Id of the deadline-bound adapter operation running on this task.
///
/// Backends that can interrupt native calls record it while they own their
/// connection, so [`Backend::interrupt`] only ever stops that operation.
pub fn current_operation() -> Option<u64> {
    OPERATION.try_with(|id| *id).ok()
}

/// Fresh operation id, never `0`.
pub(crate) fn next_operation() -> u64 {
    NEXT_OPERATION.fetch_add(1, Ordering::Relaxed)
}

/// Run `fut` with [`current_operation`] returning `id`.
pub(crate) async fn scoped<F: Future>(id: u64, fut: F) -> F::Output {
    OPERATION.scope(id, fut).await
}

/// What a backend stores natively. The adapter coerces everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Without native booleans they are stored as `0` / `1`.
    pub booleans: bool,
    /// Without native arrays they are stored as JSON text.
    pub arrays: bool,
    pub transactions: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            booleans: true,
            arrays: true,
            transactions: false,
        }
    }
}

/// Low-level primitive every storage technology implements.
///
/// Semantics are fixed by [`crate::query::eval`]; a backend that cannot
/// express an operator natively must emulate it, never drop it.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short identifier used in logs and errors.
    fn id(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &Table, row: Record) -> Result<Record>;

    /// First matching row in natural (insertion) order.
    async fn select_one(&self, table: &Table, filter: &Where) -> Result<Option<Record>>;

    async fn select(
        &self,
        table: &Table,
        filter: &Where,
        sort: Option<&SortSpec>,
        window: Window,
    ) -> Result<Vec<Record>>;

    async fn count(&self, table: &Table, filter: &Where) -> Result<u64>;

    /// Patch the first matching row and return it after the update.
    async fn update_one(&self, table: &Table, filter: &Where, patch: Record)
        -> Result<Option<Record>>;

    async fn update_many(&self, table: &Table, filter: &Where, patch: Record) -> Result<u64>;

    /// Remove every matching row and return how many went away.
    async fn delete_many(&self, table: &Table, filter: &Where) -> Result<u64>;

    /// Open a native transaction. `None` when the backend has none.
    async fn begin(&self) -> Result<Option<Box<dyn Transaction>>> {
        Ok(None)
    }

    /// The deadline of `operation` elapsed. Abort its native call if it is
    /// the one currently running; calls of other operations must survive.
    fn interrupt(&self, _operation: u64) {}
}

/// A native transaction and the backend bound to it.
#[async_trait]
pub trait Transaction: Send {
    fn backend(&self) -> Arc<dyn Backend>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
