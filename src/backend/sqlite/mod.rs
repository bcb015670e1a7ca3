//! SqliteBackend - the query IR compiled to parameterized SQL over rusqlite.
//!
//! One connection serves the backend. Calls run on tokio's blocking pool
//! while holding the connection lock; a transaction pins the connection
//! until it commits, rolls back or is dropped. The connection records which
//! deadline-bound operation is using it, and only that one is interrupted.

mod builder;

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, InterruptHandle};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task;
use tracing::{debug, warn};

pub use builder::Query;

use super::{current_operation, Backend, Capabilities, Transaction};
use crate::error::{AdapterError, Result};
use crate::query::{SortSpec, Where, Window};
use crate::record::Record;
use crate::schema::{Schema, Table};

const ID: &str = "sqlite";

type Pinned = Arc<Mutex<Option<OwnedMutexGuard<Connection>>>>;

#[derive(Clone)]
enum Handle {
    Shared(Arc<Mutex<Connection>>),
    /// Connection held by an open transaction. `None` once it finished.
    Pinned(Pinned),
}

/// SQLite backend (bundled library).
///
/// Booleans are stored as `0` / `1` and arrays as JSON text; the adapter
/// coerces both. Tables and unique indexes are created on open.
#[derive(Clone)]
pub struct SqliteBackend {
    handle: Handle,
    shared: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    /// Operation id running on the connection, `0` when none.
    owner: Arc<StdMutex<u64>>,
}

impl SqliteBackend {
    /// Open or create a database file and ensure every table of `schema`.
    pub fn open(path: impl AsRef<Path>, schema: &Schema) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(AdapterError::storage)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(AdapterError::storage)?;
        debug!(path = %path.as_ref().display(), "opened sqlite database");
        Self::with_connection(conn, schema)
    }

    /// Private in-memory database, gone when the backend drops.
    pub fn open_in_memory(schema: &Schema) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(AdapterError::storage)?;
        Self::with_connection(conn, schema)
    }

    fn with_connection(conn: Connection, schema: &Schema) -> Result<Self> {
        for table in schema.tables() {
            for statement in Query::create_table(table) {
                conn.execute_batch(&statement).map_err(AdapterError::storage)?;
            }
            debug!(table = %table.name, columns = table.columns.len(), "ensured sqlite table");
        }
        let interrupt = Arc::new(conn.get_interrupt_handle());
        let shared = Arc::new(Mutex::new(conn));
        Ok(Self {
            handle: Handle::Shared(shared.clone()),
            shared,
            interrupt,
            owner: Arc::default(),
        })
    }

    fn pinned(&self, slot: Pinned) -> Self {
        Self {
            handle: Handle::Pinned(slot),
            shared: self.shared.clone(),
            interrupt: self.interrupt.clone(),
            owner: self.owner.clone(),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let operation = current_operation().unwrap_or(0);
        let owner = self.owner.clone();
        match &self.handle {
            Handle::Shared(conn) => {
                let mut conn = conn.clone().lock_owned().await;
                task::spawn_blocking(move || {
                    let _claim = Claim::new(&owner, operation);
                    discard_abandoned_transaction(&conn)?;
                    f(&mut *conn)
                })
                .await
                .map_err(AdapterError::storage)?
            }
            Handle::Pinned(slot) => {
                let mut slot = slot.clone().lock_owned().await;
                task::spawn_blocking(move || {
                    let _claim = Claim::new(&owner, operation);
                    match slot.as_mut() {
                        Some(conn) => f(&mut **conn),
                        None => Err(AdapterError::storage("transaction already finished")),
                    }
                })
                .await
                .map_err(AdapterError::storage)?
            }
        }
    }
}

/// Marks the connection as used by `operation` until dropped.
struct Claim<'a> {
    owner: &'a StdMutex<u64>,
}

impl<'a> Claim<'a> {
    fn new(owner: &'a StdMutex<u64>, operation: u64) -> Self {
        *owner.lock().unwrap_or_else(|p| p.into_inner()) = operation;
        Self { owner }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        *self.owner.lock().unwrap_or_else(|p| p.into_inner()) = 0;
    }
}

/// A transaction whose handle was dropped mid-flight leaves the connection
/// inside `BEGIN`; roll it back before anyone else uses it.
fn discard_abandoned_transaction(conn: &Connection) -> Result<()> {
    if !conn.is_autocommit() {
        warn!("rolling back abandoned sqlite transaction");
        conn.execute_batch("ROLLBACK").map_err(AdapterError::storage)?;
    }
    Ok(())
}

fn execute(conn: &Connection, table: &Table, query: &Query) -> Result<usize> {
    tracing::trace!(sql = %query.sql, "execute");
    conn.execute(&query.sql, rusqlite::params_from_iter(query.params.iter()))
        .map_err(|err| map_err(table, err))
}

fn fetch(conn: &Connection, table: &Table, query: &Query) -> Result<Vec<Record>> {
    tracing::trace!(sql = %query.sql, "query");
    let mut stmt = conn.prepare(&query.sql).map_err(|err| map_err(table, err))?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let rows = stmt
        .query_map(rusqlite::params_from_iter(query.params.iter()), |row| {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.clone(), builder::from_sql(row.get_ref(i)?));
            }
            Ok(record)
        })
        .map_err(|err| map_err(table, err))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|err| map_err(table, err))?);
    }
    Ok(out)
}

fn scalar(conn: &Connection, table: &Table, query: &Query) -> Result<Option<i64>> {
    tracing::trace!(sql = %query.sql, "query");
    let mut stmt = conn.prepare(&query.sql).map_err(|err| map_err(table, err))?;
    let mut rows = stmt
        .query(rusqlite::params_from_iter(query.params.iter()))
        .map_err(|err| map_err(table, err))?;
    let value = match rows.next().map_err(|err| map_err(table, err))? {
        Some(row) => Some(row.get(0).map_err(|err| map_err(table, err))?),
        None => None,
    };
    Ok(value)
}

fn map_err(table: &Table, err: rusqlite::Error) -> AdapterError {
    match &err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            let message = message.clone().unwrap_or_else(|| err.to_string());
            warn!(table = %table.name, %message, "sqlite constraint violation");
            AdapterError::ConstraintViolation {
                model: table.name.clone(),
                message,
            }
        }
        _ => AdapterError::storage(err.to_string()),
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn id(&self) -> &'static str {
        ID
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            booleans: false,
            arrays: false,
            transactions: true,
        }
    }

    async fn insert(&self, table: &Table, row: Record) -> Result<Record> {
        let table = table.clone();
        let query = Query::insert(&table, &row);
        self.run(move |conn| {
            execute(conn, &table, &query)?;
            let stored = Query::by_rowid(&table, conn.last_insert_rowid());
            fetch(conn, &table, &stored)?
                .pop()
                .ok_or_else(|| AdapterError::storage("inserted row not found"))
        })
        .await
    }

    async fn select_one(&self, table: &Table, filter: &Where) -> Result<Option<Record>> {
        let window = Window {
            limit: 1,
            offset: 0,
        };
        let query = Query::select(table, filter, None, Some(window))?;
        let table = table.clone();
        self.run(move |conn| Ok(fetch(conn, &table, &query)?.pop())).await
    }

    async fn select(
        &self,
        table: &Table,
        filter: &Where,
        sort: Option<&SortSpec>,
        window: Window,
    ) -> Result<Vec<Record>> {
        let query = Query::select(table, filter, sort, Some(window))?;
        let table = table.clone();
        self.run(move |conn| fetch(conn, &table, &query)).await
    }

    async fn count(&self, table: &Table, filter: &Where) -> Result<u64> {
        let query = Query::count(table, filter)?;
        let table = table.clone();
        self.run(move |conn| Ok(scalar(conn, &table, &query)?.unwrap_or(0) as u64))
            .await
    }

    async fn update_one(
        &self,
        table: &Table,
        filter: &Where,
        patch: Record,
    ) -> Result<Option<Record>> {
        let first = Query::first_rowid(table, filter)?;
        let table = table.clone();
        self.run(move |conn| {
            let Some(rowid) = scalar(conn, &table, &first)? else {
                return Ok(None);
            };
            if let Some(update) = Query::update_rowid(&table, rowid, &patch) {
                execute(conn, &table, &update)?;
            }
            Ok(fetch(conn, &table, &Query::by_rowid(&table, rowid))?.pop())
        })
        .await
    }

    async fn update_many(&self, table: &Table, filter: &Where, patch: Record) -> Result<u64> {
        let table = table.clone();
        match Query::update(&table, filter, &patch)? {
            Some(update) => {
                self.run(move |conn| Ok(execute(conn, &table, &update)? as u64))
                    .await
            }
            None => self.count(&table, filter).await,
        }
    }

    async fn delete_many(&self, table: &Table, filter: &Where) -> Result<u64> {
        let query = Query::delete(table, filter)?;
        let table = table.clone();
        self.run(move |conn| Ok(execute(conn, &table, &query)? as u64))
            .await
    }

    async fn begin(&self) -> Result<Option<Box<dyn Transaction>>> {
        if let Handle::Pinned(_) = self.handle {
            // already inside a transaction; callers run inline
            return Ok(None);
        }
        let conn = self.shared.clone().lock_owned().await;
        let conn = task::spawn_blocking(move || {
            discard_abandoned_transaction(&conn)?;
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(AdapterError::storage)?;
            Ok::<_, AdapterError>(conn)
        })
        .await
        .map_err(AdapterError::storage)??;

        debug!("sqlite transaction started");
        let slot: Pinned = Arc::new(Mutex::new(Some(conn)));
        Ok(Some(Box::new(SqliteTransaction {
            backend: Arc::new(self.pinned(slot.clone())),
            slot,
        })))
    }

    fn interrupt(&self, operation: u64) {
        // held across the call so the owner cannot hand over meanwhile
        let owner = self.owner.lock().unwrap_or_else(|p| p.into_inner());
        if operation != 0 && *owner == operation {
            debug!(operation, "interrupting sqlite statement");
            self.interrupt.interrupt();
        }
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pinned = matches!(self.handle, Handle::Pinned(_));
        f.debug_struct("SqliteBackend")
            .field("in_transaction", &pinned)
            .finish()
    }
}

struct SqliteTransaction {
    backend: Arc<SqliteBackend>,
    slot: Pinned,
}

impl SqliteTransaction {
    async fn finish(&self, statement: &'static str) -> Result<()> {
        let conn = self.slot.lock().await.take();
        let Some(conn) = conn else {
            return Err(AdapterError::storage("transaction already finished"));
        };
        task::spawn_blocking(move || {
            let result = conn.execute_batch(statement).map_err(AdapterError::storage);
            if result.is_err() && !conn.is_autocommit() {
                let _ = conn.execute_batch("ROLLBACK");
            }
            result
        })
        .await
        .map_err(AdapterError::storage)??;
        debug!(statement, "sqlite transaction finished");
        Ok(())
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.try_lock() {
            if let Some(conn) = slot.take() {
                if !conn.is_autocommit() {
                    let _ = conn.execute_batch("ROLLBACK");
                }
            }
        }
    }
}
