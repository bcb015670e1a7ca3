//! DocumentBackend - JSON documents in redb, one table per model.
//!
//! redb has no query language, so every read scans the table and filters
//! with [`crate::query::eval`]. Each document is stored next to an insertion
//! sequence number that defines the natural order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;

use super::memory::check_unique;
use super::{Backend, Capabilities};
use crate::error::{AdapterError, Result};
use crate::query::eval::{self, Evaluator};
use crate::query::{SortSpec, Where, Window};
use crate::record::{Record, Value};
use crate::schema::{Schema, Table};

const ID: &str = "document";

/// Next insertion sequence per table.
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("__sequences");

fn documents(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    seq: u64,
    doc: Record,
}

struct Stored {
    key: String,
    seq: u64,
    doc: Record,
}

/// redb-backed document store. Cheap to clone; clones share the database.
#[derive(Clone)]
pub struct DocumentBackend {
    db: Arc<Database>,
}

impl DocumentBackend {
    /// Open or create a database file and create a table per model.
    pub fn open(path: impl AsRef<Path>, schema: &Schema) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(AdapterError::storage)?;
        debug!(path = %path.as_ref().display(), "opened document database");
        Self::with_database(db, schema)
    }

    /// Database living only in memory.
    pub fn open_in_memory(schema: &Schema) -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(AdapterError::storage)?;
        Self::with_database(db, schema)
    }

    fn with_database(db: Database, schema: &Schema) -> Result<Self> {
        let txn = db.begin_write().map_err(AdapterError::storage)?;
        {
            txn.open_table(SEQUENCES).map_err(AdapterError::storage)?;
            for table in schema.tables() {
                txn.open_table(documents(&table.name))
                    .map_err(AdapterError::storage)?;
                debug!(table = %table.name, "ensured document table");
            }
        }
        txn.commit().map_err(AdapterError::storage)?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        task::spawn_blocking(move || f(&db))
            .await
            .map_err(AdapterError::storage)?
    }

    /// Documents of `table` in insertion order; a missing table is empty.
    fn load(db: &Database, table: &str) -> Result<Vec<Stored>> {
        let txn = db.begin_read().map_err(AdapterError::storage)?;
        let docs = match txn.open_table(documents(table)) {
            Ok(docs) => docs,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(AdapterError::storage(err)),
        };
        scan(&docs)
    }

    fn matching(table: &Table, stored: &[Stored], filter: &Where) -> Result<Vec<usize>> {
        let evaluator = Evaluator::new(table, filter, ID)?;
        Ok(stored
            .iter()
            .enumerate()
            .filter(|(_, s)| evaluator.matches(&s.doc))
            .map(|(i, _)| i)
            .collect())
    }

    /// Patch the documents at `targets` in one write transaction.
    fn write_patch(
        db: &Database,
        table: &Table,
        filter: &Where,
        patch: &Record,
        first_only: bool,
    ) -> Result<Vec<Record>> {
        let txn = db.begin_write().map_err(AdapterError::storage)?;
        let updated = {
            let mut docs = txn
                .open_table(documents(&table.name))
                .map_err(AdapterError::storage)?;
            let stored = scan(&docs)?;
            let mut targets = Self::matching(table, &stored, filter)?;
            if first_only {
                targets.truncate(1);
            }

            let mut rows: Vec<Record> = stored.iter().map(|s| s.doc.clone()).collect();
            for &i in &targets {
                for (key, value) in patch {
                    rows[i].insert(key.clone(), value.clone());
                }
            }
            for &i in &targets {
                check_unique(table, &rows, &rows[i], Some(i))?;
            }

            let mut updated = Vec::with_capacity(targets.len());
            for &i in &targets {
                let bytes = encode(stored[i].seq, &rows[i])?;
                docs.insert(stored[i].key.as_str(), bytes.as_slice())
                    .map_err(AdapterError::storage)?;
                updated.push(rows[i].clone());
            }
            updated
        };
        txn.commit().map_err(AdapterError::storage)?;
        Ok(updated)
    }
}

fn scan(docs: &impl ReadableTable<&'static str, &'static [u8]>) -> Result<Vec<Stored>> {
    let mut stored = Vec::new();
    for entry in docs.iter().map_err(AdapterError::storage)? {
        let (key, value) = entry.map_err(AdapterError::storage)?;
        let envelope: Envelope = serde_json::from_slice(value.value())?;
        stored.push(Stored {
            key: key.value().to_string(),
            seq: envelope.seq,
            doc: envelope.doc,
        });
    }
    stored.sort_by_key(|s| s.seq);
    Ok(stored)
}

fn encode(seq: u64, doc: &Record) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&Envelope {
        seq,
        doc: doc.clone(),
    })?)
}

fn document_key(table: &Table, row: &Record) -> Result<String> {
    match row.get(&table.id) {
        Some(Value::String(id)) => Ok(id.clone()),
        _ => Err(AdapterError::storage(format!(
            "document in {} has no string {}",
            table.name, table.id
        ))),
    }
}

#[async_trait]
impl Backend for DocumentBackend {
    fn id(&self) -> &'static str {
        ID
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn insert(&self, table: &Table, row: Record) -> Result<Record> {
        let table = table.clone();
        self.blocking(move |db| {
            let key = document_key(&table, &row)?;
            let txn = db.begin_write().map_err(AdapterError::storage)?;
            {
                let mut docs = txn
                    .open_table(documents(&table.name))
                    .map_err(AdapterError::storage)?;
                let existing: Vec<Record> = scan(&docs)?.into_iter().map(|s| s.doc).collect();
                check_unique(&table, &existing, &row, None)?;

                let mut sequences = txn.open_table(SEQUENCES).map_err(AdapterError::storage)?;
                let seq = sequences
                    .get(table.name.as_str())
                    .map_err(AdapterError::storage)?
                    .map(|guard| guard.value())
                    .unwrap_or(0);
                sequences
                    .insert(table.name.as_str(), seq + 1)
                    .map_err(AdapterError::storage)?;

                let bytes = encode(seq, &row)?;
                docs.insert(key.as_str(), bytes.as_slice())
                    .map_err(AdapterError::storage)?;
            }
            txn.commit().map_err(AdapterError::storage)?;
            Ok(row)
        })
        .await
    }

    async fn select_one(&self, table: &Table, filter: &Where) -> Result<Option<Record>> {
        let table = table.clone();
        let filter = filter.clone();
        self.blocking(move |db| {
            let evaluator = Evaluator::new(&table, &filter, ID)?;
            Ok(Self::load(db, &table.name)?
                .into_iter()
                .map(|s| s.doc)
                .find(|doc| evaluator.matches(doc)))
        })
        .await
    }

    async fn select(
        &self,
        table: &Table,
        filter: &Where,
        sort: Option<&SortSpec>,
        window: Window,
    ) -> Result<Vec<Record>> {
        let table = table.clone();
        let filter = filter.clone();
        let sort = sort.cloned();
        self.blocking(move |db| {
            let evaluator = Evaluator::new(&table, &filter, ID)?;
            let mut found: Vec<Record> = Self::load(db, &table.name)?
                .into_iter()
                .map(|s| s.doc)
                .filter(|doc| evaluator.matches(doc))
                .collect();
            if let Some(sort) = &sort {
                eval::sort_rows(&mut found, sort);
            }
            Ok(window.apply(found))
        })
        .await
    }

    async fn count(&self, table: &Table, filter: &Where) -> Result<u64> {
        let table = table.clone();
        let filter = filter.clone();
        self.blocking(move |db| {
            let stored = Self::load(db, &table.name)?;
            Ok(Self::matching(&table, &stored, &filter)?.len() as u64)
        })
        .await
    }

    async fn update_one(
        &self,
        table: &Table,
        filter: &Where,
        patch: Record,
    ) -> Result<Option<Record>> {
        let table = table.clone();
        let filter = filter.clone();
        self.blocking(move |db| {
            Ok(Self::write_patch(db, &table, &filter, &patch, true)?.pop())
        })
        .await
    }

    async fn update_many(&self, table: &Table, filter: &Where, patch: Record) -> Result<u64> {
        let table = table.clone();
        let filter = filter.clone();
        self.blocking(move |db| {
            Ok(Self::write_patch(db, &table, &filter, &patch, false)?.len() as u64)
        })
        .await
    }

    async fn delete_many(&self, table: &Table, filter: &Where) -> Result<u64> {
        let table = table.clone();
        let filter = filter.clone();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(AdapterError::storage)?;
            let removed = {
                let mut docs = txn
                    .open_table(documents(&table.name))
                    .map_err(AdapterError::storage)?;
                let stored = scan(&docs)?;
                let targets = Self::matching(&table, &stored, &filter)?;
                for &i in &targets {
                    docs.remove(stored[i].key.as_str())
                        .map_err(AdapterError::storage)?;
                }
                targets.len() as u64
            };
            txn.commit().map_err(AdapterError::storage)?;
            Ok(removed)
        })
        .await
    }
}

impl std::fmt::Debug for DocumentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBackend").finish_non_exhaustive()
    }
}
