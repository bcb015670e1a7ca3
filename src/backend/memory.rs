//! MemoryBackend - in-process tables for tests, development, and as the
//! reference every other backend is checked against.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{Backend, Capabilities};
use crate::error::{AdapterError, Result};
use crate::query::eval::{self, Evaluator};
use crate::query::{SortSpec, Where, Window};
use crate::record::Record;
use crate::schema::Table;

const ID: &str = "memory";

/// In-memory backend keyed by table name.
///
/// Rows keep insertion order, which is the natural order for `select_one`
/// and for sort ties. Clone-friendly via Arc; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    storage: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every row currently stored in `table` (storage names).
    pub fn rows(&self, table: &str) -> Result<Vec<Record>> {
        Ok(self.read()?.get(table).cloned().unwrap_or_default())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Record>>>> {
        self.storage
            .read()
            .map_err(|_| AdapterError::storage("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Record>>>> {
        self.storage
            .write()
            .map_err(|_| AdapterError::storage("memory store lock poisoned"))
    }

    fn matching(table: &Table, rows: &[Record], filter: &Where) -> Result<Vec<usize>> {
        let evaluator = Evaluator::new(table, filter, ID)?;
        Ok(rows
            .iter()
            .enumerate()
            .filter(|(_, row)| evaluator.matches(row))
            .map(|(i, _)| i)
            .collect())
    }

    /// Apply `patch` to the rows at `targets`, all or nothing.
    fn patch_rows(
        table: &Table,
        rows: &mut Vec<Record>,
        targets: &[usize],
        patch: &Record,
    ) -> Result<()> {
        let mut next = rows.clone();
        for &i in targets {
            for (key, value) in patch {
                next[i].insert(key.clone(), value.clone());
            }
        }
        for &i in targets {
            check_unique(table, &next, &next[i], Some(i))?;
        }
        *rows = next;
        Ok(())
    }
}

/// Reject `candidate` if it repeats a non-null unique value of another row.
pub(crate) fn check_unique(
    table: &Table,
    rows: &[Record],
    candidate: &Record,
    skip: Option<usize>,
) -> Result<()> {
    for column in table.unique_columns() {
        let value = match candidate.get(&column.name) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };
        let taken = rows.iter().enumerate().any(|(i, row)| {
            Some(i) != skip
                && row
                    .get(&column.name)
                    .is_some_and(|other| eval::values_equal(other, value))
        });
        if taken {
            return Err(AdapterError::ConstraintViolation {
                model: table.name.clone(),
                message: format!("duplicate value {} for unique column {}", value, column.name),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Backend for MemoryBackend {
    fn id(&self) -> &'static str {
        ID
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn insert(&self, table: &Table, row: Record) -> Result<Record> {
        let mut storage = self.write()?;
        let rows = storage.entry(table.name.clone()).or_default();
        check_unique(table, rows, &row, None)?;
        rows.push(row.clone());
        Ok(row)
    }

    async fn select_one(&self, table: &Table, filter: &Where) -> Result<Option<Record>> {
        let storage = self.read()?;
        let evaluator = Evaluator::new(table, filter, ID)?;
        let Some(rows) = storage.get(&table.name) else {
            return Ok(None);
        };
        Ok(rows.iter().find(|row| evaluator.matches(row)).cloned())
    }

    async fn select(
        &self,
        table: &Table,
        filter: &Where,
        sort: Option<&SortSpec>,
        window: Window,
    ) -> Result<Vec<Record>> {
        let storage = self.read()?;
        let evaluator = Evaluator::new(table, filter, ID)?;
        let mut found: Vec<Record> = storage
            .get(&table.name)
            .map(|rows| rows.iter().filter(|row| evaluator.matches(row)).cloned().collect())
            .unwrap_or_default();
        drop(storage);

        if let Some(sort) = sort {
            eval::sort_rows(&mut found, sort);
        }
        Ok(window.apply(found))
    }

    async fn count(&self, table: &Table, filter: &Where) -> Result<u64> {
        let storage = self.read()?;
        let evaluator = Evaluator::new(table, filter, ID)?;
        let count = storage
            .get(&table.name)
            .map(|rows| rows.iter().filter(|row| evaluator.matches(row)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn update_one(
        &self,
        table: &Table,
        filter: &Where,
        patch: Record,
    ) -> Result<Option<Record>> {
        let mut storage = self.write()?;
        let Some(rows) = storage.get_mut(&table.name) else {
            return Ok(None);
        };
        let Some(&first) = Self::matching(table, rows, filter)?.first() else {
            return Ok(None);
        };
        Self::patch_rows(table, rows, &[first], &patch)?;
        Ok(Some(rows[first].clone()))
    }

    async fn update_many(&self, table: &Table, filter: &Where, patch: Record) -> Result<u64> {
        let mut storage = self.write()?;
        let Some(rows) = storage.get_mut(&table.name) else {
            return Ok(0);
        };
        let targets = Self::matching(table, rows, filter)?;
        Self::patch_rows(table, rows, &targets, &patch)?;
        Ok(targets.len() as u64)
    }

    async fn delete_many(&self, table: &Table, filter: &Where) -> Result<u64> {
        let mut storage = self.write()?;
        let Some(rows) = storage.get_mut(&table.name) else {
            return Ok(0);
        };
        let evaluator = Evaluator::new(table, filter, ID)?;
        let before = rows.len();
        rows.retain(|row| !evaluator.matches(row));
        Ok((before - rows.len()) as u64)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.storage.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("MemoryBackend").field("tables", &tables).finish()
    }
}
