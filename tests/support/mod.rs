//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sourced_adapter::schema::builtin;
use sourced_adapter::{
    Adapter, DocumentBackend, FieldDef, MemoryBackend, ModelDef, Schema, SqliteBackend,
};
use tempfile::TempDir;

/// Auth tables plus a `post` model that exercises booleans, arrays,
/// renamed columns and a foreign key.
pub fn schema() -> Arc<Schema> {
    let schema = builtin::auth_schema_builder()
        .model(
            ModelDef::new("post")
                .storage_name("blog_posts")
                .field(FieldDef::string("title").required())
                .field(
                    FieldDef::string("authorId")
                        .storage_name("author_id")
                        .references("user", "id"),
                )
                .field(FieldDef::number("score"))
                .field(FieldDef::boolean("published").default_value(false))
                .field(FieldDef::string_array("tags"))
                .field(FieldDef::date("publishedAt")),
        )
        .build()
        .expect("test schema");
    Arc::new(schema)
}

/// Ids `{model}-1`, `{model}-2`, ... so runs are comparable across backends.
pub fn sequential_ids() -> impl Fn(&str) -> String + Send + Sync + 'static {
    let next = AtomicU64::new(0);
    move |model: &str| format!("{model}-{}", next.fetch_add(1, Ordering::SeqCst) + 1)
}

/// An adapter plus whatever keeps its storage alive.
pub struct Harness {
    pub name: &'static str,
    pub adapter: Adapter,
    _dir: Option<TempDir>,
}

pub fn memory() -> Harness {
    let adapter = Adapter::builder(schema(), MemoryBackend::new())
        .id_generator(sequential_ids())
        .build();
    Harness {
        name: "memory",
        adapter,
        _dir: None,
    }
}

pub fn sqlite() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = schema();
    let backend = SqliteBackend::open(dir.path().join("auth.db"), &schema).expect("open sqlite");
    let adapter = Adapter::builder(schema, backend)
        .id_generator(sequential_ids())
        .build();
    Harness {
        name: "sqlite",
        adapter,
        _dir: Some(dir),
    }
}

pub fn document() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = schema();
    let backend = DocumentBackend::open(dir.path().join("auth.redb"), &schema).expect("open redb");
    let adapter = Adapter::builder(schema, backend)
        .id_generator(sequential_ids())
        .build();
    Harness {
        name: "document",
        adapter,
        _dir: Some(dir),
    }
}

/// One harness per backend, memory first.
pub fn harnesses() -> Vec<Harness> {
    vec![memory(), sqlite(), document()]
}
