//! Adapters opened from configuration, with plugin models and typed access.
#![cfg(all(feature = "sqlite", feature = "document"))]

use serde::{Deserialize, Serialize};
use serde_json::json;
use sourced_adapter::schema::builtin;
use sourced_adapter::{AdapterConfig, BackendConfig, Model, ModelsExt, Predicate, Schema};

const PLUGIN_MODELS: &str = r#"{
    "organization": {
        "modelName": "orgs",
        "fields": {
            "name": { "type": "string", "required": true },
            "slug": { "type": "string", "required": true, "unique": true },
            "seats": { "type": "number", "defaultValue": 5 },
            "createdAt": { "type": "date", "fieldName": "created_at" }
        }
    }
}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    name: String,
    slug: String,
    seats: Option<i64>,
    created_at: Option<String>,
}

impl Model for Organization {
    const MODEL: &'static str = "organization";
}

fn schema() -> Schema {
    builtin::auth_schema_builder()
        .definition_json(PLUGIN_MODELS)
        .unwrap()
        .build()
        .unwrap()
}

fn config(backend: BackendConfig) -> AdapterConfig {
    let mut config: AdapterConfig = serde_json::from_value(json!({
        "options": { "debug_logs": true, "default_limit": 10 }
    }))
    .unwrap();
    config.backend = backend;
    config
}

fn acme() -> Organization {
    Organization {
        id: String::new(),
        name: "Acme".into(),
        slug: "acme".into(),
        seats: None,
        created_at: Some("2024-02-29T12:00:00Z".into()),
    }
}

#[tokio::test]
async fn file_backends_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let backends = [
        BackendConfig::Sqlite {
            path: Some(dir.path().join("auth.db")),
        },
        BackendConfig::Document {
            path: Some(dir.path().join("auth.redb")),
        },
    ];

    for backend in backends {
        let config = config(backend);
        let created = {
            let adapter = config.connect(schema()).unwrap();
            assert!(adapter.options().debug_logs);
            adapter.models::<Organization>().create(&acme()).await.unwrap()
        };
        assert_eq!(created.seats, Some(5));
        assert_eq!(created.created_at.as_deref(), Some("2024-02-29T12:00:00.000Z"));

        let adapter = config.connect(schema()).unwrap();
        let orgs = adapter.models::<Organization>();
        let loaded = orgs.get(&created.id).await.unwrap();
        assert_eq!(loaded, Some(created), "{:?}", config.backend);

        let by_slug = orgs
            .find_one(&Predicate::starts_with("slug", "ac").into())
            .await
            .unwrap();
        assert!(by_slug.is_some(), "{:?}", config.backend);
    }
}

#[tokio::test]
async fn in_memory_variants_start_empty() {
    for backend in [
        BackendConfig::Memory,
        BackendConfig::Sqlite { path: None },
        BackendConfig::Document { path: None },
    ] {
        let adapter = config(backend.clone()).connect(schema()).unwrap();
        let orgs = adapter.models::<Organization>();
        assert_eq!(orgs.count(&Default::default()).await.unwrap(), 0, "{backend:?}");

        orgs.create(&acme()).await.unwrap();
        let err = orgs.create(&acme()).await.unwrap_err();
        assert!(err.is_constraint_violation(), "{backend:?}: {err}");
    }
}

#[test]
fn backend_config_reads_from_json() {
    let config = AdapterConfig::from_json_str(
        r#"{ "backend": { "kind": "document", "path": "data/auth.redb" }, "options": { "timeout_ms": 250 } }"#,
    )
    .unwrap();
    assert_eq!(
        config.backend,
        BackendConfig::Document {
            path: Some("data/auth.redb".into())
        }
    );
    assert_eq!(config.options.timeout_ms, Some(250));
}
