//! Concurrent first access to lazily created records.
#![cfg(all(feature = "sqlite", feature = "document"))]

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use sourced_adapter::adapter::singleton::latest_or_create;
use sourced_adapter::{record, Record, SingleFlight, Where};

fn signing_key() -> Record {
    record! { "publicKey": "pk", "privateKey": "sk" }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_create_one_key() {
    for h in support::harnesses() {
        let adapter = Arc::new(h.adapter.clone());
        let flight = Arc::new(SingleFlight::new());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let adapter = Arc::clone(&adapter);
                let flight = Arc::clone(&flight);
                tokio::spawn(async move {
                    latest_or_create(&adapter, &flight, "jwks", "createdAt", signing_key).await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            let key = task.await.unwrap().unwrap();
            ids.push(key["id"].clone());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1, "{}: {ids:?}", h.name);
        assert_eq!(adapter.count("jwks", &Where::new()).await.unwrap(), 1, "{}", h.name);
        assert_eq!(flight.in_flight(), 0, "{}", h.name);
    }
}

#[tokio::test]
async fn existing_key_is_reused() {
    for h in support::harnesses() {
        let db = &h.adapter;
        let flight = SingleFlight::new();
        let existing = db.create("jwks", signing_key()).await.unwrap();

        let found = latest_or_create(db, &flight, "jwks", "createdAt", || {
            panic!("must not create when a key exists")
        })
        .await
        .unwrap();
        assert_eq!(found["id"], existing["id"], "{}", h.name);
    }
}
