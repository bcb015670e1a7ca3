//! The same data and queries must give identical answers on every backend.

use serde_json::json;
use sourced_adapter::{record, FindMany, Record};

use crate::support::harnesses;

fn users() -> Vec<Record> {
    let stamp = "2024-05-01T08:00:00.000Z";
    [
        ("u1", "Ada", "ada@x.com", true, Some("a.png")),
        ("u2", "Bob", "bob@x.com", false, None),
        ("u3", "Cy", "cy@y.org", true, None),
        ("u4", "Di", "di@y.org", false, Some("d.png")),
        ("u5", "Ed", "ed@z.net", false, None),
    ]
    .into_iter()
    .map(|(id, name, email, verified, image)| {
        record! {
            "id": id,
            "name": name,
            "email": email,
            "emailVerified": verified,
            "image": image,
            "createdAt": stamp,
            "updatedAt": stamp,
        }
    })
    .collect()
}

fn queries() -> Vec<FindMany> {
    [
        json!({}),
        json!({ "where": [{ "field": "emailVerified", "value": true }] }),
        json!({ "where": [{ "field": "image", "operator": "ne", "value": "a.png" }] }),
        json!({ "where": [{ "field": "email", "operator": "ends_with", "value": ".org" }] }),
        json!({ "where": [{ "field": "name", "operator": "in", "value": ["Bob", "Ed", "Zed"] }] }),
        json!({ "where": [{ "field": "id", "operator": "not_in", "value": ["u1"] }], "limit": 2, "offset": 1 }),
        json!({
            "where": [
                { "field": "emailVerified", "value": false },
                { "field": "image", "operator": "is_not_null", "connector": "OR" },
                { "field": "email", "operator": "contains", "value": "z.", "connector": "OR" }
            ]
        }),
        json!({ "sort_by": { "field": "image", "direction": "desc" } }),
        json!({ "sort_by": { "field": "emailVerified" }, "limit": 3 }),
        json!({ "select": { "fields": ["email"] }, "sort_by": { "field": "email", "direction": "desc" } }),
    ]
    .into_iter()
    .map(|q| serde_json::from_value(q).expect("query"))
    .collect()
}

#[tokio::test]
async fn every_backend_agrees_with_memory() {
    let mut answers: Vec<(&'static str, Vec<Vec<Record>>, u64)> = Vec::new();
    let harnesses = harnesses();
    for h in &harnesses {
        for user in users() {
            h.adapter.create("user", user).await.unwrap();
        }
        let mut results = Vec::new();
        for query in queries() {
            results.push(h.adapter.find_many("user", query).await.unwrap());
        }
        let verified = h
            .adapter
            .update_many(
                "user",
                &serde_json::from_value(json!([{ "field": "image", "operator": "is_null" }])).unwrap(),
                record! { "emailVerified": true },
            )
            .await
            .unwrap();
        answers.push((h.name, results, verified));
    }

    let (_, expected, expected_verified) = &answers[0];
    assert_eq!(expected[0].len(), 5);
    assert_eq!(*expected_verified, 3);
    for (name, results, verified) in &answers[1..] {
        assert_eq!(verified, expected_verified, "{name}");
        for (i, (got, want)) in results.iter().zip(expected).enumerate() {
            assert_eq!(got, want, "{name}: query #{i}");
        }
    }
}
