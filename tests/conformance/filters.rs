use serde_json::{json, Value};
use sourced_adapter::{record, Adapter, AdapterError, FindMany, Predicate, Record, Where};

use crate::support::harnesses;

async fn seed_users(db: &Adapter) {
    let users = [
        record! { "name": "Ada", "email": "ada@x.com", "image": "ada.png" },
        record! { "name": "Bob", "email": "bob@x.com" },
        record! { "name": "ada", "email": "ada@y.org", "image": "small.png" },
        record! { "name": "Cy", "email": "cy@y.org", "emailVerified": true },
    ];
    for user in users {
        db.create("user", user).await.unwrap();
    }
}

async fn ids(db: &Adapter, filter: Where) -> Vec<String> {
    db.find_many("user", FindMany::new().filter(filter))
        .await
        .unwrap()
        .into_iter()
        .map(|row: Record| row["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn prefix_suffix_scenario() {
    for h in harnesses() {
        let db = &h.adapter;
        db.create("user", record! { "id": "1", "name": "a", "email": "a@x.com" })
            .await
            .unwrap();
        db.create("user", record! { "id": "2", "name": "b", "email": "b@x.com" })
            .await
            .unwrap();

        let found = ids(db, Predicate::starts_with("email", "a").into()).await;
        assert_eq!(found, ["1"], "{}", h.name);
        assert_eq!(db.count("user", &Where::new()).await.unwrap(), 2, "{}", h.name);

        let removed = db
            .delete_many("user", &Predicate::ends_with("email", "x.com").into())
            .await
            .unwrap();
        assert_eq!(removed, 2, "{}", h.name);
        assert_eq!(db.count("user", &Where::new()).await.unwrap(), 0, "{}", h.name);
    }
}

#[tokio::test]
async fn null_comparisons() {
    for h in harnesses() {
        let db = &h.adapter;
        seed_users(db).await;

        let all = db.count("user", &Where::new()).await.unwrap();
        let ne_null = db
            .count("user", &Predicate::ne("image", Value::Null).into())
            .await
            .unwrap();
        assert_eq!(ne_null, all, "{}: ne null is a tautology", h.name);
        let first = db
            .find_one("user", &Predicate::ne("email", Value::Null).into(), None)
            .await
            .unwrap();
        assert_eq!(first.unwrap()["id"], "user-1", "{}", h.name);

        let eq_null = ids(db, Predicate::eq("image", Value::Null).into()).await;
        assert_eq!(eq_null, ["user-2", "user-4"], "{}", h.name);

        let ne_value = ids(db, Predicate::ne("image", "ada.png").into()).await;
        assert_eq!(ne_value, ["user-2", "user-3", "user-4"], "{}", h.name);

        let not_null = ids(db, Predicate::is_not_null("image").into()).await;
        assert_eq!(not_null, ["user-1", "user-3"], "{}", h.name);

        // text operators never match a null cell
        let contains = ids(db, Predicate::contains("image", "").into()).await;
        assert_eq!(contains, ["user-1", "user-3"], "{}", h.name);
    }
}

#[tokio::test]
async fn empty_lists() {
    for h in harnesses() {
        let db = &h.adapter;
        seed_users(db).await;

        let none = Predicate::in_list("email", Vec::<String>::new());
        assert_eq!(db.count("user", &none.into()).await.unwrap(), 0, "{}", h.name);

        let every = Predicate::not_in_list("email", Vec::<String>::new());
        assert_eq!(db.count("user", &every.into()).await.unwrap(), 4, "{}", h.name);

        let some = ids(db, Predicate::in_list("name", ["Bob", "Cy", "nobody"]).into()).await;
        assert_eq!(some, ["user-2", "user-4"], "{}", h.name);

        // not_in keeps rows whose cell is null
        let rest = ids(db, Predicate::not_in_list("image", ["ada.png"]).into()).await;
        assert_eq!(rest, ["user-2", "user-3", "user-4"], "{}", h.name);
    }
}

#[tokio::test]
async fn text_operators_are_case_sensitive() {
    for h in harnesses() {
        let db = &h.adapter;
        seed_users(db).await;

        assert_eq!(ids(db, Predicate::eq("name", "ada").into()).await, ["user-3"], "{}", h.name);
        assert_eq!(
            ids(db, Predicate::starts_with("name", "A").into()).await,
            ["user-1"],
            "{}",
            h.name
        );
        assert_eq!(
            ids(db, Predicate::contains("email", "@Y").into()).await,
            Vec::<String>::new(),
            "{}",
            h.name
        );
        assert_eq!(
            ids(db, Predicate::ends_with("email", ".org").into()).await,
            ["user-3", "user-4"],
            "{}",
            h.name
        );
        // wildcard characters are literal
        assert_eq!(
            ids(db, Predicate::contains("email", "%").into()).await,
            Vec::<String>::new(),
            "{}",
            h.name
        );
    }
}

#[tokio::test]
async fn and_group_then_or_group() {
    for h in harnesses() {
        let db = &h.adapter;
        seed_users(db).await;

        let filter = Where::new()
            .with(Predicate::ends_with("email", "x.com"))
            .with(Predicate::eq("name", "Bob").or())
            .with(Predicate::eq("name", "Cy").or());
        assert_eq!(ids(db, filter).await, ["user-2"], "{}", h.name);

        let only_or = Where::new()
            .with(Predicate::eq("name", "Ada").or())
            .with(Predicate::eq("emailVerified", true).or());
        assert_eq!(ids(db, only_or).await, ["user-1", "user-4"], "{}", h.name);
    }
}

#[tokio::test]
async fn ranges_over_numbers_and_dates() {
    for h in harnesses() {
        let db = &h.adapter;
        for (title, score, at) in [
            ("low", json!(1), json!("2024-01-01T00:00:00Z")),
            ("mid", json!(2.5), json!("2024-06-01T00:00:00Z")),
            ("high", json!(10), Value::Null),
            ("unscored", Value::Null, json!("2025-01-01T00:00:00Z")),
        ] {
            db.create("post", record! { "title": title, "score": score, "publishedAt": at })
                .await
                .unwrap();
        }

        let titles = |rows: Vec<Record>| -> Vec<String> {
            rows.into_iter()
                .map(|r| r["title"].as_str().unwrap_or_default().to_string())
                .collect()
        };

        let above = db
            .find_many("post", FindMany::new().with(Predicate::gt("score", 2)))
            .await
            .unwrap();
        assert_eq!(titles(above), ["mid", "high"], "{}", h.name);

        let at_most = db
            .find_many("post", FindMany::new().with(Predicate::lte("score", 2.5)))
            .await
            .unwrap();
        assert_eq!(titles(at_most), ["low", "mid"], "{}", h.name);

        let since = db
            .find_many(
                "post",
                FindMany::new().with(Predicate::gte("publishedAt", "2024-06-01T00:00:00.000Z")),
            )
            .await
            .unwrap();
        assert_eq!(titles(since), ["mid", "unscored"], "{}", h.name);

        // a null bound matches nothing
        let none = db
            .count("post", &Predicate::lt("score", Value::Null).into())
            .await
            .unwrap();
        assert_eq!(none, 0, "{}", h.name);
    }
}

#[tokio::test]
async fn range_over_arrays_is_unsupported() {
    for h in harnesses() {
        let db = &h.adapter;
        db.create("post", record! { "title": "t", "tags": ["a"] })
            .await
            .unwrap();
        let err = db
            .count("post", &Predicate::gt("tags", json!(["a"])).into())
            .await
            .unwrap_err();
        assert!(
            matches!(err, AdapterError::UnsupportedOperator { ref backend, .. } if backend == h.name),
            "{}: {err}",
            h.name
        );
    }
}
