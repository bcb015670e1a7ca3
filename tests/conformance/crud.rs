use serde_json::{json, Value};
use sourced_adapter::{record, AdapterError, Predicate, Select, Where};

use crate::support::harnesses;

fn by_id(id: &str) -> Where {
    Predicate::eq("id", id).into()
}

#[tokio::test]
async fn created_records_read_back_unchanged() {
    for h in harnesses() {
        let db = &h.adapter;
        let created = db
            .create("user", record! { "name": "Ada", "email": "ada@x.com" })
            .await
            .unwrap();
        assert_eq!(created["id"], "user-1", "{}", h.name);
        assert_eq!(created["emailVerified"], false, "{}", h.name);
        assert_eq!(created["image"], Value::Null, "{}", h.name);

        let loaded = db.find_one("user", &by_id("user-1"), None).await.unwrap();
        assert_eq!(loaded.as_ref(), Some(&created), "{}", h.name);
    }
}

#[tokio::test]
async fn typed_columns_survive_storage() {
    for h in harnesses() {
        let db = &h.adapter;
        let post = db
            .create(
                "post",
                record! {
                    "title": "hello",
                    "authorId": "user-9",
                    "score": 4.0,
                    "published": true,
                    "tags": ["rust", "auth"],
                    "publishedAt": 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(post["score"], json!(4), "{}", h.name);
        assert_eq!(post["publishedAt"], "1970-01-01T00:00:00.000Z", "{}", h.name);

        let loaded = db
            .find_one("post", &Predicate::eq("published", true).into(), None)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("{}: published post missing", h.name));
        assert_eq!(loaded["published"], true, "{}", h.name);
        assert_eq!(loaded["tags"], json!(["rust", "auth"]), "{}", h.name);
        assert_eq!(loaded["authorId"], "user-9", "{}", h.name);
        assert_eq!(loaded, post, "{}", h.name);
    }
}

#[tokio::test]
async fn delete_is_idempotent() {
    for h in harnesses() {
        let db = &h.adapter;
        db.create("user", record! { "name": "Ada", "email": "ada@x.com" })
            .await
            .unwrap();

        db.delete("user", &by_id("user-1")).await.unwrap();
        db.delete("user", &by_id("user-1")).await.unwrap();
        assert_eq!(db.count("user", &Where::new()).await.unwrap(), 0, "{}", h.name);
        assert_eq!(db.delete_many("user", &Where::new()).await.unwrap(), 0, "{}", h.name);
    }
}

#[tokio::test]
async fn update_touches_only_the_first_match() {
    for h in harnesses() {
        let db = &h.adapter;
        for email in ["a@x.com", "b@x.com", "c@y.com"] {
            db.create("user", record! { "name": "same", "email": email })
                .await
                .unwrap();
        }

        let same: Where = Predicate::eq("name", "same").into();
        let updated = db
            .update("user", &same, record! { "emailVerified": true })
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("{}: nothing updated", h.name));
        assert_eq!(updated["id"], "user-1", "{}", h.name);
        assert_eq!(updated["emailVerified"], true, "{}", h.name);

        let verified: Where = Predicate::eq("emailVerified", true).into();
        assert_eq!(db.count("user", &verified).await.unwrap(), 1, "{}", h.name);

        let none = db
            .update("user", &by_id("missing"), record! { "name": "x" })
            .await
            .unwrap();
        assert!(none.is_none(), "{}", h.name);

        let x_com: Where = Predicate::ends_with("email", "@x.com").into();
        let changed = db
            .update_many("user", &x_com, record! { "name": "renamed" })
            .await
            .unwrap();
        assert_eq!(changed, 2, "{}", h.name);
        let renamed: Where = Predicate::eq("name", "renamed").into();
        assert_eq!(db.count("user", &renamed).await.unwrap(), 2, "{}", h.name);
    }
}

#[tokio::test]
async fn unique_fields_are_enforced() {
    for h in harnesses() {
        let db = &h.adapter;
        db.create("user", record! { "name": "a", "email": "dup@x.com" })
            .await
            .unwrap();
        let err = db
            .create("user", record! { "name": "b", "email": "dup@x.com" })
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation(), "{}: {err}", h.name);

        db.create("user", record! { "name": "c", "email": "other@x.com" })
            .await
            .unwrap();
        let err = db
            .update_many("user", &Where::new(), record! { "email": "same@x.com" })
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation(), "{}: {err}", h.name);
        // the failed bulk update left every row alone
        let untouched: Where = Predicate::eq("email", "same@x.com").into();
        assert_eq!(db.count("user", &untouched).await.unwrap(), 0, "{}", h.name);
    }
}

#[tokio::test]
async fn hidden_fields_need_an_explicit_select() {
    for h in harnesses() {
        let db = &h.adapter;
        let key = db
            .create("jwks", record! { "publicKey": "pk", "privateKey": "sk" })
            .await
            .unwrap();
        assert!(!key.contains_key("privateKey"), "{}", h.name);

        let select = Select::fields(["privateKey"]);
        let secret = db
            .find_one("jwks", &Where::new(), Some(&select))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secret, record! { "id": key["id"].clone(), "privateKey": "sk" }, "{}", h.name);

        let select = Select::fields(["publicKey"]).exclude_id();
        let public = db
            .find_one("jwks", &Where::new(), Some(&select))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(public, record! { "publicKey": "pk" }, "{}", h.name);
    }
}

#[tokio::test]
async fn input_errors_are_reported_before_storage() {
    for h in harnesses() {
        let db = &h.adapter;
        let err = db.create("user", record! { "name": "a" }).await.unwrap_err();
        assert!(
            matches!(err, AdapterError::MissingRequiredField { ref field, .. } if field == "email"),
            "{}: {err}",
            h.name
        );

        let err = db
            .create("user", record! { "name": "a", "email": 42 })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidValue { .. }), "{}: {err}", h.name);

        let err = db.count("ghost", &Where::new()).await.unwrap_err();
        assert_eq!(err, AdapterError::ModelNotFound("ghost".into()), "{}", h.name);

        let err = db
            .count("user", &Predicate::eq("nickname", "x").into())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::FieldNotFound { .. }), "{}: {err}", h.name);
    }
}
