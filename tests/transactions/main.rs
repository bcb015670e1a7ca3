//! Transaction scoping through the adapter.
#![cfg(all(feature = "sqlite", feature = "document"))]

#[path = "../support/mod.rs"]
mod support;

use sourced_adapter::{record, AdapterError, Predicate, Where};

#[derive(Debug, PartialEq)]
enum SignupError {
    Taken,
    Adapter(AdapterError),
}

impl From<AdapterError> for SignupError {
    fn from(err: AdapterError) -> Self {
        SignupError::Adapter(err)
    }
}

#[tokio::test]
async fn sqlite_commits_on_ok() {
    let h = support::sqlite();
    let db = &h.adapter;

    let user_id = db
        .run_in_transaction(|tx| async move {
            assert!(tx.in_transaction());
            let user = tx
                .create("user", record! { "name": "Ada", "email": "ada@x.com" })
                .await?;
            let id = user["id"].as_str().unwrap_or_default().to_string();
            tx.create(
                "account",
                record! { "accountId": "gh-1", "providerId": "github", "userId": id.clone() },
            )
            .await?;
            Ok::<_, AdapterError>(id)
        })
        .await
        .unwrap();

    assert!(!db.in_transaction());
    assert_eq!(user_id, "user-1");
    let accounts: Where = Predicate::eq("userId", user_id.as_str()).into();
    assert_eq!(db.count("account", &accounts).await.unwrap(), 1);
}

#[tokio::test]
async fn sqlite_rolls_back_on_err() {
    let h = support::sqlite();
    let db = &h.adapter;
    db.create("user", record! { "name": "Bob", "email": "bob@x.com" })
        .await
        .unwrap();

    let result = db
        .run_in_transaction(|tx| async move {
            tx.create("user", record! { "name": "Ada", "email": "ada@x.com" })
                .await?;
            let taken: Where = Predicate::eq("email", "bob@x.com").into();
            if tx.count("user", &taken).await? > 0 {
                return Err(SignupError::Taken);
            }
            Ok::<(), SignupError>(())
        })
        .await;

    assert_eq!(result, Err(SignupError::Taken));
    assert_eq!(db.count("user", &Where::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn sqlite_constraint_failure_discards_earlier_writes() {
    let h = support::sqlite();
    let db = &h.adapter;

    let err = db
        .run_in_transaction(|tx| async move {
            tx.create("user", record! { "name": "A", "email": "same@x.com" })
                .await?;
            tx.create("user", record! { "name": "B", "email": "same@x.com" })
                .await?;
            Ok::<_, AdapterError>(())
        })
        .await
        .unwrap_err();

    assert!(err.is_constraint_violation(), "{err}");
    assert_eq!(db.count("user", &Where::new()).await.unwrap(), 0);

    // the connection is usable again afterwards
    db.create("user", record! { "name": "C", "email": "same@x.com" })
        .await
        .unwrap();
}

#[tokio::test]
async fn nested_calls_join_the_open_transaction() {
    let h = support::sqlite();
    let db = &h.adapter;

    let result: Result<(), AdapterError> = db
        .run_in_transaction(|outer| async move {
            outer
                .create("user", record! { "name": "A", "email": "a@x.com" })
                .await?;
            let inner = outer.clone();
            inner
                .run_in_transaction(|tx| async move {
                    assert!(tx.in_transaction());
                    tx.create("user", record! { "name": "B", "email": "b@x.com" })
                        .await?;
                    Ok::<_, AdapterError>(())
                })
                .await?;
            Err(AdapterError::Storage("abort".into()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(db.count("user", &Where::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn backends_without_transactions_run_directly() {
    for h in [support::memory(), support::document()] {
        let db = &h.adapter;
        let result = db
            .run_in_transaction(|tx| async move {
                assert!(!tx.in_transaction());
                tx.create("user", record! { "name": "A", "email": "a@x.com" })
                    .await?;
                Err::<(), _>(AdapterError::Storage("abort".into()))
            })
            .await;

        assert!(result.is_err(), "{}", h.name);
        // writes are not undone without a native transaction
        assert_eq!(db.count("user", &Where::new()).await.unwrap(), 1, "{}", h.name);
    }
}
