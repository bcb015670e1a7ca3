//! Lazily created singleton records, such as the active signing key.

use super::Adapter;
use crate::error::Result;
use crate::flight::SingleFlight;
use crate::query::{FindMany, SortSpec};
use crate::record::Record;

/// Return the newest `model` record by `sort_field`, creating one from
/// `data` when the table is empty.
///
/// Concurrent first callers in this process queue on `flight`; exactly one
/// of them creates the record and the rest find it.
pub async fn latest_or_create<F>(
    adapter: &Adapter,
    flight: &SingleFlight,
    model: &str,
    sort_field: &str,
    mut data: F,
) -> Result<Record>
where
    F: FnMut() -> Record,
{
    let key = format!("{}:{model}:latest", adapter.backend_id());
    flight
        .get_or_create(
            &key,
            move || async move {
                let query = FindMany::new().sort_by(SortSpec::desc(sort_field)).limit(1);
                Ok(adapter.find_many(model, query).await?.pop())
            },
            move || {
                let record = data();
                async move { adapter.create(model, record).await }
            },
        )
        .await
}
