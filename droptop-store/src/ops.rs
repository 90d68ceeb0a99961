//! Operation bodies, run against a live handle
//!
//! Every record leaving this module has its internal identifiers stripped,
//! whatever the backend did with its projection.

use serde_json::Value;

use crate::backend::{Namespace, StoreHandle};
use crate::config::IncrementMode;
use crate::error::{StoreError, StoreResult};
use crate::record::{downloads_of, strip_internal_ids, Record, DOWNLOADS_FIELD, UUID_FIELD};
use crate::selector::Filter;

pub(crate) async fn find_one<H: StoreHandle>(
    handle: &H,
    ns: &Namespace,
    filter: &Filter,
) -> StoreResult<Option<Record>> {
    Ok(handle.find_one(ns, filter).await?.map(strip_internal_ids))
}

pub(crate) async fn find_all<H: StoreHandle>(handle: &H, ns: &Namespace) -> StoreResult<Vec<Record>> {
    let records = handle.find_many(ns, &Filter::All).await?;
    Ok(records.into_iter().map(strip_internal_ids).collect())
}

/// Add one download to the record with `uuid`, creating it at 1 on a miss.
pub(crate) async fn increment_downloads<H: StoreHandle>(
    handle: &H,
    ns: &Namespace,
    uuid: &str,
    mode: IncrementMode,
) -> StoreResult<Record> {
    let filter = Filter::by_uuid(uuid);
    match mode {
        IncrementMode::ReadModifyWrite => read_modify_write(handle, ns, &filter, uuid).await,
        IncrementMode::Atomic => handle
            .increment_field(ns, &filter, DOWNLOADS_FIELD, 1, true)
            .await?
            .map(strip_internal_ids)
            .ok_or_else(|| StoreError::operation(format!("upsert of '{uuid}' returned nothing"))),
    }
}

// Two separate fallible steps: a concurrent increment between the read and
// the write is overwritten. The returned count is only reported after the
// write succeeded. Creation on a miss is a single insert-if-absent, so
// concurrent misses never leave more than one record per uuid.
async fn read_modify_write<H: StoreHandle>(
    handle: &H,
    ns: &Namespace,
    filter: &Filter,
    uuid: &str,
) -> StoreResult<Record> {
    let mut record = match handle.find_one(ns, filter).await? {
        Some(record) => record,
        None => {
            let mut created = Record::new();
            created.insert(UUID_FIELD.to_owned(), Value::from(uuid));
            created.insert(DOWNLOADS_FIELD.to_owned(), Value::from(1_u64));
            if handle.insert_if_absent(ns, filter, created.clone()).await? {
                return Ok(created);
            }
            // Lost the race to create it; count on top of the winner.
            handle.find_one(ns, filter).await?.ok_or_else(|| {
                StoreError::operation(format!(
                    "record '{uuid}' disappeared before its counter was written"
                ))
            })?
        }
    };

    let downloads = downloads_of(&record)? + 1;
    let matched = handle
        .set_field(ns, filter, DOWNLOADS_FIELD, Value::from(downloads))
        .await?;
    if matched == 0 {
        return Err(StoreError::operation(format!(
            "record '{uuid}' disappeared before its counter was written"
        )));
    }

    record.insert(DOWNLOADS_FIELD.to_owned(), Value::from(downloads));
    Ok(strip_internal_ids(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Connector, MemoryStore};
    use serde_json::json;

    fn ns() -> Namespace {
        Namespace::new("droptop", "themes")
    }

    #[tokio::test]
    async fn read_modify_write_adds_one() {
        let store = MemoryStore::new();
        store
            .seed(&ns(), [json!({"uuid": "t1", "downloads": 41})])
            .unwrap();
        let handle = store.connector().connect().await.unwrap();

        let record = increment_downloads(&handle, &ns(), "t1", IncrementMode::ReadModifyWrite)
            .await
            .unwrap();
        assert_eq!(record.get("downloads"), Some(&json!(42)));
        assert_eq!(store.records(&ns())[0].get("downloads"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn miss_inserts_at_one_in_both_modes() {
        for mode in [IncrementMode::ReadModifyWrite, IncrementMode::Atomic] {
            let store = MemoryStore::new();
            let handle = store.connector().connect().await.unwrap();

            let record = increment_downloads(&handle, &ns(), "fresh", mode).await.unwrap();
            assert_eq!(record.get("downloads"), Some(&json!(1)), "{mode:?}");
            assert_eq!(record.get("uuid"), Some(&json!("fresh")), "{mode:?}");
            assert_eq!(store.records(&ns()).len(), 1, "{mode:?}");
        }
    }

    #[tokio::test]
    async fn concurrent_misses_create_one_record() {
        let store = MemoryStore::new();
        let handle = store.connector().connect().await.unwrap();

        let namespace = ns();
        let (a, b) = tokio::join!(
            increment_downloads(&handle, &namespace, "fresh", IncrementMode::ReadModifyWrite),
            increment_downloads(&handle, &namespace, "fresh", IncrementMode::ReadModifyWrite),
        );
        a.unwrap();
        b.unwrap();

        let records = store.records(&ns());
        assert_eq!(records.len(), 1);
        let downloads = records[0].get("downloads").and_then(Value::as_u64).unwrap();
        assert!((1..=2).contains(&downloads));
    }

    #[tokio::test]
    async fn failed_write_is_not_reported_as_success() {
        let store = MemoryStore::new();
        store
            .seed(&ns(), [json!({"uuid": "t1", "downloads": "lots"})])
            .unwrap();
        let handle = store.connector().connect().await.unwrap();

        let err = increment_downloads(&handle, &ns(), "t1", IncrementMode::ReadModifyWrite)
            .await
            .unwrap_err();
        assert!(!err.is_connection());
        assert_eq!(store.records(&ns())[0].get("downloads"), Some(&json!("lots")));
    }
}
