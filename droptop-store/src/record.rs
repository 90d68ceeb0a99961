//! Plain records as handed to callers
//!
//! Records are schemaless JSON objects. Apps and themes always carry `id`,
//! `uuid`, `name`, `downloads` and `direct_download_link`; counter documents
//! carry a `title` plus whatever counters they hold.

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// A single document with internal storage identifiers removed
pub type Record = Map<String, Value>;

/// Store-assigned primary key, never exposed outward
pub const INTERNAL_ID_FIELD: &str = "_id";

/// Field mutated by the download counter
pub const DOWNLOADS_FIELD: &str = "downloads";

/// Field identifying a record across the catalog
pub const UUID_FIELD: &str = "uuid";

/// Remove internal storage identifiers from a record.
pub fn strip_internal_ids(mut record: Record) -> Record {
    record.remove(INTERNAL_ID_FIELD);
    record
}

/// Read the download counter of a record.
///
/// A missing field counts as zero. Integral floats are accepted because some
/// writers store every number as a double.
pub fn downloads_of(record: &Record) -> StoreResult<u64> {
    match record.get(DOWNLOADS_FIELD) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => as_counter(value).ok_or_else(|| {
            StoreError::operation(format!(
                "'{DOWNLOADS_FIELD}' is not a non-negative integer: {value}"
            ))
        }),
    }
}

fn as_counter(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn strips_internal_id_only() {
        let r = strip_internal_ids(record(json!({"_id": "65f0", "uuid": "abc", "id": 7})));
        assert!(!r.contains_key("_id"));
        assert_eq!(r.get("uuid"), Some(&json!("abc")));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn downloads_accepts_integers_and_integral_floats() {
        assert_eq!(downloads_of(&record(json!({"downloads": 5}))).unwrap(), 5);
        assert_eq!(downloads_of(&record(json!({"downloads": 12.0}))).unwrap(), 12);
        assert_eq!(downloads_of(&record(json!({"uuid": "abc"}))).unwrap(), 0);
        assert_eq!(downloads_of(&record(json!({"downloads": null}))).unwrap(), 0);
    }

    #[test]
    fn downloads_rejects_garbage() {
        assert!(downloads_of(&record(json!({"downloads": -1}))).is_err());
        assert!(downloads_of(&record(json!({"downloads": 1.5}))).is_err());
        assert!(downloads_of(&record(json!({"downloads": "12"}))).is_err());
    }
}
