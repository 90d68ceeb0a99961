//! Selectors and the backend-neutral filters they resolve to
//!
//! A `Selector` addresses exactly one record. Name lookups are
//! case-insensitive whole-string matches for every resource kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{Record, UUID_FIELD};

/// How a caller addresses a single record
///
/// Serialized by key, so `{"id": 7}`, `{"uuid": "abc"}`, `{"name": "Foo"}`
/// and `{"query": {...}}` each map to one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selector {
    /// Numeric match on `id`
    Id(i64),
    /// Exact match on `uuid`
    Uuid(String),
    /// Case-insensitive match on `name`
    Name(String),
    /// Structured query passed through unmodified
    Query(Record),
}

impl Selector {
    pub fn to_filter(&self) -> Filter {
        match self {
            Self::Id(id) => Filter::eq("id", Value::from(*id)),
            Self::Uuid(uuid) => Filter::eq(UUID_FIELD, Value::from(uuid.as_str())),
            Self::Name(name) => Filter::EqIgnoreCase {
                field: "name".to_owned(),
                value: name.clone(),
            },
            Self::Query(query) => Filter::Document(query.clone()),
        }
    }
}

/// Query shape understood by every backend
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every record in the collection
    All,
    /// `field == value`; numbers compare by value across int/float
    Eq { field: String, value: Value },
    /// Unicode case-insensitive equality on a string field
    EqIgnoreCase { field: String, value: String },
    /// Raw store query
    Document(Record),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn by_uuid(uuid: &str) -> Self {
        Self::eq(UUID_FIELD, uuid)
    }

    /// True when a raw query uses `$` operators anywhere at the top level.
    pub fn uses_operators(&self) -> bool {
        match self {
            Self::Document(query) => query.keys().any(|k| k.starts_with('$')),
            _ => false,
        }
    }

    /// Reference evaluation against a single record.
    ///
    /// Raw queries are treated as a conjunction of top-level equalities.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::Eq { field, value } => record
                .get(field)
                .is_some_and(|found| values_equal(found, value)),
            Self::EqIgnoreCase { field, value } => record
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|found| found.to_lowercase() == value.to_lowercase()),
            Self::Document(query) => query.iter().all(|(field, value)| {
                record
                    .get(field)
                    .is_some_and(|found| values_equal(found, value))
            }),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}
