//! Connector seam between the connection manager and a concrete store
//!
//! - `MongoConnector` talks to a real MongoDB deployment
//! - `MemoryConnector` keeps everything in process (tests, local dev)

pub mod memory;
pub mod mongo;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::record::Record;
use crate::selector::Filter;

pub use memory::{MemoryConnector, MemoryStore};
pub use mongo::MongoConnector;

/// A (database, collection) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Establishes connections to a store
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: StoreHandle;

    /// Open one connection and verify it is usable.
    async fn connect(&self) -> StoreResult<Self::Handle>;

    /// Endpoint description with secrets removed, for logs
    fn describe(&self) -> String;
}

/// A live connection. Cloning shares the underlying connection.
///
/// Reads never return internal storage identifiers.
#[async_trait]
pub trait StoreHandle: Clone + Send + Sync + 'static {
    /// Round-trip to the server to check the connection is still alive.
    async fn ping(&self) -> StoreResult<()>;

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> StoreResult<Option<Record>>;

    async fn find_many(&self, ns: &Namespace, filter: &Filter) -> StoreResult<Vec<Record>>;

    /// Set `field` on the first match. Returns the number of matched records.
    async fn set_field(
        &self,
        ns: &Namespace,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64>;

    /// Insert `record` unless something already matches `filter`, as one
    /// server-side step. Returns whether the record was inserted.
    async fn insert_if_absent(
        &self,
        ns: &Namespace,
        filter: &Filter,
        record: Record,
    ) -> StoreResult<bool>;

    /// Add `by` to `field` on the first match in a single server-side step
    /// and return the updated record. With `upsert`, a miss creates a record
    /// from the filter's equality fields.
    async fn increment_field(
        &self,
        ns: &Namespace,
        filter: &Filter,
        field: &str,
        by: i64,
        upsert: bool,
    ) -> StoreResult<Option<Record>>;
}
