//! MongoDB backend
//!
//! Connecting builds a driver client with a bounded server selection timeout
//! and an idle-connection expiry, then pings `admin` so that an unreachable
//! or misconfigured cluster fails at connect time instead of on first query.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::ErrorKind as DriverErrorKind;
use mongodb::options::{ClientOptions, ReturnDocument};
use mongodb::{Client, Collection};
use serde_json::Value;

use super::{Connector, Namespace, StoreHandle};
use crate::config::{redact_uri, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::record::{strip_internal_ids, Record};
use crate::selector::Filter;

const APP_NAME: &str = "droptop-api";

/// Connector for a MongoDB deployment
#[derive(Debug, Clone)]
pub struct MongoConnector {
    uri: String,
    server_selection_timeout: Duration,
    max_idle_time: Duration,
}

impl MongoConnector {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            server_selection_timeout: config.server_selection_timeout,
            max_idle_time: config.max_idle_time,
        }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Handle = MongoHandle;

    async fn connect(&self) -> StoreResult<MongoHandle> {
        let mut options = ClientOptions::parse(&self.uri).await.map_err(|e| {
            // A bad connection string is a connection problem for the caller
            StoreError::connection(format!("invalid connection string: {e}"))
        })?;
        options.server_selection_timeout = Some(self.server_selection_timeout);
        options.max_idle_time = Some(self.max_idle_time);
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options).map_err(map_driver_error)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_driver_error)?;

        Ok(MongoHandle { client })
    }

    fn describe(&self) -> String {
        redact_uri(&self.uri)
    }
}

/// Live MongoDB client; clones share one connection pool
#[derive(Debug, Clone)]
pub struct MongoHandle {
    client: Client,
}

impl MongoHandle {
    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client
            .database(&ns.database)
            .collection::<Document>(&ns.collection)
    }
}

fn hide_internal_id() -> Document {
    doc! { "_id": 0 }
}

#[async_trait]
impl StoreHandle for MongoHandle {
    async fn ping(&self) -> StoreResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(map_driver_error)
    }

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> StoreResult<Option<Record>> {
        let found = self
            .collection(ns)
            .find_one(filter_document(filter)?)
            .projection(hide_internal_id())
            .await
            .map_err(map_driver_error)?;
        found.map(document_to_record).transpose()
    }

    async fn find_many(&self, ns: &Namespace, filter: &Filter) -> StoreResult<Vec<Record>> {
        let cursor = self
            .collection(ns)
            .find(filter_document(filter)?)
            .projection(hide_internal_id())
            .await
            .map_err(map_driver_error)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(map_driver_error)?;
        documents.into_iter().map(document_to_record).collect()
    }

    async fn set_field(
        &self,
        ns: &Namespace,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64> {
        let mut set = Document::new();
        set.insert(field, json_to_bson(value)?);

        let result = self
            .collection(ns)
            .update_one(filter_document(filter)?, doc! { "$set": set })
            .await
            .map_err(map_driver_error)?;
        Ok(result.matched_count)
    }

    async fn insert_if_absent(
        &self,
        ns: &Namespace,
        filter: &Filter,
        record: Record,
    ) -> StoreResult<bool> {
        let document = record_to_document(&strip_internal_ids(record))?;
        let result = self
            .collection(ns)
            .update_one(filter_document(filter)?, doc! { "$setOnInsert": document })
            .upsert(true)
            .await
            .map_err(map_driver_error)?;
        Ok(result.upserted_id.is_some())
    }

    async fn increment_field(
        &self,
        ns: &Namespace,
        filter: &Filter,
        field: &str,
        by: i64,
        upsert: bool,
    ) -> StoreResult<Option<Record>> {
        let mut inc = Document::new();
        inc.insert(field, by);

        let updated = self
            .collection(ns)
            .find_one_and_update(filter_document(filter)?, doc! { "$inc": inc })
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .projection(hide_internal_id())
            .await
            .map_err(map_driver_error)?;
        updated.map(document_to_record).transpose()
    }
}

/// Translate a filter into a MongoDB query document.
fn filter_document(filter: &Filter) -> StoreResult<Document> {
    Ok(match filter {
        Filter::All => Document::new(),
        Filter::Eq { field, value } => {
            let mut query = Document::new();
            query.insert(field.as_str(), json_to_bson(value.clone())?);
            query
        }
        Filter::EqIgnoreCase { field, value } => {
            let pattern = format!("^{}$", regex::escape(value));
            let mut query = Document::new();
            query.insert(field.as_str(), doc! { "$regex": pattern, "$options": "i" });
            query
        }
        Filter::Document(query) => record_to_document(query)?,
    })
}

fn json_to_bson(value: Value) -> StoreResult<Bson> {
    bson::to_bson(&value).map_err(|e| StoreError::operation(format!("BSON encode error: {e}")))
}

fn record_to_document(record: &Record) -> StoreResult<Document> {
    bson::to_document(record).map_err(|e| StoreError::operation(format!("BSON encode error: {e}")))
}

fn document_to_record(document: Document) -> StoreResult<Record> {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(record) => Ok(strip_internal_ids(record)),
        other => Err(StoreError::operation(format!(
            "expected a document, store returned {other}"
        ))),
    }
}

/// Driver errors that mean "could not reach or talk to the server" become
/// connection errors; everything else is an operation error.
fn map_driver_error(err: mongodb::error::Error) -> StoreError {
    match err.kind.as_ref() {
        DriverErrorKind::ServerSelection { .. }
        | DriverErrorKind::Io(_)
        | DriverErrorKind::Authentication { .. }
        | DriverErrorKind::ConnectionPoolCleared { .. }
        | DriverErrorKind::DnsResolve { .. } => StoreError::connection(err.to_string()),
        _ => StoreError::operation(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_filter_is_plain_equality() {
        let query = filter_document(&Filter::eq("id", 7)).unwrap();
        assert_eq!(query, doc! { "id": 7_i64 });
    }

    #[test]
    fn name_filter_is_anchored_case_insensitive_regex() {
        let filter = Filter::EqIgnoreCase {
            field: "name".into(),
            value: "Foo (beta)".into(),
        };
        let query = filter_document(&filter).unwrap();
        let inner = query.get_document("name").unwrap();
        assert_eq!(inner.get_str("$regex").unwrap(), r"^Foo \(beta\)$");
        assert_eq!(inner.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn raw_query_passes_through() {
        let q = json!({"title": "downloads"}).as_object().cloned().unwrap();
        let query = filter_document(&Filter::Document(q)).unwrap();
        assert_eq!(query, doc! { "title": "downloads" });
        assert_eq!(filter_document(&Filter::All).unwrap(), Document::new());
    }

    #[test]
    fn documents_lose_internal_id() {
        let document = doc! {
            "_id": bson::oid::ObjectId::new(),
            "uuid": "abc",
            "downloads": 5_i32,
        };
        let record = document_to_record(document).unwrap();
        assert_eq!(record, json!({"uuid": "abc", "downloads": 5}).as_object().cloned().unwrap());
    }

    // Requires a reachable deployment:
    // MONGO_URI=mongodb://localhost:27017 cargo test -p droptop-store -- --ignored
    #[tokio::test]
    #[ignore = "requires database"]
    async fn connects_and_pings() {
        let uri = std::env::var("MONGO_URI").expect("MONGO_URI required");
        let connector = MongoConnector::new(&StoreConfig::with_uri(uri));
        let handle = connector.connect().await.expect("connect failed");
        handle.ping().await.expect("ping failed");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let mut config = StoreConfig::with_uri("mongodb://127.0.0.1:1/?directConnection=true");
        config.server_selection_timeout = Duration::from_millis(200);
        let err = MongoConnector::new(&config).connect().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {err}");
    }
}
