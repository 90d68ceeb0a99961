//! In-process document store
//!
//! Behaves like a remote store from the manager's point of view: connections
//! can be refused, counted and dropped, and every operation suspends once
//! before touching data so concurrent callers interleave.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{Connector, Namespace, StoreHandle};
use crate::error::{StoreError, StoreResult};
use crate::record::{strip_internal_ids, Record, INTERNAL_ID_FIELD};
use crate::selector::Filter;

/// Shared in-memory data plus fault injection knobs
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    data: Mutex<MemoryData>,
    connects: AtomicUsize,
    epoch: AtomicU64,
    failing_connects: AtomicUsize,
    unreachable: AtomicBool,
}

#[derive(Default)]
struct MemoryData {
    collections: HashMap<Namespace, Vec<Record>>,
    next_id: u64,
}

impl MemoryData {
    fn insert(&mut self, ns: &Namespace, mut record: Record) {
        self.next_id += 1;
        record.insert(
            INTERNAL_ID_FIELD.to_owned(),
            Value::String(format!("{:024x}", self.next_id)),
        );
        self.collections.entry(ns.clone()).or_default().push(record);
    }

    fn first_match(&mut self, ns: &Namespace, filter: &Filter) -> Option<&mut Record> {
        self.collections
            .get_mut(ns)?
            .iter_mut()
            .find(|record| filter.matches(record))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert JSON objects into a collection.
    pub fn seed(&self, ns: &Namespace, records: impl IntoIterator<Item = Value>) -> StoreResult<()> {
        let mut data = self.lock();
        for value in records {
            match value {
                Value::Object(record) => data.insert(ns, record),
                other => {
                    return Err(StoreError::operation(format!(
                        "seed records must be JSON objects, got {other}"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Raw contents of a collection, internal identifiers included.
    pub fn records(&self, ns: &Namespace) -> Vec<Record> {
        self.lock().collections.get(ns).cloned().unwrap_or_default()
    }

    /// Number of connections established so far
    pub fn connection_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Refuse the next `n` connection attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.inner.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Refuse every connection attempt until cleared.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Close every open connection, as a server-side idle timeout would.
    pub fn drop_connections(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            store: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Connector handing out handles to a `MemoryStore`
#[derive(Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Handle = MemoryHandle;

    async fn connect(&self) -> StoreResult<MemoryHandle> {
        tokio::task::yield_now().await;
        let inner = &self.store.inner;

        if inner.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::connection("memory store is unreachable"));
        }
        let refused = inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StoreError::connection("connection refused"));
        }

        inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryHandle {
            store: self.store.clone(),
            epoch: inner.epoch.load(Ordering::SeqCst),
        })
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

/// One connection to a `MemoryStore`
#[derive(Clone)]
pub struct MemoryHandle {
    store: MemoryStore,
    epoch: u64,
}

impl fmt::Debug for MemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHandle")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl MemoryHandle {
    async fn checkout(&self) -> StoreResult<MutexGuard<'_, MemoryData>> {
        tokio::task::yield_now().await;
        if self.store.inner.epoch.load(Ordering::SeqCst) != self.epoch {
            return Err(StoreError::connection("connection closed by server"));
        }
        Ok(self.store.lock())
    }
}

#[async_trait]
impl StoreHandle for MemoryHandle {
    async fn ping(&self) -> StoreResult<()> {
        self.checkout().await.map(|_| ())
    }

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> StoreResult<Option<Record>> {
        reject_operators(filter)?;
        let mut data = self.checkout().await?;
        Ok(data
            .first_match(ns, filter)
            .map(|record| strip_internal_ids(record.clone())))
    }

    async fn find_many(&self, ns: &Namespace, filter: &Filter) -> StoreResult<Vec<Record>> {
        reject_operators(filter)?;
        let data = self.checkout().await?;
        Ok(data
            .collections
            .get(ns)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.matches(record))
                    .map(|record| strip_internal_ids(record.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_field(
        &self,
        ns: &Namespace,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64> {
        reject_operators(filter)?;
        let mut data = self.checkout().await?;
        match data.first_match(ns, filter) {
            Some(record) => {
                record.insert(field.to_owned(), value);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn insert_if_absent(
        &self,
        ns: &Namespace,
        filter: &Filter,
        record: Record,
    ) -> StoreResult<bool> {
        reject_operators(filter)?;
        let mut data = self.checkout().await?;
        if data.first_match(ns, filter).is_some() {
            return Ok(false);
        }
        data.insert(ns, strip_internal_ids(record));
        Ok(true)
    }

    async fn increment_field(
        &self,
        ns: &Namespace,
        filter: &Filter,
        field: &str,
        by: i64,
        upsert: bool,
    ) -> StoreResult<Option<Record>> {
        reject_operators(filter)?;
        let mut data = self.checkout().await?;

        if let Some(record) = data.first_match(ns, filter) {
            let current = numeric_field(record, field)?;
            record.insert(field.to_owned(), Value::from(current + by));
            return Ok(Some(strip_internal_ids(record.clone())));
        }
        if !upsert {
            return Ok(None);
        }

        let mut created = equality_fields(filter);
        created.insert(field.to_owned(), Value::from(by));
        data.insert(ns, created.clone());
        Ok(Some(created))
    }
}

fn reject_operators(filter: &Filter) -> StoreResult<()> {
    if filter.uses_operators() {
        return Err(StoreError::operation(
            "query operators are not supported by the memory store",
        ));
    }
    Ok(())
}

fn numeric_field(record: &Record, field: &str) -> StoreResult<i64> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| {
                StoreError::operation(format!(
                    "cannot increment non-numeric field '{field}': {value}"
                ))
            }),
    }
}

fn equality_fields(filter: &Filter) -> Record {
    let mut record = Record::new();
    match filter {
        Filter::All => {}
        Filter::Eq { field, value } => {
            record.insert(field.clone(), value.clone());
        }
        Filter::EqIgnoreCase { field, value } => {
            record.insert(field.clone(), Value::String(value.clone()));
        }
        Filter::Document(query) => record.extend(query.clone()),
    }
    record
}
