//! Query facade - the uniform surface used by every route
//!
//! `DocumentClient` is a cheap handle onto the store actor. Clone it freely;
//! all clones share the actor and therefore the one connection.

use tokio::sync::{mpsc, oneshot, watch};

use crate::actor::{Command, Query, StoreActor};
use crate::backend::{Connector, MongoConnector, Namespace};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::manager::{ConnectionManager, ConnectionState};
use crate::record::Record;
use crate::selector::{Filter, Selector};

#[derive(Clone)]
pub struct DocumentClient {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl DocumentClient {
    /// Start the store actor on the current tokio runtime.
    ///
    /// Nothing connects until the first operation (or `ensure_connection`).
    pub fn spawn<C: Connector>(connector: C, config: &StoreConfig) -> Self {
        let manager = ConnectionManager::new(
            connector,
            config.server_selection_timeout,
            config.max_idle_time,
        );
        let state = manager.subscribe();
        let (commands, inbox) = mpsc::channel(config.channel_capacity.max(1));
        let actor = StoreActor::new(manager, config.increment_mode, inbox, commands.downgrade());
        tokio::spawn(actor.run());

        Self { commands, state }
    }

    /// Start the store actor against the MongoDB deployment in `config`.
    pub fn mongo(config: &StoreConfig) -> Self {
        Self::spawn(MongoConnector::new(config), config)
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Connect now if not already connected.
    pub async fn ensure_connection(&self) -> StoreResult<()> {
        self.request(|reply| Command::Connect { reply }).await
    }

    /// First record matching `selector`, or `None`.
    pub async fn find_one(
        &self,
        db: &str,
        collection: &str,
        selector: Selector,
    ) -> StoreResult<Option<Record>> {
        let ns = Namespace::new(db, collection);
        let filter = selector.to_filter();
        self.query(|reply| Query::FindOne { ns, filter, reply }).await
    }

    /// Every record of the collection, in store order.
    pub async fn find_all(&self, db: &str, collection: &str) -> StoreResult<Vec<Record>> {
        let ns = Namespace::new(db, collection);
        self.query(|reply| Query::FindAll { ns, reply }).await
    }

    /// Add one download to the record with `uuid` and return it.
    ///
    /// An unknown uuid creates `{uuid, downloads: 1}`.
    pub async fn increment_downloads(
        &self,
        db: &str,
        collection: &str,
        uuid: &str,
    ) -> StoreResult<Record> {
        let ns = Namespace::new(db, collection);
        let uuid = uuid.to_owned();
        self.query(|reply| Query::IncrementDownloads { ns, uuid, reply })
            .await
    }

    /// First document matching a raw query, for singletons such as the
    /// `{title: "downloads"}` counters.
    pub async fn find_one_document(
        &self,
        db: &str,
        collection: &str,
        query: Record,
    ) -> StoreResult<Option<Record>> {
        let ns = Namespace::new(db, collection);
        let filter = Filter::Document(query);
        self.query(|reply| Query::FindOne { ns, filter, reply }).await
    }

    /// Stop the actor. Later calls on any clone fail with `Unavailable`.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<StoreResult<T>>) -> Query,
    ) -> StoreResult<T> {
        self.request(|reply| Command::Query(make(reply))).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<StoreResult<T>>) -> Command,
    ) -> StoreResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| StoreError::Unavailable)?;
        response.await.map_err(|_| StoreError::Unavailable)?
    }
}
