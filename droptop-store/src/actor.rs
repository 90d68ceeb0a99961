//! Store actor - serializes connection management for one service instance
//!
//! Commands are processed one at a time, so concurrent callers never race to
//! connect: while a connect is in flight they wait in the queue. Once a
//! handle is available the query itself runs on its own task, so slow
//! queries interleave instead of blocking each other.

use tokio::sync::{mpsc, oneshot};

use crate::backend::{Connector, Namespace, StoreHandle};
use crate::config::IncrementMode;
use crate::error::{StoreError, StoreResult};
use crate::manager::ConnectionManager;
use crate::ops;
use crate::record::Record;
use crate::selector::Filter;

type Reply<T> = oneshot::Sender<StoreResult<T>>;

/// Messages accepted by the actor
pub(crate) enum Command {
    /// Establish the connection without running a query
    Connect { reply: Reply<()> },
    Query(Query),
    /// A query saw a connection error on the handle of `generation`
    Invalidate { generation: u64 },
    Shutdown,
}

pub(crate) enum Query {
    FindOne {
        ns: Namespace,
        filter: Filter,
        reply: Reply<Option<Record>>,
    },
    FindAll {
        ns: Namespace,
        reply: Reply<Vec<Record>>,
    },
    IncrementDownloads {
        ns: Namespace,
        uuid: String,
        reply: Reply<Record>,
    },
}

impl Query {
    fn fail(self, error: StoreError) {
        // The caller may have gone away; nobody left to tell.
        match self {
            Self::FindOne { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::FindAll { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::IncrementDownloads { reply, .. } => {
                let _ = reply.send(Err(error));
            }
        }
    }

    async fn execute<H: StoreHandle>(self, session: Session<H>) {
        let handle = &session.handle;
        let mode = session.increment_mode;
        match self {
            Self::FindOne { ns, filter, reply } => {
                tracing::debug!(%ns, ?filter, "find_one");
                let result = ops::find_one(handle, &ns, &filter).await;
                session.respond(reply, result).await;
            }
            Self::FindAll { ns, reply } => {
                tracing::debug!(%ns, "find_all");
                let result = ops::find_all(handle, &ns).await;
                session.respond(reply, result).await;
            }
            Self::IncrementDownloads { ns, uuid, reply } => {
                tracing::debug!(%ns, %uuid, ?mode, "increment_downloads");
                let result = ops::increment_downloads(handle, &ns, &uuid, mode).await;
                session.respond(reply, result).await;
            }
        }
    }
}

/// Everything a spawned query needs from the actor
struct Session<H> {
    handle: H,
    generation: u64,
    increment_mode: IncrementMode,
    feedback: mpsc::WeakSender<Command>,
}

impl<H> Session<H> {
    /// Answer the caller. A connection error first invalidates the handle,
    /// so the caller's next request is queued behind the invalidation.
    async fn respond<T>(&self, reply: Reply<T>, result: StoreResult<T>) {
        if matches!(&result, Err(e) if e.is_connection()) {
            if let Some(commands) = self.feedback.upgrade() {
                let _ = commands
                    .send(Command::Invalidate {
                        generation: self.generation,
                    })
                    .await;
            }
        }
        let _ = reply.send(result);
    }
}

pub(crate) struct StoreActor<C: Connector> {
    manager: ConnectionManager<C>,
    increment_mode: IncrementMode,
    commands: mpsc::Receiver<Command>,
    feedback: mpsc::WeakSender<Command>,
}

impl<C: Connector> StoreActor<C> {
    pub(crate) fn new(
        manager: ConnectionManager<C>,
        increment_mode: IncrementMode,
        commands: mpsc::Receiver<Command>,
        feedback: mpsc::WeakSender<Command>,
    ) -> Self {
        Self {
            manager,
            increment_mode,
            commands,
            feedback,
        }
    }

    pub(crate) async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Connect { reply } => {
                    let result = self.manager.ensure_connection().await.map(|_| ());
                    let _ = reply.send(result);
                }
                Command::Query(query) => self.dispatch(query).await,
                Command::Invalidate { generation } => self.manager.invalidate(generation),
                Command::Shutdown => break,
            }
        }
        tracing::info!("Store actor stopped");
    }

    async fn dispatch(&mut self, query: Query) {
        let (handle, generation) = match self.manager.ensure_connection().await {
            Ok(live) => live,
            Err(e) => return query.fail(e),
        };

        let session = Session {
            handle,
            generation,
            increment_mode: self.increment_mode,
            feedback: self.feedback.clone(),
        };
        tokio::spawn(query.execute(session));
    }
}
