//! Connection manager - one lazily established connection, reused
//!
//! State machine:
//!
//! ```text
//! Disconnected --ensure--> Connecting --ok--> Connected
//!                              |                  |
//!                              +--err--> Failed   +--invalidate/stale--> Disconnected
//! ```
//!
//! `Failed` is never terminal: the next `ensure_connection` retries from scratch.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::backend::{Connector, StoreHandle};
use crate::error::{StoreError, StoreResult};

/// Observable lifecycle of the shared connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Live<H> {
    handle: H,
    generation: u64,
    last_used: Instant,
}

/// Owns the single connection handle of one service instance
pub struct ConnectionManager<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    max_idle_time: Duration,
    live: Option<Live<C::Handle>>,
    generation: u64,
    state: watch::Sender<ConnectionState>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, connect_timeout: Duration, max_idle_time: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            connect_timeout,
            max_idle_time,
            live: None,
            generation: 0,
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that follows every state transition
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Return the live handle, establishing one first if needed.
    ///
    /// A handle idle for longer than `max_idle_time` is pinged before reuse;
    /// if the server dropped it, a new connection is made transparently.
    pub async fn ensure_connection(&mut self) -> StoreResult<(C::Handle, u64)> {
        if let Some(live) = self.live.as_mut() {
            let idle_for = live.last_used.elapsed();
            let usable = if idle_for < self.max_idle_time {
                true
            } else {
                match live.handle.ping().await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            idle_secs = idle_for.as_secs(),
                            error = %e,
                            "Idle connection went stale, reconnecting"
                        );
                        false
                    }
                }
            };

            if usable {
                live.last_used = Instant::now();
                return Ok((live.handle.clone(), live.generation));
            }
        }

        self.live = None;
        self.connect().await
    }

    /// Forget the handle of `generation` after it reported a connection error.
    ///
    /// Stale reports about an already replaced handle are ignored.
    pub fn invalidate(&mut self, generation: u64) {
        if self.live.as_ref().is_some_and(|live| live.generation == generation) {
            tracing::warn!(generation, "Dropping broken store connection");
            self.live = None;
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }

    async fn connect(&mut self) -> StoreResult<(C::Handle, u64)> {
        self.state.send_replace(ConnectionState::Connecting);
        tracing::info!(endpoint = %self.connector.describe(), "Connecting to document store");

        let attempt = tokio::time::timeout(self.connect_timeout, self.connector.connect()).await;
        let result = match attempt {
            Ok(result) => result,
            Err(_) => Err(StoreError::connection(format!(
                "no server selected within {} ms",
                self.connect_timeout.as_millis()
            ))),
        };

        match result {
            Ok(handle) => {
                self.generation += 1;
                self.live = Some(Live {
                    handle: handle.clone(),
                    generation: self.generation,
                    last_used: Instant::now(),
                });
                self.state.send_replace(ConnectionState::Connected);
                tracing::info!(generation = self.generation, "Document store connected");
                Ok((handle, self.generation))
            }
            Err(e) => {
                self.state.send_replace(ConnectionState::Failed);
                tracing::warn!(error = %e, "Document store connection failed");
                Err(match e {
                    StoreError::Connection { .. } => e,
                    other => StoreError::connection(other.to_string()),
                })
            }
        }
    }
}
