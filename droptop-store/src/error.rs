/// Structured error types for droptop-store.
///
/// Not-found is deliberately absent: a selector that matches nothing is a
/// normal `Ok(None)`, never an error. Callers map the two failure kinds
/// below onto their own responses.

use thiserror::Error;

/// Coarse failure classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store could not be reached or authenticated
    Connection,
    /// The store was reachable but the operation failed
    Operation,
}

/// Main error type for store operations
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Connecting, authenticating or selecting a server failed, or a live
    /// connection was dropped underneath an operation
    #[error("connection error: {message}")]
    Connection { message: String },

    /// A query ran against a live connection and failed
    #[error("operation error: {message}")]
    Operation { message: String },

    /// The store actor has stopped and accepts no more work
    #[error("store is unavailable: the connection actor has shut down")]
    Unavailable,
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an operation error
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Operation { .. } | Self::Unavailable => ErrorKind::Operation,
        }
    }

    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::operation(format!("JSON error: {e}"))
    }
}
