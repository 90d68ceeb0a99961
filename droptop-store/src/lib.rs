//! droptop-store: shared document-store access for the Droptop API
//!
//! One `DocumentClient` per service instance owns exactly one lazily
//! established connection, funnelled through a single actor task:
//!
//! - `manager` - connect-if-needed, failure surfacing, stale-connection replacement
//! - `facade` - `find_one` / `find_all` / `increment_downloads` / `find_one_document`
//! - `backend` - MongoDB and in-memory implementations of the connector seam
//!
//! Records come back as plain JSON objects without internal identifiers;
//! "not found" is `Ok(None)`, never an error.

mod actor;
pub mod backend;
pub mod config;
pub mod error;
pub mod facade;
pub mod manager;
mod ops;
pub mod record;
pub mod selector;

pub use backend::{Connector, MemoryConnector, MemoryStore, MongoConnector, Namespace, StoreHandle};
pub use config::{IncrementMode, StoreConfig};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use facade::DocumentClient;
pub use manager::{ConnectionManager, ConnectionState};
pub use record::Record;
pub use selector::{Filter, Selector};
