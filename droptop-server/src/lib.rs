//! droptop-server: HTTP gateway for the Droptop catalog
//!
//! Serves community apps and themes, download counters, the changelog and
//! announcements under `/v1`. Every store access goes through one shared
//! [`droptop_store::DocumentClient`].

pub mod catalog;
pub mod config;
pub mod http;
pub mod static_data;

pub use catalog::ResourceKind;
pub use config::{CatalogConfig, ConfigError, GatewayConfig, ServerSettings, StaticDataConfig};
pub use http::{build_router, run_server, serve, ApiError, AppState, ServerError};
pub use static_data::{FixedStaticData, HttpStaticData, StaticData, StaticDataError};
