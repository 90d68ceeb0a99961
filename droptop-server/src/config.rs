//! Gateway configuration - defaults, TOML file, environment
//!
//! Load order (later wins):
//! 1. Built-in defaults
//! 2. TOML file (`--config` / `DROPTOP_CONFIG`)
//! 3. Environment: `MONGO_URI`, `DB`, `APPS_COLLECTION`, `THEMES_COLLECTION`,
//!    `DROPTOP_COLLECTION`, `DROPTOP_APIKEY`, `DROPTOP_BIND`
//!
//! Command line flags are applied on top by the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use droptop_store::StoreConfig;
use serde::{Deserialize, Serialize};

/// Public GlobalData repository the catalog's static files live in
pub const GLOBAL_DATA_BASE: &str = "https://github.com/Droptop-Four/GlobalData/raw/main/data";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSettings,
    pub store: StoreConfig,
    pub catalog: CatalogConfig,
    pub static_data: StaticDataConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind to (default: 127.0.0.1:8787)
    pub bind_addr: SocketAddr,

    /// Allowed CORS origins. Empty means any origin, which is what a
    /// public read-mostly API wants.
    pub cors_origins: Vec<String>,

    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where each resource kind lives in the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub database: String,
    pub apps_collection: String,
    pub themes_collection: String,
    /// Collection holding the `downloads` and `version` singletons
    pub counters_collection: String,
    /// Required `authorization` header value for counter increments.
    /// Unset leaves increments open.
    pub api_key: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: "droptop".to_string(),
            apps_collection: "community_apps".to_string(),
            themes_collection: "community_themes".to_string(),
            counters_collection: "droptop".to_string(),
            api_key: None,
        }
    }
}

/// Upstream static JSON documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticDataConfig {
    pub changelog_url: String,
    pub announcements_url: String,
    pub timeout_secs: u64,
}

impl Default for StaticDataConfig {
    fn default() -> Self {
        Self {
            changelog_url: format!("{GLOBAL_DATA_BASE}/changelog.json"),
            announcements_url: format!("{GLOBAL_DATA_BASE}/announcements.json"),
            timeout_secs: 10,
        }
    }
}

impl GatewayConfig {
    /// Defaults, then the TOML file at `path` if given, then the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(uri) = lookup("MONGO_URI") {
            self.store.uri = uri;
        }
        if let Some(db) = lookup("DB") {
            self.catalog.database = db;
        }
        if let Some(apps) = lookup("APPS_COLLECTION") {
            self.catalog.apps_collection = apps;
        }
        if let Some(themes) = lookup("THEMES_COLLECTION") {
            self.catalog.themes_collection = themes;
        }
        if let Some(counters) = lookup("DROPTOP_COLLECTION") {
            self.catalog.counters_collection = counters;
        }
        if let Some(key) = lookup("DROPTOP_APIKEY").filter(|k| !k.is_empty()) {
            self.catalog.api_key = Some(key);
        }
        if let Some(bind) = lookup("DROPTOP_BIND") {
            self.server.bind_addr = bind.parse().map_err(|e| ConfigError::Invalid {
                key: "DROPTOP_BIND",
                reason: format!("{bind:?}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Copy suitable for printing: secrets masked.
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        shown.store.uri = self.store.redacted_uri();
        if shown.catalog.api_key.is_some() {
            shown.catalog.api_key = Some("****".to_string());
        }
        shown
    }
}
