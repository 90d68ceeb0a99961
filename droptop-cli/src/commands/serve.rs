//! HTTP server command
//!
//! Runs the gateway against MongoDB, or against an in-process store with
//! `--memory` for local development.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use droptop_server::{run_server, AppState, GatewayConfig, HttpStaticData};
use droptop_store::{DocumentClient, IncrementMode, MemoryStore, Namespace};
use serde_json::Value;

/// Arguments for the serve command
#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind to (overrides config and DROPTOP_BIND)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// MongoDB connection string (overrides config and MONGO_URI)
    #[arg(long)]
    pub mongo_uri: Option<String>,

    /// Allowed CORS origin; repeat for several. None means any origin.
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,

    /// How download counters are bumped
    #[arg(long, value_enum)]
    pub increment_mode: Option<IncrementArg>,

    /// Serve from an in-process store instead of MongoDB
    #[arg(long)]
    pub memory: bool,

    /// JSON file of `{"collection": [records...]}` to load into the in-process store
    #[arg(long, requires = "memory")]
    pub seed: Option<PathBuf>,

    /// Connect to the store before accepting requests
    #[arg(long)]
    pub eager: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementArg {
    /// Read, add one, write back
    ReadModifyWrite,
    /// Single server-side increment
    Atomic,
}

impl From<IncrementArg> for IncrementMode {
    fn from(arg: IncrementArg) -> Self {
        match arg {
            IncrementArg::ReadModifyWrite => IncrementMode::ReadModifyWrite,
            IncrementArg::Atomic => IncrementMode::Atomic,
        }
    }
}

impl ServeArgs {
    /// Command line flags win over file and environment.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(bind) = self.bind {
            config.server.bind_addr = bind;
        }
        if let Some(uri) = &self.mongo_uri {
            config.store.uri = uri.clone();
        }
        if !self.cors_origins.is_empty() {
            config.server.cors_origins = self.cors_origins.clone();
        }
        if let Some(mode) = self.increment_mode {
            config.store.increment_mode = mode.into();
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = GatewayConfig::load(config_path).context("Failed to load configuration")?;
    args.apply(&mut config);

    let store = if args.memory {
        let memory = MemoryStore::new();
        if let Some(seed) = &args.seed {
            let loaded = seed_memory_store(&memory, &config.catalog.database, seed)?;
            tracing::info!(records = loaded, seed = %seed.display(), "Seeded in-memory store");
        }
        tracing::warn!("Serving from an in-memory store; nothing is persisted");
        DocumentClient::spawn(memory.connector(), &config.store)
    } else {
        tracing::info!(uri = %config.store.redacted_uri(), "Using MongoDB store");
        DocumentClient::mongo(&config.store)
    };

    if args.eager {
        // A failure here is not fatal; the next request retries.
        if let Err(e) = store.ensure_connection().await {
            tracing::warn!(error = %e, "Initial store connection failed");
        }
    }

    let static_data =
        HttpStaticData::new(&config.static_data).context("Failed to build static data client")?;
    let state = AppState::new(store, config.catalog.clone(), static_data);

    tracing::info!("Starting droptop-api on {}", config.server.bind_addr);

    // Run server (blocks until shutdown)
    run_server(state, &config.server)
        .await
        .context("Server error")?;

    Ok(())
}

/// Load `{"collection": [records...]}` into `database`. Returns the record count.
fn seed_memory_store(store: &MemoryStore, database: &str, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

    let Value::Object(collections) = document else {
        bail!("Seed file {} must be a JSON object of collections", path.display());
    };

    let mut loaded = 0;
    for (collection, records) in collections {
        let Value::Array(records) = records else {
            bail!("Seed collection {collection:?} must be an array");
        };
        loaded += records.len();
        store
            .seed(&Namespace::new(database, &collection), records)
            .with_context(|| format!("Failed to seed collection {collection:?}"))?;
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_config() {
        let args = ServeArgs {
            bind: Some("0.0.0.0:8080".parse().unwrap()),
            cors_origins: vec!["https://droptop.example".to_string()],
            increment_mode: Some(IncrementArg::Atomic),
            ..ServeArgs::default()
        };
        let mut config = GatewayConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server.bind_addr.port(), 8080);
        assert_eq!(config.server.cors_origins.len(), 1);
        assert_eq!(config.store.increment_mode, IncrementMode::Atomic);
        assert_eq!(config.store.uri, GatewayConfig::default().store.uri);
    }

    #[test]
    fn seed_file_fills_collections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"community_apps": [{{"id": 1, "uuid": "a"}}, {{"id": 2, "uuid": "b"}}],
                "droptop": [{{"title": "downloads", "basic_downloads": 0}}]}}"#
        )
        .unwrap();

        let store = MemoryStore::new();
        let loaded = seed_memory_store(&store, "droptop", file.path()).unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(
            store.records(&Namespace::new("droptop", "community_apps")).len(),
            2
        );
    }

    #[test]
    fn seed_file_must_be_collections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": 1}}]"#).unwrap();
        let err = seed_memory_store(&MemoryStore::new(), "droptop", file.path()).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }
}
