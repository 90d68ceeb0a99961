//! Axum server setup
//!
//! Server skeleton with:
//! - Any-origin CORS unless origins are configured
//! - Tracing and whole-request timeout middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use droptop_store::DocumentClient;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::routes;
use crate::catalog::ResourceKind;
use crate::config::{CatalogConfig, ServerSettings};
use crate::static_data::StaticData;

/// Shared application state
pub struct AppState {
    pub store: DocumentClient,
    pub catalog: CatalogConfig,
    pub static_data: Arc<dyn StaticData>,
}

impl AppState {
    pub fn new(
        store: DocumentClient,
        catalog: CatalogConfig,
        static_data: impl StaticData + 'static,
    ) -> Self {
        Self {
            store,
            catalog,
            static_data: Arc::new(static_data),
        }
    }
}

/// Build the full router with middleware applied.
pub fn build_router(state: AppState, settings: &ServerSettings) -> Router {
    let mut app = Router::new()
        .merge(routes::health::router())
        .merge(routes::meta::router())
        .merge(routes::changelog::router())
        .merge(routes::downloads::totals_router());

    for kind in ResourceKind::ALL {
        app = app
            .merge(routes::catalog::router(kind))
            .merge(routes::downloads::router(kind));
    }

    app.fallback(route_not_found)
        .layer(TimeoutLayer::new(settings.request_timeout()))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "CORS: ignoring invalid origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```ignore
/// let store = DocumentClient::mongo(&config.store);
/// let state = AppState::new(store, config.catalog, HttpStaticData::new(&config.static_data)?);
/// run_server(state, &config.server).await?;
/// ```
pub async fn run_server(state: AppState, settings: &ServerSettings) -> Result<(), ServerError> {
    let listener = TcpListener::bind(settings.bind_addr).await?;
    serve(listener, state, settings, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    settings: &ServerSettings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let store = state.store.clone();
    let app = build_router(state, settings);

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    store.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
