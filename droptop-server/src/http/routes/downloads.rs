//! Download counters

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use droptop_store::record::downloads_of;
use droptop_store::{Record, Selector};
use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::ResourceKind;
use crate::http::error::ApiError;
use crate::http::extractors::Authorized;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct DownloadCount {
    pub uuid: String,
    pub downloads: u64,
}

impl DownloadCount {
    fn from_record(uuid: String, record: &Record) -> Result<Self, ApiError> {
        Ok(Self {
            uuid,
            downloads: downloads_of(record)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadTotals {
    pub basic_downloads: Value,
    pub update_downloads: Value,
}

/// GET /v1/downloads
async fn totals(State(state): State<Arc<AppState>>) -> Result<Json<DownloadTotals>, ApiError> {
    let mut query = Record::new();
    query.insert("title".into(), json!("downloads"));

    let catalog = &state.catalog;
    let document = state
        .store
        .find_one_document(&catalog.database, &catalog.counters_collection, query)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            message: "The downloads document does not exist.".to_string(),
        })?;

    let field = |name: &str| document.get(name).cloned().unwrap_or(Value::Null);
    Ok(Json(DownloadTotals {
        basic_downloads: field("basic_downloads"),
        update_downloads: field("update_downloads"),
    }))
}

/// GET|POST /v1/downloads/community-{kind} with no uuid
async fn missing_uuid() -> ApiError {
    ApiError::bad_request("You need to specify an uuid.")
}

/// GET /v1/downloads/community-{kind}/{uuid}
async fn count(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ResourceKind>,
    Path(uuid): Path<String>,
) -> Result<Json<DownloadCount>, ApiError> {
    let catalog = &state.catalog;
    let record = state
        .store
        .find_one(
            &catalog.database,
            kind.collection(catalog),
            Selector::Uuid(uuid.clone()),
        )
        .await?
        .ok_or_else(|| ApiError::missing(kind.noun(), "uuid", &uuid))?;

    DownloadCount::from_record(uuid, &record).map(Json)
}

/// POST /v1/downloads/community-{kind}/{uuid}
async fn increment(
    _: Authorized,
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ResourceKind>,
    Path(uuid): Path<String>,
) -> Result<Json<DownloadCount>, ApiError> {
    let catalog = &state.catalog;
    let record = state
        .store
        .increment_downloads(&catalog.database, kind.collection(catalog), &uuid)
        .await?;

    tracing::info!(%uuid, kind = kind.noun(), "Download counted");
    DownloadCount::from_record(uuid, &record).map(Json)
}

/// Totals route
pub fn totals_router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/downloads", get(totals))
}

/// Per-uuid counter routes for one resource kind
pub fn router(kind: ResourceKind) -> Router<Arc<AppState>> {
    let base = format!("/v1/downloads/{}", kind.segment());
    Router::new()
        .route(&base, get(missing_uuid).post(missing_uuid))
        .route(&format!("{base}/"), get(missing_uuid).post(missing_uuid))
        .route(&format!("{base}/{{uuid}}"), get(count).post(increment))
        .layer(Extension(kind))
}
