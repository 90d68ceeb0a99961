//! Community apps and themes
//!
//! The same handlers serve both kinds; the router for each kind carries its
//! `ResourceKind` as an extension.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{routing::get, Extension, Json, Router};
use droptop_store::{Record, Selector};
use serde_json::Value;

use crate::catalog::ResourceKind;
use crate::http::error::ApiError;
use crate::http::extractors::NumericId;
use crate::http::server::AppState;

const DOWNLOAD_LINK_FIELD: &str = "direct_download_link";

/// GET /v1/community-{kind}
async fn list(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ResourceKind>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let catalog = &state.catalog;
    let records = state
        .store
        .find_all(&catalog.database, kind.collection(catalog))
        .await?;
    Ok(Json(records))
}

async fn lookup(
    state: &AppState,
    kind: ResourceKind,
    selector: Selector,
) -> Result<Record, ApiError> {
    let (key, value) = match &selector {
        Selector::Id(id) => ("id", id.to_string()),
        Selector::Uuid(uuid) => ("uuid", uuid.clone()),
        Selector::Name(name) => ("name", name.clone()),
        Selector::Query(_) => ("query", String::new()),
    };

    let catalog = &state.catalog;
    state
        .store
        .find_one(&catalog.database, kind.collection(catalog), selector)
        .await?
        .ok_or_else(|| ApiError::missing(kind.noun(), key, &value))
}

/// GET /v1/community-{kind}/{id} and /id/{id}
async fn by_id(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ResourceKind>,
    NumericId(id): NumericId,
) -> Result<Json<Record>, ApiError> {
    lookup(&state, kind, Selector::Id(id)).await.map(Json)
}

/// GET /v1/community-{kind}/name/{name}
async fn by_name(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ResourceKind>,
    Path(name): Path<String>,
) -> Result<Json<Record>, ApiError> {
    lookup(&state, kind, Selector::Name(name)).await.map(Json)
}

/// GET /v1/community-{kind}/uuid/{uuid}
async fn by_uuid(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ResourceKind>,
    Path(uuid): Path<String>,
) -> Result<Json<Record>, ApiError> {
    lookup(&state, kind, Selector::Uuid(uuid)).await.map(Json)
}

/// GET /v1/community-{kind}/{id,name,uuid,download} with no value
async fn to_list(Extension(kind): Extension<ResourceKind>) -> Redirect {
    Redirect::to(&format!("{}/", kind.list_path()))
}

/// GET /v1/community-{kind}/download/{uuid}
///
/// Counts the download, then sends the client to the package. A failed count
/// is logged and does not block the download.
async fn download(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ResourceKind>,
    Path(uuid): Path<String>,
) -> Result<Response, ApiError> {
    let record = lookup(&state, kind, Selector::Uuid(uuid.clone())).await?;

    let link = match record.get(DOWNLOAD_LINK_FIELD).and_then(Value::as_str) {
        Some(link) if !link.is_empty() => link.to_string(),
        _ => {
            return Err(ApiError::NotFound {
                message: format!(
                    "The {} with the '{uuid}' uuid has no download link.",
                    kind.noun()
                ),
            })
        }
    };

    let catalog = &state.catalog;
    if let Err(e) = state
        .store
        .increment_downloads(&catalog.database, kind.collection(catalog), &uuid)
        .await
    {
        tracing::error!(error = %e, %uuid, kind = kind.noun(), "Failed to count download");
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, link)]).into_response())
}

/// Routes for one resource kind
pub fn router(kind: ResourceKind) -> Router<Arc<AppState>> {
    let base = kind.list_path();
    Router::new()
        .route(&base, get(list))
        .route(&format!("{base}/"), get(list))
        .route(&format!("{base}/{{id}}"), get(by_id))
        .route(&format!("{base}/id"), get(to_list))
        .route(&format!("{base}/id/"), get(to_list))
        .route(&format!("{base}/id/{{id}}"), get(by_id))
        .route(&format!("{base}/name"), get(to_list))
        .route(&format!("{base}/name/"), get(to_list))
        .route(&format!("{base}/name/{{name}}"), get(by_name))
        .route(&format!("{base}/uuid"), get(to_list))
        .route(&format!("{base}/uuid/"), get(to_list))
        .route(&format!("{base}/uuid/{{uuid}}"), get(by_uuid))
        .route(&format!("{base}/download"), get(to_list))
        .route(&format!("{base}/download/{{uuid}}"), get(download))
        .layer(Extension(kind))
}
