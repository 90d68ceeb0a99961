//! API root, endpoint listing, ping and version

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use droptop_store::Record;
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::error::ApiError;
use crate::http::server::AppState;

/// One entry of the `/v1` listing
#[derive(Debug, Serialize)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const fn endpoint(method: &'static str, path: &'static str, description: &'static str) -> Endpoint {
    Endpoint {
        method,
        path,
        description,
    }
}

pub const ENDPOINTS: &[Endpoint] = &[
    endpoint("GET", "/v1", "Returns the list of endpoints (this list)"),
    endpoint("GET", "/v1/ping", "Liveness check"),
    endpoint("GET", "/v1/version", "Returns the current Droptop Four version"),
    endpoint("GET", "/v1/changelog", "Returns the Droptop Four changelog"),
    endpoint(
        "GET",
        "/v1/changelog/[version]",
        "Returns the Droptop Four changelog for the [version] version",
    ),
    endpoint("GET", "/v1/announcements", "Returns the Droptop Four announcements"),
    endpoint(
        "GET",
        "/v1/community-apps",
        "Returns the list of all Droptop Four community apps",
    ),
    endpoint(
        "GET",
        "/v1/community-apps/[id]",
        "Returns the Droptop Four community app with the [id] id",
    ),
    endpoint(
        "GET",
        "/v1/community-apps/id/[id]",
        "Returns the Droptop Four community app with the [id] id",
    ),
    endpoint(
        "GET",
        "/v1/community-apps/name/[name]",
        "Returns the Droptop Four community app with the [name] name",
    ),
    endpoint(
        "GET",
        "/v1/community-apps/uuid/[uuid]",
        "Returns the Droptop Four community app with the [uuid] uuid",
    ),
    endpoint(
        "GET",
        "/v1/community-apps/download/[uuid]",
        "Counts a download and redirects to the community app with the [uuid] uuid",
    ),
    endpoint(
        "GET",
        "/v1/community-themes",
        "Returns the list of all Droptop Four community themes",
    ),
    endpoint(
        "GET",
        "/v1/community-themes/[id]",
        "Returns the Droptop Four community theme with the [id] id",
    ),
    endpoint(
        "GET",
        "/v1/community-themes/id/[id]",
        "Returns the Droptop Four community theme with the [id] id",
    ),
    endpoint(
        "GET",
        "/v1/community-themes/name/[name]",
        "Returns the Droptop Four community theme with the [name] name",
    ),
    endpoint(
        "GET",
        "/v1/community-themes/uuid/[uuid]",
        "Returns the Droptop Four community theme with the [uuid] uuid",
    ),
    endpoint(
        "GET",
        "/v1/community-themes/download/[uuid]",
        "Counts a download and redirects to the community theme with the [uuid] uuid",
    ),
    endpoint("GET", "/v1/downloads", "Returns the number of downloads of Droptop Four"),
    endpoint(
        "GET",
        "/v1/downloads/community-apps/[uuid]",
        "Returns the number of downloads of the Droptop Four community app with the [uuid] uuid",
    ),
    endpoint(
        "POST",
        "/v1/downloads/community-apps/[uuid]",
        "Adds one download to the Droptop Four community app with the [uuid] uuid",
    ),
    endpoint(
        "GET",
        "/v1/downloads/community-themes/[uuid]",
        "Returns the number of downloads of the Droptop Four community theme with the [uuid] uuid",
    ),
    endpoint(
        "POST",
        "/v1/downloads/community-themes/[uuid]",
        "Adds one download to the Droptop Four community theme with the [uuid] uuid",
    ),
];

/// GET /
async fn root() -> ApiError {
    ApiError::bad_request("You need to specify the api version.")
}

/// GET /v1
async fn endpoints() -> Json<&'static [Endpoint]> {
    Json(ENDPOINTS)
}

/// GET /v1/ping
async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// GET /v1/version
async fn version(State(state): State<Arc<AppState>>) -> Result<Json<Record>, ApiError> {
    let mut query = Record::new();
    query.insert("title".into(), json!("version"));

    let catalog = &state.catalog;
    state
        .store
        .find_one_document(&catalog.database, &catalog.counters_collection, query)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            message: "The version document does not exist.".to_string(),
        })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/v1", get(endpoints))
        .route("/v1/", get(endpoints))
        .route("/v1/ping", get(ping))
        .route("/v1/version", get(version))
}
