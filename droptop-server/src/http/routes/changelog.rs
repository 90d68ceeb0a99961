//! Changelog and announcements, proxied from static data

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};
use serde_json::Value;

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::static_data::find_changenote;

/// GET /v1/changelog
async fn changelog(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(state.static_data.changelog().await?))
}

/// GET /v1/changelog/{version}
async fn changenote(
    State(state): State<Arc<AppState>>,
    Path(version): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entries = state.static_data.changelog().await?;
    find_changenote(&entries, &version)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            message: format!("The changenote with the '{version}' version does not exist."),
        })
}

/// GET /v1/announcements
async fn announcements(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.static_data.announcements().await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/changelog", get(changelog))
        .route("/v1/changelog/", get(changelog))
        .route("/v1/changelog/{version}", get(changenote))
        .route("/v1/announcements", get(announcements))
}
