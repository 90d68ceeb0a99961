//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::ApiError;
use super::server::AppState;

/// Numeric resource id from the path
pub struct NumericId(pub i64);

impl<S> FromRequestParts<S> for NumericId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("You need to specify an id."))?;

        id.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ApiError::InvalidId { id })
    }
}

/// Proof that the request carries the configured API key.
///
/// With no key configured every request passes.
pub struct Authorized;

impl FromRequestParts<Arc<AppState>> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.catalog.api_key.as_deref() else {
            return Ok(Self);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        if presented == Some(expected) {
            Ok(Self)
        } else {
            tracing::warn!("Rejected counter update with missing or wrong API key");
            Err(ApiError::Unauthorized)
        }
    }
}
