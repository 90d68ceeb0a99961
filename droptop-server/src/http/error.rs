//! API error type with IntoResponse
//!
//! Every error body has the shape
//! `{"error": {"type": ..., "status": ..., "message": ...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use droptop_store::{ErrorKind, StoreError};
use serde_json::json;

use crate::static_data::StaticDataError;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (400)
    BadRequest { message: String },

    /// Path id that does not parse as a number (400)
    InvalidId { id: String },

    /// Missing or wrong API key (401)
    Unauthorized,

    /// Lookup came back empty (404)
    NotFound { message: String },

    /// No route matched (404)
    RouteNotFound,

    /// Store failure (500, logged)
    Store(StoreError),

    /// Static document fetch failed (502, logged)
    Upstream(StaticDataError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// "The app with the 'abc' uuid does not exist."
    pub fn missing(noun: &str, key: &str, value: &str) -> Self {
        Self::NotFound {
            message: format!("The {noun} with the '{value}' {key} does not exist."),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } | Self::InvalidId { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match self {
            Self::BadRequest { message } => ("Bad Request", message),
            Self::InvalidId { id } => ("Invalid id", format!("The '{id}' id is not a number.")),
            Self::Unauthorized => (
                "Unauthorized",
                "You need to specify a valid API KEY.".to_string(),
            ),
            Self::NotFound { message } => ("Not found", message),
            Self::RouteNotFound => ("Not found", "404, not found!".to_string()),
            Self::Store(e) => {
                // Log the actual error, return generic message
                tracing::error!(error = %e, kind = ?e.kind(), "Store error");
                let message = match e.kind() {
                    ErrorKind::Connection => "Failed to connect to the database.",
                    ErrorKind::Operation => "Failed to retrieve data.",
                };
                ("Something went wrong", message.to_string())
            }
            Self::Upstream(e) => {
                tracing::error!(error = %e, "Static data error");
                ("Bad Gateway", "Failed to fetch upstream data.".to_string())
            }
        };

        let body = json!({
            "error": {
                "type": kind,
                "status": status.as_u16(),
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<StaticDataError> for ApiError {
    fn from(e: StaticDataError) -> Self {
        Self::Upstream(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_404() {
        let err = ApiError::missing("theme", "id", "42");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn missing_message_names_the_key() {
        let ApiError::NotFound { message } = ApiError::missing("app", "uuid", "abc") else {
            panic!("expected NotFound");
        };
        assert_eq!(message, "The app with the 'abc' uuid does not exist.");
    }

    #[test]
    fn store_errors_are_500() {
        let connection = ApiError::from(StoreError::connection("refused"));
        assert_eq!(connection.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let operation = ApiError::from(StoreError::operation("bad field"));
        assert_eq!(operation.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_id_and_unauthorized() {
        assert_eq!(
            ApiError::InvalidId { id: "x".into() }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
