//! Shared response types for the API layer.

use crate::sis::error::SyncError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// JSON error envelope returned by every endpoint on failure.
pub struct ApiErrorType {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, message, detail): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            status,
            message: message.to_string(),
            detail,
        }
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "detail": self.detail,
            })),
        )
            .into_response()
    }
}

/// Maps engine errors to outward status codes.
///
/// A remote timeout is a gateway problem (504), never an internal 500; a
/// conflict carries the colliding slot so the UI can explain why.
pub fn sync_error_to_response(error: SyncError) -> Response {
    let (status, message) = match &error {
        SyncError::Configuration { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Service is misconfigured",
        ),
        SyncError::RemoteUnavailable { .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            "Remote system may be slow or unavailable",
        ),
        SyncError::RemoteRejected { .. } => {
            (StatusCode::BAD_GATEWAY, "Remote system rejected the request")
        }
        SyncError::ScheduleConflict { .. } => (StatusCode::CONFLICT, "Schedule conflict"),
        SyncError::ResolutionAmbiguous { .. } => (
            StatusCode::CONFLICT,
            "Record needs manual disambiguation",
        ),
        SyncError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid request"),
        SyncError::MalformedRecord { .. } => (
            StatusCode::BAD_GATEWAY,
            "Remote system sent an unreadable payload",
        ),
        SyncError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to access local storage",
        ),
    };

    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}
