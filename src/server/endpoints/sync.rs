//! Bulk write-back endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::reconcile::writeback;
use crate::server::types::sync_error_to_response;
use crate::types::AppState;

/// POST /sync/assignments
///
/// Pushes every locally-decided teaching assignment to the remote cache and
/// returns the per-record outcome summary.
pub async fn post_sync_assignments(State(s): State<Arc<AppState>>) -> Response {
    info!("POST /sync/assignments");

    let today = Utc::now().date_naive();
    match writeback::sync_all_assignments(&s.client, &s.db, &s.retry_policy, today).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Bulk assignment sync failed: {}", e);
            sync_error_to_response(e)
        }
    }
}

/// POST /sync/advisers
///
/// Pushes every locally-set section adviser to the remote cache.
pub async fn post_sync_advisers(State(s): State<Arc<AppState>>) -> Response {
    info!("POST /sync/advisers");

    match writeback::sync_all_advisers(&s.client, &s.db, &s.retry_policy).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Bulk adviser sync failed: {}", e);
            sync_error_to_response(e)
        }
    }
}
