//! Reconciliation view endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::{error, info};

use crate::reconcile;
use crate::server::types::sync_error_to_response;
use crate::types::AppState;

/// GET /reconciliation
///
/// Runs a full reconciliation pass and returns every reconciled record with
/// assigned/unassigned counts and the skipped-record list.
pub async fn get_reconciliation(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /reconciliation");

    match reconcile::run_reconciliation(&s).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Reconciliation pass failed: {}", e);
            sync_error_to_response(e)
        }
    }
}
