use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::server::endpoints::{reconcile, schedule, sync};
use crate::types::AppState;

mod endpoints;
mod types;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/reconciliation", get(reconcile::get_reconciliation))
        .route("/schedule", post(schedule::post_create_schedule))
        .route("/schedule/:slot_id", put(schedule::put_update_schedule))
        .route("/sync/assignments", post(sync::post_sync_assignments))
        .route("/sync/advisers", post(sync::post_sync_advisers))
        .with_state(app_state)
}

async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
