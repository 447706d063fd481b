//! Conflict-gated schedule mutation endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::reconcile::conflict::SlotProposal;
use crate::reconcile::types::{TimeRange, Weekday};
use crate::reconcile::writeback;
use crate::server::types::sync_error_to_response;
use crate::sis::error::SyncError;
use crate::types::AppState;

const MIN_DURATION_HOURS: f32 = 0.5;
const MAX_DURATION_HOURS: f32 = 5.0;

/// Request body for creating or updating a teaching assignment.
#[derive(Debug, Deserialize)]
pub struct ScheduleUpdateBody {
    pub faculty_id: i64,
    pub subject_id: i64,
    pub section_id: i64,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub room: Option<String>,
    /// Remote schedule id from the reconciliation view; enables the
    /// best-effort write-back after the local write commits.
    pub remote_schedule_id: Option<String>,
}

impl ScheduleUpdateBody {
    /// Validates and converts the body into a proposal.
    fn into_proposal(self) -> Result<(SlotProposal, Option<String>), SyncError> {
        let day: Weekday = self.day.parse().map_err(|e| SyncError::Validation {
            message: format!("{e}"),
        })?;
        let time = TimeRange::parse(&self.start_time, &self.end_time).map_err(|e| {
            SyncError::Validation {
                message: format!("{e}"),
            }
        })?;

        // Meetings run on half-hour boundaries.
        if time.start_min % 30 != 0 || time.end_min % 30 != 0 {
            return Err(SyncError::Validation {
                message: "times must fall on half-hour boundaries".to_string(),
            });
        }
        let duration = time.duration_hours();
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&duration) {
            return Err(SyncError::Validation {
                message: format!(
                    "duration must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS} hours"
                ),
            });
        }

        Ok((
            SlotProposal {
                subject_id: self.subject_id,
                section_id: self.section_id,
                faculty_id: self.faculty_id,
                day,
                time,
                room: self.room,
            },
            self.remote_schedule_id,
        ))
    }
}

async fn apply_assignment(
    s: &Arc<AppState>,
    body: ScheduleUpdateBody,
    exclude_slot_id: Option<i64>,
) -> Response {
    let (proposal, remote_schedule_id) = match body.into_proposal() {
        Ok(parsed) => parsed,
        Err(e) => return sync_error_to_response(e),
    };

    // Conflict check and write share one transaction; of two racing
    // proposals exactly one commits.
    let slot = match s.db.assign_slot(&proposal, exclude_slot_id) {
        Ok(slot) => slot,
        Err(e) => {
            error!("Assignment rejected: {}", e);
            return sync_error_to_response(e);
        }
    };

    // Local state is authoritative once conflict-checked; the remote push
    // is best-effort and its failure is reported, not rolled back.
    let sync = match remote_schedule_id {
        Some(remote_id) => {
            let external_id = s
                .db
                .faculty_by_id(proposal.faculty_id)
                .ok()
                .flatten()
                .and_then(|f| f.external_id);
            match external_id {
                Some(ext) => {
                    Some(writeback::sync_assignment(&s.client, &remote_id, Some(&ext), true).await)
                }
                None => None,
            }
        }
        None => None,
    };

    (StatusCode::OK, Json(json!({ "slot": slot, "sync": sync }))).into_response()
}

/// POST /schedule
///
/// Creates a new conflict-checked teaching assignment.
pub async fn post_create_schedule(
    State(s): State<Arc<AppState>>,
    Json(body): Json<ScheduleUpdateBody>,
) -> Response {
    info!("POST /schedule");
    apply_assignment(&s, body, None).await
}

/// PUT /schedule/:slot_id
///
/// Updates an existing assignment in place. The slot being edited is
/// excluded from its own conflict check.
pub async fn put_update_schedule(
    Path(slot_id): Path<i64>,
    State(s): State<Arc<AppState>>,
    Json(body): Json<ScheduleUpdateBody>,
) -> Response {
    info!("PUT /schedule/{}", slot_id);
    apply_assignment(&s, body, Some(slot_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(start: &str, end: &str) -> ScheduleUpdateBody {
        ScheduleUpdateBody {
            faculty_id: 1,
            subject_id: 2,
            section_id: 3,
            day: "Monday".to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            room: None,
            remote_schedule_id: None,
        }
    }

    #[test]
    fn test_valid_body_parses() {
        let (proposal, _) = body("08:00", "09:30").into_proposal().unwrap();
        assert_eq!(proposal.day, Weekday::Monday);
        assert_eq!(proposal.time.to_string(), "08:00-09:30");
    }

    #[test]
    fn test_rejects_off_grid_times() {
        let err = body("08:10", "09:00").into_proposal().unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn test_rejects_out_of_range_duration() {
        assert!(body("08:00", "14:00").into_proposal().is_err());
        assert!(body("08:00", "08:30").into_proposal().is_ok());
    }

    #[test]
    fn test_rejects_bad_day() {
        let mut b = body("08:00", "09:00");
        b.day = "Funday".to_string();
        assert!(b.into_proposal().is_err());
    }
}
