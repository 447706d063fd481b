//! Schedule reconciliation engine.
//!
//! One pass is a stateless batch job: fetch the remote dataset, build the
//! lookup tables with bulk queries, resolve and classify every record, and
//! hand the report back. Nothing is persisted; corrective actions go
//! through the conflict-gated mutation path instead.

pub mod classify;
pub mod conflict;
pub mod loader;
pub mod resolver;
pub mod types;
pub mod writeback;

pub use types::ReconciliationReport;

use crate::types::AppState;
use chrono::Utc;
use rand::Rng;
use tracing::info;

use crate::sis::error::SyncError;

/// Runs one full reconciliation pass.
pub async fn run_reconciliation(state: &AppState) -> Result<ReconciliationReport, SyncError> {
    let correlation_id = generate_correlation_id();
    let started = std::time::Instant::now();
    info!(correlation_id = %correlation_id, "Starting reconciliation pass");

    let (records, dropped) = state
        .retry_policy
        .run("fetch schedules", || state.client.fetch_schedules())
        .await?;

    let today = Utc::now().date_naive();
    let tables = loader::load_lookup_tables(&state.db, &records, today)?;
    let mut report = classify::classify_all(&records, &tables, today);

    // Rows dropped at ingestion are part of the skipped tally too.
    for reason in dropped {
        report.skipped.push(types::SkippedRecord {
            remote_id: String::new(),
            reason,
        });
    }

    info!(
        correlation_id = %correlation_id,
        total = report.total,
        assigned = report.assigned,
        unassigned = report.unassigned,
        skipped = report.skipped.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Reconciliation pass finished"
    );
    Ok(report)
}

/// Generates a unique correlation ID for pass tracing.
fn generate_correlation_id() -> String {
    let timestamp = Utc::now().timestamp_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}

#[cfg(test)]
mod tests {
    use super::types::{RemoteScheduleRecord, SyncStatus, TimeRange, Weekday};
    use super::{classify, loader};
    use crate::db::LocalDbManager;
    use chrono::NaiveDate;

    fn remote(
        id: &str,
        subject: (&str, &str),
        section: &str,
        start_min: u16,
        teacher: Option<&str>,
    ) -> RemoteScheduleRecord {
        RemoteScheduleRecord {
            remote_id: id.to_string(),
            subject_code: subject.0.to_string(),
            subject_name: subject.1.to_string(),
            section_name: section.to_string(),
            day: Weekday::Monday,
            time: TimeRange::new(start_min, start_min + 60),
            room: None,
            assigned: teacher.is_some(),
            teacher_external_id: teacher.map(str::to_string),
            teacher_name: None,
        }
    }

    #[test]
    fn test_full_pass_against_seeded_database() {
        let db = LocalDbManager::in_memory();
        let math = db.insert_subject("MATH7", "Mathematics 7").unwrap();
        let sci = db.insert_subject("SCI7", "Science 7").unwrap();
        let rizal = db.insert_section("Rizal", Some("7")).unwrap();
        db.insert_section("Bonifacio", Some("7")).unwrap();
        let cruz = db.insert_faculty(Some("E100"), "A. Cruz", None).unwrap();
        db.insert_slot(math, rizal, Some(cruz), Weekday::Monday, 480, 540)
            .unwrap();
        db.insert_slot(sci, rizal, None, Weekday::Monday, 600, 660)
            .unwrap();

        let records = vec![
            // Assigned on both sides to the same person.
            remote("R1", ("MATH7", "Mathematics 7"), "Grade 7 - Rizal", 480, Some("E100")),
            // Defined locally without an assignee; remote has nobody either.
            remote("R2", ("SCI7", "Science 7"), "Grade 7 - Rizal", 600, None),
            // Remote knows a meeting the local side has no slot for.
            remote("R3", ("MATH7", "Mathematics 7"), "Grade 7 - Bonifacio", 720, Some("E100")),
            // Unknown subject: skipped with a reason.
            remote("R4", ("ART7", "Arts 7"), "Grade 7 - Rizal", 780, None),
        ];

        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let tables = loader::load_lookup_tables(&db, &records, today).unwrap();
        let report = classify::classify_all(&records, &tables, today);

        assert_eq!(report.total, 3);
        assert_eq!(report.assigned + report.unassigned, report.total);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].remote_id, "R4");

        let by_id = |id: &str| report.records.iter().find(|r| r.remote_id == id).unwrap();
        assert_eq!(by_id("R1").sync_status, SyncStatus::Synced);
        assert!(!by_id("R1").assignee_mismatch);
        assert_eq!(by_id("R2").sync_status, SyncStatus::Unassigned);
        assert!(by_id("R2").exists_locally);
        assert_eq!(by_id("R3").sync_status, SyncStatus::RemoteOnly);
        assert!(!by_id("R3").exists_locally);
        assert_eq!(by_id("R3").original_faculty_id, Some(cruz));
    }
}
