//! Write-back of local assignment decisions to the remote SIS.
//!
//! The local system is the system of record for who actually teaches; the
//! remote side only caches the assignment and the section adviser. Every
//! push is an idempotent upsert (unassignment sends a null assignee, there
//! is no delete operation), and a failed push never fails the local
//! operation that triggered it. The remote cache self-heals on the next
//! full reconciliation pass.
//!
//! Planning (which rows get pushed, with what body) is pure and separate
//! from the HTTP execution loop, mirroring the detector/storage split.

use super::loader::load_lookup_tables;
use super::resolver::{match_section_name, LookupTables, SectionMatch, AMBIGUITY_MARGIN};
use crate::db::{DbSectionAssignment, LocalDbManager};
use crate::reconcile::types::{MatchKey, RemoteScheduleRecord};
use crate::sis::{RetryPolicy, SisClient, SyncError};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};

const ASSIGNMENT_SYNC_PATH: &str = "schedules/assignment";
const ADVISER_SYNC_PATH: &str = "sections/adviser";

/// Outcome of one best-effort push.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub synced: bool,
    pub message: String,
}

impl SyncOutcome {
    fn ok() -> Self {
        Self {
            synced: true,
            message: "synced".to_string(),
        }
    }

    fn failed(e: &SyncError) -> Self {
        Self {
            synced: false,
            message: e.to_string(),
        }
    }
}

/// One attempted push in a bulk run, success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub target: String,
    pub synced: bool,
    pub message: String,
}

/// Summary of a bulk write-back run. Always returned, even under partial
/// failure, so callers see "N processed, M skipped, K errors" with every
/// attempted push attributable, instead of an opaque abort.
#[derive(Debug, Clone, Serialize)]
pub struct BulkSyncReport {
    pub total: usize,
    pub synced: usize,
    pub skipped: usize,
    pub outcomes: Vec<RecordOutcome>,
    pub errors: Vec<String>,
}

impl BulkSyncReport {
    fn with_total(total: usize) -> Self {
        Self {
            total,
            synced: 0,
            skipped: 0,
            outcomes: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tallies one push outcome into the counts, the per-record list, and
    /// (on failure) the error list.
    fn record(&mut self, target: String, outcome: SyncOutcome) {
        if outcome.synced {
            self.synced += 1;
        } else {
            self.errors.push(format!("{target}: {}", outcome.message));
        }
        self.outcomes.push(RecordOutcome {
            target,
            synced: outcome.synced,
            message: outcome.message,
        });
    }
}

/// A planned assignment push: remote schedule id plus the shared employee id
/// of the local assignee.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentPush {
    pub remote_schedule_id: String,
    pub external_employee_id: String,
}

/// A planned adviser push.
#[derive(Debug, Clone, PartialEq)]
pub struct AdviserPush {
    pub remote_section_id: String,
    pub section_name: String,
    pub external_employee_id: String,
    pub adviser_name: Option<String>,
    pub adviser_email: Option<String>,
}

/// Pure output of a planning pass: what to push, how many rows were skipped,
/// and any planning-level errors (ambiguous matches).
#[derive(Debug)]
pub struct PushPlan<T> {
    pub pushes: Vec<T>,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl<T> Default for PushPlan<T> {
    fn default() -> Self {
        Self {
            pushes: Vec::new(),
            skipped: 0,
            errors: Vec::new(),
        }
    }
}

fn assignment_body(
    remote_schedule_id: &str,
    external_employee_id: Option<&str>,
    assigned: bool,
) -> serde_json::Value {
    json!({
        "scheduleId": remote_schedule_id,
        "employeeId": external_employee_id,
        "assigned": assigned,
    })
}

fn adviser_body(
    remote_section_id: &str,
    external_employee_id: Option<&str>,
    name: Option<&str>,
    email: Option<&str>,
) -> serde_json::Value {
    json!({
        "sectionId": remote_section_id,
        "employeeId": external_employee_id,
        "adviserName": name,
        "adviserEmail": email,
    })
}

/// Decides which remote schedule records get an assignment push.
///
/// A record is pushed only when it resolves cleanly and its local slot has
/// an assignee with a shared employee id; everything else is skipped. An
/// ambiguous section match additionally lands in `errors` since it is a data
/// problem worth surfacing, not a quiet skip.
pub fn plan_assignment_pushes(
    records: &[RemoteScheduleRecord],
    tables: &LookupTables,
) -> PushPlan<AssignmentPush> {
    let mut plan = PushPlan::default();

    for record in records {
        let Some(subject) = tables.resolve_subject(&record.subject_code, &record.subject_name)
        else {
            plan.skipped += 1;
            continue;
        };
        let section_id = match tables.resolve_section(&record.section_name) {
            SectionMatch::Match(id) => id,
            SectionMatch::NoMatch => {
                plan.skipped += 1;
                continue;
            }
            SectionMatch::Ambiguous(candidates) => {
                let err = SyncError::ResolutionAmbiguous {
                    entity: "section",
                    name: record.section_name.clone(),
                    candidates,
                };
                plan.skipped += 1;
                plan.errors
                    .push(format!("schedule {}: {}", record.remote_id, err));
                continue;
            }
        };

        let key = MatchKey {
            subject_id: subject.subject_id,
            section_id,
            day: record.day,
            time: record.time,
        };
        let external_id = tables
            .slot_by_key
            .get(&key)
            .and_then(|slot| slot.faculty_id)
            .and_then(|id| tables.faculty_by_id.get(&id))
            .and_then(|f| f.external_id.clone());

        match external_id {
            Some(external_employee_id) => plan.pushes.push(AssignmentPush {
                remote_schedule_id: record.remote_id.clone(),
                external_employee_id,
            }),
            // No local decision exists for this meeting; push direction is
            // local to remote only, so nothing is sent.
            None => plan.skipped += 1,
        }
    }

    plan
}

/// Decides which section assignments get an adviser push.
///
/// Sections without a local adviser are skipped even if the remote side has
/// one; the engine never pulls remote decisions into local state here.
pub fn plan_adviser_pushes(
    assignments: &[DbSectionAssignment],
    remote_by_local: &HashMap<i64, String>,
) -> PushPlan<AdviserPush> {
    let mut plan = PushPlan::default();

    for assignment in assignments {
        let Some(remote_id) = remote_by_local.get(&assignment.section_id) else {
            plan.skipped += 1;
            continue;
        };
        let (Some(_), Some(external_id)) = (
            assignment.adviser_id,
            assignment.adviser_external_id.as_deref(),
        ) else {
            plan.skipped += 1;
            continue;
        };

        plan.pushes.push(AdviserPush {
            remote_section_id: remote_id.clone(),
            section_name: assignment.section_name.clone(),
            external_employee_id: external_id.to_string(),
            adviser_name: assignment.adviser_name.clone(),
            adviser_email: assignment.adviser_email.clone(),
        });
    }

    plan
}

/// Pushes one schedule-assignment state to the remote cache.
///
/// Sending the same `(remote id, employee id, assigned)` twice leaves the
/// remote in the same state as sending it once.
pub async fn sync_assignment(
    client: &SisClient,
    remote_schedule_id: &str,
    external_employee_id: Option<&str>,
    assigned: bool,
) -> SyncOutcome {
    let body = assignment_body(remote_schedule_id, external_employee_id, assigned);
    match client.post_json(ASSIGNMENT_SYNC_PATH, &body).await {
        Ok(_) => SyncOutcome::ok(),
        Err(e) => {
            warn!(
                remote_schedule_id,
                error = %e,
                "Assignment write-back failed (local state unaffected)"
            );
            SyncOutcome::failed(&e)
        }
    }
}

/// Pushes one section's adviser to the remote cache. A `None` employee id
/// clears the remote adviser.
pub async fn sync_section_adviser(
    client: &SisClient,
    remote_section_id: &str,
    external_employee_id: Option<&str>,
    name: Option<&str>,
    email: Option<&str>,
) -> SyncOutcome {
    let body = adviser_body(remote_section_id, external_employee_id, name, email);
    match client.post_json(ADVISER_SYNC_PATH, &body).await {
        Ok(_) => SyncOutcome::ok(),
        Err(e) => {
            warn!(
                remote_section_id,
                error = %e,
                "Adviser write-back failed (local state unaffected)"
            );
            SyncOutcome::failed(&e)
        }
    }
}

/// Pushes every locally-decided schedule assignment to the remote system.
pub async fn sync_all_assignments(
    client: &SisClient,
    db: &LocalDbManager,
    policy: &RetryPolicy,
    today: NaiveDate,
) -> Result<BulkSyncReport, SyncError> {
    let (records, dropped) = policy
        .run("fetch schedules", || client.fetch_schedules())
        .await?;
    let tables = load_lookup_tables(db, &records, today)?;
    let mut plan = plan_assignment_pushes(&records, &tables);

    // Rows the ingestion adapter dropped still count against the batch.
    let mut report = BulkSyncReport::with_total(records.len() + dropped.len());
    report.skipped = plan.skipped + dropped.len();
    report.errors.append(&mut plan.errors);
    for reason in dropped {
        report.errors.push(format!("dropped at ingestion: {reason}"));
    }

    for push in &plan.pushes {
        let outcome = sync_assignment(
            client,
            &push.remote_schedule_id,
            Some(&push.external_employee_id),
            true,
        )
        .await;
        report.record(format!("schedule {}", push.remote_schedule_id), outcome);
    }

    info!(
        total = report.total,
        synced = report.synced,
        skipped = report.skipped,
        errors = report.errors.len(),
        "Bulk assignment sync finished"
    );
    Ok(report)
}

/// Pushes every locally-set section adviser to the remote system.
pub async fn sync_all_advisers(
    client: &SisClient,
    db: &LocalDbManager,
    policy: &RetryPolicy,
) -> Result<BulkSyncReport, SyncError> {
    let (remote_sections, dropped) = policy
        .run("fetch sections", || client.fetch_sections())
        .await?;
    let local_sections = db.all_sections()?;
    let assignments = db.section_assignments()?;

    // Map local section id -> remote section id by scored name match.
    let mut remote_by_local: HashMap<i64, String> = HashMap::new();
    for remote in &remote_sections {
        if let SectionMatch::Match(local_id) =
            match_section_name(&local_sections, &remote.name, AMBIGUITY_MARGIN)
        {
            remote_by_local.insert(local_id, remote.remote_id.clone());
        }
    }

    let mut plan = plan_adviser_pushes(&assignments, &remote_by_local);

    let mut report = BulkSyncReport::with_total(assignments.len());
    report.skipped = plan.skipped;
    report.errors.append(&mut plan.errors);
    for reason in dropped {
        report.errors.push(format!("dropped at ingestion: {reason}"));
    }

    for push in &plan.pushes {
        let outcome = sync_section_adviser(
            client,
            &push.remote_section_id,
            Some(&push.external_employee_id),
            push.adviser_name.as_deref(),
            push.adviser_email.as_deref(),
        )
        .await;
        report.record(format!("section {}", push.section_name), outcome);
    }

    info!(
        total = report.total,
        synced = report.synced,
        skipped = report.skipped,
        errors = report.errors.len(),
        "Bulk adviser sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbFaculty, DbSection, DbSlot, DbSubject};
    use crate::reconcile::types::{TimeRange, Weekday};

    fn tables_with_slot(slot_faculty: Option<i64>) -> LookupTables {
        let math = DbSubject {
            subject_id: 1,
            code: "MATH7".to_string(),
            name: "Mathematics 7".to_string(),
        };
        let cruz = DbFaculty {
            faculty_id: 100,
            external_id: Some("E100".to_string()),
            name: "A. Cruz".to_string(),
            email: None,
        };
        let slot = DbSlot {
            slot_id: 5,
            subject_id: 1,
            subject_name: "Mathematics 7".to_string(),
            section_id: 10,
            section_name: "Rizal".to_string(),
            faculty_id: slot_faculty,
            day: Weekday::Monday,
            time: TimeRange::new(480, 540),
            room: None,
        };
        LookupTables {
            subject_by_code: HashMap::from([("MATH7".to_string(), math.clone())]),
            subject_by_name: HashMap::from([("mathematics 7".to_string(), math)]),
            sections: vec![DbSection {
                section_id: 10,
                name: "Rizal".to_string(),
                grade_level: None,
            }],
            faculty_by_external_id: HashMap::from([("E100".to_string(), cruz.clone())]),
            faculty_by_id: HashMap::from([(100, cruz)]),
            leave_by_faculty: HashMap::new(),
            slot_by_key: HashMap::from([(
                MatchKey {
                    subject_id: 1,
                    section_id: 10,
                    day: Weekday::Monday,
                    time: TimeRange::new(480, 540),
                },
                slot,
            )]),
        }
    }

    fn remote_record() -> RemoteScheduleRecord {
        RemoteScheduleRecord {
            remote_id: "R1".to_string(),
            subject_code: "MATH7".to_string(),
            subject_name: "Mathematics 7".to_string(),
            section_name: "Grade 7 - Rizal".to_string(),
            day: Weekday::Monday,
            time: TimeRange::new(480, 540),
            room: None,
            assigned: false,
            teacher_external_id: None,
            teacher_name: None,
        }
    }

    fn assignment(
        section_id: i64,
        adviser: Option<(i64, &str)>,
    ) -> DbSectionAssignment {
        DbSectionAssignment {
            section_id,
            section_name: "Rizal".to_string(),
            adviser_id: adviser.map(|(id, _)| id),
            adviser_external_id: adviser.map(|(_, ext)| ext.to_string()),
            adviser_name: adviser.map(|_| "A. Cruz".to_string()),
            adviser_email: None,
            homeroom_id: None,
            section_head_id: None,
        }
    }

    #[test]
    fn test_assignment_body_is_stable_and_nullable() {
        let body = assignment_body("R1", Some("E100"), true);
        assert_eq!(body["scheduleId"], "R1");
        assert_eq!(body["employeeId"], "E100");
        assert_eq!(body["assigned"], true);
        // Sending the same state twice builds the same body.
        assert_eq!(body, assignment_body("R1", Some("E100"), true));
        // Unassignment carries an explicit null assignee.
        let cleared = assignment_body("R1", None, false);
        assert!(cleared["employeeId"].is_null());
        assert_eq!(cleared["assigned"], false);
    }

    #[test]
    fn test_adviser_body_clears_with_nulls() {
        let cleared = adviser_body("S1", None, None, None);
        assert_eq!(cleared["sectionId"], "S1");
        assert!(cleared["employeeId"].is_null());
        assert!(cleared["adviserName"].is_null());
    }

    #[test]
    fn test_plan_pushes_locally_assigned_record() {
        let plan = plan_assignment_pushes(&[remote_record()], &tables_with_slot(Some(100)));
        assert_eq!(plan.skipped, 0);
        assert_eq!(
            plan.pushes,
            vec![AssignmentPush {
                remote_schedule_id: "R1".to_string(),
                external_employee_id: "E100".to_string(),
            }]
        );
    }

    #[test]
    fn test_plan_skips_record_without_local_decision() {
        // The local slot exists but has no assignee: nothing is pushed and
        // nothing is unassigned remotely.
        let plan = plan_assignment_pushes(&[remote_record()], &tables_with_slot(None));
        assert!(plan.pushes.is_empty());
        assert_eq!(plan.skipped, 1);
        assert!(plan.errors.is_empty());
    }

    #[test]
    fn test_plan_reports_ambiguous_section_as_error() {
        let mut tables = tables_with_slot(Some(100));
        tables.sections = vec![
            DbSection {
                section_id: 11,
                name: "Rizal A".to_string(),
                grade_level: None,
            },
            DbSection {
                section_id: 12,
                name: "Rizal B".to_string(),
                grade_level: None,
            },
        ];
        let mut record = remote_record();
        record.section_name = "Rizal".to_string();

        let plan = plan_assignment_pushes(&[record], &tables);
        assert!(plan.pushes.is_empty());
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.errors.len(), 1);
        assert!(plan.errors[0].contains("Ambiguous"));
    }

    #[test]
    fn test_plan_adviser_skips_without_local_adviser() {
        let remote_by_local = HashMap::from([(10, "S1".to_string())]);
        // Matched remotely but no local adviser is set: skipped, never
        // cleared remotely.
        let plan = plan_adviser_pushes(&[assignment(10, None)], &remote_by_local);
        assert!(plan.pushes.is_empty());
        assert_eq!(plan.skipped, 1);
    }

    #[test]
    fn test_plan_adviser_skips_unmatched_section() {
        let plan = plan_adviser_pushes(&[assignment(99, Some((100, "E100")))], &HashMap::new());
        assert!(plan.pushes.is_empty());
        assert_eq!(plan.skipped, 1);
    }

    #[test]
    fn test_plan_adviser_pushes_full_row() {
        let remote_by_local = HashMap::from([(10, "S1".to_string())]);
        let plan = plan_adviser_pushes(&[assignment(10, Some((100, "E100")))], &remote_by_local);
        assert_eq!(plan.skipped, 0);
        assert_eq!(plan.pushes.len(), 1);
        assert_eq!(plan.pushes[0].remote_section_id, "S1");
        assert_eq!(plan.pushes[0].external_employee_id, "E100");
        assert_eq!(plan.pushes[0].adviser_name.as_deref(), Some("A. Cruz"));
    }

    #[test]
    fn test_report_tallies_partial_failure() {
        let mut report = BulkSyncReport::with_total(3);
        report.skipped = 1;
        report.record("schedule R1".to_string(), SyncOutcome::ok());
        report.record(
            "schedule R2".to_string(),
            SyncOutcome::failed(&SyncError::RemoteRejected {
                status: 502,
                body: "upstream".to_string(),
            }),
        );

        assert_eq!(report.total, 3);
        assert_eq!(report.synced, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].synced);
        assert!(!report.outcomes[1].synced);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("schedule R2:"));
    }
}
