//! Sync-state classification of remote meetings against local slots.
//!
//! Pure computation over the immutable lookup tables: no storage or network
//! access, so records can be classified independently and a per-record
//! failure only skips that record.

use super::resolver::{LookupTables, SectionMatch};
use super::types::{
    MatchKey, ReconciledRecord, ReconciliationReport, RemoteScheduleRecord, SkippedRecord,
    SyncStatus,
};
use chrono::NaiveDate;
use tracing::debug;

/// Classifies one remote record, or explains why it cannot be.
fn classify_record(
    record: &RemoteScheduleRecord,
    tables: &LookupTables,
    today: NaiveDate,
) -> Result<ReconciledRecord, String> {
    let subject = tables
        .resolve_subject(&record.subject_code, &record.subject_name)
        .ok_or_else(|| {
            format!(
                "unknown subject '{}' ({})",
                record.subject_name, record.subject_code
            )
        })?;

    let section_id = match tables.resolve_section(&record.section_name) {
        SectionMatch::Match(id) => id,
        SectionMatch::NoMatch => {
            return Err(format!("no local section matches '{}'", record.section_name))
        }
        SectionMatch::Ambiguous(candidates) => {
            return Err(format!(
                "section '{}' needs disambiguation between {}",
                record.section_name,
                candidates.join(", ")
            ))
        }
    };

    let key = MatchKey {
        subject_id: subject.subject_id,
        section_id,
        day: record.day,
        time: record.time,
    };
    let local = tables.slot_by_key.get(&key);

    let exists_locally = local.is_some();
    let assigned_locally = local.map(|s| s.faculty_id.is_some()).unwrap_or(false);
    let is_assigned_remotely = record.assigned;

    let sync_status = match (assigned_locally, is_assigned_remotely) {
        (true, true) => SyncStatus::Synced,
        (true, false) => SyncStatus::LocalOnly,
        (false, true) => SyncStatus::RemoteOnly,
        (false, false) => SyncStatus::Unassigned,
    };

    let current_faculty_id = local.and_then(|s| s.faculty_id);
    let current_faculty_name = current_faculty_id
        .and_then(|id| tables.faculty_by_id.get(&id))
        .map(|f| f.name.clone());

    // The remote-recorded assignee, resolved independently of whoever holds
    // the slot locally right now.
    let original = record
        .teacher_external_id
        .as_deref()
        .and_then(|ext| tables.resolve_faculty(ext));
    let original_faculty_id = original.map(|f| f.faculty_id);
    let original_faculty_name = original
        .map(|f| f.name.clone())
        .or_else(|| record.teacher_name.clone());

    let assignee_mismatch = sync_status == SyncStatus::Synced
        && current_faculty_id != original_faculty_id;

    // Recommend reverting a substitute only once the original teacher's
    // leave no longer covers today. Advisory; nothing is auto-reverted.
    let should_restore_original = match (current_faculty_id, original_faculty_id) {
        (Some(current), Some(original_id)) if current != original_id => {
            let on_leave = tables
                .leave_by_faculty
                .get(&original_id)
                .map(|l| l.covers(today))
                .unwrap_or(false);
            !on_leave
        }
        _ => false,
    };

    // Leave status reflects present-day availability of whoever is
    // currently effective for this meeting.
    let effective_faculty_id = current_faculty_id.or(original_faculty_id);
    let leave = effective_faculty_id
        .and_then(|id| tables.leave_by_faculty.get(&id))
        .filter(|l| l.covers(today))
        .cloned();
    let is_on_leave = leave.is_some();

    Ok(ReconciledRecord {
        remote_id: record.remote_id.clone(),
        subject_code: record.subject_code.clone(),
        subject_name: record.subject_name.clone(),
        section_name: record.section_name.clone(),
        day: record.day,
        time: record.time,
        room: record.room.clone(),
        local_slot_id: local.map(|s| s.slot_id),
        exists_locally,
        is_assigned_remotely,
        sync_status,
        current_faculty_id,
        current_faculty_name,
        original_faculty_id,
        original_faculty_name,
        assignee_mismatch,
        should_restore_original,
        is_on_leave,
        leave,
    })
}

/// Classifies every remote record and aggregates the pass report.
///
/// Skipped records (unresolvable or ambiguous) are reported in aggregate;
/// they never abort the pass. For the classified set,
/// `assigned + unassigned == total` always holds.
pub fn classify_all(
    records: &[RemoteScheduleRecord],
    tables: &LookupTables,
    today: NaiveDate,
) -> ReconciliationReport {
    let mut classified = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for record in records {
        match classify_record(record, tables, today) {
            Ok(reconciled) => classified.push(reconciled),
            Err(reason) => {
                debug!(remote_id = %record.remote_id, reason = %reason, "Skipping record");
                skipped.push(SkippedRecord {
                    remote_id: record.remote_id.clone(),
                    reason,
                });
            }
        }
    }

    let total = classified.len();
    let unassigned = classified
        .iter()
        .filter(|r| r.sync_status == SyncStatus::Unassigned)
        .count();

    ReconciliationReport {
        assigned: total - unassigned,
        unassigned,
        total,
        records: classified,
        skipped,
    }
}
