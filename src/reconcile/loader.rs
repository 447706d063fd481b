//! Batch loading of the lookup tables for one reconciliation pass.
//!
//! Extracts the distinct set of lookup keys referenced anywhere in the
//! remote payload, then issues one bulk query per entity type. The naive
//! per-record pattern costs 3-5 queries per remote record; this caps the
//! total at a handful of queries independent of dataset size.
//!
//! Invoked exactly once per pass. The returned tables are immutable for the
//! duration of the pass; local mutations made mid-pass require a fresh one.

use super::resolver::LookupTables;
use super::types::{LeaveWindow, MatchKey, RemoteScheduleRecord};
use crate::db::LocalDbManager;
use crate::sis::error::SyncError;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Distinct lookup keys referenced by a remote payload.
#[derive(Debug, Default, PartialEq)]
pub struct KeySet {
    pub subject_codes: Vec<String>,
    pub subject_names: Vec<String>,
    pub teacher_external_ids: Vec<String>,
}

/// Scans the full payload once and collects every distinct key.
pub fn extract_keys(records: &[RemoteScheduleRecord]) -> KeySet {
    let mut codes = HashSet::new();
    let mut names = HashSet::new();
    let mut teachers = HashSet::new();

    for record in records {
        codes.insert(record.subject_code.clone());
        names.insert(record.subject_name.clone());
        if let Some(id) = &record.teacher_external_id {
            teachers.insert(id.clone());
        }
    }

    let mut keys = KeySet {
        subject_codes: codes.into_iter().collect(),
        subject_names: names.into_iter().collect(),
        teacher_external_ids: teachers.into_iter().collect(),
    };
    keys.subject_codes.sort();
    keys.subject_names.sort();
    keys.teacher_external_ids.sort();
    keys
}

/// Builds the per-pass lookup tables with bulk queries only.
///
/// `today` is the classification date for leave windows; injected so tests
/// control "now".
pub fn load_lookup_tables(
    db: &LocalDbManager,
    records: &[RemoteScheduleRecord],
    today: NaiveDate,
) -> Result<LookupTables, SyncError> {
    let keys = extract_keys(records);

    let subjects = db.subjects_by_code_or_name(&keys.subject_codes, &keys.subject_names)?;
    let sections = db.all_sections()?;
    let remote_faculty = db.faculty_by_external_ids(&keys.teacher_external_ids)?;
    let slots = db.all_slots()?;

    // Local assignees may not appear in the remote payload at all; their
    // directory entries and leave state are still needed for classification.
    let mut faculty_by_id: HashMap<i64, crate::db::DbFaculty> = remote_faculty
        .iter()
        .map(|f| (f.faculty_id, f.clone()))
        .collect();
    let missing_ids: Vec<i64> = slots
        .iter()
        .filter_map(|s| s.faculty_id)
        .filter(|id| !faculty_by_id.contains_key(id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    for faculty in db.faculty_by_ids(&missing_ids)? {
        faculty_by_id.insert(faculty.faculty_id, faculty);
    }

    let all_faculty_ids: Vec<i64> = faculty_by_id.keys().copied().collect();
    let leave_by_faculty: HashMap<i64, LeaveWindow> = db
        .leaves_covering(today, &all_faculty_ids)?
        .into_iter()
        .map(|l| {
            (
                l.faculty_id,
                LeaveWindow {
                    faculty_id: l.faculty_id,
                    start_date: l.start_date,
                    end_date: l.end_date,
                },
            )
        })
        .collect();

    let slot_by_key: HashMap<MatchKey, _> = slots
        .into_iter()
        .map(|slot| {
            (
                MatchKey {
                    subject_id: slot.subject_id,
                    section_id: slot.section_id,
                    day: slot.day,
                    time: slot.time,
                },
                slot,
            )
        })
        .collect();

    debug!(
        subjects = subjects.len(),
        sections = sections.len(),
        faculty = faculty_by_id.len(),
        local_slots = slot_by_key.len(),
        on_leave = leave_by_faculty.len(),
        "Built lookup tables"
    );

    Ok(LookupTables {
        subject_by_code: subjects
            .iter()
            .map(|s| (s.code.clone(), s.clone()))
            .collect(),
        subject_by_name: subjects
            .iter()
            .map(|s| (s.name.to_lowercase(), s.clone()))
            .collect(),
        sections,
        faculty_by_external_id: remote_faculty
            .into_iter()
            .filter_map(|f| f.external_id.clone().map(|ext| (ext, f)))
            .collect(),
        faculty_by_id,
        leave_by_faculty,
        slot_by_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::types::{TimeRange, Weekday};

    fn record(code: &str, name: &str, teacher: Option<&str>) -> RemoteScheduleRecord {
        RemoteScheduleRecord {
            remote_id: "1".to_string(),
            subject_code: code.to_string(),
            subject_name: name.to_string(),
            section_name: "Rizal".to_string(),
            day: Weekday::Monday,
            time: TimeRange::new(480, 540),
            room: None,
            assigned: teacher.is_some(),
            teacher_external_id: teacher.map(str::to_string),
            teacher_name: None,
        }
    }

    #[test]
    fn test_extract_keys_deduplicates() {
        let records = vec![
            record("MATH7", "Mathematics 7", Some("E100")),
            record("MATH7", "Mathematics 7", Some("E100")),
            record("SCI7", "Science 7", None),
        ];
        let keys = extract_keys(&records);
        assert_eq!(keys.subject_codes, vec!["MATH7", "SCI7"]);
        assert_eq!(keys.subject_names, vec!["Mathematics 7", "Science 7"]);
        assert_eq!(keys.teacher_external_ids, vec!["E100"]);
    }

    #[test]
    fn test_load_builds_all_tables() {
        let db = LocalDbManager::in_memory();
        let math = db.insert_subject("MATH7", "Mathematics 7").unwrap();
        let rizal = db.insert_section("Grade 7 - Rizal", None).unwrap();
        let cruz = db.insert_faculty(Some("E100"), "A. Cruz", None).unwrap();
        // A local assignee the remote payload never mentions.
        let santos = db.insert_faculty(Some("E200"), "B. Santos", None).unwrap();
        db.insert_slot(math, rizal, Some(santos), Weekday::Monday, 480, 540)
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        db.insert_leave(
            santos,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        )
        .unwrap();

        let records = vec![record("MATH7", "Mathematics 7", Some("E100"))];
        let tables = load_lookup_tables(&db, &records, today).unwrap();

        assert!(tables.subject_by_code.contains_key("MATH7"));
        assert!(tables.subject_by_name.contains_key("mathematics 7"));
        assert_eq!(tables.sections.len(), 1);
        assert_eq!(
            tables.faculty_by_external_id.get("E100").unwrap().faculty_id,
            cruz
        );
        // The off-payload local assignee is present with its leave window.
        assert!(tables.faculty_by_id.contains_key(&santos));
        assert!(tables.leave_by_faculty.contains_key(&santos));

        let key = MatchKey {
            subject_id: math,
            section_id: rizal,
            day: Weekday::Monday,
            time: TimeRange::new(480, 540),
        };
        assert_eq!(tables.slot_by_key.get(&key).unwrap().faculty_id, Some(santos));
    }
}
