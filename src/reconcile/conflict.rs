//! Double-booking conflict detection.
//!
//! Two independent constraints gate every local mutation:
//! - a teacher cannot be in two places at once (any overlap on the same
//!   faculty + day is a hard conflict, even for the same subject);
//! - a section cannot have two *different* teachers at overlapping times
//!   (the same teacher overlapping in one section is the edit-in-place
//!   case and is allowed).
//!
//! Detection itself is pure; the storage layer runs it inside the same
//! transaction as the write so two concurrent proposals cannot both pass
//! against stale reads.

use crate::db::DbSlot;
use crate::reconcile::types::{TimeRange, Weekday};
use crate::sis::error::SyncError;

/// A proposed (faculty, section, day, time) assignment.
#[derive(Debug, Clone)]
pub struct SlotProposal {
    pub subject_id: i64,
    pub section_id: i64,
    pub faculty_id: i64,
    pub day: Weekday,
    pub time: TimeRange,
    pub room: Option<String>,
}

/// A detected collision with an existing slot.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub slot: DbSlot,
    pub reason: String,
}

impl From<Conflict> for SyncError {
    fn from(conflict: Conflict) -> Self {
        SyncError::ScheduleConflict {
            conflicting_slot_id: conflict.slot.slot_id,
            reason: conflict.reason,
        }
    }
}

/// Checks a proposal against the candidate slot lists.
///
/// `faculty_slots` must hold every slot for the proposed faculty on the
/// proposed day, `section_slots` every slot for the proposed section on that
/// day. `exclude_slot_id` removes the slot currently being edited from both
/// lists.
pub fn find_conflict(
    proposal: &SlotProposal,
    faculty_slots: &[DbSlot],
    section_slots: &[DbSlot],
    exclude_slot_id: Option<i64>,
) -> Option<Conflict> {
    let excluded = |slot: &DbSlot| exclude_slot_id == Some(slot.slot_id);

    // Faculty rule: any overlap is a conflict regardless of subject.
    for slot in faculty_slots {
        if excluded(slot) || slot.day != proposal.day {
            continue;
        }
        if slot.time.overlaps(&proposal.time) {
            return Some(Conflict {
                reason: format!(
                    "teacher is already scheduled for {} ({}) on {} {}",
                    slot.subject_name, slot.section_name, slot.day, slot.time
                ),
                slot: slot.clone(),
            });
        }
    }

    // Section rule: overlap conflicts only when the existing assignee differs.
    for slot in section_slots {
        if excluded(slot) || slot.day != proposal.day {
            continue;
        }
        if slot.time.overlaps(&proposal.time) && slot.faculty_id != Some(proposal.faculty_id) {
            return Some(Conflict {
                reason: format!(
                    "section {} already has {} scheduled on {} {}",
                    slot.section_name, slot.subject_name, slot.day, slot.time
                ),
                slot: slot.clone(),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(
        slot_id: i64,
        section_id: i64,
        faculty_id: Option<i64>,
        start_min: u16,
        end_min: u16,
    ) -> DbSlot {
        DbSlot {
            slot_id,
            subject_id: 1,
            subject_name: "Mathematics 7".to_string(),
            section_id,
            section_name: "Grade 7 - Rizal".to_string(),
            faculty_id,
            day: Weekday::Monday,
            time: TimeRange::new(start_min, end_min),
            room: None,
        }
    }

    fn proposal(faculty_id: i64, section_id: i64, start_min: u16, end_min: u16) -> SlotProposal {
        SlotProposal {
            subject_id: 1,
            section_id,
            faculty_id,
            day: Weekday::Monday,
            time: TimeRange::new(start_min, end_min),
            room: None,
        }
    }

    #[test]
    fn test_faculty_overlap_is_hard_conflict() {
        // 08:30-09:30 against an existing 08:00-09:00 for the same teacher.
        let existing = vec![slot(1, 2, Some(7), 480, 540)];
        let found = find_conflict(&proposal(7, 3, 510, 570), &existing, &[], None);
        let conflict = found.expect("expected a faculty conflict");
        assert_eq!(conflict.slot.slot_id, 1);
        assert!(conflict.reason.contains("Monday"));
        assert!(conflict.reason.contains("08:00-09:00"));
    }

    #[test]
    fn test_faculty_back_to_back_is_allowed() {
        let existing = vec![slot(1, 2, Some(7), 480, 540)];
        assert!(find_conflict(&proposal(7, 3, 540, 600), &existing, &[], None).is_none());
    }

    #[test]
    fn test_section_overlap_different_teacher_rejected() {
        let existing = vec![slot(1, 2, Some(7), 480, 540)];
        let found = find_conflict(&proposal(8, 2, 510, 570), &[], &existing, None);
        assert!(found.is_some());
    }

    #[test]
    fn test_section_overlap_same_teacher_accepted() {
        // Edit-in-place: same teacher overlapping in one section is fine.
        let existing = vec![slot(1, 2, Some(7), 480, 540)];
        assert!(find_conflict(&proposal(7, 2, 480, 540), &[], &existing, None).is_none());
    }

    #[test]
    fn test_excluded_slot_is_ignored() {
        let existing = vec![slot(1, 2, Some(7), 480, 540)];
        let found = find_conflict(&proposal(7, 2, 480, 540), &existing, &existing, Some(1));
        assert!(found.is_none());
    }

    #[test]
    fn test_unassigned_section_slot_still_conflicts() {
        // A remote-defined slot with no local teacher still blocks a second
        // teacher from overlapping in that section.
        let existing = vec![slot(1, 2, None, 480, 540)];
        assert!(find_conflict(&proposal(8, 2, 500, 560), &[], &existing, None).is_some());
    }
}
