/// Database types for local schedule and staffing data

use crate::reconcile::types::{TimeRange, Weekday};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DbSubject {
    pub subject_id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbSection {
    pub section_id: i64,
    pub name: String,
    pub grade_level: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbFaculty {
    pub faculty_id: i64,
    pub external_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DbLeave {
    pub leave_id: i64,
    pub faculty_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A local teaching-assignment slot, joined with subject and section names
/// so conflict messages can cite what collides.
#[derive(Debug, Clone, Serialize)]
pub struct DbSlot {
    pub slot_id: i64,
    pub subject_id: i64,
    pub subject_name: String,
    pub section_id: i64,
    pub section_name: String,
    pub faculty_id: Option<i64>,
    pub day: Weekday,
    pub time: TimeRange,
    pub room: Option<String>,
}

/// Section staff roles joined with the adviser's directory entry, as needed
/// by the adviser write-back path.
#[derive(Debug, Clone, Serialize)]
pub struct DbSectionAssignment {
    pub section_id: i64,
    pub section_name: String,
    pub adviser_id: Option<i64>,
    pub adviser_external_id: Option<String>,
    pub adviser_name: Option<String>,
    pub adviser_email: Option<String>,
    pub homeroom_id: Option<i64>,
    pub section_head_id: Option<i64>,
}
