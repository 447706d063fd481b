//! Raw remote payload shapes and the normalization adapter.
//!
//! The remote SIS is not consistent about key casing (`subjectCode`,
//! `subject_code`, `subjCode` all occur in the wild), so every field that
//! varies carries serde aliases here and nowhere else. Normalization runs
//! exactly once at ingestion and produces the strongly-typed records the
//! rest of the engine works with; the matching logic never probes optional
//! fields.

use super::error::SyncError;
use crate::reconcile::types::{RemoteScheduleRecord, RemoteSectionRecord, TimeRange, Weekday};
use serde::Deserialize;

/// One schedule row as the remote system sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRemoteSchedule {
    #[serde(alias = "scheduleId", alias = "schedule_id", alias = "id")]
    pub id: serde_json::Value,

    #[serde(alias = "subjectCode", alias = "subject_code", alias = "subjCode")]
    pub subject_code: Option<String>,

    #[serde(alias = "subjectName", alias = "subject_name", alias = "subject")]
    pub subject_name: Option<String>,

    #[serde(alias = "sectionName", alias = "section_name", alias = "section")]
    pub section_name: Option<String>,

    #[serde(alias = "dayOfWeek", alias = "day_of_week")]
    pub day: Option<String>,

    #[serde(alias = "startTime", alias = "start_time", alias = "timeStart")]
    pub start_time: Option<String>,

    #[serde(alias = "endTime", alias = "end_time", alias = "timeEnd")]
    pub end_time: Option<String>,

    pub room: Option<String>,

    #[serde(default, alias = "isAssigned", alias = "is_assigned")]
    pub assigned: bool,

    #[serde(
        alias = "teacherId",
        alias = "teacher_id",
        alias = "employeeId",
        alias = "employee_id"
    )]
    pub teacher_external_id: Option<String>,

    #[serde(alias = "teacherName", alias = "teacher_name", alias = "teacher")]
    pub teacher_name: Option<String>,
}

/// One section row as the remote system sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRemoteSection {
    #[serde(alias = "sectionId", alias = "section_id", alias = "id")]
    pub id: serde_json::Value,

    #[serde(alias = "sectionName", alias = "section_name")]
    pub name: String,

    #[serde(
        alias = "adviserId",
        alias = "adviser_id",
        alias = "adviserEmployeeId"
    )]
    pub adviser_external_id: Option<String>,

    #[serde(alias = "adviserName", alias = "adviser_name", alias = "adviser")]
    pub adviser_name: Option<String>,
}

/// Envelope the remote wraps list payloads in. Some endpoints return a bare
/// array, others `{"data": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RemoteListPayload<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> RemoteListPayload<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            RemoteListPayload::Wrapped { data } => data,
            RemoteListPayload::Bare(items) => items,
        }
    }
}

/// Renders a remote id that may arrive as a JSON number or string.
fn id_to_string(id: &serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required<'a>(field: Option<&'a String>, name: &str, id: &str) -> Result<&'a str, SyncError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value.trim()),
        _ => Err(SyncError::MalformedRecord {
            message: format!("record {id}: missing {name}"),
        }),
    }
}

impl RawRemoteSchedule {
    /// Normalizes this row into a typed record, or fails with the first
    /// missing/unparseable field. Callers treat failures as skipped rows,
    /// not pass aborts.
    pub fn normalize(&self) -> Result<RemoteScheduleRecord, SyncError> {
        let remote_id = id_to_string(&self.id).ok_or_else(|| SyncError::MalformedRecord {
            message: "record missing schedule id".to_string(),
        })?;

        let subject_code = required(self.subject_code.as_ref(), "subject code", &remote_id)?;
        let subject_name = required(self.subject_name.as_ref(), "subject name", &remote_id)?;
        let section_name = required(self.section_name.as_ref(), "section name", &remote_id)?;
        let day_raw = required(self.day.as_ref(), "day", &remote_id)?;
        let start = required(self.start_time.as_ref(), "start time", &remote_id)?;
        let end = required(self.end_time.as_ref(), "end time", &remote_id)?;

        let day: Weekday = day_raw.parse().map_err(|e| SyncError::MalformedRecord {
            message: format!("record {remote_id}: {e}"),
        })?;
        let time = TimeRange::parse(start, end).map_err(|e| SyncError::MalformedRecord {
            message: format!("record {remote_id}: {e}"),
        })?;

        let teacher_external_id = self
            .teacher_external_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(RemoteScheduleRecord {
            remote_id,
            subject_code: subject_code.to_string(),
            subject_name: subject_name.to_string(),
            section_name: section_name.to_string(),
            day,
            time,
            room: self.room.clone().filter(|r| !r.trim().is_empty()),
            // An assignment flag without a teacher identity is meaningless
            // for reconciliation, so both must be present.
            assigned: self.assigned && teacher_external_id.is_some(),
            teacher_external_id,
            teacher_name: self.teacher_name.clone(),
        })
    }
}

impl RawRemoteSection {
    pub fn normalize(&self) -> Result<RemoteSectionRecord, SyncError> {
        let remote_id = id_to_string(&self.id).ok_or_else(|| SyncError::MalformedRecord {
            message: "section record missing id".to_string(),
        })?;
        if self.name.trim().is_empty() {
            return Err(SyncError::MalformedRecord {
                message: format!("section {remote_id}: empty name"),
            });
        }
        Ok(RemoteSectionRecord {
            remote_id,
            name: self.name.trim().to_string(),
            adviser_external_id: self
                .adviser_external_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            adviser_name: self.adviser_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_camel_case_payload() {
        let raw: RawRemoteSchedule = serde_json::from_str(
            r#"{
                "scheduleId": 17,
                "subjectCode": "MATH7",
                "subjectName": "Mathematics 7",
                "sectionName": "Grade 7 - Rizal",
                "dayOfWeek": "Monday",
                "startTime": "08:00",
                "endTime": "09:00",
                "room": "201",
                "isAssigned": true,
                "employeeId": "E100",
                "teacherName": "A. Cruz"
            }"#,
        )
        .unwrap();

        let record = raw.normalize().unwrap();
        assert_eq!(record.remote_id, "17");
        assert_eq!(record.subject_code, "MATH7");
        assert_eq!(record.day, Weekday::Monday);
        assert_eq!(record.time.to_string(), "08:00-09:00");
        assert!(record.assigned);
        assert_eq!(record.teacher_external_id.as_deref(), Some("E100"));
    }

    #[test]
    fn test_normalize_snake_case_payload() {
        let raw: RawRemoteSchedule = serde_json::from_str(
            r#"{
                "schedule_id": "S-9",
                "subject_code": "SCI8",
                "subject_name": "Science 8",
                "section_name": "Grade 8 - Bonifacio",
                "day": "fri",
                "start_time": "13:00",
                "end_time": "14:30",
                "assigned": false
            }"#,
        )
        .unwrap();

        let record = raw.normalize().unwrap();
        assert_eq!(record.remote_id, "S-9");
        assert_eq!(record.day, Weekday::Friday);
        assert!(!record.assigned);
        assert!(record.teacher_external_id.is_none());
    }

    #[test]
    fn test_assigned_flag_requires_teacher_identity() {
        let raw: RawRemoteSchedule = serde_json::from_str(
            r#"{
                "id": 3,
                "subjectCode": "ENG7",
                "subjectName": "English 7",
                "sectionName": "Rizal",
                "day": "Tue",
                "startTime": "10:00",
                "endTime": "11:00",
                "assigned": true
            }"#,
        )
        .unwrap();
        let record = raw.normalize().unwrap();
        assert!(!record.assigned);
    }

    #[test]
    fn test_normalize_rejects_missing_fields() {
        let raw: RawRemoteSchedule = serde_json::from_str(
            r#"{"id": 4, "subjectCode": "ENG7", "day": "Tue"}"#,
        )
        .unwrap();
        let err = raw.normalize().unwrap_err();
        assert!(matches!(err, SyncError::MalformedRecord { .. }));
    }

    #[test]
    fn test_list_payload_bare_and_wrapped() {
        let wrapped: RemoteListPayload<i32> =
            serde_json::from_str(r#"{"data": [1, 2, 3]}"#).unwrap();
        assert_eq!(wrapped.into_vec(), vec![1, 2, 3]);
        let bare: RemoteListPayload<i32> = serde_json::from_str("[4, 5]").unwrap();
        assert_eq!(bare.into_vec(), vec![4, 5]);
    }
}
