//! Core types for schedule reconciliation.

use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Enumerated weekday for a class meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

/// Error for unparseable weekday values.
#[derive(Debug, Clone)]
pub struct ParseDayError(pub String);

impl fmt::Display for ParseDayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized weekday: {}", self.0)
    }
}

impl std::error::Error for ParseDayError {}

impl FromStr for Weekday {
    type Err = ParseDayError;

    /// Parses full names and common three-letter abbreviations,
    /// case-insensitively. The remote system is not consistent about which
    /// form it sends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Ok(Weekday::Monday),
            "tuesday" | "tue" | "tues" => Ok(Weekday::Tuesday),
            "wednesday" | "wed" => Ok(Weekday::Wednesday),
            "thursday" | "thu" | "thur" | "thurs" => Ok(Weekday::Thursday),
            "friday" | "fri" => Ok(Weekday::Friday),
            "saturday" | "sat" => Ok(Weekday::Saturday),
            "sunday" | "sun" => Ok(Weekday::Sunday),
            _ => Err(ParseDayError(s.to_string())),
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unparseable time values.
#[derive(Debug, Clone)]
pub struct ParseTimeError(pub String);

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized time: {}", self.0)
    }
}

impl std::error::Error for ParseTimeError {}

/// A half-open intra-day time range `[start, end)` in minutes from midnight.
///
/// Half-open means a meeting ending at 09:00 does not overlap one starting
/// at 09:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start_min: u16,
    pub end_min: u16,
}

impl TimeRange {
    pub fn new(start_min: u16, end_min: u16) -> Self {
        Self { start_min, end_min }
    }

    /// Parses a single `"HH:MM"` value into minutes from midnight.
    pub fn parse_minutes(value: &str) -> Result<u16, ParseTimeError> {
        let trimmed = value.trim();
        let (hh, mm) = trimmed
            .split_once(':')
            .ok_or_else(|| ParseTimeError(value.to_string()))?;
        let hours: u16 = hh.parse().map_err(|_| ParseTimeError(value.to_string()))?;
        let minutes: u16 = mm.parse().map_err(|_| ParseTimeError(value.to_string()))?;
        if hours > 23 || minutes > 59 {
            return Err(ParseTimeError(value.to_string()));
        }
        Ok(hours * 60 + minutes)
    }

    /// Builds a range from `"HH:MM"` start/end values.
    pub fn parse(start: &str, end: &str) -> Result<Self, ParseTimeError> {
        let range = Self {
            start_min: Self::parse_minutes(start)?,
            end_min: Self::parse_minutes(end)?,
        };
        if range.start_min >= range.end_min {
            return Err(ParseTimeError(format!("{start}-{end}")));
        }
        Ok(range)
    }

    /// True if the two half-open ranges share any minute.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start_min < other.end_min && other.start_min < self.end_min
    }

    pub fn duration_hours(&self) -> f32 {
        (self.end_min.saturating_sub(self.start_min)) as f32 / 60.0
    }

    fn format_minutes(total: u16) -> String {
        format!("{:02}:{:02}", total / 60, total % 60)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            Self::format_minutes(self.start_min),
            Self::format_minutes(self.end_min)
        )
    }
}

// Serialized as "HH:MM-HH:MM" so API payloads stay readable.
impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RangeVisitor;

        impl Visitor<'_> for RangeVisitor {
            type Value = TimeRange;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a time range in HH:MM-HH:MM form")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TimeRange, E> {
                let (start, end) = v
                    .split_once('-')
                    .ok_or_else(|| E::custom(format!("missing '-' in time range: {v}")))?;
                TimeRange::parse(start, end).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(RangeVisitor)
    }
}

/// The remote system's view of one class meeting, after normalization.
///
/// Read-only from this system's perspective except via write-back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteScheduleRecord {
    pub remote_id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub section_name: String,
    pub day: Weekday,
    pub time: TimeRange,
    pub room: Option<String>,
    /// Whether the remote side records a teacher for this meeting.
    pub assigned: bool,
    /// External employee identifier shared between the two systems.
    pub teacher_external_id: Option<String>,
    pub teacher_name: Option<String>,
}

/// The remote system's view of one class section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSectionRecord {
    pub remote_id: String,
    pub name: String,
    pub adviser_external_id: Option<String>,
    pub adviser_name: Option<String>,
}

/// Join key between a remote meeting definition and a local slot.
///
/// Computed after entity resolution; remote and local identifiers differ, so
/// raw identifiers are never compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub subject_id: i64,
    pub section_id: i64,
    pub day: Weekday,
    pub time: TimeRange,
}

/// Whether a meeting's assignment is consistent between the two systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Both sides record an assignment (assignees may still differ; that is
    /// surfaced via `assignee_mismatch`, not a fifth status).
    Synced,
    /// Assigned locally but not remotely.
    LocalOnly,
    /// Assigned remotely but not locally.
    RemoteOnly,
    /// Neither side has an assignment.
    Unassigned,
}

/// An approved absence interval for a faculty member. Dates are inclusive
/// on both ends; planning availability is day-granular.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveWindow {
    pub faculty_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl LeaveWindow {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Derived per-meeting reconciliation view. Computed fresh on every pass,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledRecord {
    pub remote_id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub section_name: String,
    pub day: Weekday,
    pub time: TimeRange,
    pub room: Option<String>,

    pub local_slot_id: Option<i64>,
    pub exists_locally: bool,
    pub is_assigned_remotely: bool,
    pub sync_status: SyncStatus,

    pub current_faculty_id: Option<i64>,
    pub current_faculty_name: Option<String>,
    /// The remote-recorded assignee, resolved independently of the local
    /// slot's current assignee.
    pub original_faculty_id: Option<i64>,
    pub original_faculty_name: Option<String>,
    /// True when both sides are assigned but to different people.
    pub assignee_mismatch: bool,
    /// Advisory: the original teacher is back from leave and a substitute
    /// should be reverted. Never acted on automatically.
    pub should_restore_original: bool,

    pub is_on_leave: bool,
    pub leave: Option<LeaveWindow>,
}

/// A remote record that could not be classified, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub remote_id: String,
    pub reason: String,
}

/// Output of one full reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub records: Vec<ReconciledRecord>,
    pub skipped: Vec<SkippedRecord>,
    pub total: usize,
    pub assigned: usize,
    pub unassigned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_parses_variants() {
        assert_eq!("Monday".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!("  wed ".parse::<Weekday>().unwrap(), Weekday::Wednesday);
        assert_eq!("THURS".parse::<Weekday>().unwrap(), Weekday::Thursday);
        assert!("someday".parse::<Weekday>().is_err());
    }

    #[test]
    fn test_time_range_parse_and_display() {
        let range = TimeRange::parse("08:00", "09:30").unwrap();
        assert_eq!(range.start_min, 480);
        assert_eq!(range.end_min, 570);
        assert_eq!(range.to_string(), "08:00-09:30");
        assert!((range.duration_hours() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_time_range_rejects_inverted() {
        assert!(TimeRange::parse("10:00", "09:00").is_err());
        assert!(TimeRange::parse("10:00", "10:00").is_err());
        assert!(TimeRange::parse("25:00", "26:00").is_err());
    }

    #[test]
    fn test_overlap_symmetric_and_reflexive() {
        let a = TimeRange::new(480, 540);
        let b = TimeRange::new(510, 570);
        let c = TimeRange::new(540, 600);
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert!(a.overlaps(&a));
        // Half-open: back-to-back meetings do not overlap.
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn test_time_range_serde_round_trip() {
        let range = TimeRange::parse("13:30", "15:00").unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "\"13:30-15:00\"");
        let back: TimeRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);
    }

    #[test]
    fn test_leave_window_covers_inclusive() {
        let leave = LeaveWindow {
            faculty_id: 1,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        };
        assert!(leave.covers(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));
        assert!(leave.covers(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()));
        assert!(!leave.covers(NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()));
    }
}
