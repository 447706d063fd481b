/// Database module for local schedule, staffing and leave data

mod types;

pub use types::{DbFaculty, DbLeave, DbSection, DbSectionAssignment, DbSlot, DbSubject};

use crate::reconcile::conflict::{find_conflict, SlotProposal};
use crate::reconcile::types::Weekday;
use crate::sis::error::SyncError;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Result, Row};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/init_sync.sql");

const SLOT_SELECT: &str = "SELECT sl.slot_id, sl.subject_id, su.name, sl.section_id, se.name,
            sl.faculty_id, sl.day, sl.start_min, sl.end_min, sl.room
     FROM schedule_slots sl
     JOIN subjects su ON su.subject_id = sl.subject_id
     JOIN sections se ON se.section_id = sl.section_id";

pub struct LocalDbManager {
    db: Mutex<Connection>,
}

fn map_slot(row: &Row<'_>) -> Result<DbSlot> {
    let day_raw: String = row.get(6)?;
    let day: Weekday = day_raw
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    Ok(DbSlot {
        slot_id: row.get(0)?,
        subject_id: row.get(1)?,
        subject_name: row.get(2)?,
        section_id: row.get(3)?,
        section_name: row.get(4)?,
        faculty_id: row.get(5)?,
        day,
        time: crate::reconcile::types::TimeRange::new(row.get(7)?, row.get(8)?),
        room: row.get(9)?,
    })
}

fn slots_where(
    conn: &Connection,
    clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<DbSlot>> {
    let sql = format!("{SLOT_SELECT} WHERE {clause}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, map_slot)?;
    rows.collect()
}

/// Builds "?,?,?" for a dynamic IN clause.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

impl LocalDbManager {
    /// Creates a new LocalDbManager and initializes the database schema
    pub fn new(db_path: &str) -> Self {
        let conn = Connection::open(db_path).expect("Failed to open database");

        conn.execute_batch(SCHEMA_SQL)
            .expect("Failed to initialize database schema");

        Self {
            db: Mutex::new(conn),
        }
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
        conn.execute_batch(SCHEMA_SQL)
            .expect("Failed to initialize database schema");
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Bulk subject lookup by code set or (lowercased) name set.
    ///
    /// Called once per reconciliation pass, never per record.
    pub fn subjects_by_code_or_name(
        &self,
        codes: &[String],
        names: &[String],
    ) -> Result<Vec<DbSubject>> {
        if codes.is_empty() && names.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().unwrap();
        let sql = format!(
            "SELECT subject_id, code, name FROM subjects
             WHERE code IN ({}) OR lower(name) IN ({})",
            placeholders(codes.len().max(1)),
            placeholders(names.len().max(1))
        );
        let mut stmt = db.prepare(&sql)?;

        let mut args: Vec<String> = Vec::with_capacity(codes.len().max(1) + names.len().max(1));
        if codes.is_empty() {
            args.push(String::new());
        } else {
            args.extend(codes.iter().cloned());
        }
        if names.is_empty() {
            args.push(String::new());
        } else {
            args.extend(names.iter().map(|n| n.to_lowercase()));
        }

        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(DbSubject {
                subject_id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    /// All local sections. The resolver needs the full list to score
    /// containment matches and detect ambiguity.
    pub fn all_sections(&self) -> Result<Vec<DbSection>> {
        let db = self.db.lock().unwrap();
        let mut stmt =
            db.prepare("SELECT section_id, name, grade_level FROM sections ORDER BY section_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbSection {
                section_id: row.get(0)?,
                name: row.get(1)?,
                grade_level: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    /// Bulk faculty lookup by external employee identifier.
    pub fn faculty_by_external_ids(&self, external_ids: &[String]) -> Result<Vec<DbFaculty>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().unwrap();
        let sql = format!(
            "SELECT faculty_id, external_id, name, email FROM faculty
             WHERE external_id IN ({})",
            placeholders(external_ids.len())
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(external_ids.iter()), |row| {
            Ok(DbFaculty {
                faculty_id: row.get(0)?,
                external_id: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
            })
        })?;
        rows.collect()
    }

    /// Bulk faculty lookup by internal id, for local slot assignees.
    pub fn faculty_by_ids(&self, faculty_ids: &[i64]) -> Result<Vec<DbFaculty>> {
        if faculty_ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().unwrap();
        let sql = format!(
            "SELECT faculty_id, external_id, name, email FROM faculty
             WHERE faculty_id IN ({})",
            placeholders(faculty_ids.len())
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(faculty_ids.iter()), |row| {
            Ok(DbFaculty {
                faculty_id: row.get(0)?,
                external_id: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
            })
        })?;
        rows.collect()
    }

    pub fn faculty_by_id(&self, faculty_id: i64) -> Result<Option<DbFaculty>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT faculty_id, external_id, name, email FROM faculty WHERE faculty_id = ?",
        )?;
        let mut rows = stmt.query_map([faculty_id], |row| {
            Ok(DbFaculty {
                faculty_id: row.get(0)?,
                external_id: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
            })
        })?;
        rows.next().transpose()
    }

    /// Approved leave windows covering `date` for the given faculty set.
    pub fn leaves_covering(&self, date: NaiveDate, faculty_ids: &[i64]) -> Result<Vec<DbLeave>> {
        if faculty_ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().unwrap();
        let sql = format!(
            "SELECT leave_id, faculty_id, start_date, end_date FROM leave_windows
             WHERE status = 'approved' AND start_date <= ?1 AND end_date >= ?1
               AND faculty_id IN ({})",
            placeholders(faculty_ids.len())
        );
        let mut stmt = db.prepare(&sql)?;
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(date)];
        for id in faculty_ids {
            args.push(Box::new(*id));
        }
        let rows = stmt.query_map(params_from_iter(args.iter().map(|b| b.as_ref())), |row| {
            Ok(DbLeave {
                leave_id: row.get(0)?,
                faculty_id: row.get(1)?,
                start_date: row.get(2)?,
                end_date: row.get(3)?,
            })
        })?;
        rows.collect()
    }

    /// Every local slot, with subject and section names joined in.
    pub fn all_slots(&self) -> Result<Vec<DbSlot>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(SLOT_SELECT)?;
        let rows = stmt.query_map([], map_slot)?;
        rows.collect()
    }

    /// Section staff roles with the adviser's directory entry joined in.
    pub fn section_assignments(&self) -> Result<Vec<DbSectionAssignment>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT sa.section_id, se.name, sa.adviser_id, f.external_id, f.name, f.email,
                    sa.homeroom_id, sa.section_head_id
             FROM section_assignments sa
             JOIN sections se ON se.section_id = sa.section_id
             LEFT JOIN faculty f ON f.faculty_id = sa.adviser_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbSectionAssignment {
                section_id: row.get(0)?,
                section_name: row.get(1)?,
                adviser_id: row.get(2)?,
                adviser_external_id: row.get(3)?,
                adviser_name: row.get(4)?,
                adviser_email: row.get(5)?,
                homeroom_id: row.get(6)?,
                section_head_id: row.get(7)?,
            })
        })?;
        rows.collect()
    }

    /// Conflict-checked create/update of a schedule slot.
    ///
    /// The conflict reads and the write share one transaction, so two
    /// concurrent proposals for the same teacher or section cannot both pass
    /// against stale data: exactly one commits, the other sees its slot.
    pub fn assign_slot(
        &self,
        proposal: &SlotProposal,
        exclude_slot_id: Option<i64>,
    ) -> std::result::Result<DbSlot, SyncError> {
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;

        let day = proposal.day.as_str();
        let faculty_slots = slots_where(
            &tx,
            "sl.faculty_id = ?1 AND sl.day = ?2",
            &[&proposal.faculty_id, &day],
        )?;
        let section_slots = slots_where(
            &tx,
            "sl.section_id = ?1 AND sl.day = ?2",
            &[&proposal.section_id, &day],
        )?;

        if let Some(conflict) =
            find_conflict(proposal, &faculty_slots, &section_slots, exclude_slot_id)
        {
            return Err(conflict.into());
        }

        let slot_id = match exclude_slot_id {
            Some(id) => {
                let updated = tx.execute(
                    "UPDATE schedule_slots
                     SET subject_id = ?1, section_id = ?2, faculty_id = ?3, day = ?4,
                         start_min = ?5, end_min = ?6, room = ?7, updated_at = datetime('now')
                     WHERE slot_id = ?8",
                    params![
                        proposal.subject_id,
                        proposal.section_id,
                        proposal.faculty_id,
                        day,
                        proposal.time.start_min,
                        proposal.time.end_min,
                        proposal.room,
                        id
                    ],
                )?;
                if updated == 0 {
                    return Err(SyncError::Validation {
                        message: format!("slot {id} does not exist"),
                    });
                }
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO schedule_slots
                        (subject_id, section_id, faculty_id, day, start_min, end_min, room)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        proposal.subject_id,
                        proposal.section_id,
                        proposal.faculty_id,
                        day,
                        proposal.time.start_min,
                        proposal.time.end_min,
                        proposal.room
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        let mut stored = slots_where(&tx, "sl.slot_id = ?1", &[&slot_id])?;
        let slot = stored.pop().ok_or_else(|| SyncError::Storage {
            message: format!("slot {slot_id} vanished during write"),
        })?;
        tx.commit()?;
        Ok(slot)
    }

    // Seed/insert helpers. Administrative CRUD lives outside this service;
    // these exist for provisioning scripts and tests.

    pub fn insert_subject(&self, code: &str, name: &str) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO subjects (code, name) VALUES (?1, ?2)",
            params![code, name],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn insert_section(&self, name: &str, grade_level: Option<&str>) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO sections (name, grade_level) VALUES (?1, ?2)",
            params![name, grade_level],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn insert_faculty(
        &self,
        external_id: Option<&str>,
        name: &str,
        email: Option<&str>,
    ) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO faculty (external_id, name, email) VALUES (?1, ?2, ?3)",
            params![external_id, name, email],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn insert_leave(
        &self,
        faculty_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO leave_windows (faculty_id, start_date, end_date) VALUES (?1, ?2, ?3)",
            params![faculty_id, start_date, end_date],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Raw slot insert without conflict checking, for seeding known-good data.
    pub fn insert_slot(
        &self,
        subject_id: i64,
        section_id: i64,
        faculty_id: Option<i64>,
        day: Weekday,
        start_min: u16,
        end_min: u16,
    ) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO schedule_slots (subject_id, section_id, faculty_id, day, start_min, end_min)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![subject_id, section_id, faculty_id, day.as_str(), start_min, end_min],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn upsert_section_assignment(
        &self,
        section_id: i64,
        adviser_id: Option<i64>,
        homeroom_id: Option<i64>,
        section_head_id: Option<i64>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO section_assignments (section_id, adviser_id, homeroom_id, section_head_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(section_id) DO UPDATE SET
                adviser_id = excluded.adviser_id,
                homeroom_id = excluded.homeroom_id,
                section_head_id = excluded.section_head_id,
                updated_at = datetime('now')",
            params![section_id, adviser_id, homeroom_id, section_head_id],
        )?;
        Ok(())
    }
}
