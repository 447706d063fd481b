//! Entity resolution between remote records and local entities.
//!
//! Works purely on the in-memory lookup tables built by the batch loader;
//! no network or storage calls happen here, which is what keeps resolution
//! O(1)-ish per record instead of a round trip per record.
//!
//! Matching policy, in priority order:
//! 1. Subject: exact code match, else case-insensitive exact name match.
//! 2. Section: scored containment match. The two systems share no section
//!    identifier and the remote prefixes names ("Grade 7 - Rizal" vs
//!    "Rizal"), so candidates are sections whose name contains or is
//!    contained in the remote name. Multiple candidates scoring within the
//!    ambiguity margin of the best yield an explicit `Ambiguous` outcome,
//!    never a silent first-hit pick.
//! 3. Faculty: exact external-id match only. An unknown id means an
//!    unassigned slot, never a guess.

use crate::db::{DbFaculty, DbSection, DbSlot, DbSubject};
use crate::reconcile::types::{LeaveWindow, MatchKey};
use std::collections::HashMap;

/// How far (in score) a runner-up may trail the best candidate before the
/// match is considered ambiguous.
pub const AMBIGUITY_MARGIN: f32 = 0.05;

/// Outcome of a section match attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionMatch {
    /// Exactly one confident candidate.
    Match(i64),
    /// No local section name relates to the remote name.
    NoMatch,
    /// Two or more candidates are too close to call; names listed for the
    /// disambiguation message.
    Ambiguous(Vec<String>),
}

/// Immutable per-pass lookup tables.
///
/// Built once by the batch loader and treated as frozen for the duration of
/// the pass; a mid-pass local mutation requires a fresh pass.
pub struct LookupTables {
    pub subject_by_code: HashMap<String, DbSubject>,
    /// Keyed by lowercased subject name.
    pub subject_by_name: HashMap<String, DbSubject>,
    pub sections: Vec<DbSection>,
    pub faculty_by_external_id: HashMap<String, DbFaculty>,
    pub faculty_by_id: HashMap<i64, DbFaculty>,
    /// Leave windows covering "now", keyed by faculty id.
    pub leave_by_faculty: HashMap<i64, LeaveWindow>,
    /// Local slots keyed by their resolved match key.
    pub slot_by_key: HashMap<MatchKey, DbSlot>,
}

impl LookupTables {
    /// Resolves a subject by exact code, falling back to case-insensitive
    /// exact name.
    pub fn resolve_subject(&self, code: &str, name: &str) -> Option<&DbSubject> {
        self.subject_by_code
            .get(code)
            .or_else(|| self.subject_by_name.get(&name.to_lowercase()))
    }

    /// Scores one local section name against a remote name.
    ///
    /// Containment in either direction qualifies; the score is the length
    /// ratio of the shorter to the longer name, so "Rizal" inside
    /// "Grade 7 - Rizal" scores lower than an exact match (1.0).
    fn section_score(local: &str, remote: &str) -> Option<f32> {
        let local_lc = local.to_lowercase();
        let remote_lc = remote.to_lowercase();
        if local_lc == remote_lc {
            return Some(1.0);
        }
        if local_lc.contains(&remote_lc) || remote_lc.contains(&local_lc) {
            let shorter = local_lc.len().min(remote_lc.len()) as f32;
            let longer = local_lc.len().max(remote_lc.len()) as f32;
            return Some(shorter / longer);
        }
        None
    }

    /// Resolves a remote section name with the default ambiguity margin.
    pub fn resolve_section(&self, remote_name: &str) -> SectionMatch {
        self.resolve_section_with_margin(remote_name, AMBIGUITY_MARGIN)
    }

    pub fn resolve_section_with_margin(&self, remote_name: &str, margin: f32) -> SectionMatch {
        match_section_name(&self.sections, remote_name, margin)
    }

    /// Resolves a faculty member by exact external id.
    pub fn resolve_faculty(&self, external_id: &str) -> Option<&DbFaculty> {
        self.faculty_by_external_id.get(external_id)
    }
}

/// Scored containment match of a remote section name against the local
/// section list. Also used by the adviser write-back path, which matches in
/// the other direction.
pub fn match_section_name(sections: &[DbSection], remote_name: &str, margin: f32) -> SectionMatch {
    let mut scored: Vec<(f32, &DbSection)> = sections
        .iter()
        .filter_map(|s| LookupTables::section_score(&s.name, remote_name).map(|score| (score, s)))
        .collect();

    if scored.is_empty() {
        return SectionMatch::NoMatch;
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let best = scored[0].0;
    let contenders: Vec<&DbSection> = scored
        .iter()
        .take_while(|(score, _)| best - score <= margin)
        .map(|(_, s)| *s)
        .collect();

    if contenders.len() > 1 {
        SectionMatch::Ambiguous(contenders.iter().map(|s| s.name.clone()).collect())
    } else {
        SectionMatch::Match(contenders[0].section_id)
    }
}
