//! Per-scope record of identities already attempted.

use super::MarkOutcome;
use crate::recognition::{PersonId, Role};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Boundary under which "already marked" is tracked on the client.
///
/// The client guard is advisory; the backend decides whether a person
/// is already marked for the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// One camera session.
    #[default]
    Session,
    /// One local calendar day.
    CalendarDay,
}

impl ScopePolicy {
    /// Key for the given session on the given day.
    pub fn key(&self, session_id: u64, today: NaiveDate) -> ScopeKey {
        match self {
            ScopePolicy::Session => ScopeKey::Session(session_id),
            ScopePolicy::CalendarDay => ScopeKey::Day(today),
        }
    }
}

/// Concrete deduplication boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKey {
    Session(u64),
    Day(NaiveDate),
}

impl ScopeKey {
    /// Attendance date to report for marks made under this scope.
    pub fn attendance_date(&self) -> NaiveDate {
        match self {
            ScopeKey::Day(day) => *day,
            ScopeKey::Session(_) => Local::now().date_naive(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Session(id) => write!(f, "session:{id}"),
            ScopeKey::Day(day) => write!(f, "day:{day}"),
        }
    }
}

/// Terminal mark outcomes keyed by `(person, role, scope)`.
///
/// Student and teacher ids come from separate registers, so the same id
/// under two roles is two people. Failed attempts are never stored, so
/// the identity stays eligible.
#[derive(Debug, Default)]
pub struct DedupSet {
    entries: HashMap<(PersonId, Role, ScopeKey), MarkOutcome>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached terminal outcome for this identity and scope.
    pub fn get(&self, person_id: &PersonId, role: Role, scope: &ScopeKey) -> Option<&MarkOutcome> {
        self.entries.get(&(person_id.clone(), role, *scope))
    }

    /// Records an outcome. Returns false (and stores nothing) for
    /// outcomes that are not terminal.
    pub fn record(&mut self, scope: ScopeKey, outcome: MarkOutcome) -> bool {
        if !outcome.outcome.is_terminal() {
            return false;
        }
        self.entries
            .insert((outcome.person_id.clone(), outcome.role, scope), outcome);
        true
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::MarkStatus;
    use chrono::Utc;

    fn outcome(id: &str, status: MarkStatus) -> MarkOutcome {
        outcome_as(id, Role::Student, status)
    }

    fn outcome_as(id: &str, role: Role, status: MarkStatus) -> MarkOutcome {
        MarkOutcome {
            outcome: status,
            person_id: PersonId::new(id),
            role,
            timestamp: Utc::now(),
            from_cache: false,
            detail: None,
        }
    }

    #[test]
    fn test_failed_outcome_not_cached() {
        let mut set = DedupSet::new();
        let scope = ScopeKey::Session(1);
        assert!(!set.record(scope, outcome("s1", MarkStatus::Failed)));
        assert!(set.get(&PersonId::new("s1"), Role::Student, &scope).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut set = DedupSet::new();
        set.record(ScopeKey::Session(1), outcome("s1", MarkStatus::Marked));

        assert!(set.get(&PersonId::new("s1"), Role::Student, &ScopeKey::Session(1)).is_some());
        assert!(set.get(&PersonId::new("s1"), Role::Student, &ScopeKey::Session(2)).is_none());
    }

    #[test]
    fn test_roles_are_independent() {
        let mut set = DedupSet::new();
        let scope = ScopeKey::Session(1);
        set.record(scope, outcome_as("5", Role::Student, MarkStatus::Marked));

        assert!(set.get(&PersonId::new("5"), Role::Student, &scope).is_some());
        assert!(set.get(&PersonId::new("5"), Role::Teacher, &scope).is_none());

        set.record(scope, outcome_as("5", Role::Teacher, MarkStatus::AlreadyMarked));
        assert_eq!(
            set.get(&PersonId::new("5"), Role::Teacher, &scope).map(|o| o.outcome),
            Some(MarkStatus::AlreadyMarked)
        );
        assert_eq!(
            set.get(&PersonId::new("5"), Role::Student, &scope).map(|o| o.outcome),
            Some(MarkStatus::Marked)
        );
    }

    #[test]
    fn test_policy_keys() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(ScopePolicy::Session.key(4, day), ScopeKey::Session(4));
        assert_eq!(ScopePolicy::CalendarDay.key(4, day), ScopeKey::Day(day));
        assert_eq!(ScopeKey::Day(day).attendance_date(), day);
        assert_eq!(ScopeKey::Day(day).to_string(), "day:2026-10-19");
    }
}
