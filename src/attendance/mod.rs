//! Attendance marking.
//!
//! [`AttendanceMarker`] submits at most one role-routed mark call per
//! identity per scope, using a [`DedupSet`] owned by the caller. The
//! client-side guard is advisory: the backend stays the authority on
//! whether someone is already marked for the day.

mod api;
mod dedup;
mod marker;

pub use api::{
    AttendanceApi, HttpAttendanceApi, MarkError, MarkRequest, MarkResponse, STUDENT_MARK_PATH,
    TEACHER_MARK_PATH,
};
pub use dedup::{DedupSet, ScopeKey, ScopePolicy};
pub use marker::{AttendanceMarker, MarkOutcome, MarkStatus};
