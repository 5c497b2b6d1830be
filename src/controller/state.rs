//! Observable controller state.

use crate::attendance::{MarkOutcome, ScopePolicy};
use crate::capture::CameraError;
use crate::config::FileConfig;
use crate::overlay::OverlayState;
use crate::recognition::RecognitionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Lifecycle of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Never started, or the last start was refused.
    Idle,
    /// Camera held and ticks running.
    Active,
    /// Camera held, ticks paused.
    Suspended,
    /// Session torn down. A new `start` opens a fresh session.
    Stopped,
}

/// Status line for the embedding screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    CameraError,
    Scanning,
    UnknownFace,
    Matched,
    Marking,
    AlreadyMarked,
    MarkFailed,
}

impl Status {
    /// Wire name, e.g. `unknown_face`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::CameraError => "camera_error",
            Status::Scanning => "scanning",
            Status::UnknownFace => "unknown_face",
            Status::Matched => "matched",
            Status::Marking => "marking",
            Status::AlreadyMarked => "already_marked",
            Status::MarkFailed => "mark_failed",
        }
    }

    /// Blocking statuses need user action before the loop can run again.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Status::CameraError)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do after an identity is marked or found already marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Keep scanning for further people.
    #[default]
    Continue,
    /// Stop the session, releasing the camera.
    StopAfterMatch,
}

/// Errors surfaced to the embedding screen. Everything else is absorbed
/// by the loop and shown as transient status.
#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    #[error("camera permission denied: {0}")]
    Permission(String),
    #[error("camera device error: {0}")]
    Device(String),
}

impl From<CameraError> for ControllerError {
    fn from(error: CameraError) -> Self {
        match error {
            CameraError::PermissionDenied(reason) => ControllerError::Permission(reason),
            other => ControllerError::Device(other.to_string()),
        }
    }
}

/// Loop settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Delay between the end of one tick and the start of the next.
    pub interval: Duration,
    /// Forwarded unchanged to the matcher.
    pub tolerance: f64,
    /// Bound on each recognition call.
    pub request_timeout: Duration,
    pub scope: ScopePolicy,
    pub match_policy: MatchPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

impl ControllerConfig {
    pub fn from_file(config: &FileConfig) -> Self {
        Self {
            interval: config.recognition.interval(),
            tolerance: config.recognition.tolerance,
            request_timeout: config.api.request_timeout(),
            scope: config.attendance.scope,
            match_policy: config.attendance.match_policy,
        }
    }
}

/// Monotonic counters across all sessions of one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopCounters {
    pub ticks: u64,
    pub frames_skipped: u64,
    pub recognitions: u64,
    pub recognition_failures: u64,
    pub unknown_faces: u64,
    pub matches: u64,
    pub mark_requests: u64,
    pub marks_recorded: u64,
    pub already_marked: u64,
    pub mark_failures: u64,
    pub discarded_responses: u64,
}

/// Everything the embedding screen renders besides the video itself.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub state: LoopState,
    pub status: Status,
    pub message: Option<String>,
    pub session_id: Option<u64>,
    pub overlay: OverlayState,
    pub last_result: Option<RecognitionResult>,
    pub last_mark: Option<MarkOutcome>,
    pub counters: LoopCounters,
    pub updated_at: DateTime<Utc>,
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        Self {
            state: LoopState::Idle,
            status: Status::Idle,
            message: None,
            session_id: None,
            overlay: OverlayState::Idle,
            last_result: None,
            last_mark: None,
            counters: LoopCounters::default(),
            updated_at: Utc::now(),
        }
    }
}

/// What a single tick did. Mostly useful to tests and logs.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not active, or a previous tick is still in flight.
    Skipped,
    /// The surface has not warmed up, or the frame could not be encoded.
    NoFrame,
    NoFace,
    Unknown,
    Matched(MarkOutcome),
    RecognitionFailed,
    /// The session ended while a call was in flight.
    Discarded,
    /// The camera failed mid-session.
    CameraLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(Status::UnknownFace.as_str(), "unknown_face");
        assert_eq!(
            serde_json::to_value(Status::AlreadyMarked).unwrap(),
            serde_json::json!("already_marked")
        );
        assert!(Status::CameraError.is_blocking());
        assert!(!Status::MarkFailed.is_blocking());
    }

    #[test]
    fn test_camera_error_classification() {
        let denied: ControllerError = CameraError::PermissionDenied("no".into()).into();
        assert!(matches!(denied, ControllerError::Permission(_)));

        let lost: ControllerError = CameraError::CaptureFailed("unplugged".into()).into();
        assert!(matches!(lost, ControllerError::Device(_)));
    }
}
