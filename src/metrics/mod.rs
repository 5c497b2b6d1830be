//! Prometheus metrics exporter for the attendance station.
//!
//! Values are pulled from the controller's [`ControllerSnapshot`] stream
//! whenever `/metrics` is scraped, so the loop itself never touches the
//! registry.
//!
//! # Metrics Exposed
//!
//! ## Loop Metrics
//! - `face_attendance_loop_state` - 0 idle, 1 active, 2 suspended, 3 stopped
//! - `face_attendance_camera_error` - 1 while the camera is unavailable
//! - `face_attendance_ticks_total` - Ticks started
//! - `face_attendance_frames_skipped_total` - Ticks with no encodable frame
//!
//! ## Recognition Metrics
//! - `face_attendance_recognitions_total`
//! - `face_attendance_recognition_failures_total`
//! - `face_attendance_unknown_faces_total`
//! - `face_attendance_matches_total`
//! - `face_attendance_last_confidence`
//!
//! ## Attendance Metrics
//! - `face_attendance_mark_requests_total` - Network mark calls
//! - `face_attendance_marks_recorded_total`
//! - `face_attendance_already_marked_total`
//! - `face_attendance_mark_failures_total`
//! - `face_attendance_discarded_responses_total` - Late responses dropped
//!
//! # Example
//!
//! ```no_run
//! use face_attendance::controller::ControllerSnapshot;
//! use face_attendance::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let snapshot = ControllerSnapshot::default();
//! registry.update(&MetricsSnapshot::from_controller(&snapshot));
//! println!("{}", registry.encode().unwrap());
//! ```
//!
//! [`ControllerSnapshot`]: crate::controller::ControllerSnapshot

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
