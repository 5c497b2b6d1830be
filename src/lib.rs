//! Face Attendance Library
//!
//! A camera-driven attendance station. A live video surface is sampled
//! on a fixed interval, each sample is sent to a remote face matcher, and
//! every recognized student or teacher is marked present at most once per
//! scope through the attendance backend.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → recognition → attendance
//!     ↓          ↓             ↓
//!          overlay + controller snapshot
//! ```
//!
//! # Design Principles
//!
//! - **One tick in flight**: the next tick is armed only after the previous settles
//! - **Stop means stop**: late responses from a closed session are discarded
//! - **Advisory dedup**: the backend stays the authority on already-marked
//! - **Failures are transient**: only camera errors block the loop
//!
//! # Example
//!
//! ```no_run
//! use face_attendance::{
//!     attendance::{AttendanceMarker, HttpAttendanceApi},
//!     capture::{CameraSession, FrameSampler, MockCamera},
//!     config::FileConfig,
//!     controller::{ControllerConfig, RecognitionController},
//!     overlay::TracingOverlay,
//!     recognition::HttpRecognitionClient,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FileConfig::default();
//! let controller = RecognitionController::new(
//!     ControllerConfig::from_file(&config),
//!     CameraSession::new(MockCamera::new(), config.capture.clone()),
//!     FrameSampler::new(config.sampler.clone()),
//!     HttpRecognitionClient::new(&config.api)?,
//!     AttendanceMarker::new(HttpAttendanceApi::new(&config.api)?, config.api.request_timeout()),
//!     TracingOverlay::default(),
//! );
//!
//! controller.start()?;
//! controller.run().await;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod attendance;
pub mod capture;
pub mod config;
pub mod controller;
mod http;
pub mod metrics;
pub mod overlay;
pub mod recognition;

// Re-export commonly used types at crate root
pub use attendance::{AttendanceMarker, DedupSet, MarkOutcome, MarkStatus, ScopePolicy};
pub use capture::{Camera, CameraSession, CaptureConfig, Frame, FrameSampler, MockCamera};
pub use config::{ConfigError, FileConfig};
pub use controller::{
    ControllerConfig, ControllerError, ControllerSnapshot, LoopState, MatchPolicy,
    RecognitionController, Status,
};
pub use overlay::{OverlayRenderer, OverlaySink};
pub use recognition::{Identity, PersonId, RecognitionClient, RecognitionResult, Role};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
