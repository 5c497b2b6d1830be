//! Recognition loop orchestration.
//!
//! [`RecognitionController`] ties the pieces together:
//!
//! ```text
//! start ──► CameraSession ──► FrameSampler ──► RecognitionClient
//!                                                     │
//!            OverlaySink ◄── OverlayRenderer ◄────────┤
//!                                                     ▼
//!                      DedupSet ◄──► AttendanceMarker ──► AttendanceApi
//! ```
//!
//! Every transition is published as a [`ControllerSnapshot`] on a watch
//! channel so screens and the status endpoint see the same state.

mod machine;
mod state;


pub use machine::RecognitionController;
pub use state::{
    ControllerConfig, ControllerError, ControllerSnapshot, LoopCounters, LoopState, MatchPolicy,
    Status, TickOutcome,
};
