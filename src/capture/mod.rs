//! Camera input and frame handling.
//!
//! This module owns the live camera stream ([`CameraSession`]) and turns
//! the current surface picture into a compact encoded still
//! ([`FrameSampler`]). Nothing here knows about recognition or attendance.

mod camera;
mod config;
mod frame;
#[cfg(feature = "camera")]
mod native;
mod sampler;
mod session;

pub use camera::{Camera, CameraError, MockCamera};
pub use config::{CaptureConfig, SamplerConfig};
pub use frame::{Frame, VideoFrame};
#[cfg(feature = "camera")]
pub use native::NativeCamera;
pub use sampler::FrameSampler;
pub use session::{CameraHandle, CameraSession};
