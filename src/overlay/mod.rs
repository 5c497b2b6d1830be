//! Visual overlay for the live video.
//!
//! Three indicator states: neutral (idle or no face), negative
//! (unknown face) and positive (matched), plus a label when matched.

mod renderer;
mod sink;

pub use renderer::{Overlay, OverlayRenderer, OverlayState};
pub use sink::{OverlaySink, TracingOverlay};
