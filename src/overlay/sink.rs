//! Destinations for rendered overlays.

use super::Overlay;

/// Receives the overlay drawn each tick.
pub trait OverlaySink {
    /// Shows the overlay, replacing whatever was shown before.
    fn present(&mut self, overlay: &Overlay);

    /// Removes any overlay, e.g. when the camera stops.
    fn clear(&mut self) {}
}

/// Logs overlay changes; the default sink for headless stations.
#[derive(Debug, Default)]
pub struct TracingOverlay {
    last: Option<Overlay>,
}

impl OverlaySink for TracingOverlay {
    fn present(&mut self, overlay: &Overlay) {
        if self.last.as_ref() != Some(overlay) {
            tracing::debug!(
                state = ?overlay.state,
                label = overlay.label.as_deref().unwrap_or(""),
                "Overlay updated"
            );
        }
        self.last = Some(overlay.clone());
    }

    fn clear(&mut self) {
        self.last = None;
    }
}
