//! Overlay description for the live surface.

use crate::recognition::{BoundingBox, RecognitionResult};
use serde::Serialize;

/// Which of the three indicator states to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    /// No result yet, or no face in the frame.
    Idle,
    /// A face matched nobody.
    Unknown,
    /// A face matched an enrolled identity.
    Matched,
}

/// One frame's worth of overlay, in surface coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub state: OverlayState,
    pub width: u32,
    pub height: u32,
    pub bounds: BoundingBox,
    pub label: Option<String>,
}

/// Draws a bounding indicator and label for the latest result.
///
/// Stateless; called every tick whether or not the result changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayRenderer;

impl OverlayRenderer {
    /// Describes the overlay for `result`.
    ///
    /// `surface` is the live surface size; `source` is the size of the
    /// image the result's face box refers to, which differs from the
    /// surface when the sampler downscaled the frame.
    pub fn render(
        &self,
        result: Option<&RecognitionResult>,
        surface: (u32, u32),
        source: (u32, u32),
    ) -> Overlay {
        let (width, height) = surface;
        let state = match result {
            None => OverlayState::Idle,
            Some(r) if !r.face_detected() => OverlayState::Idle,
            Some(r) if !r.is_matched() => OverlayState::Unknown,
            Some(_) => OverlayState::Matched,
        };

        let bounds = result
            .and_then(RecognitionResult::bounding_box)
            .and_then(|b| scale_box(b, source, surface))
            .unwrap_or(BoundingBox {
                top: 0,
                right: width,
                bottom: height,
                left: 0,
            });

        let label = match (state, result) {
            (OverlayState::Matched, Some(r)) => r.identity().map(|identity| {
                let mut label = format!("{} ({})", identity.display_name(), identity.role);
                if let Some(score) = r.score() {
                    label.push(' ');
                    label.push_str(&score.label());
                }
                label
            }),
            (OverlayState::Unknown, _) => Some("Unknown".to_string()),
            _ => None,
        };

        Overlay {
            state,
            width,
            height,
            bounds,
            label,
        }
    }
}

fn scale_box(b: BoundingBox, source: (u32, u32), surface: (u32, u32)) -> Option<BoundingBox> {
    if source.0 == 0 || source.1 == 0 {
        return None;
    }
    let sx = surface.0 as f64 / source.0 as f64;
    let sy = surface.1 as f64 / source.1 as f64;
    let scaled = BoundingBox::from_trbl([
        (b.top as f64 * sy).round() as i64,
        (b.right as f64 * sx).round() as i64,
        (b.bottom as f64 * sy).round() as i64,
        (b.left as f64 * sx).round() as i64,
    ])?;
    Some(BoundingBox {
        right: scaled.right.min(surface.0),
        bottom: scaled.bottom.min(surface.1),
        ..scaled
    })
}
