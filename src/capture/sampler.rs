//! Still-frame sampling and JPEG encoding.

use super::{Frame, SamplerConfig, VideoFrame};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, ImageResult, RgbImage};

/// Quality reduction applied per oversize attempt.
const QUALITY_STEP: u8 = 15;

/// Frames are never downscaled below this width.
const MIN_WIDTH: u32 = 160;

/// Captures a still from the live surface and encodes it for transport.
///
/// Holds no state between captures.
#[derive(Debug, Clone, Default)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Encodes the current surface picture.
    ///
    /// Returns `None` when the surface has no dimensions yet, when the
    /// pixel buffer is inconsistent, or when the frame cannot be brought
    /// under the payload limit. The caller skips the tick in that case.
    pub fn capture(&self, surface: &VideoFrame) -> Option<Frame> {
        if !surface.has_dimensions() {
            tracing::trace!(sequence = surface.sequence(), "Surface not warmed up");
            return None;
        }
        if !surface.is_valid() {
            tracing::warn!(?surface, "Surface buffer does not match dimensions");
            return None;
        }

        let mut image =
            RgbImage::from_raw(surface.width(), surface.height(), surface.pixels().to_vec())?;
        let mut quality = self.config.jpeg_quality;

        loop {
            let bytes = match encode_jpeg(&image, quality) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "JPEG encoding failed");
                    return None;
                }
            };

            if bytes.len() <= self.config.max_bytes {
                tracing::trace!(
                    bytes = bytes.len(),
                    quality,
                    width = image.width(),
                    height = image.height(),
                    "Frame sampled"
                );
                return Some(Frame::new(
                    bytes,
                    image.width(),
                    image.height(),
                    surface.timestamp(),
                    surface.sequence(),
                ));
            }

            if quality > self.config.min_quality {
                quality = quality
                    .saturating_sub(QUALITY_STEP)
                    .max(self.config.min_quality);
            } else if image.width() / 2 >= MIN_WIDTH {
                image = imageops::resize(
                    &image,
                    image.width() / 2,
                    (image.height() / 2).max(1),
                    FilterType::Triangle,
                );
                quality = self.config.jpeg_quality;
            } else {
                tracing::warn!(
                    bytes = bytes.len(),
                    max_bytes = self.config.max_bytes,
                    "Frame exceeds payload limit at minimum size; skipping"
                );
                return None;
            }
        }
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
}
