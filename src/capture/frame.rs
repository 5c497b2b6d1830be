//! Frame types: the raw picture on the live surface and the encoded
//! still that travels to the recognition service.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};

/// The current picture on the live video surface.
///
/// Holds packed RGB8 pixels. A surface that has not warmed up yet
/// reports zero dimensions and an empty buffer.
#[derive(Clone)]
pub struct VideoFrame {
    /// Packed RGB8 pixel data.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Read timestamp.
    timestamp: DateTime<Utc>,
    /// Monotonic sequence number.
    sequence: u64,
}

impl VideoFrame {
    /// Creates a new frame with the given parameters.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp: Utc::now(),
            sequence,
        }
    }

    /// A frame from a surface that has not reported dimensions yet.
    pub fn empty(sequence: u64) -> Self {
        Self::new(Vec::new(), 0, 0, sequence)
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the read timestamp.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// True once the surface reports nonzero dimensions.
    #[inline]
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.has_dimensions()
            && self.pixels.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// An encoded still ready for transport.
///
/// Produced and consumed within one loop iteration; never persisted.
#[derive(Clone)]
pub struct Frame {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
    sequence: u64,
}

impl Frame {
    pub(crate) fn new(
        jpeg: Vec<u8>,
        width: u32,
        height: u32,
        captured_at: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        Self {
            jpeg,
            width,
            height,
            captured_at,
            sequence,
        }
    }

    /// Builds a frame from already-encoded bytes.
    pub fn from_jpeg(jpeg: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(jpeg, width, height, Utc::now(), 0)
    }

    /// Encoded JPEG bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.jpeg
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    /// Width of the encoded image, which may be smaller than the surface.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the encoded image.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// When the source picture was read from the surface.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Sequence number of the source picture.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Plain base64 of the JPEG bytes, without a data-URL prefix.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.jpeg)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("jpeg_bytes", &self.jpeg.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 64 * 48 * 3];
        let frame = VideoFrame::new(pixels, 64, 48, 1);

        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.sequence(), 1);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let pixels = vec![0u8; 100]; // Wrong size
        let frame = VideoFrame::new(pixels, 640, 480, 1);

        assert!(!frame.is_valid());
    }

    #[test]
    fn test_empty_frame_has_no_dimensions() {
        let frame = VideoFrame::empty(3);
        assert!(!frame.has_dimensions());
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_base64_has_no_data_url_prefix() {
        let frame = Frame::from_jpeg(vec![0xFF, 0xD8, 0xFF], 1, 1);
        assert_eq!(frame.to_base64(), "/9j/");
    }
}
