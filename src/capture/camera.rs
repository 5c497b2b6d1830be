//! Camera abstraction for the live video surface.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, VideoFrame};
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Clone, Error)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to read frame: {0}")]
    CaptureFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

impl CameraError {
    /// Returns true when the failure came from the user or platform
    /// refusing access, as opposed to a hardware or stream fault.
    pub fn is_permission(&self) -> bool {
        matches!(self, CameraError::PermissionDenied(_))
    }
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and mock implementations for testing.
pub trait Camera {
    /// Opens the device and starts streaming with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Reads the current picture on the live surface.
    ///
    /// A camera that is still warming up returns a frame with zero
    /// dimensions rather than an error.
    fn read(&mut self) -> Result<VideoFrame, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Stops streaming and releases the device. Must be safe to call
    /// on a camera that is already closed.
    fn close(&mut self);
}

/// Mock camera for testing that generates synthetic frames.
#[derive(Debug, Default)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
    warmup_reads: u64,
    deny_permission: bool,
    fail_after: Option<u64>,
    open_count: u32,
    close_count: u32,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports zero dimensions for the first `reads` reads after open.
    pub fn with_warmup(mut self, reads: u64) -> Self {
        self.warmup_reads = reads;
        self
    }

    /// Refuses every open as if the user denied the permission prompt.
    pub fn denying_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Fails every read once `reads` frames have been produced.
    pub fn failing_after(mut self, reads: u64) -> Self {
        self.fail_after = Some(reads);
        self
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    /// Number of closes that actually released an open stream.
    pub fn close_count(&self) -> u32 {
        self.close_count
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        if self.deny_permission {
            return Err(CameraError::PermissionDenied(
                "user dismissed the camera prompt".into(),
            ));
        }
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        self.open_count += 1;
        tracing::info!(device = config.device_id, "MockCamera opened");
        Ok(())
    }

    fn read(&mut self) -> Result<VideoFrame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        if let Some(limit) = self.fail_after {
            if self.sequence >= limit {
                return Err(CameraError::CaptureFailed("stream ended".into()));
            }
        }

        self.sequence += 1;
        if self.sequence <= self.warmup_reads {
            return Ok(VideoFrame::empty(self.sequence));
        }

        // Diagonal gradient shifted by sequence so consecutive frames differ
        let (width, height) = (config.width, config.height);
        let shift = self.sequence as u32;
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift) % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }

        Ok(VideoFrame::new(pixels, width, height, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        if self.config.take().is_some() {
            self.close_count += 1;
            tracing::info!("MockCamera closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_lifecycle() {
        let mut camera = MockCamera::new();
        let config = CaptureConfig::default();

        assert!(!camera.is_open());

        camera.open(&config).unwrap();
        assert!(camera.is_open());

        let frame = camera.read().unwrap();
        assert!(frame.is_valid());
        assert_eq!(frame.sequence(), 1);

        let frame2 = camera.read().unwrap();
        assert_eq!(frame2.sequence(), 2);

        camera.close();
        camera.close();
        assert!(!camera.is_open());
        assert_eq!(camera.close_count(), 1);
    }

    #[test]
    fn test_read_without_open() {
        let mut camera = MockCamera::new();
        assert!(matches!(camera.read(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_warmup_frames_have_no_dimensions() {
        let mut camera = MockCamera::new().with_warmup(2);
        camera.open(&CaptureConfig::with_dimensions(32, 24)).unwrap();

        assert!(!camera.read().unwrap().has_dimensions());
        assert!(!camera.read().unwrap().has_dimensions());
        assert!(camera.read().unwrap().has_dimensions());
    }

    #[test]
    fn test_denied_permission() {
        let mut camera = MockCamera::new().denying_permission();
        let err = camera.open(&CaptureConfig::default()).unwrap_err();
        assert!(err.is_permission());
        assert!(!camera.is_open());
    }
}
