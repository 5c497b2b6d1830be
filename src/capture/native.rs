//! Native camera backed by `nokhwa`.
//!
//! `nokhwa::Camera` is `!Send`, which fits the controller's
//! single-threaded loop.

use super::{Camera, CameraError, CaptureConfig, VideoFrame};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::NokhwaError;

/// A webcam opened through the platform's native capture API.
#[derive(Default)]
pub struct NativeCamera {
    inner: Option<nokhwa::Camera>,
    sequence: u64,
}

impl NativeCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Platform backends report a refused permission prompt only through
/// the error text.
fn classify(error: NokhwaError, fallback: fn(String) -> CameraError) -> CameraError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("not authorized")
    {
        CameraError::PermissionDenied(message)
    } else {
        fallback(message)
    }
}

impl Camera for NativeCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::MJPEG,
                config.fps,
            ),
        ));

        let mut camera = nokhwa::Camera::new(CameraIndex::Index(config.device_id), requested)
            .map_err(|e| classify(e, CameraError::DeviceNotFound))?;
        camera
            .open_stream()
            .map_err(|e| classify(e, CameraError::OpenFailed))?;

        let resolution = camera.resolution();
        tracing::info!(
            device = config.device_id,
            name = %camera.info().human_name(),
            width = resolution.width(),
            height = resolution.height(),
            "Native camera opened"
        );

        self.inner = Some(camera);
        self.sequence = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<VideoFrame, CameraError> {
        let camera = self.inner.as_mut().ok_or(CameraError::NotInitialized)?;
        self.sequence += 1;

        let buffer = camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        if buffer.resolution().width() == 0 || buffer.resolution().height() == 0 {
            return Ok(VideoFrame::empty(self.sequence));
        }

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        Ok(VideoFrame::new(decoded.into_raw(), width, height, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.inner.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!(error = %e, "Error stopping camera stream");
            }
            tracing::info!("Native camera closed");
        }
    }
}

impl Drop for NativeCamera {
    fn drop(&mut self) {
        self.close();
    }
}
