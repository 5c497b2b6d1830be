//! Scoped ownership of one active camera stream.

use super::{Camera, CameraError, CaptureConfig, VideoFrame};
use chrono::{DateTime, Utc};

/// Owner token for one active media stream.
///
/// Exists from [`CameraSession::start`] until [`CameraSession::stop`]
/// (or until the session is dropped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraHandle {
    id: u64,
    opened_at: DateTime<Utc>,
}

impl CameraHandle {
    /// Per-session counter, unique for the lifetime of the session object.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the stream was acquired.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }
}

/// Acquires and releases the camera device.
///
/// At most one [`CameraHandle`] is active at a time. The device is
/// released on `stop`, on a failed `start`, and on drop.
pub struct CameraSession<C: Camera> {
    camera: C,
    config: CaptureConfig,
    handle: Option<CameraHandle>,
    next_id: u64,
}

impl<C: Camera> CameraSession<C> {
    pub fn new(camera: C, config: CaptureConfig) -> Self {
        Self {
            camera,
            config,
            handle: None,
            next_id: 1,
        }
    }

    /// Acquires the camera, first releasing any stream that is still active.
    pub fn start(&mut self) -> Result<&CameraHandle, CameraError> {
        if self.handle.is_some() {
            tracing::debug!("Restarting camera; releasing previous stream");
            self.stop();
        }

        if let Err(e) = self.camera.open(&self.config) {
            // Partially opened devices still hold tracks
            self.camera.close();
            tracing::warn!(error = %e, "Camera start failed");
            return Err(e);
        }

        let handle = CameraHandle {
            id: self.next_id,
            opened_at: Utc::now(),
        };
        self.next_id += 1;
        tracing::info!(handle = handle.id, "Camera stream acquired");
        Ok(self.handle.insert(handle))
    }

    /// Releases the stream. Idempotent.
    pub fn stop(&mut self) {
        let released = self.handle.take();
        self.camera.close();
        if let Some(handle) = released {
            tracing::info!(handle = handle.id, "Camera stream released");
        }
    }

    /// Reads the current picture on the live surface.
    pub fn read(&mut self) -> Result<VideoFrame, CameraError> {
        if self.handle.is_none() {
            return Err(CameraError::NotInitialized);
        }
        self.camera.read()
    }

    /// The active handle, if any.
    pub fn handle(&self) -> Option<&CameraHandle> {
        self.handle.as_ref()
    }

    /// True while a stream is held.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// The underlying camera.
    pub fn camera(&self) -> &C {
        &self.camera
    }
}

impl<C: Camera> Drop for CameraSession<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
