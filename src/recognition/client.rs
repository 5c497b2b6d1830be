//! Remote recognition service client.

use super::{wire, RecognitionResult};
use crate::capture::Frame;
use crate::config::ApiConfig;
use crate::http;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Path of the recognition endpoint under the API base URL.
pub const RECOGNIZE_PATH: &str = "face-recognition/recognize";

/// Errors from the recognition service. All of them are transient for
/// the sampling loop.
#[derive(Debug, Clone, Error)]
pub enum RecognitionServiceError {
    #[error("recognition request timed out after {0:?}")]
    Timeout(Duration),
    #[error("recognition service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("recognition transport failed: {0}")]
    Transport(String),
    #[error("malformed recognition response: {0}")]
    Malformed(String),
}

/// Sends one encoded frame to the matcher.
///
/// Implementations must not cache: every call is a fresh query.
#[async_trait]
pub trait RecognitionClient {
    /// Matches the face in `frame`. `tolerance` is forwarded unchanged.
    async fn recognize(
        &self,
        frame: &Frame,
        tolerance: f64,
    ) -> Result<RecognitionResult, RecognitionServiceError>;
}

#[async_trait]
impl<T: RecognitionClient + Send + Sync + ?Sized> RecognitionClient for Arc<T> {
    async fn recognize(
        &self,
        frame: &Frame,
        tolerance: f64,
    ) -> Result<RecognitionResult, RecognitionServiceError> {
        (**self).recognize(frame, tolerance).await
    }
}

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    image: &'a str,
    tolerance: f64,
}

/// [`RecognitionClient`] over the backend's JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpRecognitionClient {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpRecognitionClient {
    pub fn new(config: &ApiConfig) -> Result<Self, RecognitionServiceError> {
        let http = http::build_client(config)
            .map_err(|e| RecognitionServiceError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint(RECOGNIZE_PATH),
            auth_token: config.auth_token.clone(),
            timeout: config.request_timeout(),
        })
    }

    fn map_transport(&self, error: reqwest::Error) -> RecognitionServiceError {
        if error.is_timeout() {
            RecognitionServiceError::Timeout(self.timeout)
        } else {
            RecognitionServiceError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl RecognitionClient for HttpRecognitionClient {
    async fn recognize(
        &self,
        frame: &Frame,
        tolerance: f64,
    ) -> Result<RecognitionResult, RecognitionServiceError> {
        let image = frame.to_base64();
        let request = self.http.post(&self.endpoint).json(&RecognizeRequest {
            image: &image,
            tolerance,
        });

        let response = http::authorize(request, self.auth_token.as_deref())
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        let (status, body) = http::read_json(response)
            .await
            .map_err(|e| self.map_transport(e))?;

        tracing::debug!(
            status,
            frame_bytes = frame.len(),
            sequence = frame.sequence(),
            "Recognition response received"
        );
        wire::normalize(status, &body)
    }
}
