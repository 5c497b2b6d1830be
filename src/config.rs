//! File-based configuration.
//!
//! Every section has defaults, so an empty file (or no file at all)
//! yields a working station configuration pointed at a local backend.

use crate::attendance::ScopePolicy;
use crate::capture::{CaptureConfig, SamplerConfig};
use crate::controller::MatchPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("invalid JPEG quality (must be 1-100 and min_quality <= jpeg_quality)")]
    InvalidQuality,
    #[error("payload limit must be at least 1024 bytes")]
    InvalidPayloadLimit,
    #[error("tolerance must be within 0.0-1.0, got {0}")]
    InvalidTolerance(f64),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Remote backend settings shared by the recognition and attendance calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the school backend, including the `/api` prefix.
    pub base_url: String,
    /// Bearer token attached to every request, when present.
    pub auth_token: Option<String>,
    /// Upper bound on any single remote call.
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            auth_token: None,
            request_timeout_ms: 5000,
        }
    }
}

impl ApiConfig {
    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Joins an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("request_timeout_ms"));
        }
        Ok(())
    }
}

/// Sampling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Delay between the end of one tick and the start of the next.
    pub interval_ms: u64,
    /// Matcher sensitivity; lower is stricter.
    pub tolerance: f64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1500,
            tolerance: 0.6,
        }
    }
}

impl RecognitionConfig {
    /// Tick interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("interval_ms"));
        }
        Ok(())
    }
}

/// Attendance marking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Boundary under which an identity counts as already attempted.
    pub scope: ScopePolicy,
    /// Whether scanning continues after an identity is marked.
    pub match_policy: MatchPolicy,
    /// Class attached to student marks, when the backend wants one.
    pub class_name: Option<String>,
    /// Status value sent with each mark.
    pub status: String,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            scope: ScopePolicy::Session,
            match_policy: MatchPolicy::Continue,
            class_name: None,
            status: "present".to_string(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Stop the station after this many seconds (0 runs until interrupted).
    pub duration_secs: u64,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            duration_secs: 0,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.sampler.validate()?;
        self.api.validate()?;
        self.recognition.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config.recognition.interval_ms, 1500);
        assert_eq!(config.attendance.scope, ScopePolicy::Session);
        assert_eq!(config.attendance.match_policy, MatchPolicy::Continue);
        assert_eq!(config.sampler.jpeg_quality, 70);
    }

    #[test]
    fn test_sections_parse() {
        let config = FileConfig::from_toml(
            r#"
            [api]
            base_url = "https://school.example/api/"
            auth_token = "abc"

            [recognition]
            tolerance = 0.52
            interval_ms = 500

            [attendance]
            scope = "calendar_day"
            match_policy = "stop_after_match"
            class_name = "10-A"
            "#,
        )
        .unwrap();

        assert_eq!(config.recognition.tolerance, 0.52);
        assert_eq!(config.attendance.scope, ScopePolicy::CalendarDay);
        assert_eq!(config.attendance.match_policy, MatchPolicy::StopAfterMatch);
        assert_eq!(
            config.api.endpoint("/face-recognition/recognize"),
            "https://school.example/api/face-recognition/recognize"
        );
        assert_eq!(config.api.auth_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_out_of_range_tolerance_rejected() {
        let err = FileConfig::from_toml("[recognition]\ntolerance = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTolerance(_)));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let err = FileConfig::from_toml("[api]\nbase_url = \"school.local\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
    }
}
