//! Camera and frame sampling configuration.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration for camera capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index or identifier.
    pub device_id: u32,
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Requested frames per second.
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// Encoding limits for sampled frames.
///
/// Payloads are kept small so each recognition round trip has
/// predictable latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Initial JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Lowest quality tried before the frame is downscaled.
    pub min_quality: u8,
    /// Upper bound on the encoded frame size.
    pub max_bytes: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 70,
            min_quality: 40,
            max_bytes: 256 * 1024,
        }
    }
}

impl SamplerConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::InvalidQuality);
        }
        if self.min_quality == 0 || self.min_quality > self.jpeg_quality {
            return Err(ConfigError::InvalidQuality);
        }
        if self.max_bytes < 1024 {
            return Err(ConfigError::InvalidPayloadLimit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(CaptureConfig::default().validate().is_ok());
        assert!(SamplerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_min_quality_above_quality_invalid() {
        let config = SamplerConfig {
            jpeg_quality: 50,
            min_quality: 60,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidQuality)));
    }
}
