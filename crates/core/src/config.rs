//! Tunables for an annotation session.

use crate::ink::StrokeStyle;
use crate::overlay::OverlayStyle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("zoom bounds must satisfy 0 < min <= max, got [{min}, {max}]")]
    ZoomBounds { min: f32, max: f32 },
    #[error("base scale must be positive, got {0}")]
    BaseScale(f32),
    #[error("zoom step must be positive, got {0}")]
    ZoomStep(f32),
    #[error("erase threshold must be positive, got {0}")]
    EraseThreshold(f64),
    #[error("invalid default stroke: {0}")]
    Stroke(String),
}

/// Zoom limits and the factor mapping zoom to render scale.
///
/// A render at zoom `z` uses `clamp(z) * base_scale` pixels per point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomPolicy {
    pub min: f32,
    pub max: f32,
    pub base_scale: f32,
    pub step: f32,
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        Self { min: 0.5, max: 3.0, base_scale: 1.5, step: 0.25 }
    }
}

impl ZoomPolicy {
    pub fn clamp(&self, zoom: f32) -> f32 {
        if zoom.is_nan() {
            return 1.0_f32.clamp(self.min, self.max);
        }
        zoom.clamp(self.min, self.max)
    }

    pub fn render_scale(&self, zoom: f32) -> f32 {
        self.clamp(zoom) * self.base_scale
    }

    pub fn zoom_in(&self, zoom: f32) -> f32 {
        self.clamp(zoom + self.step)
    }

    pub fn zoom_out(&self, zoom: f32) -> f32 {
        self.clamp(zoom - self.step)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min > 0.0 && self.min <= self.max) {
            return Err(ConfigError::ZoomBounds { min: self.min, max: self.max });
        }
        if !(self.base_scale > 0.0 && self.base_scale.is_finite()) {
            return Err(ConfigError::BaseScale(self.base_scale));
        }
        if !(self.step > 0.0) {
            return Err(ConfigError::ZoomStep(self.step));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub zoom: ZoomPolicy,
    /// Erase hit radius in unit-square distance.
    pub erase_threshold: f64,
    pub overlay: OverlayStyle,
    /// Pen used until the host configures another.
    pub stroke: StrokeStyle,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomPolicy::default(),
            erase_threshold: 0.02,
            overlay: OverlayStyle::default(),
            stroke: StrokeStyle::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zoom.validate()?;
        if !(self.erase_threshold > 0.0 && self.erase_threshold.is_finite()) {
            return Err(ConfigError::EraseThreshold(self.erase_threshold));
        }
        self.stroke.validate().map_err(|err| ConfigError::Stroke(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_zoom_policy() {
        let policy = ZoomPolicy::default();
        assert_eq!(policy.clamp(0.1), 0.5);
        assert_eq!(policy.clamp(10.0), 3.0);
        assert_eq!(policy.clamp(f32::NAN), 1.0);
        assert_eq!(policy.render_scale(2.0), 3.0);
        assert_eq!(policy.zoom_in(2.9), 3.0);
        assert_eq!(policy.zoom_out(1.0), 0.75);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"zoom": {"base_scale": 1.0}, "erase_threshold": 0.05}"#)
                .expect("partial config parses");

        assert_eq!(config.zoom.base_scale, 1.0);
        assert_eq!(config.zoom.max, 3.0);
        assert_eq!(config.erase_threshold, 0.05);
        assert_eq!(config.overlay, OverlayStyle::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = SessionConfig::default();
        assert!(config.validate().is_ok());

        config.zoom.min = 4.0;
        assert!(matches!(config.validate(), Err(ConfigError::ZoomBounds { .. })));

        config = SessionConfig { erase_threshold: 0.0, ..SessionConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::EraseThreshold(_))));

        config = SessionConfig::default();
        config.stroke.opacity = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Stroke(_))));
    }
}
