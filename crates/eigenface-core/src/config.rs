//! Tunable constants of the pipeline, deserializable from a config file.

use crate::types::{FACE_HEIGHT, FACE_WIDTH};
use serde::{Deserialize, Serialize};

// --- Empirical localizer constants ---
pub const SKIN_HUE_MIN: f64 = 70.0;
pub const SKIN_HUE_MAX: f64 = 150.0;
pub const BORDER_MARGIN: u32 = 2;
pub const BLACK_THRESHOLD: u32 = 50;
pub const SCALE_FACTOR: u32 = 320;

// --- Open-set rejection ---
pub const THRESHOLD_MULTIPLIER: f64 = 2.5;
pub const MIN_THRESHOLD: f64 = 1500.0;
pub const FALLBACK_THRESHOLD: f64 = 2500.0;

pub const DEFAULT_COMPONENTS: usize = 10;
pub const DEFAULT_NEIGHBORS: usize = 5;

/// Skin-tone localization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Lower bound of the skin hue band, degrees.
    pub hue_min: f64,
    /// Upper bound of the skin hue band, degrees.
    pub hue_max: f64,
    /// Radius of the square blacked out around each non-skin pixel.
    pub border_margin: u32,
    /// Packed RGB values above this count as foreground when growing the box.
    pub black_threshold: u32,
    /// Image-size divisor used to report the working scale of a pass.
    pub scale_factor: u32,
    pub face_width: u32,
    pub face_height: u32,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            hue_min: SKIN_HUE_MIN,
            hue_max: SKIN_HUE_MAX,
            border_margin: BORDER_MARGIN,
            black_threshold: BLACK_THRESHOLD,
            scale_factor: SCALE_FACTOR,
            face_width: FACE_WIDTH,
            face_height: FACE_HEIGHT,
        }
    }
}

/// Dynamic acceptance threshold parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub threshold_multiplier: f64,
    pub min_threshold: f64,
    /// Used while no same-label pair exists to estimate spread.
    pub fallback_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: THRESHOLD_MULTIPLIER,
            min_threshold: MIN_THRESHOLD,
            fallback_threshold: FALLBACK_THRESHOLD,
        }
    }
}

impl ClassifierConfig {
    /// Acceptance threshold for a given average intra-class distance.
    pub fn threshold(&self, avg_intra_class: f64) -> f64 {
        if avg_intra_class > 0.0 {
            (avg_intra_class * self.threshold_multiplier).max(self.min_threshold)
        } else {
            self.fallback_threshold
        }
    }
}

/// Everything a [`FaceRecognizer`](crate::FaceRecognizer) session needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub localizer: LocalizerConfig,
    pub classifier: ClassifierConfig,
    /// Projection dimensionality.
    pub components: usize,
    /// k for k-NN voting.
    pub neighbors: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            localizer: LocalizerConfig::default(),
            classifier: ClassifierConfig::default(),
            components: DEFAULT_COMPONENTS,
            neighbors: DEFAULT_NEIGHBORS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_uses_floor() {
        let cfg = ClassifierConfig::default();
        assert_eq!(cfg.threshold(100.0), 1500.0);
        assert_eq!(cfg.threshold(1000.0), 2500.0);
    }

    #[test]
    fn test_threshold_fallback_without_statistics() {
        let cfg = ClassifierConfig::default();
        assert_eq!(cfg.threshold(0.0), 2500.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: RecognizerConfig =
            serde_json::from_str(r#"{"neighbors": 3, "localizer": {"hue_min": 60.0}}"#).unwrap();
        assert_eq!(cfg.neighbors, 3);
        assert_eq!(cfg.components, DEFAULT_COMPONENTS);
        assert_eq!(cfg.localizer.hue_min, 60.0);
        assert_eq!(cfg.localizer.hue_max, SKIN_HUE_MAX);
        assert_eq!(cfg.classifier, ClassifierConfig::default());
    }
}
