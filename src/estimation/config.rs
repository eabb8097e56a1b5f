//! Estimator thresholds and tuning.
//!
//! Every limit the overlap cascade applies lives here so a deployment can
//! tune it from the config file.

use super::Technique;
use crate::config::ConfigError;
use crate::features::RansacConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the overlap estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Techniques tried in order; the first success wins.
    pub cascade: Vec<Technique>,

    /// Upper bound on the reference strip height.
    pub section_cap: u32,
    /// Strips this short or shorter skip straight to the fallback.
    pub min_section_height: u32,
    /// Next frames this narrow or short skip feature matching.
    pub min_feature_dimension: u32,

    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Keypoints kept per image.
    pub max_keypoints: usize,
    /// Seed for the descriptor sampling pattern.
    pub descriptor_seed: u64,
    /// Both images need strictly more keypoints than this.
    pub min_keypoints: usize,
    /// Good-match threshold is `min_distance * factor`...
    pub match_distance_factor: f64,
    /// ...but never below this floor.
    pub match_distance_floor: f64,
    /// Matches further apart than this are never good, whatever the minimum.
    pub match_distance_ceiling: f64,
    /// Good matches required to continue.
    pub min_good_matches: usize,
    /// Run RANSAC verification on good matches.
    pub verify_geometry: bool,
    /// RANSAC parameters.
    pub ransac: RansacConfig,
    /// Inliers required to trust the verified set.
    pub min_inliers: usize,
    /// Unverified good matches accepted when verification falls short.
    pub min_fallback_matches: usize,
    /// Lower clamp for a feature-based overlap.
    pub min_overlap: u32,
    /// Rows of the next frame that always stay outside the overlap.
    pub overlap_margin: u32,

    /// Smallest candidate overlap for template correlation.
    pub template_min_overlap: u32,
    /// Candidate stride; strides above 1 are refined around the best hit.
    pub template_step: u32,
    /// Correlation a candidate must exceed to be trusted.
    pub template_threshold: f64,

    /// Conservative overlap used when nothing else is trusted...
    pub fallback_overlap: u32,
    /// ...capped at `next.height / fallback_divisor`.
    pub fallback_divisor: u32,
    /// Confident estimates below this are treated as noise.
    pub min_plausible_overlap: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            cascade: vec![Technique::Features, Technique::Template],
            section_cap: 100,
            min_section_height: 20,
            min_feature_dimension: 20,
            fast_threshold: 20,
            max_keypoints: 1000,
            descriptor_seed: 0x0b1e,
            min_keypoints: 4,
            match_distance_factor: 2.0,
            match_distance_floor: 30.0,
            match_distance_ceiling: 64.0,
            min_good_matches: 4,
            verify_geometry: true,
            ransac: RansacConfig::default(),
            min_inliers: 6,
            min_fallback_matches: 3,
            min_overlap: 0,
            overlap_margin: 10,
            template_min_overlap: 10,
            template_step: 1,
            template_threshold: 0.7,
            fallback_overlap: 20,
            fallback_divisor: 10,
            min_plausible_overlap: 10,
        }
    }
}

impl EstimatorConfig {
    /// Tighter matching; fewer confident seams, fewer wrong ones.
    pub fn strict() -> Self {
        Self {
            match_distance_floor: 20.0,
            min_good_matches: 8,
            min_inliers: 10,
            template_threshold: 0.85,
            ..Default::default()
        }
    }

    /// Looser matching for low-texture content.
    pub fn permissive() -> Self {
        Self {
            fast_threshold: 12,
            max_keypoints: 1500,
            match_distance_floor: 40.0,
            match_distance_ceiling: 80.0,
            min_inliers: 4,
            template_threshold: 0.5,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cascade.contains(&Technique::Fallback) {
            return Err(ConfigError::InvalidCascade(
                "the fallback is implicit and cannot be listed".into(),
            ));
        }
        if self.section_cap == 0 {
            return Err(ConfigError::InvalidValue("section_cap must be positive".into()));
        }
        if self.template_step == 0 {
            return Err(ConfigError::InvalidValue("template_step must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.template_threshold) {
            return Err(ConfigError::InvalidValue(
                "template_threshold must be within 0..=1".into(),
            ));
        }
        if self.match_distance_ceiling < self.match_distance_floor {
            return Err(ConfigError::InvalidValue(
                "match_distance_ceiling must not be below match_distance_floor".into(),
            ));
        }
        if self.fallback_divisor == 0 {
            return Err(ConfigError::InvalidValue("fallback_divisor must be positive".into()));
        }
        if self.ransac.iterations == 0 || self.ransac.threshold <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "ransac needs positive iterations and threshold".into(),
            ));
        }
        if self.ransac.max_horizontal_shift < 0.0 {
            return Err(ConfigError::InvalidValue(
                "ransac.max_horizontal_shift must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_valid() {
        assert!(EstimatorConfig::default().validate().is_ok());
        assert!(EstimatorConfig::strict().validate().is_ok());
        assert!(EstimatorConfig::permissive().validate().is_ok());
    }

    #[test]
    fn test_fallback_in_cascade_rejected() {
        let config = EstimatorConfig {
            cascade: vec![Technique::Template, Technique::Fallback],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCascade(_))
        ));
    }

    #[test]
    fn test_negative_horizontal_shift_rejected() {
        let mut config = EstimatorConfig::default();
        config.ransac.max_horizontal_shift = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_step_rejected() {
        let config = EstimatorConfig {
            template_step: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
