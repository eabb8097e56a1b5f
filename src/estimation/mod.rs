//! Overlap estimation between the canvas and the next frame.
//!
//! The estimator compares a reference strip (the bottom of the canvas)
//! with the next frame and reports how many leading rows of the frame
//! repeat the canvas bottom. Techniques are tried in order:
//!
//! ```text
//! Features (FAST + BRIEF + RANSAC) → Template (NCC) → Fallback (constant)
//! ```
//!
//! A technique either yields a candidate or an [`EstimationFailure`];
//! failures are logged and the next technique runs. The fallback always
//! succeeds but is never confident, so the compositor places rather than
//! blends.

mod config;
mod feature;
mod template;

pub use config::EstimatorConfig;
pub use template::band_correlation;

use crate::capture::Frame;
use crate::features::FeatureExtractor;
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alignment technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technique {
    /// Keypoint matching with geometric verification.
    Features,
    /// Normalized cross-correlation over candidate overlaps.
    Template,
    /// Conservative constant.
    Fallback,
}

impl Technique {
    /// Lowercase name, as used in config files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Technique::Features => "features",
            Technique::Template => "template",
            Technique::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Technique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a technique produced no candidate.
#[derive(Debug, Clone, Error)]
pub enum EstimationFailure {
    /// The next frame is too narrow or too short for keypoints.
    #[error("frame {width}x{height} too small for feature detection")]
    FrameTooSmall {
        /// Next frame width.
        width: u32,
        /// Next frame height.
        height: u32,
    },

    /// One side has too few keypoints to match.
    #[error("too few keypoints (reference {reference}, next {next})")]
    TooFewKeypoints {
        /// Keypoints in the reference strip.
        reference: usize,
        /// Keypoints in the next frame.
        next: usize,
    },

    /// Too few matches survived the distance filter.
    #[error("{found} good matches, need {required}")]
    TooFewGoodMatches {
        /// Matches kept.
        found: usize,
        /// Matches required.
        required: usize,
    },

    /// Verification failed and too few unverified matches remain.
    #[error("{found} matches after verification, need {required}")]
    TooFewVerifiedMatches {
        /// Matches available.
        found: usize,
        /// Matches required.
        required: usize,
    },

    /// Every displacement was discarded as an outlier.
    #[error("no displacement within range")]
    NoUsableDisplacement,

    /// The candidate overlap range is empty.
    #[error("no candidate overlap in {min}..={max}")]
    NoCandidates {
        /// Smallest candidate.
        min: u32,
        /// Largest candidate.
        max: u32,
    },

    /// No candidate correlated well enough.
    #[error("best correlation {score:.3} not above {threshold:.3}")]
    LowCorrelation {
        /// Best score found.
        score: f64,
        /// Score that had to be exceeded.
        threshold: f64,
    },
}

/// Overlap between the canvas bottom and the next frame's top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapEstimate {
    /// Overlapping rows.
    pub rows: u32,
    /// True when an alignment was found; drives blend vs place.
    pub confident: bool,
    /// Technique that produced the estimate.
    pub technique: Technique,
    /// Verified-match ratio or correlation; `None` for the fallback.
    pub score: Option<f64>,
}

/// Raw output of a successful technique.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    rows: u32,
    score: f64,
}

/// Intensity views of one seam.
#[derive(Debug, Clone)]
pub struct Seam {
    /// Bottom `section_height` rows of the canvas, cropped to the common width.
    pub strip: GrayImage,
    /// The whole next frame.
    pub next: GrayImage,
    /// Rows in `strip`.
    pub section_height: u32,
    /// Height of the whole canvas the strip was cut from.
    pub canvas_height: u32,
}

impl Seam {
    /// Height of the next frame.
    #[inline]
    pub fn next_height(&self) -> u32 {
        self.next.height()
    }
}

/// Estimates per-seam overlap using the configured cascade.
#[derive(Debug, Clone)]
pub struct OverlapEstimator {
    config: EstimatorConfig,
    extractor: FeatureExtractor,
}

impl OverlapEstimator {
    /// Creates an estimator; the feature extractor is built from `config`.
    pub fn new(config: EstimatorConfig) -> Self {
        let extractor = FeatureExtractor::new(
            config.fast_threshold,
            config.max_keypoints,
            config.descriptor_seed,
        );
        Self { config, extractor }
    }

    /// Active configuration.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Strip height examined for a canvas of `canvas_height` rows and a
    /// frame of `next_height` rows.
    pub fn section_height(&self, canvas_height: u32, next_height: u32) -> u32 {
        self.config
            .section_cap
            .min(canvas_height / 3)
            .min(next_height / 3)
    }

    /// Builds the seam, or `None` when the strip is too short to examine.
    pub fn seam(&self, canvas: &RgbImage, next: &Frame) -> Option<Seam> {
        let section = self.section_height(canvas.height(), next.height());
        if section <= self.config.min_section_height {
            return None;
        }
        let width = canvas.width().min(next.width());
        let strip_rgb =
            image::imageops::crop_imm(canvas, 0, canvas.height() - section, width, section)
                .to_image();

        Some(Seam {
            strip: image::imageops::grayscale(&strip_rgb),
            next: next.luma(),
            section_height: section,
            canvas_height: canvas.height(),
        })
    }

    /// Estimates how many leading rows of `next` repeat the canvas bottom.
    pub fn estimate(&self, canvas: &RgbImage, next: &Frame) -> OverlapEstimate {
        let Some(seam) = self.seam(canvas, next) else {
            tracing::debug!(
                canvas_height = canvas.height(),
                next_height = next.height(),
                "Reference strip too short, using fallback"
            );
            return self.fallback(next);
        };
        self.estimate_seam(&seam, next)
    }

    /// Runs the cascade over a prepared seam.
    pub fn estimate_seam(&self, seam: &Seam, next: &Frame) -> OverlapEstimate {
        for &technique in &self.config.cascade {
            let outcome = match technique {
                Technique::Features => feature::estimate(seam, &self.config, &self.extractor),
                Technique::Template => template::estimate(seam, &self.config),
                Technique::Fallback => break,
            };

            match outcome {
                Ok(candidate) if candidate.rows < self.config.min_plausible_overlap => {
                    tracing::debug!(
                        %technique,
                        rows = candidate.rows,
                        "Implausibly small overlap, using fallback"
                    );
                    break;
                }
                Ok(candidate) => {
                    return OverlapEstimate {
                        rows: candidate.rows,
                        confident: true,
                        technique,
                        score: Some(candidate.score),
                    };
                }
                Err(failure) => {
                    tracing::debug!(%technique, reason = %failure, "Technique failed");
                }
            }
        }
        self.fallback(next)
    }

    /// Conservative constant overlap; never confident.
    pub fn fallback(&self, next: &Frame) -> OverlapEstimate {
        let rows = self
            .config
            .fallback_overlap
            .min(next.height() / self.config.fallback_divisor.max(1));
        OverlapEstimate {
            rows,
            confident: false,
            technique: Technique::Fallback,
            score: None,
        }
    }
}

impl Default for OverlapEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic_page;
    use image::{Rgba, RgbaImage};

    /// Canvas = page rows `[0, 300)`, next = page rows `[300 - k, 600 - k)`.
    fn overlapping_pair(k: u32) -> (RgbImage, Frame) {
        let page = synthetic_page(200, 600, 11);
        let canvas = Frame::new(
            image::imageops::crop_imm(&page, 0, 0, 200, 300).to_image(),
            1,
        )
        .to_rgb();
        let next = Frame::new(
            image::imageops::crop_imm(&page, 0, 300 - k, 200, 300).to_image(),
            2,
        );
        (canvas, next)
    }

    #[test]
    fn test_section_height_limits() {
        let estimator = OverlapEstimator::default();
        assert_eq!(estimator.section_height(900, 900), 100);
        assert_eq!(estimator.section_height(150, 900), 50);
        assert_eq!(estimator.section_height(900, 60), 20);
    }

    #[test]
    fn test_known_overlaps_are_recovered() {
        let estimator = OverlapEstimator::default();
        for k in [20, 50, 80] {
            let (canvas, next) = overlapping_pair(k);
            let estimate = estimator.estimate(&canvas, &next);
            assert!(estimate.confident, "k={} not confident", k);
            assert!(
                estimate.rows.abs_diff(k) <= 3,
                "k={} estimated {}",
                k,
                estimate.rows
            );
        }
    }

    #[test]
    fn test_features_alone_recover_overlap() {
        let config = EstimatorConfig {
            cascade: vec![Technique::Features],
            ..Default::default()
        };
        let estimator = OverlapEstimator::new(config);
        let (canvas, next) = overlapping_pair(70);
        let estimate = estimator.estimate(&canvas, &next);

        assert_eq!(estimate.technique, Technique::Features);
        assert!(estimate.confident);
        assert!(estimate.rows.abs_diff(70) <= 3);
    }

    #[test]
    fn test_template_alone_recovers_overlap() {
        let config = EstimatorConfig {
            cascade: vec![Technique::Template],
            template_step: 4,
            ..Default::default()
        };
        let estimator = OverlapEstimator::new(config);
        let (canvas, next) = overlapping_pair(38);
        let estimate = estimator.estimate(&canvas, &next);

        assert_eq!(estimate.technique, Technique::Template);
        assert_eq!(estimate.rows, 38);
    }

    #[test]
    fn test_solid_blocks_fall_back() {
        let estimator = OverlapEstimator::default();
        let canvas = Frame::new(RgbaImage::from_pixel(200, 300, Rgba([220, 30, 30, 255])), 1).to_rgb();
        let next = Frame::new(RgbaImage::from_pixel(200, 300, Rgba([30, 30, 220, 255])), 2);
        let estimate = estimator.estimate(&canvas, &next);

        assert!(!estimate.confident);
        assert_eq!(estimate.technique, Technique::Fallback);
        assert_eq!(estimate.rows, 20);
    }

    #[test]
    fn test_disjoint_texture_not_confident() {
        let estimator = OverlapEstimator::default();
        let canvas = Frame::new(synthetic_page(200, 300, 1), 1).to_rgb();
        let next = Frame::new(synthetic_page(200, 300, 2), 2);
        let estimate = estimator.estimate(&canvas, &next);

        assert!(!estimate.confident);
        assert_eq!(estimate.rows, 20);
    }

    #[test]
    fn test_sideways_copy_not_confident() {
        // Same content, scrolled 60 rows but also moved 40 px sideways.
        let page = synthetic_page(260, 600, 11);
        let canvas = Frame::new(
            image::imageops::crop_imm(&page, 0, 0, 200, 300).to_image(),
            1,
        )
        .to_rgb();
        let next = Frame::new(
            image::imageops::crop_imm(&page, 40, 240, 200, 300).to_image(),
            2,
        );
        let estimate = OverlapEstimator::default().estimate(&canvas, &next);

        assert!(!estimate.confident);
        assert_eq!(estimate.technique, Technique::Fallback);
        assert_eq!(estimate.rows, 20);
    }

    #[test]
    fn test_default_cascade_falls_through_to_template() {
        // A 20-row overlap sits inside the detector border of both images.
        let estimator = OverlapEstimator::default();
        let (canvas, next) = overlapping_pair(20);
        let estimate = estimator.estimate(&canvas, &next);

        assert_eq!(estimate.technique, Technique::Template);
        assert!(estimate.confident);
        assert_eq!(estimate.rows, 20);
    }

    #[test]
    fn test_short_frames_skip_to_fallback() {
        let estimator = OverlapEstimator::default();
        let canvas = Frame::new(synthetic_page(100, 60, 1), 1).to_rgb();
        let next = Frame::new(synthetic_page(100, 60, 2), 2);
        let estimate = estimator.estimate(&canvas, &next);

        assert_eq!(estimate.technique, Technique::Fallback);
        assert_eq!(estimate.rows, 6);
    }

    #[test]
    fn test_implausible_overlap_downgraded() {
        // A 5-row overlap is found by correlation but below the plausible floor.
        let config = EstimatorConfig {
            cascade: vec![Technique::Template],
            template_min_overlap: 2,
            ..Default::default()
        };
        let estimator = OverlapEstimator::new(config);
        let (canvas, next) = overlapping_pair(5);
        let estimate = estimator.estimate(&canvas, &next);

        assert!(!estimate.confident);
        assert_eq!(estimate.technique, Technique::Fallback);
    }
}
