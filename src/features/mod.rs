//! Keypoint detection, description, matching and verification.
//!
//! The pieces used by feature-based overlap estimation:
//!
//! ```text
//! luma → FAST corners → BRIEF descriptors → Hamming matches → RANSAC
//! ```
//!
//! Everything here is deterministic: the descriptor pattern and the RANSAC
//! sampler are both seeded.

mod brief;
mod fast;
mod matcher;
mod ransac;

pub use brief::{BriefExtractor, Descriptor, Feature, DESCRIPTOR_RADIUS};
pub use fast::{FastDetector, KeyPoint};
pub use matcher::{filter_good_matches, match_nearest, FeatureMatch};
pub use ransac::{estimate_similarity, Correspondence, RansacConfig, RansacResult};

use image::GrayImage;

/// FAST detection followed by BRIEF description.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    detector: FastDetector,
    brief: BriefExtractor,
}

impl FeatureExtractor {
    /// Creates an extractor keeping at most `max_keypoints` per image.
    pub fn new(fast_threshold: u8, max_keypoints: usize, seed: u64) -> Self {
        Self {
            detector: FastDetector::new(fast_threshold, DESCRIPTOR_RADIUS + 2, max_keypoints),
            brief: BriefExtractor::new(seed),
        }
    }

    /// Detects and describes features in `image`.
    pub fn extract(&self, image: &GrayImage) -> Vec<Feature> {
        let keypoints = self.detector.detect(image);
        self.brief.describe(image, &keypoints)
    }
}
