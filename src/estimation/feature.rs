//! Feature-based overlap estimation.

use super::{Candidate, EstimationFailure, EstimatorConfig, Seam};
use crate::features::{
    estimate_similarity, filter_good_matches, match_nearest, Correspondence, FeatureExtractor,
};

/// Aligns the next frame against the reference strip by keypoints.
///
/// The overlap is `section_height - median(ref.y - next.y)` over the
/// matches that survive distance filtering and geometric verification.
pub(super) fn estimate(
    seam: &Seam,
    config: &EstimatorConfig,
    extractor: &FeatureExtractor,
) -> Result<Candidate, EstimationFailure> {
    let (w, h) = seam.next.dimensions();
    if w <= config.min_feature_dimension || h <= config.min_feature_dimension {
        return Err(EstimationFailure::FrameTooSmall {
            width: w,
            height: h,
        });
    }

    let reference = extractor.extract(&seam.strip);
    let next = extractor.extract(&seam.next);
    tracing::debug!(
        reference = reference.len(),
        next = next.len(),
        "Detected features"
    );
    if reference.len() <= config.min_keypoints || next.len() <= config.min_keypoints {
        return Err(EstimationFailure::TooFewKeypoints {
            reference: reference.len(),
            next: next.len(),
        });
    }

    let matches = match_nearest(&next, &reference);
    let mut good = filter_good_matches(
        &matches,
        config.match_distance_factor,
        config.match_distance_floor,
    );
    good.retain(|m| f64::from(m.distance) <= config.match_distance_ceiling);
    if good.len() < config.min_good_matches {
        return Err(EstimationFailure::TooFewGoodMatches {
            found: good.len(),
            required: config.min_good_matches,
        });
    }

    let correspondences: Vec<Correspondence> = good
        .iter()
        .map(|m| {
            let from = next[m.query].keypoint;
            let to = reference[m.train].keypoint;
            Correspondence::new((from.x as f64, from.y as f64), (to.x as f64, to.y as f64))
        })
        .collect();

    let verified: Vec<Correspondence> = if config.verify_geometry {
        match estimate_similarity(&correspondences, &config.ransac) {
            Some(result) if result.inliers.len() >= config.min_inliers => {
                tracing::debug!(
                    inliers = result.inliers.len(),
                    good = good.len(),
                    model_ty = result.translation().y,
                    "Geometric verification passed"
                );
                result.inliers.iter().map(|&i| correspondences[i]).collect()
            }
            _ if correspondences.len() >= config.min_fallback_matches => {
                tracing::debug!(
                    good = good.len(),
                    "Verification inconclusive, using unfiltered good matches"
                );
                correspondences.clone()
            }
            _ => {
                return Err(EstimationFailure::TooFewVerifiedMatches {
                    found: correspondences.len(),
                    required: config.min_fallback_matches,
                })
            }
        }
    } else {
        correspondences.clone()
    };

    let section = seam.section_height as f64;
    let mut displacements =
        usable_displacements(&verified, section, config.ransac.max_horizontal_shift);
    let displacement = median(&mut displacements).ok_or(EstimationFailure::NoUsableDisplacement)?;

    let upper = seam
        .next_height()
        .saturating_sub(config.overlap_margin)
        .min(seam.canvas_height / 2)
        .max(config.min_overlap);
    let raw = section - displacement;
    let rows = raw.round().clamp(config.min_overlap as f64, upper as f64) as u32;

    tracing::debug!(displacement, raw, rows, "Feature alignment");
    Ok(Candidate {
        rows,
        score: verified.len() as f64 / good.len() as f64,
    })
}

/// Vertical displacements `ref.y - next.y` of the pairs that move by at
/// most `max_dx` sideways and at most `2 * section` vertically.
fn usable_displacements(pairs: &[Correspondence], section: f64, max_dx: f64) -> Vec<f64> {
    pairs
        .iter()
        .filter(|c| (c.to.x - c.from.x).abs() <= max_dx)
        .map(|c| c.to.y - c.from.y)
        .filter(|d| d.abs() <= 2.0 * section)
        .collect()
}

/// Median of `values`; averages the middle pair for even lengths.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
