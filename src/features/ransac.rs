//! RANSAC geometric verification over a 2-D similarity model.
//!
//! Consecutive scroll captures differ by a translation; a similarity
//! (scale, rotation, translation) is fitted so matches that disagree with
//! one rigid shift can be rejected. Models that scale, rotate or shift
//! sideways beyond a small tolerance are treated as degenerate, since a
//! scroll only moves content vertically.

use nalgebra::{Point2, Rotation2, Similarity2, Vector2};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A matched point pair: `from` in the next frame, `to` in the reference.
#[derive(Debug, Clone, Copy)]
pub struct Correspondence {
    /// Keypoint position in the next frame.
    pub from: Point2<f64>,
    /// Matched position in the reference strip.
    pub to: Point2<f64>,
}

impl Correspondence {
    /// Builds a correspondence from `(x, y)` tuples.
    pub fn new(from: (f64, f64), to: (f64, f64)) -> Self {
        Self {
            from: Point2::new(from.0, from.1),
            to: Point2::new(to.0, to.1),
        }
    }
}

/// RANSAC parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Sampling rounds.
    pub iterations: usize,
    /// Inlier reprojection error, in pixels.
    pub threshold: f64,
    /// Allowed `|scale - 1|`.
    pub max_scale_deviation: f64,
    /// Allowed rotation, in degrees.
    pub max_rotation_deg: f64,
    /// Allowed `|tx|` of the fitted model, in pixels.
    pub max_horizontal_shift: f64,
    /// Sampling seed.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            iterations: 200,
            threshold: 3.0,
            max_scale_deviation: 0.1,
            max_rotation_deg: 2.0,
            max_horizontal_shift: 4.0,
            seed: 0x5eed,
        }
    }
}

/// Best model found and the indices of its inliers.
#[derive(Debug, Clone)]
pub struct RansacResult {
    /// Fitted transform from next-frame to reference coordinates.
    pub model: Similarity2<f64>,
    /// Indices into the input correspondences.
    pub inliers: Vec<usize>,
    /// Mean reprojection error over the inliers.
    pub residual: f64,
}

impl RansacResult {
    /// Translation component of the fitted model.
    pub fn translation(&self) -> Vector2<f64> {
        self.model.isometry.translation.vector
    }
}

/// Exact similarity mapping `a.from → a.to` and `b.from → b.to`.
fn fit_pair(a: &Correspondence, b: &Correspondence) -> Option<Similarity2<f64>> {
    let dp = b.from - a.from;
    let dq = b.to - a.to;
    if dp.norm() < 1.0 {
        return None;
    }
    let scale = dq.norm() / dp.norm();
    if scale < 1e-6 {
        return None;
    }
    let angle = dq.y.atan2(dq.x) - dp.y.atan2(dp.x);
    let rotation = Rotation2::new(angle);
    let t = a.to.coords - (rotation * a.from.coords) * scale;
    Some(Similarity2::new(t, rotation.angle(), scale))
}

/// Runs RANSAC; `None` when fewer than two correspondences exist or no
/// plausible model was found.
pub fn estimate_similarity(data: &[Correspondence], config: &RansacConfig) -> Option<RansacResult> {
    let n = data.len();
    if n < 2 {
        return None;
    }

    let max_angle = config.max_rotation_deg.to_radians();
    let plausible = |m: &Similarity2<f64>| {
        (m.scaling() - 1.0).abs() <= config.max_scale_deviation
            && m.isometry.rotation.angle().abs() <= max_angle
            && m.isometry.translation.vector.x.abs() <= config.max_horizontal_shift
    };

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut best: Option<RansacResult> = None;

    for _ in 0..config.iterations {
        let sample = index::sample(&mut rng, n, 2);
        let Some(model) = fit_pair(&data[sample.index(0)], &data[sample.index(1)]) else {
            continue;
        };
        if !plausible(&model) {
            continue;
        }

        let mut inliers = Vec::new();
        let mut total_error = 0.0;
        for (i, c) in data.iter().enumerate() {
            let err = (model.transform_point(&c.from) - c.to).norm();
            if err < config.threshold {
                inliers.push(i);
                total_error += err;
            }
        }
        let residual = total_error / inliers.len().max(1) as f64;

        let better = match &best {
            None => true,
            Some(b) => {
                inliers.len() > b.inliers.len()
                    || (inliers.len() == b.inliers.len() && residual < b.residual)
            }
        };
        if better {
            let all = inliers.len() == n;
            best = Some(RansacResult {
                model,
                inliers,
                residual,
            });
            if all {
                break;
            }
        }
    }

    if let Some(b) = &best {
        tracing::trace!(
            inliers = b.inliers.len(),
            total = n,
            ty = b.translation().y,
            "RANSAC finished"
        );
    }
    best
}
