//! Template-correlation overlap estimation.

use super::{Candidate, EstimationFailure, EstimatorConfig, Seam};
use image::GrayImage;

/// Per-pixel variance below which a band counts as flat.
const FLAT_VARIANCE: f64 = 1e-3;

/// Slides a candidate overlap over the seam and keeps the best correlation.
pub(super) fn estimate(seam: &Seam, config: &EstimatorConfig) -> Result<Candidate, EstimationFailure> {
    let lo = config.template_min_overlap.max(1);
    let hi = seam.section_height.min(seam.next_height() / 2);
    if hi < lo {
        return Err(EstimationFailure::NoCandidates { min: lo, max: hi });
    }
    let width = seam.strip.width().min(seam.next.width());
    let step = config.template_step.max(1);

    let score_at = |rows: u32| band_correlation(&seam.strip, &seam.next, rows, width);

    let mut best: Option<(u32, f64)> = None;
    for rows in (lo..=hi).step_by(step as usize) {
        keep_best(&mut best, rows, score_at(rows));
    }
    if step > 1 {
        if let Some((coarse, _)) = best {
            let from = coarse.saturating_sub(step - 1).max(lo);
            let to = (coarse + step - 1).min(hi);
            for rows in from..=to {
                keep_best(&mut best, rows, score_at(rows));
            }
        }
    }

    let (rows, score) = best.ok_or(EstimationFailure::NoCandidates { min: lo, max: hi })?;
    tracing::debug!(rows, score, "Template correlation");

    if score > config.template_threshold {
        Ok(Candidate { rows, score })
    } else {
        Err(EstimationFailure::LowCorrelation {
            score,
            threshold: config.template_threshold,
        })
    }
}

fn keep_best(best: &mut Option<(u32, f64)>, rows: u32, score: f64) {
    if best.map_or(true, |(_, s)| score > s) {
        *best = Some((rows, score));
    }
}

/// Zero-mean normalized cross-correlation between the top `rows` of
/// `next` and the bottom `rows` of `strip`, over the first `width` columns.
///
/// Returns 0 when either band is flat or empty, or when `rows` or `width`
/// exceed either image.
pub fn band_correlation(strip: &GrayImage, next: &GrayImage, rows: u32, width: u32) -> f64 {
    if rows == 0
        || width == 0
        || rows > strip.height().min(next.height())
        || width > strip.width().min(next.width())
    {
        return 0.0;
    }
    let strip_top = strip.height() - rows;
    let n = (rows as f64) * (width as f64);

    let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for y in 0..rows {
        for x in 0..width {
            let a = strip.get_pixel(x, strip_top + y)[0] as f64;
            let b = next.get_pixel(x, y)[0] as f64;
            sa += a;
            sb += b;
            saa += a * a;
            sbb += b * b;
            sab += a * b;
        }
    }

    let var_a = saa - sa * sa / n;
    let var_b = sbb - sb * sb / n;
    if var_a / n < FLAT_VARIANCE || var_b / n < FLAT_VARIANCE {
        return 0.0;
    }
    let cov = sab - sa * sb / n;
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}
