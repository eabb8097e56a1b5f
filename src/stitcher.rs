//! End-to-end stitching pipeline.
//!
//! ```text
//! frames → duplicate filter → (estimate → append)* → canvas
//!                                     ↓ on CompositionError
//!                               plain concatenation
//! ```

use crate::capture::{Frame, PixelLayout};
use crate::composition::{
    concatenate, CompositionError, Compositor, CompositorConfig, SEPARATOR_COLOR,
};
use crate::config::FileConfig;
use crate::estimation::{EstimatorConfig, OverlapEstimate, OverlapEstimator, Technique};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use thiserror::Error;

/// Errors that end a stitch run.
#[derive(Debug, Error)]
pub enum StitchError {
    /// No usable frame was supplied.
    #[error("no frames to stitch")]
    InputEmpty,

    /// Compositing and the concatenation fallback both failed.
    #[error("composition failed: {0}")]
    Composition(#[from] CompositionError),
}

/// Pipeline switches around the estimator and compositor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Skip frames pixel-identical to the previous kept frame. Off by
    /// default; when on, skipped frames contribute no rows and no seam.
    pub drop_duplicate_frames: bool,
    /// Draw a separator line between frames in the concatenation fallback.
    pub separator: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            drop_duplicate_frames: false,
            separator: false,
        }
    }
}

/// A frame in a native pixel layout, before conversion.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Pixels per row.
    pub width: u32,
    /// Rows.
    pub height: u32,
    /// Channel order of `data`.
    pub layout: PixelLayout,
    /// Tightly packed rows.
    pub data: &'a [u8],
}

/// Outcome of one seam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeamReport {
    /// Seam index; seam `i` joins kept frame `i + 1` to the canvas.
    pub index: usize,
    /// Sequence number of the appended frame.
    pub sequence: u64,
    /// What the estimator reported.
    pub estimate: OverlapEstimate,
    /// Rows actually overlapped after clamping to the frame and canvas.
    pub overlap: u32,
}

/// Summary of a stitch run.
#[derive(Debug, Clone, Default)]
pub struct StitchReport {
    /// Frames handed to the run.
    pub frames_in: usize,
    /// Frames that failed raw conversion.
    pub frames_rejected: usize,
    /// Frames skipped as duplicates.
    pub frames_duplicate: usize,
    /// One entry per appended frame, empty after a concatenation.
    pub seams: Vec<SeamReport>,
    /// True when compositing failed and frames were stacked instead.
    pub concatenated: bool,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
}

impl StitchReport {
    /// Seams resolved by `technique`.
    pub fn seams_by(&self, technique: Technique) -> usize {
        self.seams
            .iter()
            .filter(|s| s.estimate.technique == technique)
            .count()
    }

    /// Sum of all applied overlaps.
    pub fn total_overlap(&self) -> u64 {
        self.seams.iter().map(|s| s.overlap as u64).sum()
    }
}

/// Drops frames whose pixels repeat the previous kept frame.
pub fn drop_duplicate_frames(frames: &[Frame]) -> Vec<&Frame> {
    let mut kept: Vec<&Frame> = Vec::with_capacity(frames.len());
    let mut last: Option<blake3::Hash> = None;
    for frame in frames {
        let fingerprint = frame.fingerprint();
        if last == Some(fingerprint) {
            tracing::debug!(frame = frame.sequence(), "Dropping duplicate frame");
            continue;
        }
        last = Some(fingerprint);
        kept.push(frame);
    }
    kept
}

/// Configured stitching pipeline.
#[derive(Debug, Clone)]
pub struct Stitcher {
    estimator: OverlapEstimator,
    compositor: CompositorConfig,
    pipeline: PipelineConfig,
}

impl Stitcher {
    /// Builds a pipeline from its three configuration sections.
    pub fn new(
        estimator: EstimatorConfig,
        compositor: CompositorConfig,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            estimator: OverlapEstimator::new(estimator),
            compositor,
            pipeline,
        }
    }

    /// Builds a pipeline from a loaded config file.
    pub fn from_config(config: &FileConfig) -> Self {
        Self::new(
            config.estimator.clone(),
            config.compositor.clone(),
            config.pipeline.clone(),
        )
    }

    /// The overlap estimator used for every seam.
    pub fn estimator(&self) -> &OverlapEstimator {
        &self.estimator
    }

    /// Stitches `frames` top to bottom into one raster.
    pub fn stitch(&self, frames: &[Frame]) -> Result<RgbImage, StitchError> {
        self.stitch_with_report(frames).map(|(canvas, _)| canvas)
    }

    /// Like [`Stitcher::stitch`], also returning per-seam details.
    pub fn stitch_with_report(
        &self,
        frames: &[Frame],
    ) -> Result<(RgbImage, StitchReport), StitchError> {
        let kept = if self.pipeline.drop_duplicate_frames {
            drop_duplicate_frames(frames)
        } else {
            frames.iter().collect()
        };
        let mut report = StitchReport {
            frames_in: frames.len(),
            frames_duplicate: frames.len() - kept.len(),
            ..Default::default()
        };

        let Some((first, rest)) = kept.split_first() else {
            return Err(StitchError::InputEmpty);
        };
        tracing::info!(
            frames = kept.len(),
            duplicates = report.frames_duplicate,
            "Stitching frames"
        );

        let canvas = match self.composite(first, rest, &mut report.seams) {
            Ok(canvas) => canvas,
            Err(err) => {
                tracing::warn!(error = %err, "Composition failed, concatenating frames instead");
                report.seams.clear();
                report.concatenated = true;
                self.stack(&kept[..])?
            }
        };

        report.width = canvas.width();
        report.height = canvas.height();
        tracing::info!(
            width = report.width,
            height = report.height,
            seams = report.seams.len(),
            concatenated = report.concatenated,
            "Stitch complete"
        );
        Ok((canvas, report))
    }

    /// Stacks `frames` with no overlap detection.
    ///
    /// `max_canvas_pixels` bounds the compositor only; stacking is limited
    /// by dimension overflow and allocation failure.
    pub fn concatenate(&self, frames: &[Frame]) -> Result<RgbImage, StitchError> {
        if frames.is_empty() {
            return Err(StitchError::InputEmpty);
        }
        self.stack(frames)
    }

    fn stack<F: Borrow<Frame>>(&self, frames: &[F]) -> Result<RgbImage, StitchError> {
        let separator = self.pipeline.separator.then_some(SEPARATOR_COLOR);
        let canvas = concatenate(frames, separator, Rgb(self.compositor.background), u64::MAX)?;
        Ok(canvas)
    }

    /// Converts native buffers and stitches those that convert.
    pub fn stitch_raw(
        &self,
        frames: &[RawFrame<'_>],
    ) -> Result<(RgbImage, StitchReport), StitchError> {
        let mut converted = Vec::with_capacity(frames.len());
        let mut rejected = 0;
        for (index, raw) in frames.iter().enumerate() {
            match Frame::from_raw(raw.width, raw.height, raw.layout, raw.data, index as u64) {
                Ok(frame) => converted.push(frame),
                Err(err) => {
                    tracing::warn!(index, error = %err, "Dropping frame that failed conversion");
                    rejected += 1;
                }
            }
        }

        let (canvas, mut report) = self.stitch_with_report(&converted)?;
        report.frames_in = frames.len();
        report.frames_rejected = rejected;
        Ok((canvas, report))
    }

    fn composite(
        &self,
        first: &Frame,
        rest: &[&Frame],
        seams: &mut Vec<SeamReport>,
    ) -> Result<RgbImage, CompositionError> {
        let mut compositor = Compositor::new(first, self.compositor.clone())?;

        for (index, &frame) in rest.iter().enumerate() {
            let estimate = self.estimator.estimate(compositor.canvas(), frame);
            tracing::debug!(
                seam = index,
                rows = estimate.rows,
                confident = estimate.confident,
                technique = %estimate.technique,
                "Estimated overlap"
            );
            let overlap = compositor.append(frame, &estimate)?;
            seams.push(SeamReport {
                index,
                sequence: frame.sequence(),
                estimate,
                overlap,
            });
        }

        Ok(compositor.finish())
    }
}

impl Default for Stitcher {
    fn default() -> Self {
        Self::new(
            EstimatorConfig::default(),
            CompositorConfig::default(),
            PipelineConfig::default(),
        )
    }
}
