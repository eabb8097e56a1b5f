//! Canvas composition.
//!
//! The [`Compositor`] grows an RGB canvas one frame at a time, blending
//! confident overlaps and placing the rest. [`concatenate`] is the plain
//! stacking used when compositing cannot finish.

mod compositor;
mod concat;

pub use compositor::Compositor;
pub use concat::{concatenate, SEPARATOR_COLOR};

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a confident overlap band is mixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BlendMode {
    /// Incoming weight ramps `(i + 0.5) / overlap` down the band.
    #[default]
    Linear,
    /// One incoming weight for the whole band.
    Fixed {
        /// Weight of the incoming frame, `0..=1`.
        incoming: f32,
    },
}

impl BlendMode {
    /// Incoming weight for row `i` of an `overlap`-row band.
    #[inline]
    pub fn weight(self, i: u32, overlap: u32) -> f32 {
        match self {
            BlendMode::Linear => (i as f32 + 0.5) / overlap as f32,
            BlendMode::Fixed { incoming } => incoming,
        }
    }
}

/// Compositor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// How confident overlap bands are mixed.
    pub blend: BlendMode,
    /// Largest canvas accepted, in pixels. Applies to compositing only;
    /// the concatenation fallback is not limited by it.
    pub max_canvas_pixels: u64,
    /// Fill for pixels no frame covers.
    pub background: [u8; 3],
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            blend: BlendMode::Linear,
            max_canvas_pixels: 1 << 28,
            background: [255, 255, 255],
        }
    }
}

impl CompositorConfig {
    /// Rejects out-of-range blend weights and a zero pixel limit.
    pub fn validate(&self) -> Result<(), crate::config::ConfigError> {
        use crate::config::ConfigError;

        if let BlendMode::Fixed { incoming } = self.blend {
            if !(0.0..=1.0).contains(&incoming) {
                return Err(ConfigError::InvalidValue(
                    "blend.incoming must be within 0..=1".into(),
                ));
            }
        }
        if self.max_canvas_pixels == 0 {
            return Err(ConfigError::InvalidValue(
                "max_canvas_pixels must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Canvas could not be built.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// The canvas would not fit `u32` dimensions or `usize` bytes.
    #[error("canvas dimensions overflow ({width} x {height} rows requested)")]
    DimensionOverflow {
        /// Requested width.
        width: u64,
        /// Requested height.
        height: u64,
    },

    /// The canvas would exceed `max_canvas_pixels`.
    #[error("canvas {width}x{height} exceeds the {limit} pixel limit")]
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Configured pixel limit.
        limit: u64,
    },

    /// The allocator refused the canvas buffer.
    #[error("failed to allocate {bytes} bytes for the canvas")]
    Allocation {
        /// Bytes requested.
        bytes: usize,
        /// Underlying reservation error.
        #[source]
        source: std::collections::TryReserveError,
    },
}

/// Checks `width x height` against the limit and returns the buffer length.
pub(crate) fn canvas_len(width: u64, height: u64, limit: u64) -> Result<usize, CompositionError> {
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(CompositionError::DimensionOverflow { width, height }),
    };
    let pixels = width * height;
    if pixels > limit {
        return Err(CompositionError::TooLarge {
            width: w,
            height: h,
            limit,
        });
    }
    pixels
        .checked_mul(3)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or(CompositionError::DimensionOverflow { width, height })
}

/// Allocates a background-filled canvas without aborting on failure.
pub(crate) fn blank_canvas(
    width: u32,
    height: u32,
    background: Rgb<u8>,
    limit: u64,
) -> Result<RgbImage, CompositionError> {
    let bytes = canvas_len(width as u64, height as u64, limit)?;
    let mut raw: Vec<u8> = Vec::new();
    raw.try_reserve_exact(bytes)
        .map_err(|source| CompositionError::Allocation { bytes, source })?;
    raw.extend(
        std::iter::repeat(background.0)
            .take(bytes / 3)
            .flatten(),
    );
    RgbImage::from_raw(width, height, raw).ok_or(CompositionError::DimensionOverflow {
        width: width as u64,
        height: height as u64,
    })
}
