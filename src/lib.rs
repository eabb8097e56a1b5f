//! Scrolling Screenshot Stitching Library
//!
//! Joins a vertical sequence of overlapping viewport captures into one
//! tall raster, as produced by scrolling a window and grabbing it after
//! every scroll step.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → estimation → composition
//!    ↓           ↓
//!  frames    features (FAST / BRIEF / RANSAC), template correlation
//! ```
//!
//! For every seam the [`OverlapEstimator`] decides how many leading rows
//! of the next frame repeat the bottom of the canvas, and the
//! [`Compositor`] appends the frame at that offset, blending the band
//! only when the estimate is confident.
//!
//! # Design Principles
//!
//! - **Never fail on content**: every seam gets an estimate; unaligned
//!   seams fall back to a small unblended overlap
//! - **Deterministic**: descriptor patterns and RANSAC sampling are seeded
//! - **No global state**: a run is a pure function of its frames and config
//!
//! # Example
//!
//! ```no_run
//! use scroll_stitch::capture::{FrameSource, MockScrollSource, ScrollConfig};
//!
//! let mut source = MockScrollSource::new(ScrollConfig::default()).unwrap();
//! let frames = source.collect_frames();
//!
//! let canvas = scroll_stitch::stitch(&frames).unwrap();
//! canvas.save("page.png").unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod composition;
pub mod config;
pub mod estimation;
pub mod features;
pub mod metrics;
pub mod stitcher;

// Re-export commonly used types at crate root
pub use capture::{Frame, FrameSource, PixelLayout};
pub use composition::{concatenate, BlendMode, CompositionError, Compositor, CompositorConfig};
pub use config::{ConfigError, FileConfig};
pub use estimation::{EstimatorConfig, OverlapEstimate, OverlapEstimator, Technique};
pub use stitcher::{
    drop_duplicate_frames, PipelineConfig, RawFrame, SeamReport, StitchError, StitchReport,
    Stitcher,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stitches `frames` with the default configuration.
pub fn stitch(frames: &[Frame]) -> Result<image::RgbImage, StitchError> {
    Stitcher::default().stitch(frames)
}
