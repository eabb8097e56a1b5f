//! Prometheus metrics for stitch runs.
//!
//! # Metrics Exposed
//!
//! ## Runs
//! - `scroll_stitch_runs_total` - Completed runs
//! - `scroll_stitch_concat_fallbacks_total` - Runs stacked without overlap
//!
//! ## Frames
//! - `scroll_stitch_frames_total` - Frames handed to runs
//! - `scroll_stitch_frames_dropped_total{reason}` - Duplicates and failed conversions
//!
//! ## Seams
//! - `scroll_stitch_seams_total{technique}` - Seams per estimation technique
//! - `scroll_stitch_confident_seams_total` - Seams that were blended
//!
//! ## Output
//! - `scroll_stitch_output_width_pixels` / `scroll_stitch_output_height_pixels`
//!
//! # Example
//!
//! ```no_run
//! use scroll_stitch::{metrics::MetricsRegistry, Stitcher};
//! # let frames = Vec::new();
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let (_, report) = Stitcher::default().stitch_with_report(&frames).unwrap();
//! registry.update(&report);
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry};
