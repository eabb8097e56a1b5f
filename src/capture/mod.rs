//! Frame intake.
//!
//! Frames arrive from an external capture layer in scroll order. This
//! module defines the frame type, its conversion from native buffers, and
//! the [`FrameSource`] seam with mock and file-backed implementations.

mod frame;
mod source;

pub use frame::{Frame, FrameError, PixelLayout};
pub use source::{
    synthetic_page, DirectorySource, FrameSource, MockScrollSource, ScrollConfig, SourceError,
};
