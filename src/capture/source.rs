//! Frame source abstraction.
//!
//! Capture itself (window selection, scroll injection, screen grabs) lives
//! outside this crate. A [`FrameSource`] is the seam where a capture layer
//! hands frames over in scroll order; the implementations here cover
//! synthetic pages for testing and image files on disk.

use super::frame::{Frame, FrameError};
use image::{Rgba, RgbaImage};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while pulling frames from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Listing or reading the source failed.
    #[error("failed to read frame source: {0}")]
    Io(#[from] std::io::Error),
    /// One frame could not be decoded; later frames may still be usable.
    #[error("frame {index} unusable: {source}")]
    Frame {
        /// Position of the frame in the source.
        index: u64,
        /// Why the frame was rejected.
        #[source]
        source: FrameError,
    },
    /// The simulated scroll geometry is inconsistent.
    #[error("invalid scroll configuration: {0}")]
    InvalidConfig(String),
}

/// Trait for producers of ordered frames.
pub trait FrameSource {
    /// Captures the next frame, or `None` once the source is exhausted.
    fn capture(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Drains the source, dropping frames that fail to convert.
    fn collect_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            match self.capture() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(SourceError::Frame { index, source }) => {
                    tracing::warn!(index, error = %source, "Dropping undecodable frame");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Frame source failed, stopping");
                    break;
                }
            }
        }
        frames
    }
}

/// Renders a deterministic textured page of the given size.
///
/// Every pixel is derived from a hash of its coordinates, so no two rows
/// repeat and any band of the page is a valid alignment target. The seed
/// is hashed before it meets the coordinates, so different seeds give
/// unrelated textures rather than shuffled copies of one.
pub fn synthetic_page(width: u32, height: u32, seed: u64) -> RgbaImage {
    let salt = mix(seed);
    RgbaImage::from_fn(width, height, |x, y| {
        let h = mix(salt ^ ((y as u64) << 32 | x as u64));
        Rgba([h as u8, (h >> 8) as u8, (h >> 16) as u8, 255])
    })
}

fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Geometry of a simulated scrolling capture.
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Page and viewport width.
    pub width: u32,
    /// Visible rows per capture.
    pub viewport_height: u32,
    /// Full page height.
    pub page_height: u32,
    /// Rows the surface advances between captures.
    pub scroll_step: u32,
    /// Texture seed.
    pub seed: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            width: 320,
            viewport_height: 240,
            page_height: 960,
            scroll_step: 180,
            seed: 7,
        }
    }
}

impl ScrollConfig {
    /// Validates the scroll geometry.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.width == 0 || self.viewport_height == 0 {
            return Err(SourceError::InvalidConfig("empty viewport".into()));
        }
        if self.page_height < self.viewport_height {
            return Err(SourceError::InvalidConfig(
                "page shorter than viewport".into(),
            ));
        }
        if self.scroll_step == 0 || self.scroll_step > self.viewport_height {
            return Err(SourceError::InvalidConfig(
                "scroll step must be 1..=viewport height".into(),
            ));
        }
        Ok(())
    }
}

/// Mock capture layer scrolling a synthetic page.
///
/// Yields one viewport per step; the final capture is clamped to the page
/// bottom the way a real surface stops at its end.
#[derive(Debug)]
pub struct MockScrollSource {
    config: ScrollConfig,
    page: RgbaImage,
    offset: Option<u32>,
    sequence: u64,
}

impl MockScrollSource {
    /// Renders the page for `config`; fails on inconsistent geometry.
    pub fn new(config: ScrollConfig) -> Result<Self, SourceError> {
        config.validate()?;
        let page = synthetic_page(config.width, config.page_height, config.seed);
        tracing::info!(?config, "MockScrollSource opened");
        Ok(Self {
            config,
            page,
            offset: Some(0),
            sequence: 0,
        })
    }

    /// The full page the frames are cut from.
    pub fn page(&self) -> &RgbaImage {
        &self.page
    }
}

impl FrameSource for MockScrollSource {
    fn capture(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(offset) = self.offset else {
            return Ok(None);
        };
        let bottom = self.config.page_height - self.config.viewport_height;
        let top = offset.min(bottom);

        let view = image::imageops::crop_imm(
            &self.page,
            0,
            top,
            self.config.width,
            self.config.viewport_height,
        )
        .to_image();

        self.offset = (top < bottom).then(|| top + self.config.scroll_step);
        self.sequence += 1;
        Ok(Some(Frame::new(view, self.sequence)))
    }
}

/// Loads frames from image files in capture order.
#[derive(Debug)]
pub struct DirectorySource {
    paths: VecDeque<PathBuf>,
    sequence: u64,
}

impl DirectorySource {
    /// Uses the given files in the given order.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            sequence: 0,
        }
    }

    /// Uses every file in `dir`, ordered by file name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(Self::from_paths(paths))
    }

    /// Remaining files.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True when every file has been read.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn capture(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        self.sequence += 1;
        let index = self.sequence;

        let image = image::open(&path).map_err(|e| SourceError::Frame {
            index,
            source: FrameError::Decode(format!("{}: {}", path.display(), e)),
        })?;
        tracing::debug!(path = %path.display(), "Loaded frame");
        Ok(Some(Frame::from_dynamic(image, index)))
    }
}
