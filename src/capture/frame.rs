//! Frame type representing one captured raster of the scrolling surface.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use thiserror::Error;

/// Channel order of a raw native pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 3 bytes per pixel, red first.
    Rgb8,
    /// 4 bytes per pixel, red first, alpha last.
    Rgba8,
    /// 3 bytes per pixel, blue first (24-bit DIB).
    Bgr8,
    /// 4 bytes per pixel, blue first (32-bit DIB).
    Bgra8,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
            PixelLayout::Rgba8 | PixelLayout::Bgra8 => 4,
        }
    }
}

/// Errors converting a native buffer into a [`Frame`].
#[derive(Debug, Error)]
pub enum FrameError {
    /// Zero or overflowing dimensions.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The buffer length disagrees with the dimensions and layout.
    #[error("buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch {
        /// `width * height * bytes_per_pixel`.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// The image file could not be decoded.
    #[error("failed to decode frame: {0}")]
    Decode(String),
}

/// A single captured frame.
///
/// Pixels are kept as RGBA, row-major and top-down. A frame is immutable
/// once built; the stitcher only ever borrows it.
#[derive(Clone)]
pub struct Frame {
    image: RgbaImage,
    /// Monotonic capture sequence number.
    sequence: u64,
}

impl Frame {
    /// Creates a frame from an RGBA buffer.
    pub fn new(image: RgbaImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    /// Creates an opaque frame from an RGB buffer.
    pub fn from_rgb(image: &RgbImage, sequence: u64) -> Self {
        Self::new(DynamicImage::ImageRgb8(image.clone()).to_rgba8(), sequence)
    }

    /// Creates a frame from any decoded image.
    pub fn from_dynamic(image: DynamicImage, sequence: u64) -> Self {
        Self::new(image.into_rgba8(), sequence)
    }

    /// Converts a raw native buffer (tightly packed rows) into a frame.
    pub fn from_raw(
        width: u32,
        height: u32,
        layout: PixelLayout,
        bytes: &[u8],
        sequence: u64,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions { width, height });
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(layout.channels()))
            .ok_or(FrameError::InvalidDimensions { width, height })?;
        if bytes.len() != expected {
            return Err(FrameError::BufferSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let rgba: Vec<u8> = match layout {
            PixelLayout::Rgba8 => bytes.to_vec(),
            PixelLayout::Bgra8 => bytes
                .chunks_exact(4)
                .flat_map(|px| [px[2], px[1], px[0], px[3]])
                .collect(),
            PixelLayout::Rgb8 => bytes
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
            PixelLayout::Bgr8 => bytes
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0], 255])
                .collect(),
        };

        let image = RgbaImage::from_raw(width, height, rgba).ok_or(
            FrameError::BufferSizeMismatch {
                expected,
                actual: bytes.len(),
            },
        )?;
        Ok(Self::new(image, sequence))
    }

    /// Returns the underlying RGBA raster.
    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }

    /// True when the frame has a non-empty raster.
    pub fn is_valid(&self) -> bool {
        self.pixel_count() > 0
    }

    /// Single-channel intensity view used for alignment.
    pub fn luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }

    /// Opaque 3-channel copy; alpha is discarded.
    pub fn to_rgb(&self) -> RgbImage {
        DynamicImage::ImageRgba8(self.image.clone()).into_rgb8()
    }

    /// BLAKE3 digest of dimensions and pixel data.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.width().to_le_bytes());
        hasher.update(&self.height().to_le_bytes());
        hasher.update(self.image.as_raw());
        hasher.finalize()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .finish()
    }
}
