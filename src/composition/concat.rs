//! Plain vertical stacking.

use super::{blank_canvas, CompositionError};
use crate::capture::Frame;
use image::{Rgb, RgbImage};
use std::borrow::Borrow;

/// Separator colour drawn between stacked frames.
pub const SEPARATOR_COLOR: Rgb<u8> = Rgb([200, 200, 200]);

/// Stacks `frames` top to bottom with no overlap.
///
/// The output is as wide as the widest frame and as tall as all frames
/// together, on `background`. With `separator` set, the last row of every
/// frame but the final one is painted in that colour.
pub fn concatenate<F: Borrow<Frame>>(
    frames: &[F],
    separator: Option<Rgb<u8>>,
    background: Rgb<u8>,
    max_canvas_pixels: u64,
) -> Result<RgbImage, CompositionError> {
    let width = frames.iter().map(|f| f.borrow().width()).max().unwrap_or(0);
    let height: u64 = frames.iter().map(|f| f.borrow().height() as u64).sum();
    let height = u32::try_from(height).map_err(|_| CompositionError::DimensionOverflow {
        width: width as u64,
        height,
    })?;

    let mut canvas = blank_canvas(width, height, background, max_canvas_pixels)?;
    let mut y = 0u32;
    for (i, frame) in frames.iter().enumerate() {
        let frame = frame.borrow();
        image::imageops::replace(&mut canvas, &frame.to_rgb(), 0, y as i64);
        y += frame.height();

        if let Some(color) = separator {
            if i + 1 < frames.len() && frame.height() > 0 {
                for x in 0..frame.width() {
                    canvas.put_pixel(x, y - 1, color);
                }
            }
        }
    }

    tracing::debug!(frames = frames.len(), width, height, "Concatenated frames");
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn solid(w: u32, h: u32, v: u8) -> Frame {
        Frame::new(RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255])), 0)
    }

    #[test]
    fn test_sizes_add_up() {
        let out = concatenate(&[solid(10, 5, 0), solid(14, 7, 50)], None, WHITE, u64::MAX).unwrap();
        assert_eq!(out.dimensions(), (14, 12));
        assert_eq!(*out.get_pixel(12, 2), WHITE);
        assert_eq!(*out.get_pixel(12, 8), Rgb([50, 50, 50]));
    }

    #[test]
    fn test_separator_between_frames_only() {
        let out = concatenate(
            &[solid(4, 3, 0), solid(4, 3, 0)],
            Some(SEPARATOR_COLOR),
            WHITE,
            u64::MAX,
        )
        .unwrap();
        assert_eq!(*out.get_pixel(0, 2), SEPARATOR_COLOR);
        assert_eq!(*out.get_pixel(0, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_empty_input_gives_empty_canvas() {
        let out = concatenate::<Frame>(&[], None, WHITE, u64::MAX).unwrap();
        assert_eq!(out.dimensions(), (0, 0));
    }

    #[test]
    fn test_limit_applies() {
        let result = concatenate(&[solid(10, 10, 0), solid(10, 10, 0)], None, WHITE, 150);
        assert!(matches!(result, Err(CompositionError::TooLarge { .. })));
    }
}
