//! Incremental canvas growth.

use super::{blank_canvas, canvas_len, CompositionError, CompositorConfig};
use crate::capture::Frame;
use crate::estimation::OverlapEstimate;
use image::{Rgb, RgbImage};

/// Accumulates frames into one tall canvas.
///
/// The value itself is the accumulating state; [`Compositor::finish`]
/// consumes it and hands the canvas out.
#[derive(Debug)]
pub struct Compositor {
    canvas: RgbImage,
    config: CompositorConfig,
    frames: usize,
}

impl Compositor {
    /// Starts a canvas holding a copy of `first`.
    pub fn new(first: &Frame, config: CompositorConfig) -> Result<Self, CompositionError> {
        canvas_len(
            first.width() as u64,
            first.height() as u64,
            config.max_canvas_pixels,
        )?;
        Ok(Self {
            canvas: first.to_rgb(),
            config,
            frames: 1,
        })
    }

    /// Canvas built so far.
    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// Frames composited so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Appends `frame` so that its top `estimate.rows` rows cover the
    /// canvas bottom, and returns the overlap actually applied.
    ///
    /// On error the canvas is left as it was.
    pub fn append(&mut self, frame: &Frame, estimate: &OverlapEstimate) -> Result<u32, CompositionError> {
        let (old_w, old_h) = self.canvas.dimensions();
        let (w, h) = (frame.width(), frame.height());
        let overlap = estimate.rows.min(h).min(old_h);
        if overlap != estimate.rows {
            tracing::debug!(
                requested = estimate.rows,
                overlap,
                "Overlap clamped to frame bounds"
            );
        }

        let new_h = old_h as u64 + h as u64 - overlap as u64;
        let new_w = old_w.max(w);
        let bytes = canvas_len(new_w as u64, new_h, self.config.max_canvas_pixels)?;
        // canvas_len guarantees new_h fits in u32.
        let new_h = new_h as u32;

        if new_w == old_w {
            self.grow_in_place(new_h, bytes)?;
        } else {
            self.widen(new_w, new_h)?;
        }

        let top = old_h - overlap;
        let blend = estimate.confident && overlap > 0;
        self.place(frame, top, if blend { overlap } else { 0 }, old_w);
        self.frames += 1;

        tracing::debug!(
            frame = frame.sequence(),
            overlap,
            blended = blend,
            width = new_w,
            height = new_h,
            "Appended frame"
        );
        Ok(overlap)
    }

    /// Consumes the compositor and returns the canvas.
    pub fn finish(self) -> RgbImage {
        self.canvas
    }

    fn background(&self) -> Rgb<u8> {
        Rgb(self.config.background)
    }

    /// Extends the canvas buffer with background rows.
    fn grow_in_place(&mut self, new_h: u32, bytes: usize) -> Result<(), CompositionError> {
        let (width, old_h) = self.canvas.dimensions();
        let background = self.background();
        let mut raw = std::mem::take(&mut self.canvas).into_raw();
        let extra = bytes - raw.len();

        let reserved = raw.try_reserve_exact(extra);
        let height = if reserved.is_ok() {
            raw.extend(std::iter::repeat(background.0).take(extra / 3).flatten());
            new_h
        } else {
            old_h
        };

        self.canvas = RgbImage::from_raw(width, height, raw).ok_or(
            CompositionError::DimensionOverflow {
                width: width as u64,
                height: height as u64,
            },
        )?;
        reserved.map_err(|source| CompositionError::Allocation { bytes, source })
    }

    /// Reallocates a wider canvas and copies the old one to its top-left.
    fn widen(&mut self, new_w: u32, new_h: u32) -> Result<(), CompositionError> {
        let mut canvas = blank_canvas(new_w, new_h, self.background(), self.config.max_canvas_pixels)?;
        image::imageops::replace(&mut canvas, &self.canvas, 0, 0);
        self.canvas = canvas;
        Ok(())
    }

    /// Writes `frame` at row `top`, blending its first `blend_rows` rows
    /// over the columns the previous canvas covered.
    fn place(&mut self, frame: &Frame, top: u32, blend_rows: u32, covered_w: u32) {
        let mode = self.config.blend;
        let src = frame.image();
        let canvas_w = self.canvas.width() as usize;
        let dst = &mut *self.canvas;

        for y in 0..frame.height() {
            let weight = (y < blend_rows).then(|| mode.weight(y, blend_rows));
            let row_start = (top + y) as usize * canvas_w * 3;
            for x in 0..frame.width() {
                let incoming = src.get_pixel(x, y);
                let at = row_start + x as usize * 3;
                let out = &mut dst[at..at + 3];
                match weight {
                    Some(a) if x < covered_w => {
                        for c in 0..3 {
                            let mixed = (1.0 - a) * out[c] as f32 + a * incoming[c] as f32;
                            out[c] = mixed.round().clamp(0.0, 255.0) as u8;
                        }
                    }
                    _ => out.copy_from_slice(&incoming.0[..3]),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::BlendMode;
    use crate::estimation::Technique;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32, rgb: [u8; 3], seq: u64) -> Frame {
        Frame::new(RgbaImage::from_pixel(w, h, Rgba([rgb[0], rgb[1], rgb[2], 255])), seq)
    }

    fn estimate(rows: u32, confident: bool) -> OverlapEstimate {
        OverlapEstimate {
            rows,
            confident,
            technique: if confident { Technique::Template } else { Technique::Fallback },
            score: None,
        }
    }

    #[test]
    fn test_height_law() {
        let mut comp = Compositor::new(&solid(50, 100, [0, 0, 0], 1), CompositorConfig::default()).unwrap();
        comp.append(&solid(50, 80, [9, 9, 9], 2), &estimate(30, true)).unwrap();
        assert_eq!(comp.canvas().dimensions(), (50, 150));
        comp.append(&solid(50, 80, [9, 9, 9], 3), &estimate(0, false)).unwrap();
        assert_eq!(comp.finish().dimensions(), (50, 230));
    }

    #[test]
    fn test_unconfident_places_without_blending() {
        let mut comp = Compositor::new(&solid(10, 40, [0, 0, 0], 1), CompositorConfig::default()).unwrap();
        comp.append(&solid(10, 40, [200, 100, 50], 2), &estimate(10, false)).unwrap();
        let canvas = comp.finish();

        assert_eq!(canvas.height(), 70);
        assert_eq!(*canvas.get_pixel(5, 29), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(5, 30), Rgb([200, 100, 50]));
    }

    #[test]
    fn test_linear_blend_ramps_across_band() {
        let mut comp = Compositor::new(&solid(10, 40, [0, 0, 0], 1), CompositorConfig::default()).unwrap();
        comp.append(&solid(10, 40, [200, 200, 200], 2), &estimate(10, true)).unwrap();
        let canvas = comp.finish();

        // Band rows 30..40: weight (i + 0.5) / 10.
        assert_eq!(canvas.get_pixel(0, 30)[0], 10);
        assert_eq!(canvas.get_pixel(0, 39)[0], 190);
        assert_eq!(canvas.get_pixel(0, 40)[0], 200);
        assert_eq!(canvas.get_pixel(0, 29)[0], 0);
    }

    #[test]
    fn test_fixed_blend_uses_single_ratio() {
        let config = CompositorConfig {
            blend: BlendMode::Fixed { incoming: 0.7 },
            ..Default::default()
        };
        let mut comp = Compositor::new(&solid(10, 40, [0, 0, 0], 1), config).unwrap();
        comp.append(&solid(10, 40, [100, 100, 100], 2), &estimate(10, true)).unwrap();
        let canvas = comp.finish();

        assert_eq!(canvas.get_pixel(0, 30)[0], 70);
        assert_eq!(canvas.get_pixel(0, 39)[0], 70);
    }

    #[test]
    fn test_wider_frame_pads_with_background() {
        let mut comp = Compositor::new(&solid(10, 20, [0, 0, 0], 1), CompositorConfig::default()).unwrap();
        comp.append(&solid(16, 20, [50, 50, 50], 2), &estimate(5, true)).unwrap();
        let canvas = comp.finish();

        assert_eq!(canvas.dimensions(), (16, 35));
        assert_eq!(*canvas.get_pixel(12, 0), Rgb([255, 255, 255]));
        // Band columns beyond the old width are copied, not blended.
        assert_eq!(*canvas.get_pixel(12, 15), Rgb([50, 50, 50]));
        assert_eq!(*canvas.get_pixel(12, 30), Rgb([50, 50, 50]));
    }

    #[test]
    fn test_narrower_frame_leaves_background() {
        let mut comp = Compositor::new(&solid(16, 20, [0, 0, 0], 1), CompositorConfig::default()).unwrap();
        comp.append(&solid(10, 20, [50, 50, 50], 2), &estimate(0, false)).unwrap();
        let canvas = comp.finish();

        assert_eq!(canvas.dimensions(), (16, 40));
        assert_eq!(*canvas.get_pixel(12, 30), Rgb([255, 255, 255]));
        assert_eq!(*canvas.get_pixel(5, 30), Rgb([50, 50, 50]));
    }

    #[test]
    fn test_overlap_clamped_to_canvas() {
        let mut comp = Compositor::new(&solid(10, 8, [0, 0, 0], 1), CompositorConfig::default()).unwrap();
        let applied = comp.append(&solid(10, 200, [50, 50, 50], 2), &estimate(20, false)).unwrap();
        assert_eq!(applied, 8);
        assert_eq!(comp.finish().height(), 200);
    }

    #[test]
    fn test_limit_leaves_canvas_untouched() {
        let config = CompositorConfig {
            max_canvas_pixels: 1000,
            ..Default::default()
        };
        let mut comp = Compositor::new(&solid(10, 50, [1, 2, 3], 1), config).unwrap();
        let err = comp.append(&solid(10, 80, [0, 0, 0], 2), &estimate(0, false));

        assert!(matches!(err, Err(CompositionError::TooLarge { .. })));
        assert_eq!(comp.canvas().dimensions(), (10, 50));
        assert_eq!(comp.frames(), 1);
    }
}
