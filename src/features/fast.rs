//! FAST-9 corner detection.

use image::GrayImage;

/// Bresenham circle of radius 3, clockwise from 12 o'clock.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous arc length required for a corner.
const ARC_LENGTH: usize = 9;

/// A detected corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPoint {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Corner strength; larger is stronger.
    pub score: u32,
}

/// FAST-9 detector with non-maximum suppression.
#[derive(Debug, Clone)]
pub struct FastDetector {
    threshold: u8,
    border: u32,
    max_keypoints: usize,
}

impl FastDetector {
    /// Creates a detector.
    ///
    /// No keypoint is reported closer than `border` pixels to an edge; the
    /// border is never less than 4 so the suppression window stays inside
    /// the scored area.
    pub fn new(threshold: u8, border: u32, max_keypoints: usize) -> Self {
        Self {
            threshold,
            border: border.max(4),
            max_keypoints,
        }
    }

    /// Detects the strongest corners, ordered by descending score.
    ///
    /// Ties are broken by position, so the result depends only on pixel
    /// content and never on iteration order.
    pub fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let (w, h) = image.dimensions();
        if w <= 2 * self.border || h <= 2 * self.border {
            return Vec::new();
        }

        let scores = self.score_map(image);
        let at = |x: u32, y: u32| scores[index(w, x, y)];

        let mut keypoints = Vec::new();
        for y in self.border..h - self.border {
            for x in self.border..w - self.border {
                let s = at(x, y);
                if s == 0 {
                    continue;
                }
                let mut is_max = true;
                'window: for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let n = at((x as i32 + dx) as u32, (y as i32 + dy) as u32);
                        // Earlier neighbours win plateaus.
                        let earlier = dy < 0 || (dy == 0 && dx < 0);
                        if n > s || (earlier && n == s) {
                            is_max = false;
                            break 'window;
                        }
                    }
                }
                if is_max {
                    keypoints.push(KeyPoint { x, y, score: s });
                }
            }
        }

        keypoints.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
        });
        keypoints.truncate(self.max_keypoints);

        tracing::trace!(count = keypoints.len(), width = w, height = h, "FAST corners");
        keypoints
    }

    fn score_map(&self, image: &GrayImage) -> Vec<u32> {
        let (w, h) = image.dimensions();
        let mut scores = vec![0u32; w as usize * h as usize];
        let y_range = (self.border - 1)..(h - self.border + 1);
        let x_range = (self.border - 1)..(w - self.border + 1);

        for y in y_range {
            for x in x_range.clone() {
                scores[index(w, x, y)] = self.corner_score(image, x, y);
            }
        }
        scores
    }

    /// Segment-test score: summed excess contrast of the winning arc's side,
    /// or 0 when no arc of [`ARC_LENGTH`] pixels exists.
    fn corner_score(&self, image: &GrayImage, x: u32, y: u32) -> u32 {
        let p = image.get_pixel(x, y)[0] as i32;
        let t = self.threshold as i32;

        let mut class = [0i8; 16];
        let mut excess = [0u32; 16];
        for (i, &(dx, dy)) in CIRCLE.iter().enumerate() {
            let v = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as i32;
            if v > p + t {
                class[i] = 1;
                excess[i] = (v - p - t) as u32;
            } else if v < p - t {
                class[i] = -1;
                excess[i] = (p - t - v) as u32;
            }
        }

        let mut best_side = 0i8;
        let mut run = 0usize;
        let mut prev = 0i8;
        for i in 0..16 + ARC_LENGTH {
            let c = class[i % 16];
            run = if c != 0 && c == prev { run + 1 } else { usize::from(c != 0) };
            prev = c;
            if run >= ARC_LENGTH {
                best_side = c;
                break;
            }
        }
        if best_side == 0 {
            return 0;
        }

        class
            .iter()
            .zip(excess.iter())
            .filter(|(&c, _)| c == best_side)
            .map(|(_, &e)| e)
            .sum::<u32>()
            .max(1)
    }
}

/// Row-major offset of `(x, y)`, computed in `usize` so large frames
/// cannot wrap.
#[inline]
fn index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}
