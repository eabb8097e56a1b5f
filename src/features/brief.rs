//! Binary BRIEF descriptors over box-smoothed intensity.
//!
//! Each of the 256 bits compares the 5×5 mean around two pattern points.
//! The pattern is drawn once from a seeded generator so two images
//! described by the same extractor are always comparable. Scrolling never
//! rotates content, so the pattern is not steered.

use super::fast::KeyPoint;
use image::GrayImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const PATTERN_RADIUS: i32 = 12;
const BOX_RADIUS: i32 = 2;

/// How far a descriptor reaches from its keypoint, in pixels.
pub const DESCRIPTOR_RADIUS: u32 = (PATTERN_RADIUS + BOX_RADIUS) as u32;

/// A 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u64; 4]);

impl Descriptor {
    /// Number of differing bits.
    #[inline]
    pub fn hamming(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// A keypoint with its descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    /// Where the feature was detected.
    pub keypoint: KeyPoint,
    /// Its binary descriptor.
    pub descriptor: Descriptor,
}

/// Summed-area table with a zero first row and column.
struct Integral {
    sums: Vec<u64>,
    stride: usize,
}

impl Integral {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0u64;
            for x in 0..w {
                row += image.get_pixel(x as u32, y as u32)[0] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { sums, stride }
    }

    /// Sum over the inclusive box `[x0, x1] × [y0, y1]`.
    fn box_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.sums[(y1 + 1) * s + x1 + 1] + self.sums[y0 * s + x0]
            - self.sums[y0 * s + x1 + 1]
            - self.sums[(y1 + 1) * s + x0]
    }
}

/// BRIEF descriptor extractor.
#[derive(Debug, Clone)]
pub struct BriefExtractor {
    pattern: Vec<[(i32, i32); 2]>,
}

impl BriefExtractor {
    /// Builds the sampling pattern from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let point = |rng: &mut ChaCha8Rng| {
            (
                rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
                rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
            )
        };

        let mut pattern = Vec::with_capacity(256);
        while pattern.len() < 256 {
            let a = point(&mut rng);
            let b = point(&mut rng);
            if a != b {
                pattern.push([a, b]);
            }
        }
        Self { pattern }
    }

    /// Describes every keypoint whose pattern fits inside the image.
    pub fn describe(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Vec<Feature> {
        let integral = Integral::new(image);
        let (w, h) = image.dimensions();
        let r = DESCRIPTOR_RADIUS;

        keypoints
            .iter()
            .filter(|kp| kp.x >= r && kp.y >= r && kp.x + r < w && kp.y + r < h)
            .map(|kp| Feature {
                keypoint: *kp,
                descriptor: self.describe_one(&integral, kp),
            })
            .collect()
    }

    fn describe_one(&self, integral: &Integral, kp: &KeyPoint) -> Descriptor {
        let mean_at = |(dx, dy): (i32, i32)| {
            let cx = kp.x as i32 + dx;
            let cy = kp.y as i32 + dy;
            integral.box_sum(
                (cx - BOX_RADIUS) as usize,
                (cy - BOX_RADIUS) as usize,
                (cx + BOX_RADIUS) as usize,
                (cy + BOX_RADIUS) as usize,
            )
        };

        let mut bits = [0u64; 4];
        for (i, [a, b]) in self.pattern.iter().enumerate() {
            if mean_at(*a) < mean_at(*b) {
                bits[i / 64] |= 1 << (i % 64);
            }
        }
        Descriptor(bits)
    }
}
