//! Bucket-based tile rendering.
//!
//! Divides the image into tiles (buckets) that are rendered independently
//! and in parallel using rayon. A bucket of `width x 1` is a scanline.

use pt_math::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::camera::CameraFrame;
use crate::integrator::Integrator;
use crate::rng::pixel_rng;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// X coordinate of bucket's top-left corner
    pub x: u32,
    /// Y coordinate of bucket's top-left corner
    pub y: u32,
    /// Width of the bucket in pixels
    pub width: u32,
    /// Height of the bucket in pixels
    pub height: u32,
    /// Index of this bucket in the render order
    pub index: usize,
}

impl Bucket {
    /// Create a new bucket.
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    /// Get the total number of pixels in this bucket.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Default bucket size in pixels.
pub const DEFAULT_BUCKET_SIZE: u32 = 64;

/// How a frame is cut into independently rendered tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tiling {
    /// Square buckets in spiral order from the image center
    Buckets { size: u32 },
    /// One tile per image row, top to bottom
    Scanlines,
}

impl Default for Tiling {
    fn default() -> Self {
        Tiling::Buckets {
            size: DEFAULT_BUCKET_SIZE,
        }
    }
}

impl Tiling {
    pub fn tiles(self, width: u32, height: u32) -> Vec<Bucket> {
        match self {
            Tiling::Buckets { size } => generate_buckets(width, height, size),
            Tiling::Scanlines => generate_scanlines(width, height),
        }
    }
}

/// Generate buckets for an image, sorted in spiral order from center.
///
/// Buckets are rendered from the center outward so the most important part
/// of the image is finished first when a frame is interrupted.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let bucket_size = bucket_size.max(1);
    let mut buckets = Vec::new();

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bw = bucket_size.min(width - x);
            let bh = bucket_size.min(height - y);
            buckets.push(Bucket::new(x, y, bw, bh, buckets.len()));
            x += bucket_size;
        }
        y += bucket_size;
    }

    sort_spiral(&mut buckets, width, height);

    // Update indices after sorting
    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }

    buckets
}

/// One bucket per scanline.
pub fn generate_scanlines(width: u32, height: u32) -> Vec<Bucket> {
    (0..height)
        .map(|y| Bucket::new(0, y, width, 1, y as usize))
        .collect()
}

/// Sort buckets by distance from image center (spiral order).
fn sort_spiral(buckets: &mut [Bucket], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;

    let distance = |b: &Bucket| {
        let cx = b.x as f32 + b.width as f32 / 2.0;
        let cy = b.y as f32 + b.height as f32 / 2.0;
        (cx - center_x).powi(2) + (cy - center_y).powi(2)
    };

    buckets.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Render one sample for every pixel of a bucket.
///
/// Each pixel draws from its own RNG stream keyed by (seed, sample, x, y).
/// Non-finite radiance is dropped to zero so one bad path cannot poison the
/// accumulated pixel.
pub fn render_bucket(
    bucket: &Bucket,
    frame: &CameraFrame,
    integrator: &Integrator<'_>,
    sample_index: u32,
    seed: u64,
) -> BucketResult {
    let mut pixels = Vec::with_capacity(bucket.pixel_count() as usize);

    for local_y in 0..bucket.height {
        for local_x in 0..bucket.width {
            let x = bucket.x + local_x;
            let y = bucket.y + local_y;
            let mut rng = pixel_rng(seed, sample_index, x, y);

            let jitter = Vec2::new(rng.gen(), rng.gen());
            let lens = Vec2::new(rng.gen(), rng.gen());
            let ray = frame.primary_ray(x, y, jitter, lens);

            let color = integrator.radiance(ray, &mut rng);
            pixels.push(if color.is_finite() { color } else { Vec3::ZERO });
        }
    }

    BucketResult::new(*bucket, pixels)
}

/// Result of rendering a bucket.
#[derive(Debug, Clone)]
pub struct BucketResult {
    /// The bucket that was rendered
    pub bucket: Bucket,
    /// Pixel radiance in row-major order within the bucket
    pub pixels: Vec<Vec3>,
}

impl BucketResult {
    /// Create a new bucket result.
    pub fn new(bucket: Bucket, pixels: Vec<Vec3>) -> Self {
        Self { bucket, pixels }
    }
}
