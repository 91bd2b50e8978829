//! Progressive accumulation buffer.

use std::path::Path;

use pt_math::Vec3;

use crate::bucket::BucketResult;
use crate::error::Result;

/// Per-pixel running sums of linear radiance and the number of committed
/// samples. Pixels are row-major with row 0 at the top.
///
/// Frames are only ever added whole, so every pixel always holds exactly
/// `samples` contributions.
#[derive(Debug, Clone)]
pub struct Accumulator {
    width: u32,
    height: u32,
    sums: Vec<Vec3>,
    samples: u32,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sums: vec![Vec3::ZERO; width as usize * height as usize],
            samples: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of committed samples per pixel.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Zero all sums and the sample counter.
    pub fn reset(&mut self) {
        self.sums.fill(Vec3::ZERO);
        self.samples = 0;
    }

    /// Add one complete frame given as tile results covering the image.
    pub fn commit_tiles(&mut self, tiles: &[BucketResult]) {
        for tile in tiles {
            let b = &tile.bucket;
            for (row, chunk) in tile.pixels.chunks_exact(b.width as usize).enumerate() {
                let start = (b.y as usize + row) * self.width as usize + b.x as usize;
                for (sum, value) in self.sums[start..start + chunk.len()].iter_mut().zip(chunk) {
                    *sum += *value;
                }
            }
        }
        self.samples += 1;
    }

    /// Add a frame that contributed nothing (black), e.g. a degenerate camera.
    /// The sums are unchanged, so the average drops by `n / (n + 1)`.
    pub fn commit_black(&mut self) {
        self.samples += 1;
    }

    /// Running sum of a pixel.
    pub fn sum(&self, x: u32, y: u32) -> Vec3 {
        self.sums[(y * self.width + x) as usize]
    }

    /// Averaged linear radiance of a pixel (zero before the first sample).
    pub fn average(&self, x: u32, y: u32) -> Vec3 {
        self.mean(self.sum(x, y))
    }

    fn mean(&self, sum: Vec3) -> Vec3 {
        if self.samples == 0 {
            Vec3::ZERO
        } else {
            sum / self.samples as f32
        }
    }

    /// Averaged image as linear floats clamped to [0, 1], RGB interleaved.
    pub fn to_rgb_f32(&self) -> Vec<f32> {
        self.sums
            .iter()
            .flat_map(|s| self.mean(*s).clamp(Vec3::ZERO, Vec3::ONE).to_array())
            .collect()
    }

    /// Averaged image as 8-bit RGB, optionally gamma-2 encoded.
    pub fn to_rgb8(&self, gamma: bool) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.sums.len() * 3);
        for sum in &self.sums {
            let rgb = color_to_rgb8(self.mean(*sum), gamma);
            bytes.extend_from_slice(&rgb);
        }
        bytes
    }

    /// Save the averaged image as an 8-bit PNG.
    pub fn save_png(&self, path: impl AsRef<Path>, gamma: bool) -> Result<()> {
        let path = path.as_ref();
        image::save_buffer(
            path,
            &self.to_rgb8(gamma),
            self.width,
            self.height,
            image::ColorType::Rgb8,
        )?;
        log::info!("Saved {}x{} image ({} spp) to {}", self.width, self.height, self.samples, path.display());
        Ok(())
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGB after clamping.
pub fn color_to_rgb8(color: Vec3, gamma: bool) -> [u8; 3] {
    let encode = |c: f32| {
        let c = if gamma { linear_to_gamma(c) } else { c };
        (255.0 * c.clamp(0.0, 1.0)) as u8
    };
    [encode(color.x), encode(color.y), encode(color.z)]
}
