//! Decoded textures and the sampling service used by the renderer.
//!
//! Textures are stored as linear RGBA floats so the same texel array can be
//! sampled on the CPU and uploaded to the GPU unchanged. Decoding image files
//! is left to the caller; `Texture::from_image` accepts anything the `image`
//! crate produced.

use image::DynamicImage;
use pt_math::{Vec2, Vec4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building a texture from raw data.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Invalid texture dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Texture data size mismatch: expected {expected} bytes, found {found}")]
    DataSize { expected: usize, found: usize },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// Handle of a texture inside a [`TextureSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub u32);

/// A texture with pixel data.
///
/// Stores pixels in linear RGBA float format for rendering.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Texture width in pixels
    pub width: u32,

    /// Texture height in pixels
    pub height: u32,

    /// Stored as [R, G, B, A] per pixel, row-major order, top row first
    pub pixels: Vec<[f32; 4]>,

    /// Name for debugging
    pub name: String,
}

impl Texture {
    /// Create a texture from 8-bit RGBA data.
    ///
    /// `srgb` converts the color channels to linear; alpha is always linear.
    /// Data maps (roughness, normal, opacity) should pass `false`.
    pub fn from_rgba8(width: u32, height: u32, data: &[u8], srgb: bool) -> TextureResult<Self> {
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(TextureError::DataSize {
                expected,
                found: data.len(),
            });
        }

        let convert = |c: u8| {
            if srgb {
                srgb_to_linear(c)
            } else {
                c as f32 / 255.0
            }
        };
        let pixels = data
            .chunks_exact(4)
            .map(|p| [convert(p[0]), convert(p[1]), convert(p[2]), p[3] as f32 / 255.0])
            .collect();

        Ok(Self {
            width,
            height,
            pixels,
            name: String::new(),
        })
    }

    /// Create a texture from an image decoded by the `image` crate.
    pub fn from_image(img: &DynamicImage, srgb: bool) -> TextureResult<Self> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.as_raw(), srgb)
    }

    /// Create a solid color texture (1x1).
    pub fn solid_color(color: Vec4) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![color.to_array()],
            name: "<solid>".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sample the texture at UV coordinates (bilinear filtering, wrapping).
    ///
    /// UV coordinates are in [0, 1] range, with (0, 0) at bottom-left.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let u = uv.x.rem_euclid(1.0);
        let v = uv.y.rem_euclid(1.0);
        if !u.is_finite() || !v.is_finite() {
            return self.texel(0, 0);
        }

        // Convert to pixel coordinates, flipping V for image rows
        let x = u * (self.width as f32 - 1.0);
        let y = (1.0 - v) * (self.height as f32 - 1.0);

        let x0 = (x.floor() as u32).min(self.width - 1);
        let y0 = (y.floor() as u32).min(self.height - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = x.fract();
        let fy = y.fract();

        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), fx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    /// Pixel at integer coordinates (opaque black when out of range).
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        self.pixels
            .get(idx)
            .map(|p| Vec4::from_array(*p))
            .unwrap_or(Vec4::W)
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<[f32; 4]>()
    }
}

/// Texture lookup service consulted by the renderer.
///
/// `None` means the texture could not be resolved; callers then use the
/// material's scalar value.
pub trait TextureSampler: Send + Sync {
    fn sample(&self, id: TextureId, uv: Vec2) -> Option<Vec4>;

    /// Texel data behind a handle, for uploading to the GPU.
    ///
    /// Samplers that are not backed by in-memory images return `None`, and
    /// the GPU path treats the slot as unset.
    fn texture(&self, _id: TextureId) -> Option<&Texture> {
        None
    }
}

/// In-memory texture table addressed by [`TextureId`].
#[derive(Clone, Debug, Default)]
pub struct TextureSet {
    textures: Vec<Texture>,
}

impl TextureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a texture and return its handle.
    pub fn insert(&mut self, texture: Texture) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        log::debug!(
            "Added texture {:?} '{}' ({}x{}, {:.1} KB)",
            id,
            texture.name,
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );
        self.textures.push(texture);
        id
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Get total memory usage of all textures.
    pub fn total_size_bytes(&self) -> usize {
        self.textures.iter().map(|t| t.size_bytes()).sum()
    }
}

impl TextureSampler for TextureSet {
    fn sample(&self, id: TextureId, uv: Vec2) -> Option<Vec4> {
        self.get(id).map(|t| t.sample(uv))
    }

    fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.get(id)
    }
}

/// Convert sRGB byte value to linear float.
pub fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_texture() {
        let tex = Texture::solid_color(Vec4::new(1.0, 0.5, 0.0, 1.0));
        assert_eq!(tex.width, 1);
        assert_eq!(tex.height, 1);

        let sample = tex.sample(Vec2::new(0.5, 0.5));
        assert!((sample.x - 1.0).abs() < 0.001);
        assert!((sample.y - 0.5).abs() < 0.001);
        assert!((sample.z - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_from_rgba8_validation() {
        assert!(matches!(
            Texture::from_rgba8(0, 4, &[], false),
            Err(TextureError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            Texture::from_rgba8(2, 2, &[0; 12], false),
            Err(TextureError::DataSize {
                expected: 16,
                found: 12
            })
        ));
    }

    #[test]
    fn test_bilinear_sample() {
        // 2x1: black on the left, white on the right
        let data = [0, 0, 0, 255, 255, 255, 255, 255];
        let tex = Texture::from_rgba8(2, 1, &data, false).unwrap();

        assert!(tex.sample(Vec2::new(0.0, 0.5)).x.abs() < 1e-5);
        assert!((tex.sample(Vec2::new(0.5, 0.5)).x - 0.5).abs() < 1e-5);
        assert!((tex.sample(Vec2::new(0.25, 0.5)).x - 0.25).abs() < 1e-5);

        // Wrapping
        assert!((tex.sample(Vec2::new(1.25, 0.5)).x - 0.25).abs() < 1e-5);
        assert!((tex.sample(Vec2::new(-0.75, 0.5)).x - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_v_flip() {
        // 1x2: top row red, bottom row green
        let data = [255, 0, 0, 255, 0, 255, 0, 255];
        let tex = Texture::from_rgba8(1, 2, &data, false).unwrap();

        let top = tex.sample(Vec2::new(0.0, 0.999_999));
        let bottom = tex.sample(Vec2::new(0.0, 0.0));
        assert!(top.x > 0.99 && top.y < 0.01);
        assert!(bottom.y > 0.99 && bottom.x < 0.01);
    }

    #[test]
    fn test_texture_set() {
        let mut set = TextureSet::new();
        assert!(set.is_empty());

        let id = set.insert(Texture::solid_color(Vec4::ONE).with_name("white"));
        assert_eq!(id, TextureId(0));
        assert_eq!(set.len(), 1);
        assert_eq!(set.total_size_bytes(), 16);

        assert_eq!(TextureSampler::sample(&set, id, Vec2::ZERO), Some(Vec4::ONE));
        assert_eq!(TextureSampler::sample(&set, TextureId(7), Vec2::ZERO), None);
        assert!(set.texture(id).is_some());
    }

    #[test]
    fn test_srgb_to_linear() {
        // Black stays black
        assert!((srgb_to_linear(0) - 0.0).abs() < 0.001);

        // White stays white
        assert!((srgb_to_linear(255) - 1.0).abs() < 0.001);

        // Mid-gray is darker in linear
        let mid = srgb_to_linear(128);
        assert!(mid < 0.5);
        assert!(mid > 0.1);
    }
}
