//! Material parameter block shared by the CPU integrator and the GPU layout.

use pt_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::texture::TextureId;

/// Emission magnitude below which a material does not count as a light.
pub const EMISSION_EPSILON: f32 = 1.0e-6;

/// How light interacts with the surface beyond the opaque lobes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Surface {
    /// Diffuse and glossy reflection only
    #[default]
    Opaque,

    /// Dielectric: with probability `translucency` a ray is reflected or
    /// refracted at an interface with index of refraction `ior`
    Translucent { translucency: f32, ior: f32 },
}

/// Optional texture bindings. Unset slots fall back to the scalar parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSlots {
    pub diffuse: Option<TextureId>,
    pub normal: Option<TextureId>,
    pub emissive: Option<TextureId>,
    pub roughness: Option<TextureId>,
    pub metallic: Option<TextureId>,
    /// Cutout mask, red channel = probability of the surface being present
    pub opacity: Option<TextureId>,
}

impl TextureSlots {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A physically based material.
///
/// All scalars are kept in range: colors in [0, 1] (emission only
/// non-negative), `roughness` and `reflectiveness` in [0, 1],
/// `translucency` in [0, 1], `ior >= 1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub name: String,

    /// Diffuse albedo, also the base color for metals
    pub diffuse: Vec3,

    /// Tint of the glossy lobe and of dielectric reflection
    pub specular: Vec3,

    pub emissive: Vec3,
    pub emissive_intensity: f32,

    /// 0 = mirror, 1 = fully rough
    pub roughness: f32,

    /// Probability of the glossy lobe, doubles as metalness in the BRDF
    pub reflectiveness: f32,

    pub surface: Surface,
    pub textures: TextureSlots,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::ONE,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            roughness: 0.5,
            reflectiveness: 0.0,
            surface: Surface::Opaque,
            textures: TextureSlots::default(),
        }
    }
}

impl Material {
    /// Create a new material with a name and diffuse color.
    pub fn new(name: impl Into<String>, diffuse: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse,
            ..Default::default()
        }
        .sanitized()
    }

    /// Create a pure emitter.
    pub fn light(name: impl Into<String>, color: Vec3, intensity: f32) -> Self {
        Self::new(name, Vec3::ZERO).with_emission(color, intensity)
    }

    pub fn with_specular(mut self, specular: Vec3) -> Self {
        self.specular = specular;
        self.sanitized()
    }

    pub fn with_emission(mut self, color: Vec3, intensity: f32) -> Self {
        self.emissive = color;
        self.emissive_intensity = intensity;
        self.sanitized()
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self.sanitized()
    }

    pub fn with_reflectiveness(mut self, reflectiveness: f32) -> Self {
        self.reflectiveness = reflectiveness;
        self.sanitized()
    }

    /// Make the surface a dielectric.
    pub fn with_translucency(mut self, translucency: f32, ior: f32) -> Self {
        self.surface = Surface::Translucent { translucency, ior };
        self.sanitized()
    }

    pub fn with_textures(mut self, textures: TextureSlots) -> Self {
        self.textures = textures;
        self
    }

    /// Clamp every parameter into its valid range. NaNs take the default value.
    ///
    /// Materials deserialized from an external source should pass through
    /// this before rendering; the builder methods apply it already.
    pub fn sanitized(mut self) -> Self {
        let defaults = Material::default();
        self.diffuse = clamp_color(self.diffuse, defaults.diffuse);
        self.specular = clamp_color(self.specular, defaults.specular);
        self.emissive = finite_or(self.emissive, Vec3::ZERO).max(Vec3::ZERO);
        self.emissive_intensity = unit_or(self.emissive_intensity, 0.0, f32::MAX, 0.0);
        self.roughness = unit_or(self.roughness, 0.0, 1.0, defaults.roughness);
        self.reflectiveness = unit_or(self.reflectiveness, 0.0, 1.0, 0.0);
        if let Surface::Translucent { translucency, ior } = self.surface {
            self.surface = Surface::Translucent {
                translucency: unit_or(translucency, 0.0, 1.0, 0.0),
                ior: unit_or(ior, 1.0, f32::MAX, 1.0),
            };
        }
        self
    }

    /// Radiance emitted by the surface (color times intensity).
    pub fn emission(&self) -> Vec3 {
        self.emissive * self.emissive_intensity
    }

    /// True if the material emits light, either from its scalar emission or
    /// from an emissive texture with positive intensity.
    pub fn is_emissive(&self) -> bool {
        self.emission().abs().max_element() > EMISSION_EPSILON
            || (self.textures.emissive.is_some() && self.emissive_intensity > 0.0)
    }

    /// Probability of taking the dielectric branch at a hit.
    pub fn translucency(&self) -> f32 {
        match self.surface {
            Surface::Opaque => 0.0,
            Surface::Translucent { translucency, .. } => translucency,
        }
    }
}

fn finite_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let pick = |x: f32, f: f32| if x.is_finite() { x } else { f };
    Vec3::new(pick(v.x, fallback.x), pick(v.y, fallback.y), pick(v.z, fallback.z))
}

fn clamp_color(v: Vec3, fallback: Vec3) -> Vec3 {
    finite_or(v, fallback).clamp(Vec3::ZERO, Vec3::ONE)
}

fn unit_or(x: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if x.is_nan() {
        fallback
    } else {
        x.clamp(lo, hi)
    }
}
