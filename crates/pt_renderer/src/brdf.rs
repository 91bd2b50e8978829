//! Cook-Torrance microfacet BRDF.
//!
//! `f = kd * albedo / pi + D * G * F / (4 * (n.v) * (n.l))` with
//! - D: GGX normal distribution, alpha = roughness^2
//! - G: Smith with two Schlick-GGX terms
//! - F: Schlick against the half vector
//! - kd = (1 - F) * (1 - metalness)

use std::f32::consts::PI;

use pt_math::Vec3;
use serde::{Deserialize, Serialize};

/// Base reflectivity of dielectrics at normal incidence.
pub const MIN_DIELECTRIC_F0: f32 = 0.04;

/// Guards divisions by vanishing cosines.
const BRDF_EPSILON: f32 = 1.0e-4;

/// Smallest GGX alpha; a perfect mirror has no finite density.
const MIN_ALPHA: f32 = 1.0e-3;

/// Roughness remapping for the Schlick-GGX geometry term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryRemap {
    /// `k = (r + 1)^2 / 8`, for analytic lights
    #[default]
    Direct,
    /// `k = r^2 / 2`, for image-based lighting
    ImageBased,
}

impl GeometryRemap {
    pub fn k(self, roughness: f32) -> f32 {
        match self {
            GeometryRemap::Direct => (roughness + 1.0) * (roughness + 1.0) / 8.0,
            GeometryRemap::ImageBased => roughness * roughness / 2.0,
        }
    }
}

/// Cook-Torrance BRDF parameters at a shading point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CookTorrance {
    pub base_color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub remap: GeometryRemap,
}

impl CookTorrance {
    pub fn new(base_color: Vec3, metalness: f32, roughness: f32) -> Self {
        Self {
            base_color,
            metalness: metalness.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
            remap: GeometryRemap::default(),
        }
    }

    pub fn with_remap(mut self, remap: GeometryRemap) -> Self {
        self.remap = remap;
        self
    }

    /// GGX alpha (squared roughness, floored).
    pub fn alpha(&self) -> f32 {
        (self.roughness * self.roughness).max(MIN_ALPHA)
    }

    /// Reflectance at normal incidence.
    pub fn f0(&self) -> Vec3 {
        Vec3::splat(MIN_DIELECTRIC_F0).lerp(self.base_color, self.metalness)
    }

    /// Evaluate the BRDF for unit vectors `n` (normal), `v` (toward the
    /// viewer) and `l` (toward the light).
    ///
    /// Returns `None` if either direction is on or below the surface.
    pub fn evaluate(&self, n: Vec3, v: Vec3, l: Vec3) -> Option<Vec3> {
        self.lobes(n, v, l).map(|(diffuse, specular)| diffuse + specular)
    }

    /// Only the `kd * albedo / pi` term of [`CookTorrance::evaluate`].
    pub fn evaluate_diffuse(&self, n: Vec3, v: Vec3, l: Vec3) -> Option<Vec3> {
        self.lobes(n, v, l).map(|(diffuse, _)| diffuse)
    }

    fn lobes(&self, n: Vec3, v: Vec3, l: Vec3) -> Option<(Vec3, Vec3)> {
        let n_dot_v = n.dot(v);
        let n_dot_l = n.dot(l);
        if n_dot_v <= 0.0 || n_dot_l <= 0.0 {
            return None;
        }

        let h = (v + l).normalize_or_zero();
        if h == Vec3::ZERO {
            return None;
        }
        let n_dot_h = n.dot(h).clamp(BRDF_EPSILON, 1.0);
        let v_dot_h = v.dot(h).max(0.0);

        let d = ggx_d(n_dot_h, self.alpha());
        let k = self.remap.k(self.roughness);
        let g = schlick_ggx(n_dot_v, k) * schlick_ggx(n_dot_l, k);
        let f = fresnel_schlick(self.f0(), v_dot_h);

        let specular = f * (d * g)
            / (4.0 * n_dot_v.max(BRDF_EPSILON) * n_dot_l.max(BRDF_EPSILON) + BRDF_EPSILON);
        let kd = (Vec3::ONE - f) * (1.0 - self.metalness);
        let diffuse = kd * self.base_color / PI;

        Some((diffuse, specular))
    }
}

/// GGX/Trowbridge-Reitz normal distribution.
#[inline]
pub fn ggx_d(n_dot_h: f32, alpha: f32) -> f32 {
    let a2 = alpha * alpha;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom)
}

/// Schlick-GGX geometry term for one direction.
#[inline]
pub fn schlick_ggx(n_dot_x: f32, k: f32) -> f32 {
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// `(1 - cos)^5`
#[inline]
pub fn schlick_weight(cos_theta: f32) -> f32 {
    let x = (1.0 - cos_theta).clamp(0.0, 1.0);
    let x2 = x * x;
    x2 * x2 * x
}

/// Fresnel-Schlick approximation for a colored F0.
#[inline]
pub fn fresnel_schlick(f0: Vec3, cos_theta: f32) -> Vec3 {
    f0 + (Vec3::ONE - f0) * schlick_weight(cos_theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{cosine_hemisphere, ggx_microfacet_normal, reflect};
    use pt_math::Onb;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn direction(theta: f32, phi: f32) -> Vec3 {
        Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
    }

    #[test]
    fn test_ggx_normalization() {
        // Integral of D(h) (n.h) over the hemisphere is 1
        let alpha = 0.3;
        let steps = 4000;
        let mut sum = 0.0;
        for i in 0..steps {
            let theta = (i as f32 + 0.5) / steps as f32 * PI / 2.0;
            sum += ggx_d(theta.cos(), alpha) * theta.cos() * theta.sin();
        }
        let integral = sum * (PI / 2.0 / steps as f32) * 2.0 * PI;
        assert!((integral - 1.0).abs() < 0.01, "integral = {integral}");
    }

    #[test]
    fn test_schlick_weight() {
        assert!((schlick_weight(1.0) - 0.0).abs() < 1e-6);
        assert!((schlick_weight(0.0) - 1.0).abs() < 1e-6);
        assert!(schlick_weight(0.5) > 0.0 && schlick_weight(0.5) < 1.0);
    }

    #[test]
    fn test_f0_blend() {
        let dielectric = CookTorrance::new(Vec3::new(1.0, 0.0, 0.0), 0.0, 0.5);
        assert!((dielectric.f0() - Vec3::splat(0.04)).length() < 1e-6);

        let metal = CookTorrance::new(Vec3::new(1.0, 0.5, 0.0), 1.0, 0.5);
        assert!((metal.f0() - Vec3::new(1.0, 0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_geometry_remap() {
        assert!((GeometryRemap::Direct.k(1.0) - 0.5).abs() < 1e-6);
        assert!((GeometryRemap::ImageBased.k(1.0) - 0.5).abs() < 1e-6);
        assert!((GeometryRemap::Direct.k(0.0) - 0.125).abs() < 1e-6);
        assert!(GeometryRemap::ImageBased.k(0.0).abs() < 1e-6);
    }

    #[test]
    fn test_below_surface_is_invalid() {
        let brdf = CookTorrance::new(Vec3::splat(0.5), 0.0, 0.5);
        let n = Vec3::Z;
        let v = Vec3::new(0.0, 0.6, 0.8);
        assert!(brdf.evaluate(n, v, Vec3::new(0.0, 0.6, -0.8)).is_none());
        assert!(brdf.evaluate(n, Vec3::new(0.0, 0.6, -0.8), v).is_none());
        assert!(brdf.evaluate(n, Vec3::X, v).is_none());
        assert!(brdf.evaluate(n, v, v).is_some());
    }

    #[test]
    fn test_reciprocity() {
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..500 {
            let brdf = CookTorrance::new(
                Vec3::new(rng.gen(), rng.gen(), rng.gen()),
                rng.gen(),
                rng.gen(),
            );
            let n = Vec3::Z;
            let v = direction(rng.gen_range(0.0..1.5), rng.gen_range(0.0..6.28));
            let l = direction(rng.gen_range(0.0..1.5), rng.gen_range(0.0..6.28));

            let a = brdf.evaluate(n, v, l).unwrap();
            let b = brdf.evaluate(n, l, v).unwrap();
            assert!((a - b).abs().max_element() <= 1e-5 * a.max_element().max(1.0));
        }
    }

    #[test]
    fn test_diffuse_and_fresnel_weights_bounded() {
        // Per direction the diffuse weight plus the Fresnel weight never exceed one
        for metalness in [0.0, 0.3, 1.0] {
            for i in 0..=20 {
                let cos = i as f32 / 20.0;
                let f0 = Vec3::splat(MIN_DIELECTRIC_F0).lerp(Vec3::splat(0.9), metalness);
                let f = fresnel_schlick(f0, cos);
                let kd = (Vec3::ONE - f) * (1.0 - metalness);
                assert!((kd + f).max_element() <= 1.0 + 1e-6);
                assert!(f.max_element() <= 1.0 + 1e-6);
            }
        }
    }

    /// Directional albedo: the diffuse term by cosine sampling, the specular
    /// term by GGX sampling so near-mirror lobes stay well estimated.
    fn directional_albedo(brdf: &CookTorrance, v: Vec3, samples: usize, rng: &mut StdRng) -> Vec3 {
        let n = Vec3::Z;
        let frame = Onb::from_normal(n);
        let mut sum = Vec3::ZERO;
        for _ in 0..samples {
            // f * cos / pdf = f * pi
            let l = frame.to_world(cosine_hemisphere(rng.gen(), rng.gen()));
            if let Some(f) = brdf.evaluate_diffuse(n, v, l) {
                sum += f * PI;
            }

            let h = ggx_microfacet_normal(n, brdf.alpha(), rng.gen(), rng.gen());
            let l = reflect(-v, h);
            if let (Some(f), Some(fd)) = (brdf.evaluate(n, v, l), brdf.evaluate_diffuse(n, v, l)) {
                // pdf(l) = D(h) (n.h) / (4 (v.h)), with h rebuilt the way evaluate does
                let h = (v + l).normalize();
                let n_dot_h = n.dot(h).clamp(BRDF_EPSILON, 1.0);
                let pdf = ggx_d(n_dot_h, brdf.alpha()) * n_dot_h / (4.0 * v.dot(h).max(BRDF_EPSILON));
                sum += (f - fd) * n.dot(l) / pdf;
            }
        }
        sum / samples as f32
    }

    #[test]
    fn test_directional_albedo_at_most_one() {
        let mut rng = StdRng::seed_from_u64(2024);

        for roughness in [0.0, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0] {
            for metalness in [0.0, 0.5, 1.0] {
                for cos_v in [0.05f32, 0.3, 0.8, 1.0] {
                    let brdf = CookTorrance::new(Vec3::splat(0.5), metalness, roughness);
                    let v = Vec3::new((1.0 - cos_v * cos_v).sqrt(), 0.0, cos_v);

                    let albedo = directional_albedo(&brdf, v, 20_000, &mut rng);
                    assert!(
                        albedo.max_element() <= 1.0,
                        "albedo {albedo:?} for roughness {roughness}, metalness {metalness}, cos {cos_v}"
                    );
                    assert!(albedo.min_element() > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_bright_metal_albedo_at_most_one() {
        let mut rng = StdRng::seed_from_u64(7);

        for roughness in [0.0, 0.1, 0.3] {
            for cos_v in [0.05f32, 0.5, 1.0] {
                let brdf = CookTorrance::new(Vec3::splat(0.9), 1.0, roughness);
                let v = Vec3::new((1.0 - cos_v * cos_v).sqrt(), 0.0, cos_v);

                let albedo = directional_albedo(&brdf, v, 20_000, &mut rng);
                assert!(
                    albedo.max_element() <= 1.0,
                    "albedo {albedo:?} for roughness {roughness}, cos {cos_v}"
                );
            }
        }
    }

    #[test]
    fn test_diffuse_lobe_is_part_of_evaluate() {
        let brdf = CookTorrance::new(Vec3::new(0.8, 0.4, 0.2), 0.3, 0.4);
        let n = Vec3::Z;
        let v = direction(0.4, 0.3);
        let l = direction(0.9, 2.0);

        let full = brdf.evaluate(n, v, l).unwrap();
        let diffuse = brdf.evaluate_diffuse(n, v, l).unwrap();
        assert!(diffuse.min_element() > 0.0);
        assert!((full - diffuse).min_element() > 0.0);
        assert!(brdf.evaluate_diffuse(n, v, -l).is_none());
    }
}
