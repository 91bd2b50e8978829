//! Direction and point sampling routines.
//!
//! All samplers take their uniform random numbers explicitly so they are
//! deterministic under test; the integrator draws them from its RNG.

use std::f32::consts::{FRAC_PI_4, PI};

use pt_math::{Onb, Vec2, Vec3};

/// Map the unit square to the unit disk (Shirley-Chiu concentric mapping).
pub fn concentric_disk(u1: f32, u2: f32) -> Vec2 {
    let offset = Vec2::new(2.0 * u1 - 1.0, 2.0 * u2 - 1.0);
    if offset == Vec2::ZERO {
        return Vec2::ZERO;
    }

    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (offset.y, PI / 2.0 - FRAC_PI_4 * (offset.x / offset.y))
    };
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Cosine-weighted direction in the local frame (z up). pdf = cos / pi.
pub fn cosine_hemisphere(u1: f32, u2: f32) -> Vec3 {
    let d = concentric_disk(u1, u2);
    let z = (1.0 - d.length_squared()).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

/// Cosine-weighted direction around a world-space normal.
pub fn cosine_direction(n: Vec3, u1: f32, u2: f32) -> Vec3 {
    Onb::from_normal(n).to_world(cosine_hemisphere(u1, u2))
}

/// Mirror `d` about the plane with normal `n`.
#[inline]
pub fn reflect(d: Vec3, n: Vec3) -> Vec3 {
    d - 2.0 * d.dot(n) * n
}

/// Refract the unit direction `d` through the interface with unit normal `n`
/// (facing against `d`) and relative index `eta = n_incident / n_transmitted`.
///
/// Returns `None` on total internal reflection.
pub fn refract(d: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = (-d.dot(n)).min(1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some((eta * d + (eta * cos_i - cos_t) * n).normalize())
}

/// Schlick's reflectance at a dielectric interface.
///
/// `r0 = ((1 - eta) / (1 + eta))^2`, which is the same for `eta` and `1/eta`.
pub fn schlick_reflectance(cos_theta: f32, eta: f32) -> f32 {
    let r0 = ((1.0 - eta) / (1.0 + eta)).powi(2);
    r0 + (1.0 - r0) * crate::brdf::schlick_weight(cos_theta)
}

/// Sample a GGX-distributed microfacet normal around `n`.
pub fn ggx_microfacet_normal(n: Vec3, alpha: f32, u1: f32, u2: f32) -> Vec3 {
    // tan^2(theta) = alpha^2 * u1 / (1 - u1)
    let tan_theta = alpha * (u1 / (1.0 - u1).max(1.0e-7)).sqrt();
    let cos_theta = 1.0 / (1.0 + tan_theta * tan_theta).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * u2;

    let h_local = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
    Onb::from_normal(n).to_world(h_local)
}

/// Glossy reflection: the mirror direction blended toward a cosine sample.
///
/// Roughness 0 gives the mirror direction, roughness 1 a pure cosine sample,
/// in between the blend weight is `roughness^2`. A blend that dips below the
/// surface falls back to the cosine sample.
pub fn glossy_direction(mirror: Vec3, n: Vec3, roughness: f32, u1: f32, u2: f32) -> Vec3 {
    let diffuse = cosine_direction(n, u1, u2);
    let t = roughness * roughness;
    let d = mirror.lerp(diffuse, t).normalize_or_zero();
    if d.dot(n) <= 0.0 {
        diffuse
    } else {
        d
    }
}
