//! Ray-triangle intersection and the brute-force reference search.

use pt_core::Triangle;
use pt_math::{Interval, Ray, Vec3};

/// Rays closer to parallel with a triangle's plane than this are rejected.
const PARALLEL_EPSILON: f32 = 1.0e-8;

/// Closest-hit record: which triangle, at what distance, and where on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Index into the scene's triangle list
    pub triangle: u32,
    /// Ray parameter of the hit
    pub t: f32,
    /// Barycentric weights `(w0, w1, w2)` for attribute interpolation
    pub barycentric: Vec3,
}

/// Intersect a ray with a single triangle.
///
/// Plane distance through the face normal, then an inside test on the
/// barycentric weights from the precomputed projection coefficients. Only
/// hits strictly inside `ray_t` count. Degenerate triangles have a zero
/// normal and never hit.
#[inline]
pub fn intersect_triangle(tri: &Triangle, ray: &Ray, ray_t: Interval) -> Option<(f32, Vec3)> {
    let denom = tri.normal.dot(ray.direction);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = tri.normal.dot(tri.positions[0] - ray.origin) / denom;
    if !ray_t.surrounds(t) {
        return None;
    }

    let w = tri.barycentric(ray.at(t));
    if w.y < 0.0 || w.z < 0.0 || w.y + w.z > 1.0 {
        return None;
    }

    Some((t, w))
}

/// Closest hit by testing every triangle. Reference for the BVH.
pub fn closest_hit_linear(triangles: &[Triangle], ray: &Ray, ray_t: Interval) -> Option<TriangleHit> {
    let mut closest: Option<TriangleHit> = None;
    let mut range = ray_t;

    for (i, tri) in triangles.iter().enumerate() {
        if let Some((t, barycentric)) = intersect_triangle(tri, ray, range) {
            range = range.with_max(t);
            closest = Some(TriangleHit {
                triangle: i as u32,
                t,
                barycentric,
            });
        }
    }

    closest
}
