use crate::{Interval, Ray, Vec3};

/// Minimum extent of a box along any axis.
const MIN_EXTENT: f32 = 1.0e-4;

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// Invariant: `min <= max` on every axis for any non-empty box, and no axis is
/// thinner than [`MIN_EXTENT`], so the slab test never sees a zero-width slab
/// (axis-aligned triangles would otherwise produce flat boxes).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create an empty AABB (contains nothing, identity for `surrounding`).
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from two corner points (in any order).
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut aabb = Self {
            min: a.min(b),
            max: a.max(b),
        };
        aabb.pad_to_minimums();
        aabb
    }

    /// Bounding box of a triangle.
    pub fn from_triangle(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        Self::from_points(p0.min(p1).min(p2), p0.max(p1).max(p2))
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// Test if a ray intersects this AABB within the given interval.
    ///
    /// Slab method on the ray's cached inverse direction. A box is hit only if
    /// the entry distance is strictly less than the exit distance, so grazing
    /// rays fail. NaNs from `0 * inf` (ray origin on a slab plane while
    /// parallel to it) are discarded by `f32::max`/`f32::min`.
    pub fn hit(&self, r: &Ray, mut ray_t: Interval) -> bool {
        let inv = r.inv_direction();
        for axis in 0..3 {
            let mut t0 = (self.min[axis] - r.origin[axis]) * inv[axis];
            let mut t1 = (self.max[axis] - r.origin[axis]) * inv[axis];
            if inv[axis] < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            ray_t.min = ray_t.min.max(t0);
            ray_t.max = ray_t.max.min(t1);
            if ray_t.max <= ray_t.min {
                return false;
            }
        }
        true
    }

    /// Returns true if the point lies inside or on the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Returns true if `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }

    /// Pad thin axes to avoid zero-width AABBs (degenerate cases).
    fn pad_to_minimums(&mut self) {
        for axis in 0..3 {
            if self.max[axis] - self.min[axis] < MIN_EXTENT {
                let padded = Interval::new(self.min[axis], self.max[axis]).expand(MIN_EXTENT);
                self.min[axis] = padded.min;
                self.max[axis] = padded.max;
            }
        }
    }

}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
