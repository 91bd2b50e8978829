use crate::Vec3;

/// Orthonormal basis around a surface normal.
///
/// Local frame convention: `u` = tangent, `v` = bitangent, `w` = normal, so a
/// local direction with positive z lies in the hemisphere of the normal.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Onb {
    pub u: Vec3,
    pub v: Vec3,
    pub w: Vec3,
}

impl Onb {
    /// Build a basis from a (normalized) normal.
    ///
    /// Branchless construction from Duff et al., "Building an Orthonormal
    /// Basis, Revisited" (2017).
    pub fn from_normal(n: Vec3) -> Self {
        let sign = 1.0_f32.copysign(n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        let u = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
        let v = Vec3::new(b, sign + n.y * n.y * a, -n.y);
        Self { u, v, w: n }
    }

    /// Build a basis from a normal and a preferred tangent direction.
    ///
    /// The tangent is Gram-Schmidt orthogonalized against the normal. Falls
    /// back to [`Onb::from_normal`] when the tangent is (nearly) parallel.
    pub fn from_normal_tangent(n: Vec3, tangent: Vec3) -> Self {
        let t = tangent - n * n.dot(tangent);
        let len2 = t.length_squared();
        if len2 < 1.0e-12 || !len2.is_finite() {
            return Self::from_normal(n);
        }
        let u = t / len2.sqrt();
        Self { u, v: n.cross(u), w: n }
    }

    /// Transform a direction from local (tangent space) to world space.
    #[inline]
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.u * local.x + self.v * local.y + self.w * local.z
    }
}
