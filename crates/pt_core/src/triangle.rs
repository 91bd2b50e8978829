//! World-space triangle with everything the intersector and shader need
//! precomputed at construction.

use pt_math::{Aabb, Onb, Vec2, Vec3};

/// Index into a scene's material table.
pub type MaterialId = u32;

/// Area below which a triangle is treated as degenerate.
const MIN_AREA: f32 = 1.0e-12;

/// Precomputed coefficients for projecting a point onto barycentric weights.
///
/// `e0 = p1 - p0`, `e1 = p2 - p0`, the three dot products of the edges and the
/// inverse of the Gram determinant `d00 * d11 - d01^2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarycentricBasis {
    pub e0: Vec3,
    pub e1: Vec3,
    pub d00: f32,
    pub d01: f32,
    pub d11: f32,
    pub inv_denom: f32,
}

impl BarycentricBasis {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        let e0 = p1 - p0;
        let e1 = p2 - p0;
        let d00 = e0.dot(e0);
        let d01 = e0.dot(e1);
        let d11 = e1.dot(e1);
        let denom = d00 * d11 - d01 * d01;
        let inv_denom = if denom.abs() > 0.0 { 1.0 / denom } else { 0.0 };
        Self {
            e0,
            e1,
            d00,
            d01,
            d11,
            inv_denom,
        }
    }

    /// Barycentric weights `(w0, w1, w2)` of `p` (assumed on the plane) with
    /// respect to the triangle whose first vertex is `p0`.
    #[inline]
    pub fn weights(&self, p0: Vec3, p: Vec3) -> Vec3 {
        let v2 = p - p0;
        let d20 = v2.dot(self.e0);
        let d21 = v2.dot(self.e1);
        let w1 = (self.d11 * d20 - self.d01 * d21) * self.inv_denom;
        let w2 = (self.d00 * d21 - self.d01 * d20) * self.inv_denom;
        Vec3::new(1.0 - w1 - w2, w1, w2)
    }
}

/// A triangle in world space.
///
/// The face normal follows counter-clockwise winding, `(p1 - p0) x (p2 - p0)`.
/// Shading treats both sides alike, so winding only matters for the tangent
/// frame handedness.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub positions: [Vec3; 3],
    pub normals: [Vec3; 3],
    pub uvs: [Vec2; 3],

    /// Unit face normal (zero for degenerate triangles)
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,

    pub barycentric: BarycentricBasis,

    /// Interpolate vertex normals instead of using the face normal
    pub smooth: bool,

    pub object_id: u32,
    pub element_id: u32,
    pub material: MaterialId,
    pub area: f32,
}

impl Triangle {
    /// Create a flat-shaded triangle with default UVs `(0,0) (1,0) (0,1)`.
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3, material: MaterialId) -> Self {
        let cross = (p1 - p0).cross(p2 - p0);
        let normal = cross.normalize_or_zero();
        let uvs = [Vec2::ZERO, Vec2::X, Vec2::Y];
        let mut triangle = Self {
            positions: [p0, p1, p2],
            normals: [normal; 3],
            uvs,
            normal,
            tangent: Vec3::ZERO,
            bitangent: Vec3::ZERO,
            barycentric: BarycentricBasis::new(p0, p1, p2),
            smooth: false,
            object_id: 0,
            element_id: 0,
            material,
            area: 0.5 * cross.length(),
        };
        triangle.update_tangent_frame();
        triangle
    }

    /// Set per-vertex normals and enable smooth shading.
    ///
    /// Zero or non-finite vertex normals are replaced by the face normal.
    pub fn with_normals(mut self, normals: [Vec3; 3]) -> Self {
        for (slot, n) in self.normals.iter_mut().zip(normals) {
            let n = n.normalize_or_zero();
            *slot = if n == Vec3::ZERO { self.normal } else { n };
        }
        self.smooth = true;
        self
    }

    /// Set texture coordinates and rebuild the tangent frame from them.
    pub fn with_uvs(mut self, uvs: [Vec2; 3]) -> Self {
        self.uvs = uvs;
        self.update_tangent_frame();
        self
    }

    /// Set the owning object and element identifiers.
    pub fn with_ids(mut self, object_id: u32, element_id: u32) -> Self {
        self.object_id = object_id;
        self.element_id = element_id;
        self
    }

    /// Derive tangent/bitangent from the UV deltas.
    ///
    /// With degenerate UVs an arbitrary orthonormal frame around the face
    /// normal is used instead.
    fn update_tangent_frame(&mut self) {
        let [p0, p1, p2] = self.positions;
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let du1 = self.uvs[1] - self.uvs[0];
        let du2 = self.uvs[2] - self.uvs[0];
        let det = du1.x * du2.y - du2.x * du1.y;

        let frame = if det.abs() < 1.0e-12 {
            Onb::from_normal(self.normal)
        } else {
            let r = 1.0 / det;
            let tangent = (e1 * du2.y - e2 * du1.y) * r;
            let bitangent = (e2 * du1.x - e1 * du2.x) * r;
            let mut frame = Onb::from_normal_tangent(self.normal, tangent);
            // Keep the bitangent on the side the UV layout points to (mirrored UVs)
            if frame.v.dot(bitangent) < 0.0 {
                frame.v = -frame.v;
            }
            frame
        };

        self.tangent = frame.u;
        self.bitangent = frame.v;
    }

    /// Zero-area or non-finite triangles are never intersected.
    pub fn is_degenerate(&self) -> bool {
        !self.positions.iter().all(|p| p.is_finite())
            || !self.area.is_finite()
            || self.area <= MIN_AREA
    }

    /// Barycentric weights of a point on the triangle's plane.
    #[inline]
    pub fn barycentric(&self, p: Vec3) -> Vec3 {
        self.barycentric.weights(self.positions[0], p)
    }

    /// Shading normal at the given barycentric weights (unit length).
    pub fn interpolate_normal(&self, bary: Vec3) -> Vec3 {
        if !self.smooth {
            return self.normal;
        }
        let n = self.normals[0] * bary.x + self.normals[1] * bary.y + self.normals[2] * bary.z;
        let n = n.normalize_or_zero();
        if n == Vec3::ZERO {
            self.normal
        } else {
            n
        }
    }

    /// Texture coordinate at the given barycentric weights.
    #[inline]
    pub fn interpolate_uv(&self, bary: Vec3) -> Vec2 {
        self.uvs[0] * bary.x + self.uvs[1] * bary.y + self.uvs[2] * bary.z
    }

    pub fn bounds(&self) -> Aabb {
        let [p0, p1, p2] = self.positions;
        Aabb::from_triangle(p0, p1, p2)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.positions[0] + self.positions[1] + self.positions[2]) / 3.0
    }

    /// Uniformly distributed point on the triangle from two uniform numbers.
    ///
    /// Square-root transform: `b0 = 1 - sqrt(u1)`, `b1 = u2 * sqrt(u1)`.
    pub fn sample_point(&self, u1: f32, u2: f32) -> Vec3 {
        let su = u1.sqrt();
        let b0 = 1.0 - su;
        let b1 = u2 * su;
        let b2 = 1.0 - b0 - b1;
        self.positions[0] * b0 + self.positions[1] * b1 + self.positions[2] * b2
    }
}
