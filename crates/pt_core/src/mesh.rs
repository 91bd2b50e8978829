//! Indexed mesh geometry as handed over by a scene loader.
//!
//! The renderer works on world-space triangles; `Mesh::to_triangles` is the
//! single conversion point and validates the index buffer on the way.

use pt_math::{Aabb, Mat4, Mat4Ext, Vec2, Vec3};

use crate::error::{Error, Result};
use crate::triangle::{MaterialId, Triangle};

/// A mesh consisting of vertex positions, optional normals and UVs, and
/// triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional, faces are flat-shaded without them)
    pub normals: Option<Vec<Vec3>>,

    /// UV coordinates (optional, one per vertex)
    pub uvs: Option<Vec<Vec2>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box in object space
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    ///
    /// If normals are not provided, they will NOT be automatically computed.
    /// Call `compute_normals()` explicitly if you need them.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            normals,
            uvs: None,
            indices,
            bounds,
        }
    }

    /// Attach UV coordinates.
    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Compute axis-aligned bounding box from positions.
    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        if positions.is_empty() {
            return Aabb::EMPTY;
        }

        let (min, max) = positions.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), p| (min.min(*p), max.max(*p)),
        );

        Aabb::from_points(min, max)
    }

    /// Compute smooth vertex normals by averaging area-weighted face normals.
    ///
    /// Faces with out-of-range indices are skipped; `to_triangles` reports them.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.normalize_or_zero();
        }

        self.normals = Some(normals);
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Check index and attribute counts against the vertex count.
    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();

        if self.indices.len() % 3 != 0 {
            return Err(Error::IndexCount(self.indices.len()));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(Error::IndexOutOfRange { index, count });
        }
        if let Some(normals) = &self.normals {
            if normals.len() != count {
                return Err(Error::AttributeMismatch {
                    attribute: "normal",
                    found: normals.len(),
                    expected: count,
                });
            }
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() != count {
                return Err(Error::AttributeMismatch {
                    attribute: "uv",
                    found: uvs.len(),
                    expected: count,
                });
            }
        }
        Ok(())
    }

    /// Convert to world-space triangles.
    ///
    /// Positions go through `transform`, normals through its inverse
    /// transpose. Transforms that mirror the mesh reverse the winding so face
    /// normals stay on the side the vertex normals point to. Degenerate faces
    /// are kept here; the scene builder filters them.
    pub fn to_triangles(
        &self,
        transform: &Mat4,
        material: MaterialId,
        object_id: u32,
        element_id: u32,
    ) -> Result<Vec<Triangle>> {
        self.validate()?;

        let flip = transform.flips_winding();
        let world: Vec<Vec3> = self
            .positions
            .iter()
            .map(|p| transform.transform_point3(*p))
            .collect();
        let normals: Option<Vec<Vec3>> = self
            .normals
            .as_ref()
            .map(|ns| ns.iter().map(|n| transform.transform_normal3(*n)).collect());

        let triangles = self
            .indices
            .chunks_exact(3)
            .map(|face| {
                let mut idx = [face[0] as usize, face[1] as usize, face[2] as usize];
                if flip {
                    idx.swap(1, 2);
                }

                let mut tri = Triangle::new(world[idx[0]], world[idx[1]], world[idx[2]], material)
                    .with_ids(object_id, element_id);
                if let Some(uvs) = &self.uvs {
                    tri = tri.with_uvs([uvs[idx[0]], uvs[idx[1]], uvs[idx[2]]]);
                }
                if let Some(ns) = &normals {
                    tri = tri.with_normals([ns[idx[0]], ns[idx[1]], ns[idx[2]]]);
                }
                tri
            })
            .collect();

        Ok(triangles)
    }
}
