//! Immutable render scene: triangles, materials, textures, BVH and lights.
//!
//! A `Scene` is built once and shared behind an `Arc`. Editing the scene
//! means building a new snapshot and handing it to the renderer between
//! frames.

use std::fmt;
use std::sync::Arc;

use pt_core::{Material, MaterialId, TextureId, TextureSampler, TextureSet, Triangle};
use pt_math::{Aabb, Interval, Ray, Vec2, Vec4};
use rand::Rng;

use crate::bvh::{Bvh, DEFAULT_BVH_SEED};
use crate::intersect::TriangleHit;

pub struct Scene {
    triangles: Vec<Triangle>,
    materials: Vec<Material>,
    textures: Arc<dyn TextureSampler>,
    bvh: Bvh,
    lights: Vec<u32>,
    default_material: Material,
    dropped: usize,
}

impl Scene {
    /// Build a scene without textures.
    pub fn build(triangles: Vec<Triangle>, materials: Vec<Material>) -> Self {
        Self::build_with(triangles, materials, Arc::new(TextureSet::new()), DEFAULT_BVH_SEED)
    }

    /// Build a scene with a texture service and an explicit BVH seed.
    ///
    /// Degenerate triangles are dropped and counted. Materials are clamped
    /// into range. Triangles referring to a missing material render with a
    /// default grey material.
    pub fn build_with(
        triangles: Vec<Triangle>,
        materials: Vec<Material>,
        textures: Arc<dyn TextureSampler>,
        bvh_seed: u64,
    ) -> Self {
        let start = std::time::Instant::now();

        let input_count = triangles.len();
        let triangles: Vec<Triangle> = triangles.into_iter().filter(|t| !t.is_degenerate()).collect();
        let dropped = input_count - triangles.len();
        if dropped > 0 {
            log::warn!("Dropped {} degenerate triangles of {}", dropped, input_count);
        }

        let materials: Vec<Material> = materials.into_iter().map(Material::sanitized).collect();
        let missing = triangles
            .iter()
            .filter(|t| t.material as usize >= materials.len())
            .count();
        if missing > 0 {
            log::warn!("{} triangles reference missing materials, using default", missing);
        }

        let bvh = Bvh::build(&triangles, bvh_seed);

        let mut scene = Self {
            triangles,
            materials,
            textures,
            bvh,
            lights: Vec::new(),
            default_material: Material::new("default", pt_math::Vec3::splat(0.5)),
            dropped,
        };
        scene.lights = (0..scene.triangles.len() as u32)
            .filter(|&i| scene.material_of(&scene.triangles[i as usize]).is_emissive())
            .collect();

        log::info!(
            "Built scene: {} triangles, {} materials, {} lights, BVH depth {} in {:.2?}",
            scene.triangles.len(),
            scene.materials.len(),
            scene.lights.len(),
            scene.bvh.depth(),
            start.elapsed()
        );

        scene
    }

    /// Scene with no geometry. Every ray misses.
    pub fn empty() -> Self {
        Self::build(Vec::new(), Vec::new())
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle(&self, index: u32) -> &Triangle {
        &self.triangles[index as usize]
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Degenerate triangles removed at build time.
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Material by id, or the default material if it does not exist.
    pub fn material(&self, id: MaterialId) -> &Material {
        self.materials.get(id as usize).unwrap_or(&self.default_material)
    }

    pub fn material_of(&self, triangle: &Triangle) -> &Material {
        self.material(triangle.material)
    }

    pub fn default_material(&self) -> &Material {
        &self.default_material
    }

    pub fn textures(&self) -> &dyn TextureSampler {
        self.textures.as_ref()
    }

    /// Sample an optional texture slot.
    pub fn sample_texture(&self, slot: Option<TextureId>, uv: Vec2) -> Option<Vec4> {
        slot.and_then(|id| self.textures.sample(id, uv))
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn bounds(&self) -> Aabb {
        self.bvh.bounds()
    }

    /// Indices of emissive triangles.
    pub fn lights(&self) -> &[u32] {
        &self.lights
    }

    /// Probability that the surface is present at a hit (opacity cutout).
    pub fn opacity_at(&self, hit: &TriangleHit) -> f32 {
        let tri = self.triangle(hit.triangle);
        let material = self.material_of(tri);
        match material.textures.opacity {
            None => 1.0,
            Some(_) => {
                let uv = tri.interpolate_uv(hit.barycentric);
                self.sample_texture(material.textures.opacity, uv)
                    .map_or(1.0, |texel| texel.x.clamp(0.0, 1.0))
            }
        }
    }

    /// Closest hit with stochastic opacity testing.
    ///
    /// A candidate on a cutout material is kept with probability equal to its
    /// opacity; rejected candidates do not end the search.
    pub fn intersect<R: Rng>(&self, ray: &Ray, ray_t: Interval, rng: &mut R) -> Option<TriangleHit> {
        self.bvh.closest_hit(&self.triangles, ray, ray_t, &mut |hit| {
            let opacity = self.opacity_at(hit);
            opacity >= 1.0 || rng.gen::<f32>() < opacity
        })
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("triangles", &self.triangles.len())
            .field("materials", &self.materials.len())
            .field("lights", &self.lights.len())
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::empty()
    }
}
