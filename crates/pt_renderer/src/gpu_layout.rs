//! Flattened, GPU-ready scene layout.
//!
//! The arena BVH is rewritten depth first so that a node's left child is the
//! next node and only the right child needs an index. All records are
//! `#[repr(C)]` POD with 16-byte aligned vectors so the arrays can be bound
//! directly as WGSL storage buffers.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use pt_core::{Material, Surface, TextureId, TextureSampler, Triangle};
use pt_math::{Aabb, Interval, Ray, Vec3};

use crate::bvh::{BvhNode, NodeId};
use crate::camera::CameraFrame;
use crate::error::{RenderError, Result};
use crate::intersect::{intersect_triangle, TriangleHit};
use crate::renderer::RenderConfig;
use crate::scene::Scene;

/// Marks a node without a right child (a leaf) or an unbound texture slot.
pub const NONE: i32 = -1;

/// Uniform flag: one light sample per diffuse bounce.
pub const FLAG_NEXT_EVENT_ESTIMATION: u32 = 1;
/// Uniform flag: the camera basis is valid. Without it the frame is black.
pub const FLAG_CAMERA_VALID: u32 = 1 << 1;

/// BVH node, 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuBvhNode {
    pub min: [f32; 3],
    /// Index of the right child, [`NONE`] for leaves
    pub right_child: i32,
    pub max: [f32; 3],
    /// Triangle index for leaves
    pub triangle: u32,
}

impl GpuBvhNode {
    pub fn is_leaf(&self) -> bool {
        self.right_child < 0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb {
            min: Vec3::from(self.min),
            max: Vec3::from(self.max),
        }
    }
}

/// Triangle with interpolation attributes, 192 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuTriangle {
    pub positions: [[f32; 4]; 3],
    pub normals: [[f32; 4]; 3],
    /// uv0.xy, uv1.xy
    pub uv01: [f32; 4],
    /// uv2.xy, area, unused
    pub uv2_area: [f32; 4],
    /// Face normal, w = 1 when vertex normals are interpolated
    pub normal: [f32; 4],
    pub tangent: [f32; 4],
    pub bitangent: [f32; 4],
    pub material: u32,
    pub object_id: u32,
    pub element_id: u32,
    pub _pad: u32,
}

impl From<&Triangle> for GpuTriangle {
    fn from(tri: &Triangle) -> Self {
        let v4 = |v: Vec3, w: f32| v.extend(w).to_array();
        Self {
            positions: tri.positions.map(|p| v4(p, 1.0)),
            normals: tri.normals.map(|n| v4(n, 0.0)),
            uv01: [tri.uvs[0].x, tri.uvs[0].y, tri.uvs[1].x, tri.uvs[1].y],
            uv2_area: [tri.uvs[2].x, tri.uvs[2].y, tri.area, 0.0],
            normal: v4(tri.normal, if tri.smooth { 1.0 } else { 0.0 }),
            tangent: v4(tri.tangent, 0.0),
            bitangent: v4(tri.bitangent, 0.0),
            material: tri.material,
            object_id: tri.object_id,
            element_id: tri.element_id,
            _pad: 0,
        }
    }
}

/// Material parameter block, 96 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    /// Diffuse color, w = roughness
    pub diffuse: [f32; 4],
    /// Specular color, w = reflectiveness
    pub specular: [f32; 4],
    /// Emissive color, w = emissive intensity
    pub emissive: [f32; 4],
    /// Probability of a dielectric event, 0 for opaque surfaces
    pub translucency: f32,
    pub ior: f32,
    pub _pad: [f32; 2],
    /// Texture indices: diffuse, normal, emissive, roughness, metallic,
    /// opacity. [`NONE`] when unbound or unresolved.
    pub textures: [i32; 6],
    pub _pad2: [i32; 2],
}

impl Default for GpuMaterial {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Texture location inside the shared texel array.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuTextureHeader {
    pub width: u32,
    pub height: u32,
    /// Index of the first texel
    pub offset: u32,
    pub _pad: u32,
}

/// Entry of the light list.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub triangle: u32,
    pub area: f32,
}

/// Per-dispatch parameters, 112 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuUniforms {
    /// Eye position, w = aperture
    pub origin: [f32; 4],
    /// w = focal length
    pub forward: [f32; 4],
    /// w = half width of the image plane
    pub right: [f32; 4],
    /// w = half height of the image plane
    pub up: [f32; 4],
    /// w = focal distance
    pub background: [f32; 4],
    pub width: u32,
    pub height: u32,
    pub sample_index: u32,
    pub trace_depth: u32,
    pub max_depth: u32,
    pub light_count: u32,
    pub flags: u32,
    /// Low 32 bits of the base seed folded with the high bits
    pub seed: u32,
}

impl GpuUniforms {
    pub fn new(frame: Option<&CameraFrame>, config: &RenderConfig, light_count: u32, sample_index: u32) -> Self {
        let mut flags = 0;
        if config.next_event_estimation {
            flags |= FLAG_NEXT_EVENT_ESTIMATION;
        }

        let mut uniforms = Self {
            background: config.background.extend(0.0).to_array(),
            width: config.width,
            height: config.height,
            sample_index,
            trace_depth: config.trace_depth,
            max_depth: config.max_depth,
            light_count,
            flags,
            seed: (config.seed ^ (config.seed >> 32)) as u32,
            ..Self::default()
        };

        if let Some(frame) = frame {
            uniforms.flags |= FLAG_CAMERA_VALID;
            uniforms.origin = frame.origin.extend(frame.aperture).to_array();
            uniforms.forward = frame.forward.extend(frame.focal_length).to_array();
            uniforms.right = frame.right.extend(frame.half_width).to_array();
            uniforms.up = frame.up.extend(frame.half_height).to_array();
            uniforms.background[3] = frame.focal_distance;
        }
        uniforms
    }
}

/// All scene arrays in upload order.
#[derive(Debug, Clone, Default)]
pub struct GpuSceneData {
    pub nodes: Vec<GpuBvhNode>,
    pub triangles: Vec<GpuTriangle>,
    pub materials: Vec<GpuMaterial>,
    pub lights: Vec<GpuLight>,
    pub texture_headers: Vec<GpuTextureHeader>,
    pub texels: Vec<[f32; 4]>,
}

impl GpuSceneData {
    /// Flatten a scene.
    ///
    /// Triangles with an out-of-range material id get the index of an
    /// appended copy of the default material, so the kernel never reads
    /// past the material array.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut data = Self::default();

        if let Some(root) = scene.bvh().root() {
            data.nodes.reserve(scene.bvh().nodes().len());
            data.flatten(scene, root);
        }

        let mut textures = TextureTable::default();
        data.materials = scene
            .materials()
            .iter()
            .chain(std::iter::once(scene.default_material()))
            .map(|m| textures.material(m, scene.textures()))
            .collect();
        data.texture_headers = textures.headers;
        data.texels = textures.texels;

        let default_index = scene.materials().len() as u32;
        data.triangles = scene
            .triangles()
            .iter()
            .map(|tri| {
                let mut gpu = GpuTriangle::from(tri);
                if gpu.material >= default_index {
                    gpu.material = default_index;
                }
                gpu
            })
            .collect();

        data.lights = scene
            .lights()
            .iter()
            .map(|&i| GpuLight {
                triangle: i,
                area: scene.triangle(i).area,
            })
            .collect();

        log::debug!(
            "Flattened scene: {} nodes, {} triangles, {} materials, {} textures ({} texels)",
            data.nodes.len(),
            data.triangles.len(),
            data.materials.len(),
            data.texture_headers.len(),
            data.texels.len()
        );
        data
    }

    fn flatten(&mut self, scene: &Scene, id: NodeId) -> usize {
        let index = self.nodes.len();
        let node = scene.bvh().node(id);
        let bounds = node.bounds();
        self.nodes.push(GpuBvhNode {
            min: bounds.min.to_array(),
            max: bounds.max.to_array(),
            right_child: NONE,
            triangle: 0,
        });

        match *node {
            BvhNode::Leaf { triangle, .. } => {
                self.nodes[index].triangle = triangle;
            }
            BvhNode::Interior { left, right, .. } => {
                self.flatten(scene, left);
                let right_index = self.flatten(scene, right);
                self.nodes[index].right_child = right_index as i32;
            }
        }
        index
    }

    pub fn nodes_bytes(&self) -> u64 {
        std::mem::size_of_val(self.nodes.as_slice()) as u64
    }

    pub fn triangles_bytes(&self) -> u64 {
        std::mem::size_of_val(self.triangles.as_slice()) as u64
    }

    pub fn materials_bytes(&self) -> u64 {
        std::mem::size_of_val(self.materials.as_slice()) as u64
    }

    pub fn lights_bytes(&self) -> u64 {
        std::mem::size_of_val(self.lights.as_slice()) as u64
    }

    pub fn textures_bytes(&self) -> u64 {
        std::mem::size_of_val(self.texture_headers.as_slice()) as u64
    }

    pub fn texels_bytes(&self) -> u64 {
        std::mem::size_of_val(self.texels.as_slice()) as u64
    }

    /// Fail when any array exceeds the device's storage binding size.
    pub fn check_limits(&self, max_storage_binding: u64) -> Result<()> {
        let buffers = [
            ("bvh nodes", self.nodes_bytes()),
            ("triangles", self.triangles_bytes()),
            ("materials", self.materials_bytes()),
            ("lights", self.lights_bytes()),
            ("texture headers", self.textures_bytes()),
            ("texels", self.texels_bytes()),
        ];
        for (buffer, size) in buffers {
            if size > max_storage_binding {
                return Err(RenderError::SceneTooLarge {
                    buffer,
                    size,
                    limit: max_storage_binding,
                });
            }
        }
        Ok(())
    }

    /// Closest hit by walking the flattened nodes with an explicit stack,
    /// the same traversal the compute kernel performs.
    pub fn closest_hit(&self, triangles: &[Triangle], ray: &Ray, ray_t: Interval) -> Option<TriangleHit> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut closest: Option<TriangleHit> = None;
        let mut range = ray_t;
        let mut stack = vec![0usize];

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.is_leaf() {
                let triangle = node.triangle;
                if let Some((t, barycentric)) = intersect_triangle(&triangles[triangle as usize], ray, range) {
                    range = range.with_max(t);
                    closest = Some(TriangleHit {
                        triangle,
                        t,
                        barycentric,
                    });
                }
            } else if node.bounds().hit(ray, range) {
                stack.push(node.right_child as usize);
                stack.push(index + 1);
            }
        }
        closest
    }
}

/// Deduplicates textures referenced by materials and packs their texels.
#[derive(Default)]
struct TextureTable {
    indices: HashMap<TextureId, i32>,
    headers: Vec<GpuTextureHeader>,
    texels: Vec<[f32; 4]>,
}

impl TextureTable {
    fn material(&mut self, material: &Material, sampler: &dyn TextureSampler) -> GpuMaterial {
        let slots = &material.textures;
        let textures = [
            slots.diffuse,
            slots.normal,
            slots.emissive,
            slots.roughness,
            slots.metallic,
            slots.opacity,
        ]
        .map(|slot| slot.map_or(NONE, |id| self.resolve(id, sampler)));

        let (translucency, ior) = match material.surface {
            Surface::Opaque => (0.0, 1.0),
            Surface::Translucent { translucency, ior } => (translucency, ior),
        };

        GpuMaterial {
            diffuse: material.diffuse.extend(material.roughness).to_array(),
            specular: material.specular.extend(material.reflectiveness).to_array(),
            emissive: material.emissive.extend(material.emissive_intensity).to_array(),
            translucency,
            ior,
            _pad: [0.0; 2],
            textures,
            _pad2: [0; 2],
        }
    }

    fn resolve(&mut self, id: TextureId, sampler: &dyn TextureSampler) -> i32 {
        if let Some(&index) = self.indices.get(&id) {
            return index;
        }
        let index = match sampler.texture(id) {
            Some(texture) => {
                let index = self.headers.len() as i32;
                self.headers.push(GpuTextureHeader {
                    width: texture.width,
                    height: texture.height,
                    offset: self.texels.len() as u32,
                    _pad: 0,
                });
                self.texels.extend_from_slice(&texture.pixels);
                index
            }
            None => {
                log::warn!("Texture {:?} not available for GPU upload, using scalar fallback", id);
                NONE
            }
        };
        self.indices.insert(id, index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::closest_hit_linear;
    use pt_core::{Texture, TextureSet, TextureSlots};
    use pt_math::Vec4;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn random_scene(count: usize, seed: u64) -> Scene {
        let mut rng = StdRng::seed_from_u64(seed);
        let point = |rng: &mut StdRng| Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
        let tris = (0..count)
            .map(|_| {
                let c = point(&mut rng);
                let a = c + point(&mut rng) * 0.1;
                let b = c + point(&mut rng) * 0.1;
                Triangle::new(c, a, b, 0)
            })
            .collect();
        Scene::build(tris, vec![Material::default()])
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<GpuBvhNode>(), 32);
        assert_eq!(std::mem::size_of::<GpuTriangle>(), 192);
        assert_eq!(std::mem::size_of::<GpuMaterial>(), 96);
        assert_eq!(std::mem::size_of::<GpuTextureHeader>(), 16);
        assert_eq!(std::mem::size_of::<GpuLight>(), 8);
        assert_eq!(std::mem::size_of::<GpuUniforms>(), 112);
    }

    #[test]
    fn test_flatten_layout() {
        let scene = random_scene(50, 3);
        let data = GpuSceneData::from_scene(&scene);

        assert_eq!(data.nodes.len(), scene.bvh().nodes().len());
        let leaves: Vec<u32> = data.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.triangle).collect();
        assert_eq!(leaves.len(), 50);

        for (i, node) in data.nodes.iter().enumerate() {
            if !node.is_leaf() {
                let right = node.right_child as usize;
                assert!(right > i + 1 && right < data.nodes.len());
                assert!(node.bounds().contains(&data.nodes[i + 1].bounds()));
                assert!(node.bounds().contains(&data.nodes[right].bounds()));
            }
        }
    }

    #[test]
    fn test_flat_traversal_matches_brute_force() {
        let scene = random_scene(300, 9);
        let data = GpuSceneData::from_scene(&scene);
        let mut rng = StdRng::seed_from_u64(10);

        let mut hits = 0;
        for _ in 0..500 {
            let origin = Vec3::new(rng.gen_range(-6.0..6.0), rng.gen_range(-6.0..6.0), rng.gen_range(-6.0..6.0));
            let target = Vec3::new(rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0));
            let ray = Ray::new(origin, (target - origin).normalize());

            let flat = data.closest_hit(scene.triangles(), &ray, Interval::FORWARD);
            let brute = closest_hit_linear(scene.triangles(), &ray, Interval::FORWARD);
            match (flat, brute) {
                (Some(a), Some(b)) => {
                    hits += 1;
                    assert!((a.t - b.t).abs() < 1e-5);
                }
                (None, None) => {}
                other => panic!("flat traversal disagrees with brute force: {:?}", other),
            }
        }
        assert!(hits > 0);
    }

    #[test]
    fn test_empty_scene() {
        let data = GpuSceneData::from_scene(&Scene::empty());
        assert!(data.nodes.is_empty());
        assert!(data.triangles.is_empty());
        assert_eq!(data.materials.len(), 1);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(data.closest_hit(&[], &ray, Interval::FORWARD).is_none());
    }

    #[test]
    fn test_materials_and_textures() {
        let mut set = TextureSet::new();
        let red = set.insert(Texture::solid_color(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        let slots = TextureSlots {
            diffuse: Some(red),
            emissive: Some(red),
            roughness: Some(TextureId(99)),
            ..TextureSlots::default()
        };
        let materials = vec![
            Material::new("glass", Vec3::ONE).with_translucency(0.9, 1.5),
            Material::new("tex", Vec3::ONE).with_textures(slots),
        ];
        let tris = vec![
            Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y, 1),
            Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Z, 7),
        ];
        let scene = Scene::build_with(tris, materials, Arc::new(set), 1);
        let data = GpuSceneData::from_scene(&scene);

        assert_eq!(data.materials.len(), 3);
        assert_eq!(data.materials[0].translucency, 0.9);
        assert_eq!(data.materials[0].ior, 1.5);
        assert_eq!(data.materials[1].textures, [0, NONE, 0, NONE, NONE, NONE]);
        assert_eq!(data.texture_headers.len(), 1);
        assert_eq!(data.texels.len(), 1);
        assert_eq!(data.triangles[0].material, 1);
        assert_eq!(data.triangles[1].material, 2);
    }

    #[test]
    fn test_check_limits() {
        let data = GpuSceneData::from_scene(&random_scene(10, 1));
        assert!(data.check_limits(1 << 20).is_ok());
        match data.check_limits(100) {
            Err(RenderError::SceneTooLarge { buffer, size, limit }) => {
                assert_eq!(buffer, "bvh nodes");
                assert_eq!(size, data.nodes_bytes());
                assert_eq!(limit, 100);
            }
            other => panic!("expected SceneTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_uniforms() {
        let config = RenderConfig::default().with_resolution(8, 4).with_seed(0x1_0000_0002);
        let camera = crate::Camera::default();
        let frame = camera.frame(8, 4);
        let u = GpuUniforms::new(frame.as_ref(), &config, 3, 5);
        assert_eq!(u.flags, FLAG_NEXT_EVENT_ESTIMATION | FLAG_CAMERA_VALID);
        assert_eq!(u.seed, 3);
        assert_eq!(u.sample_index, 5);
        assert_eq!(u.light_count, 3);
        assert_eq!(u.forward[3], 1.0);

        let u = GpuUniforms::new(None, &config, 0, 0);
        assert_eq!(u.flags & FLAG_CAMERA_VALID, 0);
    }
}
