//! Monte Carlo path tracer for triangle meshes.
//!
//! A scene of world-space triangles and materials is built once into an
//! immutable [`Scene`] (BVH and light list). [`PathTracer`] then renders
//! progressive frames over it: one sample per pixel per frame, averaged in
//! an [`Accumulator`]. With the `gpu` feature, [`GpuRenderer`] runs the same
//! integrator as a wgpu compute kernel.

mod accumulator;
mod brdf;
mod bucket;
mod bvh;
mod camera;
mod control;
mod demo;
mod error;
#[cfg(feature = "gpu")]
mod gpu;
mod gpu_layout;
mod integrator;
mod intersect;
mod renderer;
mod rng;
mod sampling;
mod scene;

pub use accumulator::{color_to_rgb8, linear_to_gamma, Accumulator};
pub use brdf::{fresnel_schlick, ggx_d, schlick_ggx, CookTorrance, GeometryRemap, MIN_DIELECTRIC_F0};
pub use bucket::{generate_buckets, generate_scanlines, render_bucket, Bucket, BucketResult, Tiling, DEFAULT_BUCKET_SIZE};
pub use bvh::{Bvh, BvhNode, NodeId, DEFAULT_BVH_SEED};
pub use camera::{Camera, CameraFrame};
pub use control::RenderControl;
pub use demo::{cornell_box, cube_mesh, quad_mesh, DemoScene};
pub use error::{RenderError, Result};
#[cfg(feature = "gpu")]
pub use gpu::GpuRenderer;
pub use gpu_layout::{GpuBvhNode, GpuLight, GpuMaterial, GpuSceneData, GpuTextureHeader, GpuTriangle, GpuUniforms};
pub use integrator::Integrator;
pub use intersect::{closest_hit_linear, intersect_triangle, TriangleHit};
pub use renderer::{FrameStatus, PathTracer, RenderConfig};
pub use rng::{pixel_rng, pixel_seed, splitmix64};
pub use sampling::{cosine_direction, glossy_direction, reflect, refract, schlick_reflectance};
pub use scene::Scene;

/// Re-export common math types from pt_math
pub use pt_math::{Aabb, Interval, Ray, Vec2, Vec3, Vec4};
