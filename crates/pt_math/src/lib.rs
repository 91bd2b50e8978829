// Re-export glam for convenience
pub use glam::*;

// Path tracer math types
mod aabb;
mod interval;
mod onb;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use onb::Onb;
pub use ray::Ray;
pub use transform::Mat4Ext;

/// Offset applied to secondary ray origins to avoid self-intersection.
pub const RAY_EPSILON: f32 = 1.0e-3;
