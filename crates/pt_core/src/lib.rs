//! Path tracer core - the scene data handed to the renderer.
//!
//! This crate provides:
//!
//! - **Geometry**: `Triangle` with precomputed barycentric coefficients and a
//!   tangent frame, and an indexed `Mesh` that converts into world-space triangles
//! - **Materials**: `Material` parameter block with the `Surface` tag
//! - **Textures**: decoded RGBA `Texture` data and the `TextureSampler` service
//!
//! # Example
//!
//! ```ignore
//! use pt_core::{Material, Mesh};
//! use pt_math::{Mat4, Vec3};
//!
//! let mesh = Mesh::new(positions, indices, None);
//! let triangles = mesh.to_triangles(&Mat4::IDENTITY, 0, 0, 0)?;
//! let materials = vec![Material::new("grey", Vec3::splat(0.5))];
//! ```

pub mod error;
pub mod material;
pub mod mesh;
pub mod texture;
pub mod triangle;

// Re-export commonly used types
pub use error::{Error, Result};
pub use material::{Material, Surface, TextureSlots};
pub use mesh::Mesh;
pub use texture::{Texture, TextureError, TextureId, TextureSampler, TextureSet};
pub use triangle::{BarycentricBasis, MaterialId, Triangle};
