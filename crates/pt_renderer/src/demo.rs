//! Built-in demo scenes assembled from indexed meshes.

use std::f32::consts::FRAC_PI_2;

use pt_core::{Material, Mesh, Triangle};
use pt_math::{Mat4, Quat, Vec2, Vec3};

use crate::camera::Camera;

/// Triangles, materials and a camera framing them.
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    pub camera: Camera,
}

/// Unit quad in the XY plane facing +Z.
pub fn quad_mesh() -> Mesh {
    let positions = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ];
    let uvs = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
    Mesh::new(positions, vec![0, 1, 2, 0, 2, 3], None).with_uvs(uvs)
}

/// Cube spanning [-1, 1] on every axis, flat shaded.
pub fn cube_mesh() -> Mesh {
    let positions = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            )
        })
        .collect();
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -Z
        4, 5, 6, 5, 7, 6, // +Z
        0, 1, 4, 1, 5, 4, // -Y
        2, 6, 3, 3, 6, 7, // +Y
        0, 4, 2, 2, 4, 6, // -X
        1, 3, 5, 3, 7, 5, // +X
    ];
    Mesh::new(positions, indices, None)
}

/// Classic Cornell box: red and green side walls, a ceiling light and two
/// boxes, one of them glossy.
pub fn cornell_box() -> pt_core::Result<DemoScene> {
    let materials = vec![
        Material::new("white", Vec3::splat(0.73)),
        Material::new("red", Vec3::new(0.65, 0.05, 0.05)),
        Material::new("green", Vec3::new(0.12, 0.45, 0.15)),
        Material::light("light", Vec3::new(1.0, 0.85, 0.6), 12.0),
        Material::new("glossy", Vec3::splat(0.8))
            .with_reflectiveness(0.6)
            .with_roughness(0.2),
    ];
    let (white, red, green, light, glossy) = (0, 1, 2, 3, 4);

    let quad = quad_mesh();
    let cube = cube_mesh();
    let walls = [
        (Mat4::from_translation(Vec3::NEG_Y) * Mat4::from_rotation_x(-FRAC_PI_2), white),
        (Mat4::from_translation(Vec3::Y) * Mat4::from_rotation_x(FRAC_PI_2), white),
        (Mat4::from_translation(Vec3::NEG_Z), white),
        (Mat4::from_translation(Vec3::NEG_X) * Mat4::from_rotation_y(FRAC_PI_2), red),
        (Mat4::from_translation(Vec3::X) * Mat4::from_rotation_y(-FRAC_PI_2), green),
        (
            Mat4::from_translation(Vec3::new(0.0, 0.998, 0.0))
                * Mat4::from_rotation_x(FRAC_PI_2)
                * Mat4::from_scale(Vec3::splat(0.25)),
            light,
        ),
    ];
    let boxes = [
        (
            Mat4::from_scale_rotation_translation(
                Vec3::new(0.3, 0.6, 0.3),
                Quat::from_rotation_y(0.3),
                Vec3::new(-0.35, -0.4, -0.3),
            ),
            glossy,
        ),
        (
            Mat4::from_scale_rotation_translation(
                Vec3::splat(0.3),
                Quat::from_rotation_y(-0.3),
                Vec3::new(0.35, -0.7, 0.3),
            ),
            white,
        ),
    ];

    let mut triangles = Vec::new();
    for (object, (transform, material)) in walls.iter().enumerate() {
        triangles.extend(quad.to_triangles(transform, *material, object as u32, 0)?);
    }
    for (i, (transform, material)) in boxes.iter().enumerate() {
        triangles.extend(cube.to_triangles(transform, *material, (walls.len() + i) as u32, 0)?);
    }

    let camera = Camera::default()
        .with_position(Vec3::new(0.0, 0.0, 3.4), Vec3::ZERO, Vec3::Y)
        .with_lens(40.0, 0.0, 3.4);

    Ok(DemoScene {
        triangles,
        materials,
        camera,
    })
}
