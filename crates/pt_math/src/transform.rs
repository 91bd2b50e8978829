// Transform utilities for Mat4
//
// glam::Mat4 already provides transform_point3(), transform_vector3() and
// inverse(). These cover what mesh ingestion needs on top of that.

use glam::{Mat3, Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform a surface normal (inverse-transpose of the upper 3x3).
    /// The result is normalized; non-invertible matrices yield the input.
    fn transform_normal3(&self, normal: Vec3) -> Vec3;

    /// True if the transform flips handedness (negative determinant).
    fn flips_winding(&self) -> bool;
}

impl Mat4Ext for Mat4 {
    fn transform_normal3(&self, normal: Vec3) -> Vec3 {
        let m = Mat3::from_mat4(*self);
        if m.determinant().abs() < f32::EPSILON {
            return normal;
        }
        (m.inverse().transpose() * normal).normalize_or_zero()
    }

    fn flips_winding(&self) -> bool {
        Mat3::from_mat4(*self).determinant() < 0.0
    }
}
