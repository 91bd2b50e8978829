//! Pinhole/thin-lens camera for primary ray generation.

use pt_math::{Ray, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::sampling::concentric_disk;

/// Narrowest and widest accepted vertical field of view, in degrees.
const MIN_FOVY: f32 = 0.1;
const MAX_FOVY: f32 = 179.5;

/// Focal length used when a non-positive one is requested.
const MIN_FOCAL_LENGTH: f32 = 0.1;

/// Camera description. Setters apply the same clamps as the viewer UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub position: Vec3,
    /// Normalized view direction
    pub direction: Vec3,
    /// Normalized up hint (need not be orthogonal to `direction`)
    pub up: Vec3,
    /// Distance from the eye to the image plane
    pub focal_length: f32,
    /// Vertical field of view in degrees
    pub fovy: f32,
    /// Distance to the plane in perfect focus
    pub focal_distance: f32,
    /// Lens radius, 0 for a pinhole
    pub aperture: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
            focal_length: 1.0,
            fovy: 45.0,
            focal_distance: 5.0,
            aperture: 0.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set camera position and orientation.
    pub fn with_position(mut self, position: Vec3, look_at: Vec3, up: Vec3) -> Self {
        self.set_position(position);
        self.set_direction(look_at - position);
        self.set_up(up);
        self
    }

    /// Set lens settings.
    pub fn with_lens(mut self, fovy: f32, aperture: f32, focal_distance: f32) -> Self {
        self.set_fovy(fovy);
        self.set_aperture(aperture);
        self.set_focal_distance(focal_distance);
        self
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or_zero();
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up.normalize_or_zero();
    }

    /// Non-positive focal lengths become 0.1.
    pub fn set_focal_length(&mut self, focal_length: f32) {
        self.focal_length = if focal_length > 0.0 {
            focal_length
        } else {
            MIN_FOCAL_LENGTH
        };
    }

    /// Clamped to [0.1, 179.5] degrees.
    pub fn set_fovy(&mut self, fovy: f32) {
        self.fovy = if fovy.is_nan() {
            Camera::default().fovy
        } else {
            fovy.clamp(MIN_FOVY, MAX_FOVY)
        };
    }

    pub fn set_focal_distance(&mut self, focal_distance: f32) {
        self.focal_distance = focal_distance.max(MIN_FOCAL_LENGTH);
    }

    pub fn set_aperture(&mut self, aperture: f32) {
        self.aperture = aperture.max(0.0);
    }

    /// Precompute the image plane for a resolution.
    ///
    /// Returns `None` when the basis is degenerate (zero direction or up
    /// parallel to direction); callers render such frames black.
    pub fn frame(&self, width: u32, height: u32) -> Option<CameraFrame> {
        if width == 0 || height == 0 {
            return None;
        }
        let forward = self.direction.normalize_or_zero();
        let right = forward.cross(self.up).normalize_or_zero();
        if forward == Vec3::ZERO || right == Vec3::ZERO || !self.position.is_finite() {
            return None;
        }
        let true_up = right.cross(forward);

        let half_height = self.focal_length * (self.fovy.to_radians() * 0.5).tan();
        let half_width = half_height * (width as f32 / height as f32);

        Some(CameraFrame {
            origin: self.position,
            forward,
            right,
            up: true_up,
            focal_length: self.focal_length,
            half_width,
            half_height,
            width: width as f32,
            height: height as f32,
            focal_distance: self.focal_distance,
            aperture: self.aperture,
        })
    }
}

/// Camera basis and image plane for one resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub origin: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub focal_length: f32,
    pub half_width: f32,
    pub half_height: f32,
    pub width: f32,
    pub height: f32,
    pub focal_distance: f32,
    pub aperture: f32,
}

impl CameraFrame {
    /// Primary ray through pixel `(x, y)`, row 0 at the top.
    ///
    /// `jitter` in [0, 1)^2 is the sub-pixel offset (0.5, 0.5 is the pixel
    /// center); `lens` in [0, 1)^2 picks the point on the aperture disk.
    pub fn primary_ray(&self, x: u32, y: u32, jitter: Vec2, lens: Vec2) -> Ray {
        let sx = ((x as f32 + jitter.x) / self.width * 2.0 - 1.0) * self.half_width;
        let sy = (1.0 - (y as f32 + jitter.y) / self.height * 2.0) * self.half_height;
        let on_plane = self.forward * self.focal_length + self.right * sx + self.up * sy;
        let direction = on_plane.normalize();

        if self.aperture <= 0.0 {
            return Ray::new(self.origin, direction);
        }

        // Retarget through the point that stays sharp on the focal plane
        let focus = self.origin + direction * (self.focal_distance / direction.dot(self.forward));
        let disk = concentric_disk(lens.x, lens.y) * self.aperture;
        let origin = self.origin + self.right * disk.x + self.up * disk.y;
        Ray::new(origin, (focus - origin).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Vec2 = Vec2::new(0.5, 0.5);

    #[test]
    fn test_setter_clamps() {
        let mut camera = Camera::new();

        camera.set_focal_length(-2.0);
        assert_eq!(camera.focal_length, 0.1);
        camera.set_focal_length(0.0);
        assert_eq!(camera.focal_length, 0.1);

        camera.set_fovy(0.0);
        assert_eq!(camera.fovy, 0.1);
        camera.set_fovy(200.0);
        assert_eq!(camera.fovy, 179.5);
        camera.set_fovy(60.0);
        assert_eq!(camera.fovy, 60.0);

        camera.set_direction(Vec3::new(0.0, 0.0, -3.0));
        assert_eq!(camera.direction, Vec3::NEG_Z);
    }

    #[test]
    fn test_center_ray() {
        let camera = Camera::new().with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let frame = camera.frame(101, 101).unwrap();

        let ray = frame.primary_ray(50, 50, CENTER, CENTER);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-5);
        assert_eq!(ray.origin, Vec3::ZERO);
    }

    #[test]
    fn test_image_orientation() {
        let camera = Camera::new().with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let frame = camera.frame(100, 50).unwrap();

        // Row 0 is the top of the image, column 0 the left
        let top_left = frame.primary_ray(0, 0, CENTER, CENTER);
        assert!(top_left.direction.y > 0.0);
        assert!(top_left.direction.x < 0.0);

        let bottom_right = frame.primary_ray(99, 49, CENTER, CENTER);
        assert!(bottom_right.direction.y < 0.0);
        assert!(bottom_right.direction.x > 0.0);
    }

    #[test]
    fn test_fov_extent() {
        let mut camera = Camera::new().with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        camera.set_fovy(90.0);
        let frame = camera.frame(10, 10).unwrap();

        // Top edge of the image plane is at 45 degrees
        let ray = frame.primary_ray(5, 0, Vec2::new(0.0, 0.0), CENTER);
        let angle = ray.direction.y.atan2(-ray.direction.z);
        assert!((angle - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_basis() {
        let camera = Camera::new().with_position(Vec3::ZERO, Vec3::Y, Vec3::Y);
        assert!(camera.frame(10, 10).is_none());

        let mut camera = Camera::new();
        camera.set_direction(Vec3::ZERO);
        assert!(camera.frame(10, 10).is_none());
        assert!(Camera::new().frame(0, 10).is_none());
    }

    #[test]
    fn test_depth_of_field_focus() {
        let camera = Camera::new()
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_lens(40.0, 0.2, 4.0);
        let frame = camera.frame(64, 64).unwrap();

        // All lens samples for one pixel converge on the focal plane
        let pinhole = frame.primary_ray(10, 20, CENTER, CENTER);
        let focus = pinhole.at(4.0 / pinhole.direction.dot(Vec3::NEG_Z));
        for (lx, ly) in [(0.1, 0.2), (0.9, 0.4), (0.3, 0.8)] {
            let ray = frame.primary_ray(10, 20, CENTER, Vec2::new(lx, ly));
            assert!(ray.origin != Vec3::ZERO);
            let t = (focus - ray.origin).length();
            assert!((ray.at(t) - focus).length() < 1e-4);
        }
    }
}
