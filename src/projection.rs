//! Pointer projection onto the particle field.
//!
//! The field lies in the `z = 0` plane, centred on the origin. An invisible
//! hit-plane of the same size catches pointer rays: a screen position is
//! turned into normalized device coordinates, unprojected into a world-space
//! ray through the camera, and intersected with the plane. The hit is returned
//! in the field's UV space, `(0, 0)` at the bottom-left corner.

use crate::error::ProjectError;
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Rays closer to parallel than this are treated as missing the plane.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Orbit camera looking at the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport width divided by height.
    pub aspect: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraState {
    /// Camera on the +Z axis looking straight at the field.
    pub fn new(fov_y: f32, aspect: f32, distance: f32) -> Self {
        Self {
            fov_y,
            aspect,
            distance,
            yaw: 0.0,
            pitch: 0.0,
            near: 1.0,
            far: 10_000.0,
        }
    }

    /// World position of the camera.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(f32::EPSILON), self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space height visible at the target distance:
    /// `2 · tan(fov_y / 2) · distance`.
    pub fn fov_height(&self) -> f32 {
        2.0 * (self.fov_y * 0.5).tan() * self.distance
    }

    /// Update the aspect ratio after a viewport change.
    pub fn set_viewport(&mut self, viewport: Vec2) {
        if viewport.x > 0.0 && viewport.y > 0.0 {
            self.aspect = viewport.x / viewport.y;
        }
    }
}

/// Camera settings as written in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub distance: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            distance: 300.0,
            near: 1.0,
            far: 10_000.0,
        }
    }
}

impl CameraConfig {
    /// Camera for a viewport of the given size.
    pub fn camera(&self, viewport: Vec2) -> CameraState {
        let mut camera = CameraState::new(self.fov_y_degrees.to_radians(), 1.0, self.distance);
        camera.near = self.near;
        camera.far = self.far;
        camera.set_viewport(viewport);
        camera
    }
}

/// Scale that fits an image of `image_height` pixels to `fov_height` world units.
pub fn scale_factor(fov_height: f32, image_height: u32) -> f32 {
    if image_height == 0 {
        return 1.0;
    }
    fov_height / image_height as f32
}

/// Invisible plane covering the field, used only for pointer picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitPlane {
    /// World-space width.
    pub width: f32,
    /// World-space height.
    pub height: f32,
}

impl HitPlane {
    /// Plane for an image of `width × height` pixels at `scale` world units per pixel.
    pub fn new(width: u32, height: u32, scale: f32) -> Self {
        Self {
            width: width as f32 * scale,
            height: height as f32 * scale,
        }
    }

    /// Map a world-space point on the plane to UV.
    pub fn world_to_uv(&self, point: Vec3) -> Vec2 {
        Vec2::new(point.x / self.width + 0.5, point.y / self.height + 0.5)
    }
}

/// Screen pixel coordinates (origin top-left) to NDC (`[-1, 1]`, y up).
pub fn screen_to_ndc(screen: Vec2, viewport: Vec2) -> Vec2 {
    Vec2::new(
        (screen.x / viewport.x) * 2.0 - 1.0,
        1.0 - (screen.y / viewport.y) * 2.0,
    )
}

/// Project a screen position to field UV.
///
/// Returns [`ProjectError::NoIntersection`] when the ray is parallel to the
/// plane, points away from it, lands outside its bounds, or when the inputs
/// are degenerate (empty viewport, zero-sized plane).
pub fn project(
    screen: Vec2,
    viewport: Vec2,
    plane: &HitPlane,
    camera: &CameraState,
) -> Result<Vec2, ProjectError> {
    if viewport.x <= 0.0 || viewport.y <= 0.0 || plane.width <= 0.0 || plane.height <= 0.0 {
        return Err(ProjectError::NoIntersection);
    }

    let ndc = screen_to_ndc(screen, viewport);
    let inverse = camera.view_proj().inverse();
    let near = inverse.project_point3(ndc.extend(0.0));
    let far = inverse.project_point3(ndc.extend(1.0));
    let dir = far - near;

    if dir.z.abs() < PARALLEL_EPSILON {
        return Err(ProjectError::NoIntersection);
    }
    let t = -near.z / dir.z;
    if t < 0.0 {
        return Err(ProjectError::NoIntersection);
    }

    let uv = plane.world_to_uv(near + dir * t);
    let inside = (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y);
    if !uv.is_finite() || !inside {
        return Err(ProjectError::NoIntersection);
    }
    Ok(uv)
}
