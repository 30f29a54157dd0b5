//! Perspective camera, screen rays and projection
//!
//! Camera motion is not part of the deterministic simulation; it only maps
//! between screen space and the ground plane.

pub mod autofocus;

pub use autofocus::{CameraAutofocus, FocusParams};

use glam::{IVec2, Mat4, Vec2, Vec3};

/// A half-line in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Hit point on the y = 0 ground plane
    pub fn ground_hit(&self) -> Option<Vec3> {
        if self.dir.y.abs() < 1e-6 {
            return None;
        }
        let t = -self.origin.y / self.dir.y;
        (t >= 0.0).then(|| self.at(t))
    }

    /// Hit distance against an oriented box given by its model matrix and
    /// local-space bounds
    pub fn hit_obb(&self, model: &Mat4, local_min: Vec3, local_max: Vec3) -> Option<f32> {
        if model.determinant().abs() < 1e-12 {
            return None;
        }
        let inv = model.inverse();
        let o_local = inv.transform_point3(self.origin);
        let d_local = inv.transform_vector3(self.dir);
        let t_local = ray_aabb_hit_t(o_local, d_local, local_min, local_max)?;
        // Local t is in units of d_local; convert back to world distance
        Some((model.transform_point3(o_local + d_local * t_local) - self.origin).length())
    }
}

/// Slab-method ray / AABB intersection, returns the entry distance (or the
/// exit distance when the origin is inside)
pub fn ray_aabb_hit_t(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = Vec3::new(
        if dir.x != 0.0 { 1.0 / dir.x } else { f32::INFINITY },
        if dir.y != 0.0 { 1.0 / dir.y } else { f32::INFINITY },
        if dir.z != 0.0 { 1.0 / dir.z } else { f32::INFINITY },
    );

    let t1 = (min - origin) * inv;
    let t2 = (max - origin) * inv;
    // 0 * inf yields NaN when the origin lies on a slab plane; min/max skip NaN
    let t_near = t1.min(t2);
    let t_far = t1.max(t2);

    let t_enter = t_near.max_element();
    let t_exit = t_far.min_element();

    if t_enter > t_exit || t_exit < 0.0 {
        return None;
    }
    Some(if t_enter >= 0.0 { t_enter } else { t_exit })
}

/// Fixed perspective camera looking down at the grid
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Logical viewport size (same units as pointer coordinates)
    viewport: Vec2,
}

impl Camera {
    /// Camera framing a centered zone of `zone` cells
    pub fn framing(zone: IVec2, viewport: Vec2) -> Self {
        let extent = zone.max_element().max(1) as f32;
        Self {
            position: Vec3::new(0.0, extent * 0.85, extent * 0.7),
            target: Vec3::ZERO,
            fov_y: 45.0_f32.to_radians(),
            near: 0.1,
            far: extent * 6.0,
            viewport: viewport.max(Vec2::ONE),
        }
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.x / self.viewport.y
    }

    /// Update the viewport; returns false when nothing changed or the size
    /// is degenerate
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        let size = Vec2::new(width, height);
        if size == self.viewport {
            return false;
        }
        self.viewport = size;
        true
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect(), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Ray through a screen point (origin top-left)
    pub fn screen_ray(&self, screen: Vec2) -> Ray {
        let ndc = Vec2::new(
            2.0 * screen.x / self.viewport.x - 1.0,
            1.0 - 2.0 * screen.y / self.viewport.y,
        );
        let inv = self.view_projection().inverse();
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }

    pub fn center_ray(&self) -> Ray {
        self.screen_ray(self.viewport * 0.5)
    }

    /// Screen position of a world point, None when behind the camera
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }

    /// Ground point under a screen position
    pub fn ground_point(&self, screen: Vec2) -> Option<Vec2> {
        self.screen_ray(screen).ground_hit().map(|p| Vec2::new(p.x, p.z))
    }
}
