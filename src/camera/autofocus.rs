//! Depth-of-field autofocus
//!
//! Casts the screen-center ray against the block batch each frame and eases
//! the optics toward whatever it finds. An active agent takes priority so the
//! overlay anchor stays sharp.

use glam::Vec3;

use super::Camera;
use crate::renderer::batch::InstancedRenderBatch;

const APERTURE: f32 = 0.025;
const AGENT_APERTURE: f32 = 0.05;
const MAX_BLUR: f32 = 0.01;
const AGENT_MAX_BLUR: f32 = 0.02;
/// Smoothing rate (1/s)
const FOCUS_SMOOTH: f32 = 4.0;

/// Optics consumed by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusParams {
    pub focus_distance: f32,
    pub aperture: f32,
    pub max_blur: f32,
}

pub struct CameraAutofocus {
    params: FocusParams,
    last_hit: Option<f32>,
    enabled: bool,
}

impl CameraAutofocus {
    pub fn new(camera: &Camera) -> Self {
        Self {
            params: FocusParams {
                focus_distance: camera.position.distance(camera.target),
                aperture: APERTURE,
                max_blur: MAX_BLUR,
            },
            last_hit: None,
            enabled: true,
        }
    }

    pub fn params(&self) -> FocusParams {
        self.params
    }

    /// Distance of the most recent batch hit along the center ray
    pub fn last_hit(&self) -> Option<f32> {
        self.last_hit
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Ease optics toward this frame's focus target
    pub fn update(&mut self, dt: f32, camera: &Camera, batch: &InstancedRenderBatch, agent: Option<Vec3>) {
        if !self.enabled {
            return;
        }

        self.last_hit = batch.raycast(&camera.center_ray()).map(|hit| hit.distance);

        let (target_distance, target_aperture, target_blur) = match agent {
            Some(position) => (camera.position.distance(position), AGENT_APERTURE, AGENT_MAX_BLUR),
            None => (
                self.last_hit.unwrap_or_else(|| camera.position.distance(camera.target)),
                APERTURE,
                MAX_BLUR,
            ),
        };

        let k = (FOCUS_SMOOTH * dt).min(1.0);
        self.params.focus_distance += (target_distance - self.params.focus_distance) * k;
        self.params.aperture += (target_aperture - self.params.aperture) * k;
        self.params.max_blur += (target_blur - self.params.max_blur) * k;
    }

    /// Release raycasting state; later updates do nothing
    pub fn dispose(&mut self) {
        self.enabled = false;
        self.last_hit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec2, Vec2};

    #[test]
    fn test_eases_toward_agent() {
        let camera = Camera::framing(IVec2::new(10, 10), Vec2::new(800.0, 600.0));
        let batch = InstancedRenderBatch::default();
        let mut focus = CameraAutofocus::new(&camera);
        let agent = Vec3::new(0.0, 4.0, 0.0);
        for _ in 0..240 {
            focus.update(1.0 / 60.0, &camera, &batch, Some(agent));
        }
        let p = focus.params();
        assert!((p.focus_distance - camera.position.distance(agent)).abs() < 1e-2);
        assert!((p.aperture - AGENT_APERTURE).abs() < 1e-4);
    }

    #[test]
    fn test_falls_back_to_target_without_hits() {
        let camera = Camera::framing(IVec2::new(10, 10), Vec2::new(800.0, 600.0));
        let batch = InstancedRenderBatch::default();
        let mut focus = CameraAutofocus::new(&camera);
        focus.update(0.5, &camera, &batch, None);
        assert!(focus.last_hit().is_none());
        assert!((focus.params().focus_distance - camera.position.distance(camera.target)).abs() < 1e-4);
    }

    #[test]
    fn test_dispose_stops_updates() {
        let camera = Camera::framing(IVec2::new(10, 10), Vec2::new(800.0, 600.0));
        let batch = InstancedRenderBatch::default();
        let mut focus = CameraAutofocus::new(&camera);
        focus.dispose();
        let before = focus.params();
        focus.update(1.0, &camera, &batch, Some(Vec3::Y));
        assert_eq!(focus.params(), before);
        assert!(!focus.is_enabled());
    }
}
