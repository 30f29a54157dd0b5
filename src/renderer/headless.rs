//! Device-less backend
//!
//! Runs the full per-frame preparation (instance packing, draw grouping)
//! without a GPU. Used by the native binary and by tests, which can also
//! inject transient failures.

use super::batch::InstancedRenderBatch;
use super::{FrameRenderer, FrameView};
use crate::error::FrameError;

#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    size: (u32, u32),
    frames: u64,
    skipped: u64,
    fail_next: u32,
    draw_calls: usize,
    instances: usize,
    uploads: u64,
    uploaded_revision: Option<u64>,
    scene_released: bool,
    device_released: bool,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..Default::default()
        }
    }

    /// Make the next `count` frames fail as if the surface timed out
    pub fn fail_next_frames(&mut self, count: u32) {
        self.fail_next = count;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    /// Number of geometry uploads performed
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn scene_released(&self) -> bool {
        self.scene_released
    }
}

impl FrameRenderer for HeadlessRenderer {
    fn upload_scene(&mut self, batch: &InstancedRenderBatch) {
        if self.device_released {
            return;
        }
        let revision = batch.geometry_revision();
        if self.uploaded_revision != Some(revision) {
            self.uploaded_revision = Some(revision);
            self.uploads += 1;
        }
    }

    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), FrameError> {
        if self.device_released {
            return Err(FrameError::Released);
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            self.skipped += 1;
            return Err(FrameError::Surface(wgpu::SurfaceError::Timeout));
        }

        self.upload_scene(frame.batch);
        let (raw, groups) = frame.batch.packed_instances();
        self.instances = raw.len();
        self.draw_calls = groups.len();
        self.frames += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
        }
    }

    fn release_scene(&mut self) {
        self.scene_released = true;
        self.uploaded_revision = None;
        self.instances = 0;
        self.draw_calls = 0;
    }

    fn release_device(&mut self) {
        self.device_released = true;
    }

    fn is_released(&self) -> bool {
        self.device_released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FocusParams;
    use crate::renderer::batch::InstancedRenderBatch;
    use glam::{Mat4, Vec3};

    fn view(batch: &InstancedRenderBatch) -> FrameView<'_> {
        FrameView {
            batch,
            view_proj: Mat4::IDENTITY,
            camera_position: Vec3::ONE,
            focus: FocusParams {
                focus_distance: 1.0,
                aperture: 0.025,
                max_blur: 0.01,
            },
            background: Vec3::ZERO,
            depth_of_field: true,
            elapsed: 0.0,
        }
    }

    #[test]
    fn test_injected_failures_then_recovers() {
        let batch = InstancedRenderBatch::default();
        let mut renderer = HeadlessRenderer::new(64, 64);
        renderer.fail_next_frames(2);
        assert!(renderer.render(&view(&batch)).is_err());
        assert!(renderer.render(&view(&batch)).is_err());
        assert!(renderer.render(&view(&batch)).is_ok());
        assert_eq!(renderer.frames(), 1);
        assert_eq!(renderer.skipped(), 2);
    }

    #[test]
    fn test_geometry_uploaded_once() {
        let batch = InstancedRenderBatch::default();
        let mut renderer = HeadlessRenderer::new(64, 64);
        for _ in 0..5 {
            renderer.render(&view(&batch)).unwrap();
        }
        assert_eq!(renderer.uploads(), 1);
    }

    #[test]
    fn test_released_device_rejects_frames() {
        let batch = InstancedRenderBatch::default();
        let mut renderer = HeadlessRenderer::new(64, 64);
        renderer.release_device();
        assert!(matches!(renderer.render(&view(&batch)), Err(FrameError::Released)));
        renderer.resize(0, 10);
        assert_eq!(renderer.size(), (64, 64));
    }
}
