//! Rendering module
//!
//! The batch and catalog are plain CPU data; the only code touching a GPU
//! device is `pipeline`. Scenes talk to either backend through
//! [`FrameRenderer`].

pub mod batch;
pub mod catalog;
pub mod headless;
pub mod pipeline;
pub mod shapes;
pub mod vertex;

pub use batch::{InstanceHandle, InstancedRenderBatch, entity_index_of};
pub use catalog::{GeometryCatalog, GeometryKind, GeometryProvider, Mesh};
pub use headless::HeadlessRenderer;
pub use pipeline::BlockRenderState;
pub use shapes::ProceduralShapes;

use glam::{Mat4, Vec3};

use crate::camera::FocusParams;
use crate::error::FrameError;

/// Everything a backend needs to draw one frame
pub struct FrameView<'a> {
    pub batch: &'a InstancedRenderBatch,
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub focus: FocusParams,
    pub background: Vec3,
    pub depth_of_field: bool,
    pub elapsed: f32,
}

/// Presentation backend driven once per frame
pub trait FrameRenderer {
    /// Commit geometry and instance storage for a batch. Called once at
    /// init; `render` re-uploads only when the batch's geometry changes.
    fn upload_scene(&mut self, batch: &InstancedRenderBatch);

    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), FrameError>;

    /// New drawable size in physical pixels; zero sizes are ignored
    fn resize(&mut self, width: u32, height: u32);

    /// Reconfigure the surface after it was lost or became outdated
    fn reconfigure(&mut self) {}

    /// Drop geometry and instance buffers
    fn release_scene(&mut self);

    /// Drop the device itself; called last during teardown
    fn release_device(&mut self);

    fn is_released(&self) -> bool;
}
