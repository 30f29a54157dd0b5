//! Error taxonomy
//!
//! - `InitError`: fatal, aborts initialization after disposing partial state
//! - `FrameError`: transient, the frame is skipped and the loop continues
//! - `InteractionError`: a click or lookup that cannot be honored, ignored
//! - `BatchError`: instanced batch budget/handle violations

use crate::renderer::batch::{GeometryId, InstanceHandle};

/// Fatal initialization failure
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("grid zone must be non-empty, got {width}x{height}")]
    EmptyZone { width: i32, height: i32 },
    #[error("grid zone {width}x{height} exceeds {max} cells")]
    ZoneTooLarge { width: i32, height: i32, max: usize },
    #[error("geometry catalog expected {expected} mesh variants, got {actual}")]
    IncompleteCatalog { expected: usize, actual: usize },
    #[error("mesh variant {0} has no triangles")]
    EmptyMesh(&'static str),
    #[error("render batch allocation failed: {0}")]
    Batch(#[from] BatchError),
    #[error("contestant data is invalid: {0}")]
    Contestants(#[from] serde_json::Error),
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("no compatible graphics adapter: {0}")]
    Adapter(String),
    #[error("failed to create graphics device: {0}")]
    Device(String),
}

/// A single frame could not be rendered
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("render backend has been released")]
    Released,
}

/// A pointer interaction that resolves to nothing valid
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    #[error("instance handle {handle} is out of range ({count} instances)")]
    HandleOutOfRange { handle: u32, count: u32 },
    #[error("entity index {index} is out of range ({count} entities)")]
    EntityOutOfRange { index: usize, count: usize },
    #[error("block {index} is not selectable under the active category")]
    NotSelectable { index: usize },
    #[error("no block belongs to category {0:?}")]
    NoMatchingBlock(String),
    #[error("scene has been torn down")]
    TornDown,
}

/// Instanced batch misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("instance capacity {capacity} exhausted")]
    InstanceCapacity { capacity: u32 },
    #[error("vertex budget {budget} exceeded (needs {needed})")]
    VertexBudget { budget: u32, needed: u32 },
    #[error("index budget {budget} exceeded (needs {needed})")]
    IndexBudget { budget: u32, needed: u32 },
    #[error("unknown geometry {0:?}")]
    UnknownGeometry(GeometryId),
    #[error("unknown instance {0:?}")]
    UnknownInstance(InstanceHandle),
    #[error("batch has been disposed")]
    Disposed,
}
