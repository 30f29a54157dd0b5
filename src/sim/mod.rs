//! Deterministic simulation module
//!
//! Everything that decides where blocks are and how they move lives here.
//! This module must stay free of GPU and platform dependencies:
//! - Seeded RNG only
//! - Stable iteration order (by entity index)
//! - Frame time is supplied by the caller

pub mod agent;
pub mod block;
pub mod easing;
pub mod packer;
pub mod wave;

pub use agent::{AgentAnimation, AgentPose, AgentState};
pub use block::{BlockEntity, BlockId, BlockStore, BottomShape, GridBox, TopShape};
pub use packer::{GridPacker, PackerConfig};
pub use wave::{BlockColors, ColorMode, WaveConfig, WaveField, WaveInputs};
