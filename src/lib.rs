//! Block Tide - a tiled block grid that breathes
//!
//! Core modules:
//! - `sim`: Deterministic simulation (packing, wave field, agent animation)
//! - `camera`: Perspective camera, screen rays and depth-of-field autofocus
//! - `renderer`: Geometry catalog, instanced batch and the WebGPU pipeline
//! - `scene`: Scene context, selection and lifecycle
//! - `contestants`: Externally supplied contestant records
//! - `settings`: Configuration and persisted preferences

pub mod camera;
pub mod contestants;
pub mod error;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod sim;

pub use error::{BatchError, FrameError, InitError, InteractionError};
pub use scene::{BlockClick, Scene, Viewer};
pub use settings::{QualityPreset, Settings};

use glam::{IVec2, Vec2};

/// Animation tuning constants
pub mod consts {
    use glam::Vec3;

    /// Upper bound on zone area (cells)
    pub const MAX_ZONE_CELLS: usize = 1 << 20;

    /// Largest frame delta fed to the simulation (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Pointer influence falls off linearly to zero over 10 cells
    pub const POINTER_FALLOFF: f32 = 0.1;
    /// Height added directly under the pointer
    pub const POINTER_BOOST: f32 = 5.0;
    /// Noise sampling scale along x
    pub const NOISE_X_SCALE: f32 = 0.1;
    /// Noise scroll speed along y (cells per second)
    pub const NOISE_TIME_SCALE: f32 = 5.0;
    /// Resting height every block returns to
    pub const BASE_HEIGHT: f32 = 1.0;
    /// Height per unit of contestant progress
    pub const PROGRESS_BOOST: f32 = 3.0;
    /// Height added to the highlighted block
    pub const HIGHLIGHT_BOOST: f32 = 5.0;
    /// Interpolation rate while rising
    pub const RISE_RATE: f32 = 0.1;
    /// Interpolation rate while falling (faster, gives the liquid settle)
    pub const FALL_RATE: f32 = 0.3;
    /// Height of blocks outside the active category
    pub const FILTERED_HEIGHT: f32 = 0.2;

    /// Primary theme ripple
    pub const RIPPLE_GAIN: f32 = 1.1;
    pub const RIPPLE_EXPONENT: f32 = 0.9;
    pub const RIPPLE_WIDTH: f32 = 0.05;
    pub const RIPPLE_AMPLITUDE: f32 = 10.0;
    /// Echo ripple trailing the primary one
    pub const ECHO_DELAY: f32 = 0.3;
    pub const ECHO_GAIN: f32 = 1.3;
    pub const ECHO_WIDTH: f32 = 0.025;
    pub const ECHO_AMPLITUDE: f32 = 5.0;

    /// Agent timings (seconds)
    pub const EMERGE_DURATION: f32 = 1.0;
    pub const RETURN_DURATION: f32 = 0.8;
    /// Where the agent hovers relative to its resting pose
    pub const AGENT_HOVER_OFFSET: Vec3 = Vec3::new(0.0, 3.0, 0.0);
    /// Extra scale at the end of emerging (1.5x total)
    pub const AGENT_SCALE_BOOST: f32 = 0.5;
    pub const HOVER_AMPLITUDE: f32 = 0.1;
    pub const HOVER_FREQUENCY: f32 = 2.0;
    /// Slow yaw while active (radians/sec)
    pub const AGENT_YAW_SPEED: f32 = 0.5;

    /// Fraction of a cell a tile footprint occupies
    pub const TILE_GAP: f32 = 0.92;
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert an integer grid cell to a world-space ground point (x, z).
///
/// The zone is centered on the world origin.
#[inline]
pub fn cell_to_world(cell: Vec2, zone: IVec2) -> Vec2 {
    cell - zone.as_vec2() * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(2.0, 6.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 6.0, 1.0), 6.0);
        assert_eq!(lerp(2.0, 6.0, 0.5), 4.0);
    }

    #[test]
    fn test_cell_to_world_centers_zone() {
        let zone = IVec2::new(10, 6);
        assert_eq!(cell_to_world(Vec2::new(5.0, 3.0), zone), Vec2::ZERO);
        assert_eq!(cell_to_world(Vec2::ZERO, zone), Vec2::new(-5.0, -3.0));
    }
}
