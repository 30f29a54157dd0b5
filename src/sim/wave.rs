//! Wave field: per-frame block heights and ripple colors
//!
//! Heights combine pointer proximity, scrolling coherent noise, contestant
//! progress and highlight boosts. A color-mode change launches a radial
//! ripple from the screen-center ground point plus a delayed echo; bottoms
//! recolor with the primary pulse and tops with the echo.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::block::BlockEntity;
use super::easing::{cubic_pulse, gain};
use crate::consts::*;
use crate::contestants::ContestantRoster;
use crate::lerp;

/// Number of top colors per palette
pub const PALETTE_SIZE: usize = 6;

/// Theme of the whole scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "light" => Some(ColorMode::Light),
            "dark" => Some(ColorMode::Dark),
            _ => None,
        }
    }

    /// Color of every block's bottom
    pub fn base_color(&self) -> Vec3 {
        match self {
            ColorMode::Light => Vec3::new(0.86, 0.84, 0.80),
            ColorMode::Dark => Vec3::new(0.10, 0.10, 0.14),
        }
    }

    pub fn background(&self) -> Vec3 {
        match self {
            ColorMode::Light => Vec3::new(0.95, 0.94, 0.91),
            ColorMode::Dark => Vec3::new(0.02, 0.02, 0.05),
        }
    }

    pub fn palette(&self) -> [Vec3; PALETTE_SIZE] {
        match self {
            ColorMode::Light => [
                Vec3::new(0.96, 0.55, 0.45),
                Vec3::new(0.98, 0.80, 0.42),
                Vec3::new(0.55, 0.80, 0.60),
                Vec3::new(0.45, 0.68, 0.92),
                Vec3::new(0.72, 0.58, 0.90),
                Vec3::new(0.94, 0.92, 0.88),
            ],
            ColorMode::Dark => [
                Vec3::new(1.00, 0.30, 0.45),
                Vec3::new(1.00, 0.72, 0.20),
                Vec3::new(0.20, 0.95, 0.60),
                Vec3::new(0.20, 0.70, 1.00),
                Vec3::new(0.65, 0.35, 1.00),
                Vec3::new(0.30, 0.30, 0.36),
            ],
        }
    }

    pub fn palette_color(&self, index: usize) -> Vec3 {
        self.palette()[index % PALETTE_SIZE]
    }
}

/// Wave field tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveConfig {
    /// Noise contribution to height
    pub amplitude: f32,
    /// Length of a theme ripple (seconds)
    pub transition_duration: f32,
    /// Ripples lift blocks as well as recolor them
    pub ripple_heights: bool,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            amplitude: 8.0,
            transition_duration: 2.0,
            ripple_heights: true,
        }
    }
}

/// Per-frame inputs from the scene
#[derive(Debug, Clone, Copy)]
pub struct WaveInputs {
    /// Seconds since the scene started
    pub elapsed: f32,
    /// Pointer projected onto the ground plane
    pub pointer: Option<Vec2>,
    /// Ground point under the screen center, where ripples start
    pub ripple_origin: Vec2,
    /// Distance from `ripple_origin` to the farthest zone corner
    pub ripple_reach: f32,
}

/// Current bottom/top colors of one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockColors {
    pub bottom: Vec3,
    pub top: Vec3,
}

/// Pulse strengths for one block at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RipplePulse {
    pub primary: f32,
    pub echo: f32,
}

#[derive(Debug, Clone, Copy)]
struct ThemeTransition {
    start: f32,
}

/// Asymmetric height easing: slow rise, faster fall
#[inline]
pub fn ease_height(height: f32, target: f32) -> f32 {
    let rate = if target >= height { RISE_RATE } else { FALL_RATE };
    lerp(height, target, rate).max(0.0)
}

pub struct WaveField {
    config: WaveConfig,
    noise: FastNoiseLite,
    mode: ColorMode,
    transition: Option<ThemeTransition>,
    colors: Vec<BlockColors>,
    frozen: bool,
}

impl WaveField {
    pub fn new(config: WaveConfig, seed: i32, mode: ColorMode, blocks: &[BlockEntity]) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(1.0));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(2));
        noise.set_fractal_gain(Some(0.5));
        noise.set_fractal_lacunarity(Some(2.0));

        let colors = blocks
            .iter()
            .map(|b| BlockColors {
                bottom: mode.base_color(),
                top: mode.palette_color(b.top_color_index),
            })
            .collect();

        Self {
            config,
            noise,
            mode,
            transition: None,
            colors,
            frozen: false,
        }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stop (or resume) wave recomputation for every block
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn colors(&self, index: usize) -> Option<BlockColors> {
        self.colors.get(index).copied()
    }

    pub fn in_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Switch theme, launching a ripple at `elapsed`. Returns false when the
    /// mode is already active.
    pub fn set_color_mode(&mut self, mode: ColorMode, elapsed: f32) -> bool {
        if mode == self.mode {
            return false;
        }
        self.mode = mode;
        self.transition = Some(ThemeTransition { start: elapsed });
        true
    }

    /// Coherent noise in [0, 1]
    pub fn noise_at(&self, x: f32, y: f32) -> f32 {
        let raw = self.noise.get_noise_2d(x, y);
        ((raw + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Resting target height before any ripple
    pub fn target_height(&self, block: &BlockEntity, progress: f32, inputs: &WaveInputs) -> f32 {
        let c_factor = inputs
            .pointer
            .map(|p| (1.0 - p.distance(block.center) * POINTER_FALLOFF).clamp(0.0, 1.0))
            .unwrap_or(0.0);
        let min = block.grid_box.min.as_vec2();
        let noise = self.noise_at(min.x * NOISE_X_SCALE, min.y + inputs.elapsed * NOISE_TIME_SCALE);
        let highlight = if block.highlighted { HIGHLIGHT_BOOST } else { 0.0 };

        noise * self.config.amplitude
            + BASE_HEIGHT
            + c_factor * POINTER_BOOST
            + progress * PROGRESS_BOOST
            + highlight
    }

    /// Normalized transition time, None when no ripple is running
    pub fn transition_time(&self, elapsed: f32) -> Option<f32> {
        let transition = self.transition?;
        let duration = self.config.transition_duration.max(f32::EPSILON);
        let t = ((elapsed - transition.start) / duration).clamp(0.0, 1.0);
        (t < 1.0).then_some(t)
    }

    /// Pulse strengths at normalized radial distance `from0`
    pub fn ripple_at(&self, elapsed: f32, from0: f32) -> Option<RipplePulse> {
        let t = self.transition_time(elapsed)?;
        let start = self.transition?.start;
        let duration = self.config.transition_duration.max(f32::EPSILON);
        let echo_t = ((elapsed - start - ECHO_DELAY) / duration).clamp(0.0, 1.0);

        Some(RipplePulse {
            primary: cubic_pulse(gain(t, RIPPLE_GAIN).powf(RIPPLE_EXPONENT), RIPPLE_WIDTH, from0),
            echo: cubic_pulse(gain(echo_t, ECHO_GAIN), ECHO_WIDTH, from0),
        })
    }

    /// Advance every block one frame
    pub fn update(&mut self, blocks: &mut [BlockEntity], roster: &ContestantRoster, inputs: &WaveInputs) {
        if self.colors.len() != blocks.len() {
            self.colors.resize(
                blocks.len(),
                BlockColors {
                    bottom: self.mode.base_color(),
                    top: self.mode.palette_color(0),
                },
            );
        }

        if self.frozen {
            for block in blocks.iter_mut() {
                let next = ease_height(block.height, block.target_height);
                block.height_velocity = next - block.height;
                block.height = next;
            }
            return;
        }

        let rippling = self.transition_time(inputs.elapsed).is_some();
        if !rippling && self.transition.take().is_some() {
            // Ripple finished: settle every block on the new theme
            for (block, colors) in blocks.iter().zip(self.colors.iter_mut()) {
                colors.bottom = self.mode.base_color();
                colors.top = self.mode.palette_color(block.top_color_index);
            }
        }

        let reach = inputs.ripple_reach.max(f32::EPSILON);
        let base = self.mode.base_color();
        for (i, block) in blocks.iter_mut().enumerate() {
            let progress = roster.progress_of(block.contestant);
            let mut target = self.target_height(block, progress, inputs);

            if rippling {
                let from0 = (block.center.distance(inputs.ripple_origin) / reach).clamp(0.0, 1.0);
                if let Some(pulse) = self.ripple_at(inputs.elapsed, from0) {
                    if self.config.ripple_heights {
                        target += pulse.primary * RIPPLE_AMPLITUDE + pulse.echo * ECHO_AMPLITUDE;
                    }
                    let colors = &mut self.colors[i];
                    colors.bottom = colors.bottom.lerp(base, pulse.primary);
                    colors.top = colors
                        .top
                        .lerp(self.mode.palette_color(block.top_color_index), pulse.echo);
                }
            }

            let next = ease_height(block.height, target);
            block.height_velocity = next - block.height;
            block.height = next;
            block.target_height = target;
        }
    }

    /// Drop per-block colors and any running ripple
    pub fn clear(&mut self) {
        self.colors.clear();
        self.transition = None;
        self.frozen = false;
    }

    /// Snap every block to the resting height
    pub fn reset_heights(&self, blocks: &mut [BlockEntity]) {
        for block in blocks.iter_mut() {
            block.height = BASE_HEIGHT;
            block.height_velocity = 0.0;
            block.target_height = BASE_HEIGHT;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::block::{BlockId, GridBox, TopShape};
    use glam::IVec2;
    use proptest::prelude::*;

    fn blocks(n: i32) -> Vec<BlockEntity> {
        let zone = IVec2::new(n, 1);
        (0..n)
            .map(|i| {
                BlockEntity::new(
                    BlockId(i as u32 + 1),
                    GridBox::new(IVec2::new(i, 0), IVec2::new(i + 1, 1)),
                    TopShape::Flat,
                    zone,
                )
            })
            .collect()
    }

    fn inputs(elapsed: f32) -> WaveInputs {
        WaveInputs {
            elapsed,
            pointer: None,
            ripple_origin: Vec2::ZERO,
            ripple_reach: 10.0,
        }
    }

    #[test]
    fn test_asymmetric_easing() {
        let up = ease_height(1.0, 11.0);
        let down = ease_height(11.0, 1.0);
        assert!((up - 2.0).abs() < 1e-5);
        assert!((down - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_target_height_bounds() {
        let blocks = blocks(4);
        let field = WaveField::new(WaveConfig::default(), 1, ColorMode::Light, &blocks);
        for t in [0.0, 0.7, 3.1, 40.0] {
            let h = field.target_height(&blocks[0], 0.0, &inputs(t));
            assert!((1.0..=9.0 + 1e-4).contains(&h), "height {h} out of range");
        }
    }

    #[test]
    fn test_pointer_and_highlight_boost() {
        let mut blocks = blocks(1);
        let field = WaveField::new(WaveConfig::default(), 1, ColorMode::Light, &blocks);
        let mut with_pointer = inputs(0.5);
        let plain = field.target_height(&blocks[0], 0.0, &with_pointer);
        with_pointer.pointer = Some(blocks[0].center);
        let near = field.target_height(&blocks[0], 0.0, &with_pointer);
        assert!((near - plain - POINTER_BOOST).abs() < 1e-4);

        blocks[0].highlighted = true;
        let lit = field.target_height(&blocks[0], 1.0, &inputs(0.5));
        assert!((lit - plain - HIGHLIGHT_BOOST - PROGRESS_BOOST).abs() < 1e-4);
    }

    #[test]
    fn test_pointer_falloff_radius() {
        let blocks = blocks(1);
        let field = WaveField::new(WaveConfig::default(), 1, ColorMode::Light, &blocks);
        let mut far = inputs(0.0);
        far.pointer = Some(blocks[0].center + Vec2::new(10.0, 0.0));
        let plain = field.target_height(&blocks[0], 0.0, &inputs(0.0));
        assert!((field.target_height(&blocks[0], 0.0, &far) - plain).abs() < 1e-5);
    }

    #[test]
    fn test_color_mode_ripple_lifecycle() {
        let mut blocks = blocks(6);
        let roster = ContestantRoster::default();
        let mut field = WaveField::new(WaveConfig::default(), 3, ColorMode::Light, &blocks);
        assert!(!field.set_color_mode(ColorMode::Light, 0.0));
        assert!(field.set_color_mode(ColorMode::Dark, 1.0));
        assert!(field.transition_time(1.5).is_some());

        let mut t = 1.0;
        while t < 3.5 {
            field.update(&mut blocks, &roster, &inputs(t));
            t += 1.0 / 60.0;
        }
        assert!(!field.in_transition());
        let colors = field.colors(0).unwrap();
        assert_eq!(colors.bottom, ColorMode::Dark.base_color());
        assert_eq!(colors.top, ColorMode::Dark.palette_color(blocks[0].top_color_index));
    }

    #[test]
    fn test_ripple_pulse_center() {
        let blocks = blocks(1);
        let mut field = WaveField::new(WaveConfig::default(), 3, ColorMode::Light, &blocks);
        field.set_color_mode(ColorMode::Dark, 0.0);
        // At the midpoint gain() is 0.5 and the pulse sits near from0 = 0.5^0.9
        let center = 0.5f32.powf(RIPPLE_EXPONENT);
        let pulse = field.ripple_at(1.0, center).unwrap();
        assert!((pulse.primary - 1.0).abs() < 1e-4);
        assert_eq!(field.ripple_at(1.0, 0.0).unwrap().primary, 0.0);
    }

    /// Inputs that put the single block of `blocks(1)` at from0 = 0.5
    fn halfway_inputs(elapsed: f32) -> WaveInputs {
        WaveInputs {
            ripple_origin: Vec2::new(-5.0, 0.0),
            ..inputs(elapsed)
        }
    }

    #[test]
    fn test_echo_peaks_after_primary() {
        let blocks = blocks(1);
        let mut field = WaveField::new(WaveConfig::default(), 3, ColorMode::Light, &blocks);
        field.set_color_mode(ColorMode::Dark, 0.0);

        let mut primary_peak = (0.0, 0.0f32);
        let mut echo_peak = (0.0, 0.0f32);
        for i in 0..480 {
            let t = i as f32 / 240.0;
            let Some(pulse) = field.ripple_at(t, 0.5) else {
                break;
            };
            if pulse.primary > primary_peak.1 {
                primary_peak = (t, pulse.primary);
            }
            if pulse.echo > echo_peak.1 {
                echo_peak = (t, pulse.echo);
            }
        }
        assert!(primary_peak.1 > 0.9);
        assert!(echo_peak.1 > 0.9);
        assert!(echo_peak.0 - primary_peak.0 > ECHO_DELAY * 0.5, "{primary_peak:?} vs {echo_peak:?}");
    }

    #[test]
    fn test_top_color_trails_bottom() {
        let mut blocks = blocks(1);
        let roster = ContestantRoster::default();
        let mut field = WaveField::new(WaveConfig::default(), 3, ColorMode::Light, &blocks);
        let start = field.colors(0).unwrap();
        field.set_color_mode(ColorMode::Dark, 0.0);

        let mut t = 0.0;
        loop {
            let pulse = field.ripple_at(t, 0.5).unwrap();
            field.update(&mut blocks, &roster, &halfway_inputs(t));
            if pulse.primary > 0.5 {
                assert_eq!(pulse.echo, 0.0);
                break;
            }
            t += 1.0 / 60.0;
            assert!(t < 2.0, "primary pulse never reached the block");
        }

        let colors = field.colors(0).unwrap();
        let dark = ColorMode::Dark.base_color();
        assert!(colors.bottom.distance(dark) < start.bottom.distance(dark));
        assert_eq!(colors.top, start.top);
    }

    #[test]
    fn test_reduced_motion_skips_ripple_heights() {
        let mut full_blocks = blocks(1);
        let mut calm_blocks = blocks(1);
        let roster = ContestantRoster::default();
        let calm_config = WaveConfig {
            ripple_heights: false,
            ..WaveConfig::default()
        };
        let mut full = WaveField::new(WaveConfig::default(), 3, ColorMode::Light, &full_blocks);
        let mut calm = WaveField::new(calm_config, 3, ColorMode::Light, &calm_blocks);
        full.set_color_mode(ColorMode::Dark, 0.0);
        calm.set_color_mode(ColorMode::Dark, 0.0);

        let mut t = 0.0;
        let pulse = loop {
            let pulse = full.ripple_at(t, 0.5).unwrap();
            full.update(&mut full_blocks, &roster, &halfway_inputs(t));
            calm.update(&mut calm_blocks, &roster, &halfway_inputs(t));
            if pulse.primary > 0.5 {
                break pulse;
            }
            t += 1.0 / 60.0;
            assert!(t < 2.0, "primary pulse never reached the block");
        };

        let resting = calm.target_height(&calm_blocks[0], 0.0, &halfway_inputs(t));
        assert!((calm_blocks[0].target_height - resting).abs() < 1e-5);
        let boost = pulse.primary * RIPPLE_AMPLITUDE + pulse.echo * ECHO_AMPLITUDE;
        assert!((full_blocks[0].target_height - resting - boost).abs() < 1e-3);
        assert_eq!(full.colors(0), calm.colors(0));
    }

    #[test]
    fn test_clear_drops_colors() {
        let blocks = blocks(3);
        let mut field = WaveField::new(WaveConfig::default(), 3, ColorMode::Light, &blocks);
        field.set_color_mode(ColorMode::Dark, 0.0);
        field.set_frozen(true);
        field.clear();
        assert!(field.colors(0).is_none());
        assert!(!field.in_transition());
        assert!(!field.is_frozen());
    }

    #[test]
    fn test_frozen_eases_to_targets() {
        let mut blocks = blocks(2);
        let roster = ContestantRoster::default();
        let mut field = WaveField::new(WaveConfig::default(), 3, ColorMode::Light, &blocks);
        field.reset_heights(&mut blocks);
        blocks[1].target_height = FILTERED_HEIGHT;
        field.set_frozen(true);
        for i in 0..120 {
            field.update(&mut blocks, &roster, &inputs(i as f32 * 0.016));
        }
        assert_eq!(blocks[0].height, BASE_HEIGHT);
        assert!((blocks[1].height - FILTERED_HEIGHT).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_height_never_negative(seed in any::<i32>(), steps in 1usize..200, px in -20.0f32..20.0, pz in -20.0f32..20.0) {
            let mut blocks = blocks(5);
            let roster = ContestantRoster::default();
            let mut field = WaveField::new(WaveConfig::default(), seed, ColorMode::Light, &blocks);
            field.set_color_mode(ColorMode::Dark, 0.2);
            for i in 0..steps {
                let mut input = inputs(i as f32 * 0.05);
                input.pointer = Some(Vec2::new(px, pz));
                field.update(&mut blocks, &roster, &input);
                for b in &blocks {
                    prop_assert!(b.height >= 0.0);
                }
            }
        }
    }
}
