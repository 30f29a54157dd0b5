//! Viewer settings and preferences
//!
//! Persisted in LocalStorage on the web; native builds use defaults or JSON.

use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::sim::packer::PackerConfig;
use crate::sim::wave::{ColorMode, WaveConfig};

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Whether the depth-of-field haze is rendered
    pub fn depth_of_field(&self) -> bool {
        match self {
            QualityPreset::Low => false,
            QualityPreset::Medium => true,
            QualityPreset::High => true,
        }
    }

    /// Upper bound on device pixel ratio used for the drawable
    pub fn max_pixel_ratio(&self) -> f32 {
        match self {
            QualityPreset::Low => 1.0,
            QualityPreset::Medium => 1.5,
            QualityPreset::High => 2.0,
        }
    }
}

/// Viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Grid ===
    /// Zone size in cells
    pub zone_width: i32,
    pub zone_height: i32,
    /// Starting maximum block size
    pub max_block_width: i32,
    pub max_block_height: i32,
    /// Probability a block is forced square
    pub square_chance: f32,
    /// Probability per row that the max block size is resampled
    pub resample_chance: f32,
    /// Sizes the max block size is resampled from
    pub resample_sizes: Vec<i32>,
    /// Packing seed; time-based when absent
    pub seed: Option<u64>,

    // === Animation ===
    /// Noise contribution to block height
    pub wave_amplitude: f32,
    /// Theme ripple length (seconds)
    pub transition_duration: f32,
    pub color_mode: ColorMode,

    // === Graphics ===
    pub quality: QualityPreset,

    // === Accessibility ===
    /// Keep ripple recoloring but drop the height pulses
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let packer = PackerConfig::default();
        let wave = WaveConfig::default();
        Self {
            zone_width: 32,
            zone_height: 20,
            max_block_width: packer.max_size.x,
            max_block_height: packer.max_size.y,
            square_chance: packer.square_chance,
            resample_chance: packer.resample_chance,
            resample_sizes: packer.resample_sizes,
            seed: None,

            wave_amplitude: wave.amplitude,
            transition_duration: wave.transition_duration,
            color_mode: ColorMode::Light,

            quality: QualityPreset::Medium,

            reduced_motion: false,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Parse settings, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn zone(&self) -> IVec2 {
        IVec2::new(self.zone_width, self.zone_height)
    }

    pub fn packer_config(&self) -> PackerConfig {
        PackerConfig {
            max_size: IVec2::new(self.max_block_width.max(1), self.max_block_height.max(1)),
            square_chance: self.square_chance.clamp(0.0, 1.0),
            resample_chance: self.resample_chance.clamp(0.0, 1.0),
            resample_sizes: self.resample_sizes.iter().copied().filter(|&s| s > 0).collect(),
            ..PackerConfig::default()
        }
    }

    pub fn wave_config(&self) -> WaveConfig {
        WaveConfig {
            amplitude: self.wave_amplitude.max(0.0),
            transition_duration: self.transition_duration,
            ripple_heights: !self.reduced_motion,
        }
    }

    /// Effective depth of field (off under reduced motion)
    pub fn effective_depth_of_field(&self) -> bool {
        self.quality.depth_of_field() && !self.reduced_motion
    }

    /// Pixel ratio to render at, capped by the quality preset
    pub fn render_pixel_ratio(&self, device_ratio: f32) -> f32 {
        device_ratio.clamp(1.0, self.quality.max_pixel_ratio())
    }

    /// LocalStorage key
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "block_tide_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
        {
            match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
                Err(e) => log::warn!("Ignoring stored settings: {}", e),
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(json) = serde_json::to_string(self)
        {
            let _ = storage.set_item(Self::STORAGE_KEY, &json);
            log::info!("Settings saved");
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_configs() {
        let settings = Settings::default();
        assert_eq!(settings.zone(), IVec2::new(32, 20));
        assert_eq!(settings.packer_config(), PackerConfig::default());
        assert_eq!(settings.wave_config(), WaveConfig::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{"zone_width": 10, "color_mode": "Dark", "seed": 7}"#).unwrap();
        assert_eq!(settings.zone(), IVec2::new(10, 20));
        assert_eq!(settings.color_mode, ColorMode::Dark);
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.quality, QualityPreset::Medium);
    }

    #[test]
    fn test_reduced_motion_drops_ripple_heights() {
        let settings = Settings {
            reduced_motion: true,
            ..Settings::default()
        };
        assert!(!settings.wave_config().ripple_heights);
        assert!(!settings.effective_depth_of_field());
    }

    #[test]
    fn test_pixel_ratio_capped() {
        let settings = Settings::from_preset(QualityPreset::Low);
        assert_eq!(settings.render_pixel_ratio(3.0), 1.0);
        assert_eq!(Settings::from_preset(QualityPreset::High).render_pixel_ratio(1.5), 1.5);
    }

    #[test]
    fn test_quality_from_str() {
        assert_eq!(QualityPreset::from_str("MED"), Some(QualityPreset::Medium));
        assert_eq!(QualityPreset::from_str("ultra"), None);
        for preset in [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High] {
            assert_eq!(QualityPreset::from_str(preset.as_str()), Some(preset));
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_load_uses_defaults() {
        Settings::default().save();
        assert_eq!(Settings::load(), Settings::default());
    }
}
