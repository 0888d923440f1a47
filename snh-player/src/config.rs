//! Player configuration
//!
//! One TOML document carries the shared sections (`[repository]`,
//! `[logging]`) plus the player's own: `[viewport]`, `[cascata]` and
//! `[remix]`. The two engine presets are independent; neither derives its
//! constants from the other.
//!
//! Every field has a compiled default, so a partial file (or no file at all)
//! yields a complete configuration. [`PlayerConfig::validate`] rejects
//! presets whose ranges are inverted or whose intervals are not positive.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use snh_common::config::{ConfigResolver, LoggingConfig, RepositoryConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Complete player configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub repository: RepositoryConfig,
    pub logging: LoggingConfig,
    pub viewport: ViewportConfig,
    pub cascata: CascataPreset,
    pub remix: RemixPreset,
}

impl PlayerConfig {
    /// Resolve the config file (CLI → `SNH_CONFIG` → user dir), load and validate
    pub fn load(cli_path: Option<PathBuf>) -> Result<Self> {
        let config: PlayerConfig = ConfigResolver::new(cli_path).load()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PlayerConfig = snh_common::config::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.viewport.validate()?;
        self.cascata.validate()?;
        self.remix.validate()
    }
}

/// Inclusive `[min, max]` range of seconds, fractions or rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Uniform draw in `[min, max)`; a degenerate range returns `min`
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.min + rng.gen::<f64>() * (self.max - self.min)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(&self, name: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(Error::InvalidConfig(format!(
                "{}: range [{}, {}] is not ordered",
                name, self.min, self.max
            )));
        }
        Ok(())
    }

    fn check_positive(&self, name: &str) -> Result<()> {
        self.check(name)?;
        if self.min <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{}: lower bound must be positive",
                name
            )));
        }
        Ok(())
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "{} must be positive (got {})",
            name, value
        )));
    }
    Ok(())
}

/// Canvas sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Fraction of the viewport used by the 16:9 canvas when windowed
    pub fraction: f64,
    /// Start in fullscreen (canvas = whole viewport)
    pub fullscreen: bool,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            fraction: 0.85,
            fullscreen: false,
        }
    }
}

impl ViewportConfig {
    fn validate(&self) -> Result<()> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "viewport.fraction must be in (0, 1] (got {})",
                self.fraction
            )));
        }
        Ok(())
    }
}

/// Scale, margin and crop bounds for overlay placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayBounds {
    /// Target size as a fraction of the canvas' major side
    pub scale: Range,
    /// Margin kept free on every side, as a fraction of each canvas side
    pub margin: f64,
    /// Fraction of each source dimension kept by the crop
    pub crop: Range,
}

impl Default for OverlayBounds {
    fn default() -> Self {
        Self {
            scale: Range::new(0.10, 0.65),
            margin: 0.05,
            crop: Range::new(0.5, 1.0),
        }
    }
}

impl OverlayBounds {
    fn validate(&self, name: &str) -> Result<()> {
        self.scale.check_positive(&format!("{}.scale", name))?;
        self.crop.check_positive(&format!("{}.crop", name))?;
        if self.crop.max > 1.0 {
            return Err(Error::InvalidConfig(format!(
                "{}.crop must not exceed 1.0",
                name
            )));
        }
        if !(0.0..0.5).contains(&self.margin) {
            return Err(Error::InvalidConfig(format!(
                "{}.margin must be in [0, 0.5)",
                name
            )));
        }
        Ok(())
    }
}

/// Where a channel enters: a fraction of the score duration or fixed seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    Fraction(f64),
    Seconds(f64),
}

impl EntryPoint {
    /// Entry time in seconds for a score of `duration` seconds
    pub fn resolve(&self, duration: f64) -> f64 {
        match *self {
            EntryPoint::Fraction(f) => duration * f,
            EntryPoint::Seconds(s) => s,
        }
    }
}

/// Visual channel type in the staggered schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    Image,
    Video,
}

/// One visual channel slot in the schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualSlot {
    pub kind: VisualKind,
    /// Entry as a fraction of the duration
    pub at: f64,
}

/// Gain envelope of one audio channel group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioGroupPreset {
    /// One channel per entry point
    pub entries: Vec<EntryPoint>,
    /// Clips drawn for each channel's chain pool
    pub per_channel: usize,
    /// Target gain after fade-in
    pub gain: f32,
    pub fade_in: f64,
    pub fade_out: f64,
    /// Fade-out ends this many seconds before the hard cut
    pub end_offset: f64,
}

impl AudioGroupPreset {
    pub fn ambient() -> Self {
        Self {
            entries: vec![
                EntryPoint::Seconds(1.0),
                EntryPoint::Fraction(0.12),
                EntryPoint::Fraction(0.25),
                EntryPoint::Fraction(0.40),
                EntryPoint::Fraction(0.58),
            ],
            per_channel: 2,
            gain: 1.0,
            fade_in: 2.0,
            fade_out: 2.0,
            end_offset: 0.0,
        }
    }

    pub fn spectral() -> Self {
        Self {
            entries: vec![
                EntryPoint::Seconds(5.0),
                EntryPoint::Seconds(12.0),
                EntryPoint::Seconds(18.0),
            ],
            per_channel: 2,
            gain: 1.5,
            fade_in: 3.0,
            fade_out: 3.0,
            end_offset: 5.0,
        }
    }

    fn validate(&self, name: &str, min_duration: f64) -> Result<()> {
        if self.per_channel == 0 {
            return Err(Error::InvalidConfig(format!(
                "{}.per_channel must be at least 1",
                name
            )));
        }
        check_positive(&format!("{}.fade_in", name), self.fade_in)?;
        check_positive(&format!("{}.fade_out", name), self.fade_out)?;
        if self.end_offset < 0.0 || self.gain < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{}: gain and end_offset must not be negative",
                name
            )));
        }
        for entry in &self.entries {
            let at = entry.resolve(min_duration);
            if !(0.0..min_duration).contains(&at) {
                return Err(Error::InvalidConfig(format!(
                    "{}: entry {:?} falls outside a {}s score",
                    name, entry, min_duration
                )));
            }
        }
        Ok(())
    }
}

impl Default for AudioGroupPreset {
    fn default() -> Self {
        Self::ambient()
    }
}

/// Long-form "cascata" engine constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascataPreset {
    /// Score durations (seconds), one drawn uniformly per session
    pub durations: Vec<f64>,

    /// Stepped acceleration starts at this fraction of the duration
    pub accel_phase: f64,
    /// Seconds per acceleration step
    pub accel_interval: f64,
    /// Playback-rate increase per step
    pub accel_step: f64,

    /// Speed curve exponent `p`
    pub speed_exponent: f64,
    /// Speed curve maximum extra multiplier `M`
    pub speed_max_mult: f64,
    /// Ceiling for video-channel cycling speed
    pub video_speed_cap: f64,

    /// First show phase (seconds at speed 1)
    pub first_show: f64,
    /// Subsequent show phases
    pub show: f64,
    pub gap: Range,
    /// Multiplier applied to the drawn gap per completed cycle (1.0 = none)
    pub gap_decay: f64,

    pub overlay: OverlayBounds,

    /// Images shared by all image channels
    pub shared_images: usize,
    /// Videos shared by all video channels
    pub shared_videos: usize,

    pub visual_schedule: Vec<VisualSlot>,
    pub ambient: AudioGroupPreset,
    pub spectral: AudioGroupPreset,

    /// Per-item preload timeout (seconds)
    pub preload_timeout: f64,

    /// Seconds per loading-pulse phase
    pub pulse_interval: f64,
    /// Grid fade before playback (seconds)
    pub transition_fade: f64,
    /// Backdrop cells on the canvas' minor axis
    pub grid_density: u32,
}

impl Default for CascataPreset {
    fn default() -> Self {
        let slot = |kind, at| VisualSlot { kind, at };
        Self {
            durations: vec![20.0, 22.0, 24.0, 25.0, 26.0],
            accel_phase: 0.74,
            accel_interval: 0.5,
            accel_step: 0.05,
            speed_exponent: 4.0,
            speed_max_mult: 18.0,
            video_speed_cap: 6.0,
            first_show: 4.5,
            show: 2.5,
            gap: Range::new(1.0, 2.5),
            gap_decay: 1.0,
            overlay: OverlayBounds::default(),
            shared_images: 10,
            shared_videos: 4,
            visual_schedule: vec![
                slot(VisualKind::Image, 0.00),
                slot(VisualKind::Video, 0.10),
                slot(VisualKind::Image, 0.20),
                slot(VisualKind::Video, 0.33),
                slot(VisualKind::Image, 0.46),
                slot(VisualKind::Video, 0.58),
                slot(VisualKind::Image, 0.70),
            ],
            ambient: AudioGroupPreset::ambient(),
            spectral: AudioGroupPreset::spectral(),
            preload_timeout: 15.0,
            pulse_interval: 1.5,
            transition_fade: 1.0,
            grid_density: 45,
        }
    }
}

impl CascataPreset {
    pub fn preload_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.preload_timeout)
    }

    /// Shortest configured duration
    pub fn min_duration(&self) -> f64 {
        self.durations.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn validate(&self) -> Result<()> {
        if self.durations.is_empty() {
            return Err(Error::InvalidConfig(
                "cascata.durations must not be empty".to_string(),
            ));
        }
        for d in &self.durations {
            check_positive("cascata.durations", *d)?;
        }
        if !(0.0..=1.0).contains(&self.accel_phase) {
            return Err(Error::InvalidConfig(
                "cascata.accel_phase must be in [0, 1]".to_string(),
            ));
        }
        check_positive("cascata.accel_interval", self.accel_interval)?;
        check_positive("cascata.speed_exponent", self.speed_exponent)?;
        check_positive("cascata.video_speed_cap", self.video_speed_cap)?;
        check_positive("cascata.first_show", self.first_show)?;
        check_positive("cascata.show", self.show)?;
        check_positive("cascata.gap_decay", self.gap_decay)?;
        check_positive("cascata.preload_timeout", self.preload_timeout)?;
        check_positive("cascata.pulse_interval", self.pulse_interval)?;
        check_positive("cascata.transition_fade", self.transition_fade)?;
        if self.speed_max_mult < 0.0 || self.accel_step < 0.0 {
            return Err(Error::InvalidConfig(
                "cascata.speed_max_mult and accel_step must not be negative".to_string(),
            ));
        }
        if self.grid_density == 0 {
            return Err(Error::InvalidConfig(
                "cascata.grid_density must be at least 1".to_string(),
            ));
        }
        self.gap.check_positive("cascata.gap")?;
        self.overlay.validate("cascata.overlay")?;
        for slot in &self.visual_schedule {
            if !(0.0..1.0).contains(&slot.at) {
                return Err(Error::InvalidConfig(format!(
                    "cascata.visual_schedule: entry {} must be in [0, 1)",
                    slot.at
                )));
            }
        }
        let min = self.min_duration();
        self.ambient.validate("cascata.ambient", min)?;
        self.spectral.validate("cascata.spectral", min)
    }
}

/// Continuous "remix" engine constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemixPreset {
    /// Material categories played by the remix
    pub categories: Vec<String>,

    /// Per-clip playback-rate band of the background video
    pub clip_rate: Range,

    /// Ambient slot position (seconds) that triggers the A/B crossfade
    pub crossfade_at: f64,
    pub crossfade_duration: f64,

    pub spectral_fade: f64,
    /// Wait before each spectral appearance (seconds)
    pub spectral_interval: Range,
    /// Time spent at peak (seconds)
    pub spectral_peak: Range,
    pub spectral_peak_gain: f32,
    /// Ambient layer gain while a spectral voice is up
    pub duck_level: f32,

    /// Chance of an image appearance per check
    pub image_chance: f64,
    pub image_check_interval: f64,
    pub image_show: Range,
    pub image_fade: Range,
    pub image_scale: Range,
    pub image_margin: f64,
    /// Images preloaded for the overlay layer
    pub image_pool: usize,

    /// Seconds after start when stepped acceleration begins (None = off)
    pub accel_start: Option<f64>,
    pub accel_interval: f64,
    pub accel_step: f64,

    pub preload_timeout: f64,
}

impl Default for RemixPreset {
    fn default() -> Self {
        Self {
            categories: vec![
                "sonhos".to_string(),
                "prospeccoes".to_string(),
                "legacy".to_string(),
            ],
            clip_rate: Range::new(0.8, 1.2),
            crossfade_at: 7.0,
            crossfade_duration: 3.0,
            spectral_fade: 5.0,
            spectral_interval: Range::new(30.0, 300.0),
            spectral_peak: Range::new(30.0, 120.0),
            spectral_peak_gain: 1.5,
            duck_level: 0.1,
            image_chance: 0.13,
            image_check_interval: 3.0,
            image_show: Range::new(3.0, 13.0),
            image_fade: Range::new(0.5, 1.5),
            image_scale: Range::new(0.07, 0.70),
            image_margin: 0.07,
            image_pool: 12,
            accel_start: None,
            accel_interval: 0.5,
            accel_step: 0.05,
            preload_timeout: 15.0,
        }
    }
}

impl RemixPreset {
    pub fn preload_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.preload_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        self.clip_rate.check_positive("remix.clip_rate")?;
        check_positive("remix.crossfade_at", self.crossfade_at)?;
        check_positive("remix.crossfade_duration", self.crossfade_duration)?;
        check_positive("remix.spectral_fade", self.spectral_fade)?;
        self.spectral_interval.check("remix.spectral_interval")?;
        self.spectral_peak.check("remix.spectral_peak")?;
        if !(0.0..=1.0).contains(&self.image_chance) {
            return Err(Error::InvalidConfig(
                "remix.image_chance must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.duck_level) {
            return Err(Error::InvalidConfig(
                "remix.duck_level must be in [0, 1]".to_string(),
            ));
        }
        check_positive("remix.image_check_interval", self.image_check_interval)?;
        self.image_show.check("remix.image_show")?;
        self.image_fade.check_positive("remix.image_fade")?;
        self.image_scale.check_positive("remix.image_scale")?;
        if !(0.0..0.5).contains(&self.image_margin) {
            return Err(Error::InvalidConfig(
                "remix.image_margin must be in [0, 0.5)".to_string(),
            ));
        }
        check_positive("remix.accel_interval", self.accel_interval)?;
        check_positive("remix.preload_timeout", self.preload_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        PlayerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_cascata_section() {
        let config = PlayerConfig::from_toml(
            r#"
            [cascata]
            durations = [30.0]
            video_speed_cap = 4.0

            [remix]
            image_chance = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.cascata.durations, vec![30.0]);
        assert_eq!(config.cascata.video_speed_cap, 4.0);
        assert_eq!(config.cascata.accel_phase, 0.74);
        assert_eq!(config.remix.image_chance, 0.5);
        assert_eq!(config.remix.crossfade_at, 7.0);
        assert_eq!(config.viewport.fraction, 0.85);
    }

    #[test]
    fn test_entry_points_in_toml() {
        let config = PlayerConfig::from_toml(
            r#"
            [cascata.spectral]
            entries = [{ seconds = 4.0 }, { fraction = 0.5 }]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.cascata.spectral.entries,
            vec![EntryPoint::Seconds(4.0), EntryPoint::Fraction(0.5)]
        );
        // Untouched fields of the group fall back to the ambient defaults
        assert_eq!(config.cascata.spectral.per_channel, 2);
    }

    #[test]
    fn test_inverted_gap_rejected() {
        let mut preset = CascataPreset::default();
        preset.gap = Range::new(3.0, 1.0);
        assert!(matches!(preset.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_durations_rejected() {
        let mut preset = CascataPreset::default();
        preset.durations.clear();
        assert!(preset.validate().is_err());
    }

    #[test]
    fn test_spectral_entry_beyond_shortest_duration_rejected() {
        let mut preset = CascataPreset::default();
        preset.durations = vec![15.0, 30.0];
        // Default spectral entry at 18s does not fit a 15s score
        assert!(preset.validate().is_err());
    }

    #[test]
    fn test_range_sample_stays_in_bounds() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let range = Range::new(0.8, 1.2);
        for _ in 0..1000 {
            let v = range.sample(&mut rng);
            assert!((0.8..1.2).contains(&v));
        }
        assert_eq!(Range::new(2.0, 2.0).sample(&mut rng), 2.0);
    }

    #[test]
    fn test_remix_bad_chance_rejected() {
        let mut preset = RemixPreset::default();
        preset.image_chance = 1.5;
        assert!(preset.validate().is_err());
    }
}
