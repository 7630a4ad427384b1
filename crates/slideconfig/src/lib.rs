use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitySetting {
    Low,
    Medium,
    #[default]
    High,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SliderConfig {
    pub version: u32,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub slides: Vec<SlideEntry>,
    #[serde(default)]
    pub navigation: Navigation,
    #[serde(default)]
    pub effects: Effects,
    #[serde(default)]
    pub quality: Quality,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlideEntry {
    pub image: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Navigation {
    #[serde(default)]
    pub initial_index: usize,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub autoplay: Option<Duration>,
    #[serde(default = "default_true")]
    pub drag: bool,
    #[serde(default = "default_true")]
    pub keyboard: bool,
    /// Fraction of the viewport width a drag must cover to change slides.
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f32,
    #[serde(
        default = "default_transition",
        deserialize_with = "deserialize_duration"
    )]
    pub transition: Duration,
}

impl Default for Navigation {
    fn default() -> Self {
        Self {
            initial_index: 0,
            autoplay: None,
            drag: true,
            keyboard: true,
            swipe_threshold: default_swipe_threshold(),
            transition: default_transition(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Effects {
    #[serde(default)]
    pub displacement_map: Option<String>,
    #[serde(default)]
    pub cursor_map: Option<String>,
    #[serde(default = "default_displacement_scale")]
    pub displacement_scale: f32,
    #[serde(default)]
    pub cursor_scale: Option<f32>,
    /// Horizontal channel offset for the RGB split filter; `None` disables it.
    #[serde(default)]
    pub rgb_split: Option<f32>,
    #[serde(default = "default_throttle", deserialize_with = "deserialize_duration")]
    pub throttle: Duration,
    #[serde(
        default = "default_idle_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub idle_timeout: Duration,
    #[serde(
        default = "default_resize_debounce",
        deserialize_with = "deserialize_duration"
    )]
    pub resize_debounce: Duration,
    #[serde(
        default = "default_pointer_ease",
        deserialize_with = "deserialize_duration"
    )]
    pub pointer_ease: Duration,
    #[serde(default)]
    pub tilt: Tilt,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            displacement_map: None,
            cursor_map: None,
            displacement_scale: default_displacement_scale(),
            cursor_scale: None,
            rgb_split: None,
            throttle: default_throttle(),
            idle_timeout: default_idle_timeout(),
            resize_debounce: default_resize_debounce(),
            pointer_ease: default_pointer_ease(),
            tilt: Tilt::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tilt {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_container_shift")]
    pub container_shift: f32,
    #[serde(default = "default_title_shift")]
    pub title_shift: f32,
    #[serde(default = "default_subtitle_shift")]
    pub subtitle_shift: f32,
    #[serde(
        default = "default_tilt_reset",
        deserialize_with = "deserialize_duration"
    )]
    pub reset_after: Duration,
}

impl Default for Tilt {
    fn default() -> Self {
        Self {
            enabled: true,
            container_shift: default_container_shift(),
            title_shift: default_title_shift(),
            subtitle_shift: default_subtitle_shift(),
            reset_after: default_tilt_reset(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Quality {
    #[serde(default)]
    pub default: QualitySetting,
    #[serde(
        default = "default_sample_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub sample_interval: Duration,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_fps_floor")]
    pub fps_floor: f32,
    #[serde(default = "default_fps_ceiling")]
    pub fps_ceiling: f32,
    #[serde(default)]
    pub memory_ceiling_mb: Option<f32>,
}

impl Default for Quality {
    fn default() -> Self {
        Self {
            default: QualitySetting::default(),
            sample_interval: default_sample_interval(),
            samples: default_samples(),
            fps_floor: default_fps_floor(),
            fps_ceiling: default_fps_ceiling(),
            memory_ceiling_mb: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_width() -> f32 {
    1280.0
}

fn default_height() -> f32 {
    720.0
}

fn default_swipe_threshold() -> f32 {
    0.2
}

fn default_transition() -> Duration {
    Duration::from_secs_f32(1.0)
}

fn default_displacement_scale() -> f32 {
    40.0
}

fn default_throttle() -> Duration {
    Duration::from_millis(16)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_resize_debounce() -> Duration {
    Duration::from_millis(100)
}

fn default_pointer_ease() -> Duration {
    Duration::from_millis(600)
}

fn default_container_shift() -> f32 {
    20.0
}

fn default_title_shift() -> f32 {
    12.0
}

fn default_subtitle_shift() -> f32 {
    8.0
}

fn default_tilt_reset() -> Duration {
    Duration::from_millis(1500)
}

fn default_sample_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_samples() -> usize {
    5
}

fn default_fps_floor() -> f32 {
    30.0
}

fn default_fps_ceiling() -> f32 {
    50.0
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer)?
        .ok_or_else(|| de::Error::custom("duration must not be empty"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl SliderConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SliderConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn image_urls(&self) -> Vec<String> {
        self.slides.iter().map(|slide| slide.image.clone()).collect()
    }

    /// True when at least one slide carries a title or subtitle.
    pub fn has_captions(&self) -> bool {
        self.slides
            .iter()
            .any(|slide| slide.title.is_some() || slide.subtitle.is_some())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.slides.is_empty() {
            return Err(ConfigError::Invalid(
                "config must define at least one slide".into(),
            ));
        }

        for (index, slide) in self.slides.iter().enumerate() {
            if slide.image.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "slide {index} has an empty image path"
                )));
            }
        }

        if !(self.viewport.width > 0.0 && self.viewport.height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "viewport must be positive, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }

        let nav = &self.navigation;
        if nav.initial_index >= self.slides.len() {
            return Err(ConfigError::Invalid(format!(
                "navigation.initial_index {} is out of range for {} slides",
                nav.initial_index,
                self.slides.len()
            )));
        }
        if !(nav.swipe_threshold > 0.0 && nav.swipe_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "navigation.swipe_threshold must be within (0, 1), got {}",
                nav.swipe_threshold
            )));
        }
        if nav.transition.is_zero() {
            return Err(ConfigError::Invalid(
                "navigation.transition must be greater than zero".into(),
            ));
        }
        if let Some(autoplay) = nav.autoplay {
            if autoplay <= nav.transition {
                return Err(ConfigError::Invalid(format!(
                    "navigation.autoplay ({autoplay:?}) must be longer than the transition ({:?})",
                    nav.transition
                )));
            }
        }

        let fx = &self.effects;
        if fx.displacement_scale < 0.0 {
            return Err(ConfigError::Invalid(
                "effects.displacement_scale must be >= 0".into(),
            ));
        }
        if let Some(scale) = fx.cursor_scale {
            if scale < 0.0 {
                return Err(ConfigError::Invalid(
                    "effects.cursor_scale must be >= 0".into(),
                ));
            }
        }
        if fx.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "effects.idle_timeout must be greater than zero".into(),
            ));
        }
        if fx.tilt.reset_after.is_zero() {
            return Err(ConfigError::Invalid(
                "effects.tilt.reset_after must be greater than zero".into(),
            ));
        }

        let quality = &self.quality;
        if quality.samples == 0 {
            return Err(ConfigError::Invalid("quality.samples must be >= 1".into()));
        }
        if quality.sample_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "quality.sample_interval must be greater than zero".into(),
            ));
        }
        if quality.fps_floor >= quality.fps_ceiling {
            return Err(ConfigError::Invalid(format!(
                "quality.fps_floor ({}) must be below quality.fps_ceiling ({})",
                quality.fps_floor, quality.fps_ceiling
            )));
        }

        Ok(())
    }
}
