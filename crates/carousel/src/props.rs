use std::time::Duration;

use crate::quality::QualitySettings;
use crate::types::{Size, TextStyle};

#[derive(Debug, Clone, PartialEq)]
pub struct SlideSource {
    pub image: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

impl SlideSource {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image: url.into(),
            title: None,
            subtitle: None,
        }
    }

    pub fn with_caption(mut self, title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self.subtitle = Some(subtitle.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TiltProps {
    pub enabled: bool,
    pub container_shift: f32,
    pub title_shift: f32,
    pub subtitle_shift: f32,
    /// Inactivity window before text returns to neutral.
    pub reset_after: Duration,
}

impl Default for TiltProps {
    fn default() -> Self {
        Self {
            enabled: true,
            container_shift: 20.0,
            title_shift: 12.0,
            subtitle_shift: 8.0,
            reset_after: Duration::from_millis(1500),
        }
    }
}

/// Immutable parameters shared by every controller of one slider.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderProps {
    pub viewport: Size,
    pub slides: Vec<SlideSource>,
    pub initial_index: usize,
    pub autoplay: Option<Duration>,
    pub drag: bool,
    pub keyboard: bool,
    /// Fraction of the viewport width a drag must cover to navigate.
    pub swipe_threshold: f32,
    pub transition: Duration,
    pub displacement_map: Option<String>,
    pub cursor_map: Option<String>,
    pub displacement_scale: f32,
    /// Enables the cursor displacement filter when set.
    pub cursor_scale: Option<f32>,
    /// Enables the RGB split filter when set.
    pub rgb_split: Option<f32>,
    pub throttle: Duration,
    pub idle_timeout: Duration,
    pub resize_debounce: Duration,
    pub pointer_ease: Duration,
    pub tilt: TiltProps,
    pub quality: QualitySettings,
    pub title_style: TextStyle,
    pub subtitle_style: TextStyle,
}

impl SliderProps {
    pub fn new(slides: Vec<SlideSource>) -> Self {
        Self {
            viewport: Size::new(1280.0, 720.0),
            slides,
            initial_index: 0,
            autoplay: None,
            drag: true,
            keyboard: true,
            swipe_threshold: 0.2,
            transition: Duration::from_secs(1),
            displacement_map: None,
            cursor_map: None,
            displacement_scale: 40.0,
            cursor_scale: None,
            rgb_split: None,
            throttle: Duration::from_millis(16),
            idle_timeout: Duration::from_secs(3),
            resize_debounce: Duration::from_millis(100),
            pointer_ease: Duration::from_millis(600),
            tilt: TiltProps::default(),
            quality: QualitySettings::default(),
            title_style: TextStyle::title(),
            subtitle_style: TextStyle::subtitle(),
        }
    }

    pub fn from_images<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(images.into_iter().map(SlideSource::image).collect())
    }

    pub fn has_texts(&self) -> bool {
        self.slides
            .iter()
            .any(|slide| slide.title.is_some() || slide.subtitle.is_some())
    }

    /// Every URL the slider needs, slides first.
    pub fn asset_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.slides.iter().map(|s| s.image.clone()).collect();
        urls.extend(self.displacement_map.iter().cloned());
        if self.cursor_scale.is_some() {
            urls.extend(self.cursor_map.iter().cloned());
        }
        urls
    }
}
