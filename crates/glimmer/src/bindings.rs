use std::path::{Path, PathBuf};

use carousel::{QualityLevel, QualitySettings, Size, SlideSource, SliderProps, TiltProps};
use slideconfig::{QualitySetting, SliderConfig};

/// Where relative image paths in a config are looked up.
#[derive(Debug, Clone, Default)]
pub struct AssetRoots {
    /// Directory of the config file itself; always tried first.
    pub base: Option<PathBuf>,
    pub fallbacks: Vec<PathBuf>,
}

impl AssetRoots {
    pub fn resolve(&self, reference: &str) -> String {
        if reference.contains("://") || Path::new(reference).is_absolute() {
            return reference.to_string();
        }
        let candidates: Vec<PathBuf> = self
            .base
            .iter()
            .chain(&self.fallbacks)
            .map(|root| root.join(reference))
            .collect();
        match candidates.iter().find(|path| path.exists()) {
            Some(found) => found.display().to_string(),
            None => {
                tracing::warn!(image = reference, "image not found under any root");
                candidates
                    .first()
                    .map_or_else(|| reference.to_string(), |path| path.display().to_string())
            }
        }
    }
}

pub fn map_quality(setting: QualitySetting) -> QualityLevel {
    match setting {
        QualitySetting::Low => QualityLevel::Low,
        QualitySetting::Medium => QualityLevel::Medium,
        QualitySetting::High => QualityLevel::High,
    }
}

pub fn slider_props(config: &SliderConfig, roots: &AssetRoots) -> SliderProps {
    let slides = config
        .slides
        .iter()
        .map(|slide| SlideSource {
            image: roots.resolve(&slide.image),
            title: slide.title.clone(),
            subtitle: slide.subtitle.clone(),
        })
        .collect();

    let mut props = SliderProps::new(slides);
    props.viewport = Size::new(config.viewport.width, config.viewport.height);

    let nav = &config.navigation;
    props.initial_index = nav.initial_index;
    props.autoplay = nav.autoplay;
    props.drag = nav.drag;
    props.keyboard = nav.keyboard;
    props.swipe_threshold = nav.swipe_threshold;
    props.transition = nav.transition;

    let effects = &config.effects;
    props.displacement_map = effects.displacement_map.as_deref().map(|url| roots.resolve(url));
    props.cursor_map = effects.cursor_map.as_deref().map(|url| roots.resolve(url));
    props.displacement_scale = effects.displacement_scale;
    props.cursor_scale = effects.cursor_scale;
    props.rgb_split = effects.rgb_split;
    props.throttle = effects.throttle;
    props.idle_timeout = effects.idle_timeout;
    props.resize_debounce = effects.resize_debounce;
    props.pointer_ease = effects.pointer_ease;
    props.tilt = TiltProps {
        enabled: effects.tilt.enabled,
        container_shift: effects.tilt.container_shift,
        title_shift: effects.tilt.title_shift,
        subtitle_shift: effects.tilt.subtitle_shift,
        reset_after: effects.tilt.reset_after,
    };

    let quality = &config.quality;
    props.quality = QualitySettings {
        default: map_quality(quality.default),
        sample_interval: quality.sample_interval,
        samples: quality.samples,
        fps_floor: quality.fps_floor,
        fps_ceiling: quality.fps_ceiling,
        memory_ceiling_mb: quality.memory_ceiling_mb,
    };
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
version = 1

[viewport]
width = 1024
height = 768

[[slides]]
image = "mem://1600x900/a"
title = "First"

[[slides]]
image = "b.png"

[navigation]
autoplay = "4s"
keyboard = false

[effects]
displacement_map = "maps/clouds.png"
cursor_scale = 15.0

[quality]
default = "medium"
samples = 3
"#;

    #[test]
    fn config_maps_onto_props() {
        let config = SliderConfig::from_toml_str(CONFIG).unwrap();
        let props = slider_props(&config, &AssetRoots::default());

        assert_eq!(props.viewport, Size::new(1024.0, 768.0));
        assert_eq!(props.slides.len(), 2);
        assert_eq!(props.slides[0].title.as_deref(), Some("First"));
        assert_eq!(props.autoplay, Some(Duration::from_secs(4)));
        assert!(!props.keyboard);
        assert!(props.drag);
        assert_eq!(props.cursor_scale, Some(15.0));
        assert_eq!(props.quality.default, QualityLevel::Medium);
        assert_eq!(props.quality.samples, 3);
        assert!(props.has_texts());
    }

    #[test]
    fn relative_images_resolve_against_existing_roots() {
        let root = TempDir::new().unwrap();
        let base = root.path().join("config");
        let images = root.path().join("images");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("b.png"), b"not decoded here").unwrap();

        let roots = AssetRoots {
            base: Some(base.clone()),
            fallbacks: vec![images.clone()],
        };
        assert_eq!(roots.resolve("b.png"), images.join("b.png").display().to_string());
        assert_eq!(roots.resolve("c.png"), base.join("c.png").display().to_string());
        assert_eq!(roots.resolve("mem://10x10/x"), "mem://10x10/x");
    }

    #[test]
    fn quality_settings_map_one_to_one() {
        assert_eq!(map_quality(QualitySetting::Low), QualityLevel::Low);
        assert_eq!(map_quality(QualitySetting::High), QualityLevel::High);
    }
}
