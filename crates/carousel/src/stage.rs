//! Frame context shared by the slider's controllers.
//!
//! A [`Stage`] owns the engines and every service that mutates them. Update,
//! timer and listener callbacks all receive `&mut Stage`, so controllers
//! never hold references into each other.

use std::rc::Rc;
use std::time::Instant;

use scheduler::RenderScheduler;

use crate::controllers::Controllers;
use crate::coordinator::{AnimationCoordinator, AnimationHost, AnimationParts};
use crate::engine::{AnimationEngine, EngineError, RenderEngine};
use crate::ledger::ResourceLedger;
use crate::props::SliderProps;
use crate::quality::QualityManager;
use crate::textures::TextureCache;
use crate::types::{AppId, FilterId, NodeId, Property, Size, Target};

/// Vertical offsets of caption lines relative to their container.
pub(crate) const TITLE_OFFSET_Y: f32 = -24.0;
pub(crate) const SUBTITLE_OFFSET_Y: f32 = 40.0;

/// Caption nodes for one slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextGroup {
    pub container: NodeId,
    pub title: Option<NodeId>,
    pub subtitle: Option<NodeId>,
}

/// A displacement map sprite and the filter sampling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplacementRig {
    pub sprite: NodeId,
    pub filter: Option<FilterId>,
}

/// Handles created once all assets have settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub root: NodeId,
    pub slide_container: NodeId,
    pub slides: Vec<NodeId>,
    /// Source size per slide; placeholders report the viewport.
    pub texture_sizes: Vec<Size>,
    /// Cover scale per slide for the current viewport.
    pub base_scales: Vec<f32>,
    /// Empty when no slide has a caption, otherwise aligned with `slides`.
    pub texts: Vec<TextGroup>,
    pub displacement: Option<DisplacementRig>,
    pub cursor: Option<DisplacementRig>,
    pub rgb_split: Option<FilterId>,
    pub viewport: Size,
}

impl Scene {
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn text(&self, index: usize) -> Option<&TextGroup> {
        self.texts.get(index)
    }

    pub fn base_scale(&self, index: usize) -> f32 {
        self.base_scales.get(index).copied().unwrap_or(1.0)
    }

    /// Base filters stay attached whenever the slider is mounted.
    pub fn base_filters(&self) -> Vec<FilterId> {
        self.displacement.and_then(|rig| rig.filter).into_iter().collect()
    }

    /// Filters attached only while the pointer is engaged.
    pub fn custom_filters(&self) -> Vec<FilterId> {
        self.cursor
            .and_then(|rig| rig.filter)
            .into_iter()
            .chain(self.rgb_split)
            .collect()
    }
}

/// Flags shared between controllers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliderState {
    pub current_index: usize,
    pub engaged: bool,
    /// Filter scales have been ramped to zero by the idle timer.
    pub filters_idle: bool,
    pub transitioning: bool,
    pub loading: bool,
    pub ready: bool,
    pub fallback: bool,
}

pub struct Stage {
    pub(crate) instance: String,
    pub(crate) render: Box<dyn RenderEngine>,
    pub(crate) tweens: Box<dyn AnimationEngine>,
    pub(crate) ledger: ResourceLedger<Stage>,
    pub(crate) scheduler: RenderScheduler<Stage>,
    pub(crate) coordinator: AnimationCoordinator<Stage>,
    pub(crate) textures: TextureCache,
    pub(crate) quality: QualityManager,
    pub(crate) props: Rc<SliderProps>,
    pub(crate) app: Option<AppId>,
    pub(crate) scene: Option<Scene>,
    pub(crate) state: SliderState,
    pub(crate) controllers: Controllers,
    pub(crate) now: Instant,
}

impl AnimationHost for Stage {
    fn animation_parts(&mut self) -> AnimationParts<'_, Self> {
        AnimationParts {
            coordinator: &mut self.coordinator,
            tweens: self.tweens.as_mut(),
            ledger: &mut self.ledger,
            scheduler: &mut self.scheduler,
        }
    }
}

impl Stage {
    pub(crate) fn new(
        instance: String,
        render: Box<dyn RenderEngine>,
        tweens: Box<dyn AnimationEngine>,
        props: Rc<SliderProps>,
        now: Instant,
    ) -> Self {
        let current_index = props.initial_index.min(props.slides.len().saturating_sub(1));
        Self {
            ledger: ResourceLedger::new(instance.clone()),
            scheduler: RenderScheduler::new(),
            coordinator: AnimationCoordinator::new(format!("{instance}:animations")),
            textures: TextureCache::new(),
            quality: QualityManager::new(props.quality),
            controllers: Controllers::default(),
            state: SliderState {
                current_index,
                ..SliderState::default()
            },
            app: None,
            scene: None,
            instance,
            render,
            tweens,
            props,
            now,
        }
    }

    /// Scheduler and ledger owner key for one controller.
    pub(crate) fn owner(&self, controller: &str) -> String {
        format!("{}:{controller}", self.instance)
    }

    pub(crate) fn active_displacement_scale(&self) -> f32 {
        self.props.displacement_scale * self.quality.level().displacement_factor()
    }

    pub(crate) fn active_cursor_scale(&self) -> f32 {
        self.props.cursor_scale.unwrap_or(0.0) * self.quality.level().displacement_factor()
    }

    /// Filters for the slide container, trimmed to the quality budget.
    pub(crate) fn compose_filters(&self, active: bool) -> Vec<FilterId> {
        let Some(scene) = &self.scene else {
            return Vec::new();
        };
        let mut filters = scene.base_filters();
        if active {
            let budget = self.quality.level().filter_budget();
            let room = budget.saturating_sub(filters.len());
            filters.extend(scene.custom_filters().into_iter().take(room));
        }
        filters
    }

    fn apply_filters(&mut self, active: bool) {
        let filters = self.compose_filters(active);
        let Some(scene) = &self.scene else {
            return;
        };
        if let Err(error) = self.render.set_filters(scene.slide_container, &filters) {
            tracing::warn!(instance = %self.instance, error = %error, "failed to apply filters");
        }
    }

    /// Attaches custom filters and gives the RGB split its configured offset.
    pub(crate) fn activate_filters(&mut self) {
        self.apply_filters(true);
        let split = self.props.rgb_split.unwrap_or(0.0) * self.quality.level().displacement_factor();
        if let Some(filter) = self.scene.as_ref().and_then(|s| s.rgb_split) {
            self.render.set_property(Target::Filter(filter), Property::SplitRed, split);
            self.render.set_property(Target::Filter(filter), Property::SplitBlue, -split);
        }
    }

    /// Canonical inactive state: base filters only, custom filters detached
    /// with their scales at zero.
    pub(crate) fn deactivate_filters(&mut self) {
        self.apply_filters(false);
        let Some(scene) = &self.scene else {
            return;
        };
        for filter in scene.custom_filters() {
            for property in [
                Property::FilterScaleX,
                Property::FilterScaleY,
                Property::SplitRed,
                Property::SplitBlue,
            ] {
                // Each filter kind accepts only its own pair.
                self.render.set_property(Target::Filter(filter), property, 0.0);
            }
        }
    }

    pub(crate) fn slide_count(&self) -> usize {
        self.scene
            .as_ref()
            .map_or(self.props.slides.len(), Scene::len)
    }

    /// Creates the scene graph from settled textures. Missing images fall
    /// back to placeholders and a missing displacement map skips its filter.
    pub(crate) fn build_scene(&mut self, viewport: Size) -> Result<(), EngineError> {
        let app = self
            .app
            .ok_or_else(|| EngineError::Unavailable("no render root".into()))?;
        let root = self
            .render
            .stage(app)
            .ok_or_else(|| EngineError::UnknownHandle(format!("stage of application {}", app.0)))?;
        let props = Rc::clone(&self.props);

        let slide_container = self.create_tracked_container(root)?;
        let mut slides = Vec::with_capacity(props.slides.len());
        let mut texture_sizes = Vec::with_capacity(props.slides.len());
        for (index, source) in props.slides.iter().enumerate() {
            let (node, size) = match self.ledger.texture(&source.image) {
                Some(texture) => {
                    let size = self
                        .render
                        .texture_info(texture)
                        .map_or(viewport, |info| info.size());
                    (self.render.create_sprite(texture)?, size)
                }
                None => {
                    tracing::warn!(index, url = %source.image, "slide image unavailable; using placeholder");
                    (self.render.create_placeholder(viewport)?, viewport)
                }
            };
            self.ledger.track_display_object(self.render.as_mut(), node);
            self.render.add_child(slide_container, node)?;
            self.render.set_anchor(node, 0.5, 0.5);
            let shown = index == self.state.current_index;
            self.render.set_visible(node, shown);
            self.render
                .set_property(Target::Node(node), Property::Alpha, if shown { 1.0 } else { 0.0 });
            slides.push(node);
            texture_sizes.push(size);
        }

        let mut texts = Vec::new();
        if props.has_texts() {
            for (index, source) in props.slides.iter().enumerate() {
                let container = self.create_tracked_container(root)?;
                let title = match &source.title {
                    Some(title) => Some(self.create_tracked_text(container, title, false)?),
                    None => None,
                };
                let subtitle = match &source.subtitle {
                    Some(subtitle) => Some(self.create_tracked_text(container, subtitle, true)?),
                    None => None,
                };
                let shown = index == self.state.current_index;
                self.render.set_visible(container, shown);
                self.render
                    .set_property(Target::Node(container), Property::Alpha, if shown { 1.0 } else { 0.0 });
                texts.push(TextGroup {
                    container,
                    title,
                    subtitle,
                });
            }
        }

        let displacement = match &props.displacement_map {
            Some(url) => self.create_rig(root, url, "displacement"),
            None => None,
        };
        let cursor = match (&props.cursor_map, props.cursor_scale) {
            (Some(url), Some(_)) => self.create_rig(root, url, "cursor"),
            _ => None,
        };
        let rgb_split = match props.rgb_split {
            Some(_) => match self.render.create_rgb_split_filter() {
                Ok(filter) => self.ledger.track_filter(self.render.as_mut(), filter),
                Err(error) => {
                    tracing::warn!(error = %error, "rgb split filter unavailable");
                    None
                }
            },
            None => None,
        };

        self.scene = Some(Scene {
            root,
            slide_container,
            base_scales: vec![1.0; slides.len()],
            slides,
            texture_sizes,
            texts,
            displacement,
            cursor,
            rgb_split,
            viewport,
        });

        let active = self.active_displacement_scale();
        if let Some(filter) = self.scene.as_ref().and_then(|s| s.displacement).and_then(|r| r.filter) {
            self.render.set_property(Target::Filter(filter), Property::FilterScaleX, active);
            self.render.set_property(Target::Filter(filter), Property::FilterScaleY, active);
        }
        self.deactivate_filters();
        Ok(())
    }

    fn create_tracked_container(&mut self, parent: NodeId) -> Result<NodeId, EngineError> {
        let node = self.render.create_container()?;
        self.ledger.track_display_object(self.render.as_mut(), node);
        self.render.add_child(parent, node)?;
        Ok(node)
    }

    fn create_tracked_text(&mut self, parent: NodeId, content: &str, subtitle: bool) -> Result<NodeId, EngineError> {
        let style = if subtitle {
            &self.props.subtitle_style
        } else {
            &self.props.title_style
        };
        let node = self.render.create_text(content, style)?;
        self.ledger.track_display_object(self.render.as_mut(), node);
        self.render.add_child(parent, node)?;
        self.render.set_anchor(node, 0.5, 0.5);
        let offset = if subtitle { SUBTITLE_OFFSET_Y } else { TITLE_OFFSET_Y };
        self.render.set_property(Target::Node(node), Property::Y, offset);
        Ok(node)
    }

    fn create_rig(&mut self, root: NodeId, url: &str, label: &str) -> Option<DisplacementRig> {
        let Some(texture) = self.ledger.texture(url) else {
            tracing::warn!(url, rig = label, "displacement map unavailable; skipping filter");
            return None;
        };
        let sprite = match self.render.create_sprite(texture) {
            Ok(sprite) => sprite,
            Err(error) => {
                tracing::warn!(url, rig = label, error = %error, "failed to create displacement sprite");
                return None;
            }
        };
        self.ledger.track_display_object(self.render.as_mut(), sprite);
        if let Err(error) = self.render.add_child(root, sprite) {
            tracing::warn!(rig = label, error = %error, "failed to attach displacement sprite");
        }
        self.render.set_anchor(sprite, 0.5, 0.5);
        let filter = match self.render.create_displacement_filter(sprite) {
            Ok(filter) => self.ledger.track_filter(self.render.as_mut(), filter),
            Err(error) => {
                tracing::warn!(rig = label, error = %error, "displacement filter unavailable");
                None
            }
        };
        Some(DisplacementRig { sprite, filter })
    }
}
