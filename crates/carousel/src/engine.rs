//! Boundaries to the rendering and animation engines.
//!
//! The slider core never touches pixels or interpolation math itself. It
//! creates, mutates and destroys opaque handles through these traits, which
//! keeps the resource ledger and scheduler testable against the in-memory
//! engines in [`crate::headless`].

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::easing::Easing;
use crate::types::{AppId, FilterId, NodeId, Property, Size, Target, TextStyle, TextureId, TweenId};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum EngineError {
    #[error("unknown or destroyed handle {0}")]
    UnknownHandle(String),
    #[error("asset '{url}' failed to load: {reason}")]
    AssetLoad { url: String, reason: String },
    #[error("render root unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Parameters for creating a render root.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationConfig {
    pub size: Size,
    /// Device pixel ratio the canvas renders at.
    pub resolution: f32,
    pub antialias: bool,
    pub background_alpha: f32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            size: Size::new(1280.0, 720.0),
            resolution: 1.0,
            antialias: true,
            background_alpha: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextureInfo {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl TextureInfo {
    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }
}

/// Completion of an asynchronous asset request.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetEvent {
    Loaded { url: String, texture: TextureInfo },
    Failed { url: String, error: EngineError },
}

impl AssetEvent {
    pub fn url(&self) -> &str {
        match self {
            AssetEvent::Loaded { url, .. } | AssetEvent::Failed { url, .. } => url,
        }
    }
}

/// One reading of the renderer's frame rate and heap usage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PerformanceSample {
    pub fps: f32,
    pub heap_used_mb: Option<f32>,
}

/// Live object counts reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EngineDiagnostics {
    pub applications: usize,
    pub nodes: usize,
    pub filters: usize,
    pub textures: usize,
    /// Destroy calls that targeted an unknown or already destroyed handle.
    pub rejected_destroys: usize,
}

/// Read/write access to animatable properties.
pub trait PropertyAccess {
    fn property(&self, target: Target, property: Property) -> Option<f32>;
    /// Returns `false` when the target no longer exists.
    fn set_property(&mut self, target: Target, property: Property, value: f32) -> bool;
}

/// Scene graph, texture and filter operations of the rendering engine.
pub trait RenderEngine: PropertyAccess {
    fn create_application(&mut self, config: &ApplicationConfig) -> Result<AppId, EngineError>;
    /// Root container of the application's scene graph.
    fn stage(&self, app: AppId) -> Option<NodeId>;
    fn resize(&mut self, app: AppId, size: Size) -> Result<(), EngineError>;
    /// Renderer resolution relative to the device pixel ratio.
    fn set_resolution(&mut self, app: AppId, resolution: f32) -> Result<(), EngineError>;
    fn resolution(&self, app: AppId) -> Option<f32>;
    fn stop_ticker(&mut self, app: AppId);
    /// Removes the canvas from its host element.
    fn detach_view(&mut self, app: AppId);
    fn destroy_application(&mut self, app: AppId) -> Result<(), EngineError>;
    /// Renders one frame; `now` feeds the engine's frame-rate meter.
    fn render_frame(&mut self, app: AppId, now: Instant);
    fn sample_performance(&self, app: AppId) -> PerformanceSample;

    /// Starts an asynchronous load. Completion arrives through
    /// [`poll_assets`](Self::poll_assets), never synchronously.
    fn request_asset(&mut self, url: &str) -> Result<(), EngineError>;
    fn poll_assets(&mut self) -> Vec<AssetEvent>;
    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo>;
    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), EngineError>;

    fn create_sprite(&mut self, texture: TextureId) -> Result<NodeId, EngineError>;
    /// Solid placeholder used when an image failed to load.
    fn create_placeholder(&mut self, size: Size) -> Result<NodeId, EngineError>;
    fn create_container(&mut self) -> Result<NodeId, EngineError>;
    fn create_text(&mut self, content: &str, style: &TextStyle) -> Result<NodeId, EngineError>;
    fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError>;
    fn remove_from_parent(&mut self, node: NodeId);
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn set_visible(&mut self, node: NodeId, visible: bool);
    fn is_visible(&self, node: NodeId) -> Option<bool>;
    fn set_anchor(&mut self, node: NodeId, x: f32, y: f32);
    /// Destroys a single node. Children are detached, not destroyed, and
    /// sprite textures are left alive.
    fn destroy_node(&mut self, node: NodeId) -> Result<(), EngineError>;

    fn create_displacement_filter(&mut self, map: NodeId) -> Result<FilterId, EngineError>;
    fn create_rgb_split_filter(&mut self) -> Result<FilterId, EngineError>;
    fn set_filters(&mut self, node: NodeId, filters: &[FilterId]) -> Result<(), EngineError>;
    fn filters(&self, node: NodeId) -> Vec<FilterId>;
    fn destroy_filter(&mut self, filter: FilterId) -> Result<(), EngineError>;

    fn diagnostics(&self) -> EngineDiagnostics;

    /// The engine as a plain property target for tween stepping.
    fn properties(&mut self) -> &mut dyn PropertyAccess;
}

/// Tween engine: animate properties toward values over time.
pub trait AnimationEngine {
    /// Creates a tween for `properties` on `target`. Start values are read
    /// from the scene when the tween first advances.
    fn animate_to(
        &mut self,
        target: Target,
        properties: &[(Property, f32)],
        duration: Duration,
        easing: Easing,
        paused: bool,
    ) -> TweenId;
    /// Creates an empty timeline that tracks are composed into.
    fn create_timeline(&mut self, paused: bool) -> TweenId;
    /// Adds a track to a timeline starting at offset `at`.
    fn timeline_add(
        &mut self,
        timeline: TweenId,
        target: Target,
        properties: &[(Property, f32)],
        duration: Duration,
        easing: Easing,
        at: Duration,
    ) -> Result<(), EngineError>;
    fn play(&mut self, tween: TweenId) -> bool;
    /// Stops interpolation immediately. Returns `false` for unknown tweens.
    fn kill(&mut self, tween: TweenId) -> bool;
    /// True while the tween is playing and not finished.
    fn is_active(&self, tween: TweenId) -> bool;
    fn is_alive(&self, tween: TweenId) -> bool;
    /// Steps all playing tweens and returns the ones that finished.
    fn advance(&mut self, dt: Duration, scene: &mut dyn PropertyAccess) -> Vec<TweenId>;
    fn live_count(&self) -> usize;
}
