use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use crate::engine::{
    ApplicationConfig, AssetEvent, EngineDiagnostics, EngineError, PerformanceSample,
    PropertyAccess, RenderEngine, TextureInfo,
};
use crate::types::{AppId, FilterId, NodeId, Property, Size, Target, TextStyle, TextureId};

use super::loader::{AssetLoader, LoaderMode};

const FRAME_WINDOW: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Stage(AppId),
    Container,
    Sprite(TextureId),
    Placeholder(Size),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Transform {
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    alpha: f32,
    rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            alpha: 1.0,
            rotation: 0.0,
        }
    }
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    visible: bool,
    anchor: (f32, f32),
    transform: Transform,
    filters: Vec<FilterId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            visible: true,
            anchor: (0.0, 0.0),
            transform: Transform::default(),
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Displacement { map: NodeId },
    RgbSplit,
}

#[derive(Debug)]
struct Filter {
    kind: FilterKind,
    primary: f32,
    secondary: f32,
}

#[derive(Debug)]
struct Application {
    stage: NodeId,
    size: Size,
    resolution: f32,
    ticker_running: bool,
    view_attached: bool,
    frames: VecDeque<Instant>,
}

impl Application {
    fn measured_fps(&self) -> f32 {
        let (Some(first), Some(last)) = (self.frames.front(), self.frames.back()) else {
            return 0.0;
        };
        let span = last.duration_since(*first).as_secs_f32();
        if span <= 0.0 {
            return 0.0;
        }
        (self.frames.len() - 1) as f32 / span
    }
}

/// In-memory implementation of [`RenderEngine`].
///
/// Keeps a full scene graph with transforms, visibility and filter chains so
/// controllers can be asserted against, and records every destroy call so
/// tests can check that nothing is released twice.
pub struct HeadlessRenderer {
    next_id: u64,
    apps: HashMap<AppId, Application>,
    nodes: HashMap<NodeId, Node>,
    filters: HashMap<FilterId, Filter>,
    textures: HashMap<TextureId, TextureInfo>,
    loader: AssetLoader,
    destroyed: HashMap<u64, usize>,
    rejected_destroys: usize,
    poisoned: HashSet<u64>,
    fail_applications: bool,
    fail_filters: bool,
    performance: Option<PerformanceSample>,
    frames_rendered: u64,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(LoaderMode::Inline)
    }
}

impl HeadlessRenderer {
    pub fn new(mode: LoaderMode) -> Self {
        Self {
            next_id: 1,
            apps: HashMap::new(),
            nodes: HashMap::new(),
            filters: HashMap::new(),
            textures: HashMap::new(),
            loader: AssetLoader::new(mode),
            destroyed: HashMap::new(),
            rejected_destroys: 0,
            poisoned: HashSet::new(),
            fail_applications: false,
            fail_filters: false,
            performance: None,
            frames_rendered: 0,
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Makes `create_application` fail, as a lost GL context would.
    pub fn set_fail_applications(&mut self, fail: bool) {
        self.fail_applications = fail;
    }

    /// Makes filter construction fail.
    pub fn set_fail_filters(&mut self, fail: bool) {
        self.fail_filters = fail;
    }

    /// Destroying the handle with this raw id will return an error.
    pub fn poison(&mut self, raw: u64) {
        self.poisoned.insert(raw);
    }

    /// Pins the values reported by `sample_performance`.
    pub fn set_performance(&mut self, sample: Option<PerformanceSample>) {
        self.performance = sample;
    }

    /// Successful destroy calls recorded for a raw handle id.
    pub fn destroy_count(&self, raw: u64) -> usize {
        self.destroyed.get(&raw).copied().unwrap_or(0)
    }

    pub fn total_destroyed(&self) -> usize {
        self.destroyed.values().sum()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn pending_assets(&self) -> usize {
        self.loader.in_flight()
    }

    /// Blocks until the loader is idle and returns the finished events.
    pub fn wait_for_assets(&mut self) -> Vec<AssetEvent> {
        let finished = self.loader.wait_idle();
        finished
            .into_iter()
            .map(|asset| self.finish_asset(asset.url, asset.dimensions))
            .collect()
    }

    pub fn node_kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(&node).map(|n| &n.kind)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn anchor(&self, node: NodeId) -> Option<(f32, f32)> {
        self.nodes.get(&node).map(|n| n.anchor)
    }

    pub fn filter_kind(&self, filter: FilterId) -> Option<FilterKind> {
        self.filters.get(&filter).map(|f| f.kind)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn contains_filter(&self, filter: FilterId) -> bool {
        self.filters.contains_key(&filter)
    }

    pub fn contains_texture(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }

    pub fn ticker_running(&self, app: AppId) -> bool {
        self.apps.get(&app).is_some_and(|a| a.ticker_running)
    }

    pub fn view_attached(&self, app: AppId) -> bool {
        self.apps.get(&app).is_some_and(|a| a.view_attached)
    }

    pub fn app_size(&self, app: AppId) -> Option<Size> {
        self.apps.get(&app).map(|a| a.size)
    }

    fn record_destroy(&mut self, raw: u64, what: &str) -> Result<(), EngineError> {
        if self.poisoned.contains(&raw) {
            return Err(EngineError::Unsupported(format!(
                "{what} {raw} refused destruction"
            )));
        }
        *self.destroyed.entry(raw).or_default() += 1;
        Ok(())
    }

    fn reject(&mut self, what: &str, raw: u64) -> EngineError {
        self.rejected_destroys += 1;
        EngineError::UnknownHandle(format!("{what} {raw}"))
    }

    fn insert_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.allocate());
        self.nodes.insert(id, Node::new(kind));
        id
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|child| *child != node);
        }
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(current) = cursor {
            if current == candidate {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    fn destroy_subtree(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&node) {
                stack.extend(removed.children);
                *self.destroyed.entry(node.0).or_default() += 1;
            }
        }
    }

    fn finish_asset(
        &mut self,
        url: String,
        dimensions: Result<(u32, u32), EngineError>,
    ) -> AssetEvent {
        match dimensions {
            Ok((width, height)) => {
                let id = TextureId(self.allocate());
                let texture = TextureInfo { id, width, height };
                self.textures.insert(id, texture);
                tracing::trace!(url = %url, texture = ?id, width, height, "texture decoded");
                AssetEvent::Loaded { url, texture }
            }
            Err(error) => AssetEvent::Failed { url, error },
        }
    }
}

impl PropertyAccess for HeadlessRenderer {
    fn property(&self, target: Target, property: Property) -> Option<f32> {
        match target {
            Target::Node(node) => {
                let t = &self.nodes.get(&node)?.transform;
                match property {
                    Property::X => Some(t.x),
                    Property::Y => Some(t.y),
                    Property::ScaleX => Some(t.scale_x),
                    Property::ScaleY => Some(t.scale_y),
                    Property::Alpha => Some(t.alpha),
                    Property::Rotation => Some(t.rotation),
                    _ => None,
                }
            }
            Target::Filter(filter) => {
                let f = self.filters.get(&filter)?;
                match (f.kind, property) {
                    (FilterKind::Displacement { .. }, Property::FilterScaleX)
                    | (FilterKind::RgbSplit, Property::SplitRed) => Some(f.primary),
                    (FilterKind::Displacement { .. }, Property::FilterScaleY)
                    | (FilterKind::RgbSplit, Property::SplitBlue) => Some(f.secondary),
                    _ => None,
                }
            }
        }
    }

    fn set_property(&mut self, target: Target, property: Property, value: f32) -> bool {
        match target {
            Target::Node(node) => {
                let Some(n) = self.nodes.get_mut(&node) else {
                    return false;
                };
                let t = &mut n.transform;
                let slot = match property {
                    Property::X => &mut t.x,
                    Property::Y => &mut t.y,
                    Property::ScaleX => &mut t.scale_x,
                    Property::ScaleY => &mut t.scale_y,
                    Property::Alpha => &mut t.alpha,
                    Property::Rotation => &mut t.rotation,
                    _ => return false,
                };
                *slot = value;
                true
            }
            Target::Filter(filter) => {
                let Some(f) = self.filters.get_mut(&filter) else {
                    return false;
                };
                let slot = match (f.kind, property) {
                    (FilterKind::Displacement { .. }, Property::FilterScaleX)
                    | (FilterKind::RgbSplit, Property::SplitRed) => &mut f.primary,
                    (FilterKind::Displacement { .. }, Property::FilterScaleY)
                    | (FilterKind::RgbSplit, Property::SplitBlue) => &mut f.secondary,
                    _ => return false,
                };
                *slot = value;
                true
            }
        }
    }
}

impl RenderEngine for HeadlessRenderer {
    fn create_application(&mut self, config: &ApplicationConfig) -> Result<AppId, EngineError> {
        if self.fail_applications {
            return Err(EngineError::Unavailable(
                "webgl context could not be created".into(),
            ));
        }
        if config.size.is_empty() {
            return Err(EngineError::Unavailable(format!(
                "cannot create a {}x{} canvas",
                config.size.width, config.size.height
            )));
        }
        let id = AppId(self.allocate());
        let stage = self.insert_node(NodeKind::Stage(id));
        self.apps.insert(
            id,
            Application {
                stage,
                size: config.size,
                resolution: config.resolution,
                ticker_running: true,
                view_attached: true,
                frames: VecDeque::with_capacity(FRAME_WINDOW),
            },
        );
        Ok(id)
    }

    fn stage(&self, app: AppId) -> Option<NodeId> {
        self.apps.get(&app).map(|a| a.stage)
    }

    fn resize(&mut self, app: AppId, size: Size) -> Result<(), EngineError> {
        let entry = self
            .apps
            .get_mut(&app)
            .ok_or_else(|| EngineError::UnknownHandle(format!("application {}", app.0)))?;
        entry.size = size;
        Ok(())
    }

    fn set_resolution(&mut self, app: AppId, resolution: f32) -> Result<(), EngineError> {
        let entry = self
            .apps
            .get_mut(&app)
            .ok_or_else(|| EngineError::UnknownHandle(format!("application {}", app.0)))?;
        entry.resolution = resolution;
        Ok(())
    }

    fn resolution(&self, app: AppId) -> Option<f32> {
        self.apps.get(&app).map(|a| a.resolution)
    }

    fn stop_ticker(&mut self, app: AppId) {
        if let Some(entry) = self.apps.get_mut(&app) {
            entry.ticker_running = false;
        }
    }

    fn detach_view(&mut self, app: AppId) {
        if let Some(entry) = self.apps.get_mut(&app) {
            entry.view_attached = false;
        }
    }

    fn destroy_application(&mut self, app: AppId) -> Result<(), EngineError> {
        if !self.apps.contains_key(&app) {
            return Err(self.reject("application", app.0));
        }
        self.record_destroy(app.0, "application")?;
        if let Some(entry) = self.apps.remove(&app) {
            self.destroy_subtree(entry.stage);
        }
        Ok(())
    }

    fn render_frame(&mut self, app: AppId, now: Instant) {
        let Some(entry) = self.apps.get_mut(&app) else {
            return;
        };
        if !entry.ticker_running {
            return;
        }
        if entry.frames.len() == FRAME_WINDOW {
            entry.frames.pop_front();
        }
        entry.frames.push_back(now);
        self.frames_rendered += 1;
    }

    fn sample_performance(&self, app: AppId) -> PerformanceSample {
        if let Some(sample) = self.performance {
            return sample;
        }
        PerformanceSample {
            fps: self.apps.get(&app).map_or(0.0, Application::measured_fps),
            heap_used_mb: None,
        }
    }

    fn request_asset(&mut self, url: &str) -> Result<(), EngineError> {
        if url.trim().is_empty() {
            return Err(EngineError::AssetLoad {
                url: url.to_string(),
                reason: "empty url".into(),
            });
        }
        self.loader.request(url);
        Ok(())
    }

    fn poll_assets(&mut self) -> Vec<AssetEvent> {
        let finished = self.loader.drain();
        finished
            .into_iter()
            .map(|asset| self.finish_asset(asset.url, asset.dimensions))
            .collect()
    }

    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo> {
        self.textures.get(&texture).copied()
    }

    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), EngineError> {
        if !self.textures.contains_key(&texture) {
            return Err(self.reject("texture", texture.0));
        }
        self.record_destroy(texture.0, "texture")?;
        self.textures.remove(&texture);
        Ok(())
    }

    fn create_sprite(&mut self, texture: TextureId) -> Result<NodeId, EngineError> {
        if !self.textures.contains_key(&texture) {
            return Err(EngineError::UnknownHandle(format!("texture {}", texture.0)));
        }
        Ok(self.insert_node(NodeKind::Sprite(texture)))
    }

    fn create_placeholder(&mut self, size: Size) -> Result<NodeId, EngineError> {
        Ok(self.insert_node(NodeKind::Placeholder(size)))
    }

    fn create_container(&mut self) -> Result<NodeId, EngineError> {
        Ok(self.insert_node(NodeKind::Container))
    }

    fn create_text(&mut self, content: &str, _style: &TextStyle) -> Result<NodeId, EngineError> {
        Ok(self.insert_node(NodeKind::Text(content.to_string())))
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&parent) {
            return Err(EngineError::UnknownHandle(format!("node {}", parent.0)));
        }
        if !self.nodes.contains_key(&child) {
            return Err(EngineError::UnknownHandle(format!("node {}", child.0)));
        }
        if self.is_ancestor(child, parent) {
            return Err(EngineError::Unsupported(format!(
                "node {} cannot contain its ancestor {}",
                parent.0, child.0
            )));
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        Ok(())
    }

    fn remove_from_parent(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.visible = visible;
        }
    }

    fn is_visible(&self, node: NodeId) -> Option<bool> {
        self.nodes.get(&node).map(|n| n.visible)
    }

    fn set_anchor(&mut self, node: NodeId, x: f32, y: f32) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.anchor = (x, y);
        }
    }

    fn destroy_node(&mut self, node: NodeId) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&node) {
            return Err(self.reject("node", node.0));
        }
        self.record_destroy(node.0, "node")?;
        self.detach(node);
        if let Some(removed) = self.nodes.remove(&node) {
            for child in removed.children {
                if let Some(orphan) = self.nodes.get_mut(&child) {
                    orphan.parent = None;
                }
            }
        }
        Ok(())
    }

    fn create_displacement_filter(&mut self, map: NodeId) -> Result<FilterId, EngineError> {
        if self.fail_filters {
            return Err(EngineError::Unsupported("filter shaders unavailable".into()));
        }
        if !self.nodes.contains_key(&map) {
            return Err(EngineError::UnknownHandle(format!("node {}", map.0)));
        }
        let id = FilterId(self.allocate());
        self.filters.insert(
            id,
            Filter {
                kind: FilterKind::Displacement { map },
                primary: 0.0,
                secondary: 0.0,
            },
        );
        Ok(id)
    }

    fn create_rgb_split_filter(&mut self) -> Result<FilterId, EngineError> {
        if self.fail_filters {
            return Err(EngineError::Unsupported("filter shaders unavailable".into()));
        }
        let id = FilterId(self.allocate());
        self.filters.insert(
            id,
            Filter {
                kind: FilterKind::RgbSplit,
                primary: 0.0,
                secondary: 0.0,
            },
        );
        Ok(id)
    }

    fn set_filters(&mut self, node: NodeId, filters: &[FilterId]) -> Result<(), EngineError> {
        if let Some(missing) = filters.iter().find(|f| !self.filters.contains_key(f)) {
            return Err(EngineError::UnknownHandle(format!("filter {}", missing.0)));
        }
        let n = self
            .nodes
            .get_mut(&node)
            .ok_or_else(|| EngineError::UnknownHandle(format!("node {}", node.0)))?;
        n.filters = filters.to_vec();
        Ok(())
    }

    fn filters(&self, node: NodeId) -> Vec<FilterId> {
        self.nodes
            .get(&node)
            .map(|n| n.filters.clone())
            .unwrap_or_default()
    }

    fn destroy_filter(&mut self, filter: FilterId) -> Result<(), EngineError> {
        if !self.filters.contains_key(&filter) {
            return Err(self.reject("filter", filter.0));
        }
        self.record_destroy(filter.0, "filter")?;
        self.filters.remove(&filter);
        for node in self.nodes.values_mut() {
            node.filters.retain(|f| *f != filter);
        }
        Ok(())
    }

    fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            applications: self.apps.len(),
            nodes: self.nodes.len(),
            filters: self.filters.len(),
            textures: self.textures.len(),
            rejected_destroys: self.rejected_destroys,
        }
    }

    fn properties(&mut self) -> &mut dyn PropertyAccess {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loaded_texture(engine: &mut HeadlessRenderer, url: &str) -> TextureInfo {
        engine.request_asset(url).unwrap();
        match engine.poll_assets().pop() {
            Some(AssetEvent::Loaded { texture, .. }) => texture,
            other => panic!("expected a loaded texture, got {other:?}"),
        }
    }

    #[test]
    fn assets_surface_only_when_polled() {
        let mut engine = HeadlessRenderer::default();
        engine.request_asset("mem://800x600/a").unwrap();
        assert_eq!(engine.diagnostics().textures, 0);
        let events = engine.poll_assets();
        assert_eq!(events.len(), 1);
        assert_eq!(engine.diagnostics().textures, 1);
        assert!(engine.poll_assets().is_empty());
    }

    #[test]
    fn destroying_a_node_orphans_its_children() {
        let mut engine = HeadlessRenderer::default();
        let texture = loaded_texture(&mut engine, "mem://10x10/t");
        let parent = engine.create_container().unwrap();
        let sprite = engine.create_sprite(texture.id).unwrap();
        engine.add_child(parent, sprite).unwrap();

        engine.destroy_node(parent).unwrap();
        assert!(engine.contains_node(sprite));
        assert_eq!(engine.parent(sprite), None);
        assert!(engine.contains_texture(texture.id));
    }

    #[test]
    fn double_destroy_is_rejected_and_counted() {
        let mut engine = HeadlessRenderer::default();
        let filter = engine.create_rgb_split_filter().unwrap();
        engine.destroy_filter(filter).unwrap();
        assert!(engine.destroy_filter(filter).is_err());
        assert_eq!(engine.destroy_count(filter.0), 1);
        assert_eq!(engine.diagnostics().rejected_destroys, 1);
    }

    #[test]
    fn application_teardown_takes_its_stage() {
        let mut engine = HeadlessRenderer::default();
        let app = engine
            .create_application(&ApplicationConfig::default())
            .unwrap();
        let stage = engine.stage(app).unwrap();
        let child = engine.create_container().unwrap();
        engine.add_child(stage, child).unwrap();
        engine.destroy_application(app).unwrap();
        assert!(!engine.contains_node(stage));
        assert!(!engine.contains_node(child));
        assert_eq!(engine.diagnostics(), EngineDiagnostics::default());
    }

    #[test]
    fn filter_properties_follow_filter_kind() {
        let mut engine = HeadlessRenderer::default();
        let split = engine.create_rgb_split_filter().unwrap();
        assert!(engine.set_property(Target::Filter(split), Property::SplitRed, 4.0));
        assert!(!engine.set_property(Target::Filter(split), Property::FilterScaleX, 4.0));
        assert_eq!(
            engine.property(Target::Filter(split), Property::SplitRed),
            Some(4.0)
        );
    }

    #[test]
    fn rejects_cycles() {
        let mut engine = HeadlessRenderer::default();
        let outer = engine.create_container().unwrap();
        let inner = engine.create_container().unwrap();
        engine.add_child(outer, inner).unwrap();
        assert!(engine.add_child(inner, outer).is_err());
    }

    #[test]
    fn measures_frame_rate_from_render_calls() {
        let mut engine = HeadlessRenderer::default();
        let app = engine
            .create_application(&ApplicationConfig::default())
            .unwrap();
        let start = Instant::now();
        for frame in 0..=60 {
            engine.render_frame(app, start + Duration::from_millis(frame * 20));
        }
        let fps = engine.sample_performance(app).fps;
        assert!((fps - 50.0).abs() < 0.5, "fps was {fps}");

        engine.stop_ticker(app);
        engine.render_frame(app, start + Duration::from_secs(5));
        assert_eq!(engine.frames_rendered(), 61);
    }

    #[test]
    fn poisoned_handles_refuse_destruction() {
        let mut engine = HeadlessRenderer::default();
        let node = engine.create_container().unwrap();
        engine.poison(node.0);
        assert!(engine.destroy_node(node).is_err());
        assert!(engine.contains_node(node));
    }
}
