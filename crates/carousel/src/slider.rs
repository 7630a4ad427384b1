use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use scheduler::FlushReport;
use serde::Serialize;

use crate::controllers::{self, transition, ControllerCounters, ControllerStatus, Lifecycle};
use crate::coordinator::{complete_animations, CoordinatorStats};
use crate::engine::{AnimationEngine, ApplicationConfig, EngineDiagnostics, EngineError, RenderEngine};
use crate::ledger::{dispatch_event, fire_due_timers, DisposalReport, EventTarget, InputEvent, LedgerStats};
use crate::props::SliderProps;
use crate::quality::QualityLevel;
use crate::stage::{Scene, Stage};
use crate::textures::TextureOutcome;
use crate::types::{AppId, Key, Point, Property, Size, Target};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum SliderError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("a slider needs at least one slide")]
    NoSlides,
    #[error("slider {0} has been disposed")]
    Disposed(String),
}

/// Snapshot of every subsystem, for hosts and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliderStatus {
    pub instance: String,
    pub lifecycle: Lifecycle,
    pub ready: bool,
    pub fallback: bool,
    pub loading: bool,
    pub current_index: usize,
    pub transitioning: bool,
    pub engaged: bool,
    pub filters_idle: bool,
    pub quality: QualityLevel,
    pub controllers: ControllerStatus,
    pub counters: ControllerCounters,
    pub ledger: LedgerStats,
    pub animations: CoordinatorStats,
    pub pending_updates: usize,
    pub pending_textures: usize,
    pub engine: EngineDiagnostics,
}

/// What one call to [`Slider::frame`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub flush: FlushReport,
    pub timers_fired: usize,
    pub assets_settled: usize,
    pub tweens_completed: usize,
    pub callbacks_run: usize,
    pub quality_change: Option<QualityLevel>,
}

/// Host-facing carousel instance.
///
/// Owns the frame context and drives it: input is routed to controller
/// listeners through the ledger, visual work waits for [`frame`](Self::frame).
pub struct Slider {
    stage: Stage,
    lifecycle: Lifecycle,
    viewport: Size,
    last_frame: Option<Instant>,
    disposal: Option<DisposalReport>,
}

impl Slider {
    pub fn new(
        render: Box<dyn RenderEngine>,
        tweens: Box<dyn AnimationEngine>,
        props: SliderProps,
    ) -> Result<Self, SliderError> {
        if props.slides.is_empty() {
            return Err(SliderError::NoSlides);
        }
        let instance = format!("slider-{}", NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed));
        let viewport = props.viewport;
        let stage = Stage::new(instance, render, tweens, Rc::new(props), Instant::now());
        Ok(Self {
            stage,
            lifecycle: Lifecycle::default(),
            viewport,
            last_frame: None,
            disposal: None,
        })
    }

    pub fn instance(&self) -> &str {
        &self.stage.instance
    }

    /// Creates the render root and requests every asset. The scene is built
    /// and controllers mount on the first frame after loading settles.
    ///
    /// Calling this again while initialising or mounted is a no-op. A failed
    /// render root leaves the slider in its fallback state.
    pub fn initialize(&mut self, container: Size, now: Instant) -> Result<(), SliderError> {
        if matches!(self.lifecycle, Lifecycle::Disposing | Lifecycle::Disposed) {
            return Err(SliderError::Disposed(self.stage.instance.clone()));
        }
        if !self.lifecycle.begin_init() {
            tracing::debug!(instance = %self.stage.instance, "initialize already in progress");
            return Ok(());
        }
        self.stage.now = now;
        self.viewport = container;

        let config = ApplicationConfig {
            size: container,
            resolution: self.stage.quality.level().resolution(),
            ..ApplicationConfig::default()
        };
        let stage = &mut self.stage;
        let created = stage
            .render
            .create_application(&config)
            .and_then(|app| {
                stage
                    .ledger
                    .track_application(stage.render.as_mut(), app)
                    .ok_or_else(|| EngineError::Unavailable("slider is unmounting".into()))
            });
        let app = match created {
            Ok(app) => app,
            Err(error) => {
                tracing::warn!(instance = %stage.instance, error = %error, "render root unavailable; falling back");
                stage.state.fallback = true;
                self.lifecycle.finish_init(false);
                return Err(error.into());
            }
        };
        stage.app = Some(app);
        stage.state.fallback = false;
        stage.state.loading = true;

        for url in stage.props.asset_urls() {
            if let Err(error) = stage.textures.load(stage.render.as_mut(), &mut stage.ledger, &url) {
                tracing::warn!(url = %url, error = %error, "asset request failed");
            }
        }
        tracing::info!(
            instance = %stage.instance,
            slides = stage.props.slides.len(),
            width = container.width,
            height = container.height,
            "slider initialising"
        );
        Ok(())
    }

    /// Advances the slider by one animation frame.
    ///
    /// Order: due timers, settled assets, the scheduler flush, tween
    /// stepping with completion routing, the render, then quality sampling.
    pub fn frame(&mut self, now: Instant) -> FrameReport {
        if matches!(self.lifecycle, Lifecycle::Disposing | Lifecycle::Disposed) {
            return FrameReport::default();
        }
        // Input also moves `stage.now`, so tweens step from the last frame.
        let dt = self
            .last_frame
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_frame = Some(now);
        self.stage.now = now;

        let timers_fired = fire_due_timers(&mut self.stage, |stage| &mut stage.ledger, now);
        let assets_settled = self.settle_assets();
        if self.stage.state.loading && self.stage.textures.pending_len() == 0 {
            self.finish_loading();
        }
        let flush = scheduler::flush(&mut self.stage, |stage| &mut stage.scheduler);

        let finished = {
            let stage = &mut self.stage;
            stage.tweens.advance(dt, stage.render.properties())
        };
        let callbacks_run = complete_animations(&mut self.stage, &finished);

        let mut quality_change = None;
        if let Some(app) = self.stage.app {
            self.stage.render.render_frame(app, now);
            if self.stage.state.ready && self.stage.quality.is_due(now) {
                let sample = self.stage.render.sample_performance(app);
                quality_change = self.stage.quality.sample(now, sample);
                if let Some(level) = quality_change {
                    self.apply_quality(level);
                }
            }
        }

        FrameReport {
            flush,
            timers_fired,
            assets_settled,
            tweens_completed: finished.len(),
            callbacks_run,
            quality_change,
        }
    }

    fn settle_assets(&mut self) -> usize {
        let stage = &mut self.stage;
        let events = stage.render.poll_assets();
        let settled = events.len();
        for event in events {
            let outcome = stage
                .textures
                .complete(stage.render.as_mut(), &mut stage.ledger, event);
            if let TextureOutcome::Ready { url, texture, .. } = outcome {
                tracing::debug!(url = %url, width = texture.width, height = texture.height, "texture ready");
            }
        }
        settled
    }

    fn finish_loading(&mut self) {
        let stage = &mut self.stage;
        stage.state.loading = false;
        match stage.build_scene(self.viewport) {
            Ok(()) => {
                controllers::init_all(stage);
                stage.state.ready = true;
                self.lifecycle.finish_init(true);
                tracing::info!(instance = %stage.instance, slides = stage.slide_count(), "slider ready");
            }
            Err(error) => {
                tracing::warn!(instance = %stage.instance, error = %error, "scene construction failed; falling back");
                stage.state.fallback = true;
                self.lifecycle.finish_init(false);
            }
        }
    }

    /// Re-applies filter scales and the filter budget for a new level.
    fn apply_quality(&mut self, level: QualityLevel) {
        let stage = &mut self.stage;
        if stage.state.filters_idle {
            stage.deactivate_filters();
        } else {
            let active = stage.active_displacement_scale();
            let base = stage
                .scene
                .as_ref()
                .and_then(|scene| scene.displacement)
                .and_then(|rig| rig.filter);
            if let Some(filter) = base {
                stage.render.set_property(Target::Filter(filter), Property::FilterScaleX, active);
                stage.render.set_property(Target::Filter(filter), Property::FilterScaleY, active);
            }
            if stage.state.engaged {
                stage.activate_filters();
            } else {
                stage.deactivate_filters();
            }
        }
        if let Some(app) = stage.app {
            if let Err(error) = stage.render.set_resolution(app, level.resolution()) {
                tracing::warn!(error = %error, "failed to apply render resolution");
            }
        }
        tracing::debug!(level = %level, budget = level.filter_budget(), "filters recomposed");
    }

    /// Tears everything down. Safe to call repeatedly and at any point,
    /// including while assets are still loading.
    pub fn dispose(&mut self) -> DisposalReport {
        if !self.lifecycle.begin_dispose() {
            return DisposalReport {
                already_disposed: true,
                ..DisposalReport::default()
            };
        }
        let stage = &mut self.stage;
        stage.ledger.mark_unmounting();
        controllers::dispose_all(stage);
        stage
            .coordinator
            .kill_all_animations(stage.tweens.as_mut(), &mut stage.ledger);
        let dropped = stage.scheduler.clear();
        stage.textures.abandon_pending();
        for event in stage.render.poll_assets() {
            stage
                .textures
                .complete(stage.render.as_mut(), &mut stage.ledger, event);
        }
        let report = stage.ledger.dispose(stage.render.as_mut(), stage.tweens.as_mut());
        stage.quality.reset();
        stage.scene = None;
        stage.app = None;
        stage.state.ready = false;
        stage.state.loading = false;
        stage.state.engaged = false;
        stage.state.transitioning = false;
        self.lifecycle.finish_dispose();
        tracing::info!(
            instance = %stage.instance,
            dropped_updates = dropped,
            errors = report.errors,
            "slider disposed"
        );
        self.disposal = Some(report);
        report
    }

    /// Report of the first, effective [`dispose`](Self::dispose) call.
    pub fn disposal(&self) -> Option<&DisposalReport> {
        self.disposal.as_ref()
    }

    // Navigation

    pub fn go_next(&mut self) -> bool {
        transition::go_next(&mut self.stage)
    }

    pub fn go_prev(&mut self) -> bool {
        transition::go_prev(&mut self.stage)
    }

    pub fn transition_to(&mut self, index: usize) -> bool {
        transition::transition_to(&mut self.stage, index)
    }

    // Input

    fn dispatch(&mut self, target: EventTarget, event: InputEvent, now: Instant) -> usize {
        if !self.lifecycle.is_active() {
            return 0;
        }
        self.stage.now = now;
        dispatch_event(&mut self.stage, |stage| &mut stage.ledger, target, &event)
    }

    pub fn pointer_enter(&mut self, position: Point, now: Instant) -> usize {
        self.dispatch(EventTarget::Container, InputEvent::PointerEnter(position), now)
    }

    pub fn pointer_leave(&mut self, now: Instant) -> usize {
        self.dispatch(EventTarget::Container, InputEvent::PointerLeave, now)
    }

    pub fn pointer_move(&mut self, position: Point, now: Instant) -> usize {
        self.dispatch(EventTarget::Container, InputEvent::PointerMove(position), now)
    }

    pub fn pointer_down(&mut self, position: Point, now: Instant) -> usize {
        self.dispatch(EventTarget::Container, InputEvent::PointerDown(position), now)
    }

    pub fn pointer_up(&mut self, position: Point, now: Instant) -> usize {
        self.dispatch(EventTarget::Container, InputEvent::PointerUp(position), now)
    }

    pub fn key_down(&mut self, key: Key, now: Instant) -> usize {
        self.dispatch(EventTarget::Document, InputEvent::KeyDown(key), now)
    }

    pub fn resize(&mut self, size: Size, now: Instant) -> usize {
        self.dispatch(EventTarget::Window, InputEvent::Resize(size), now)
    }

    // Status

    pub fn is_ready(&self) -> bool {
        self.stage.state.ready
    }

    pub fn current_index(&self) -> usize {
        self.stage.state.current_index
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.stage.scene.as_ref()
    }

    pub fn render(&self) -> &dyn RenderEngine {
        self.stage.render.as_ref()
    }

    pub fn quality(&self) -> QualityLevel {
        self.stage.quality.level()
    }

    /// Calls `listener` with every quality level change until the slider is
    /// disposed.
    pub fn on_quality_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(QualityLevel) + 'static,
    {
        self.stage.quality.subscribe(listener)
    }

    pub fn off_quality_change(&mut self, id: u64) -> bool {
        self.stage.quality.unsubscribe(id)
    }

    /// Render root, once [`initialize`](Self::initialize) has created it.
    pub fn application(&self) -> Option<AppId> {
        self.stage.app
    }

    pub fn status(&self) -> SliderStatus {
        let stage = &self.stage;
        SliderStatus {
            instance: stage.instance.clone(),
            lifecycle: self.lifecycle,
            ready: stage.state.ready,
            fallback: stage.state.fallback,
            loading: stage.state.loading,
            current_index: stage.state.current_index,
            transitioning: stage.state.transitioning,
            engaged: stage.state.engaged,
            filters_idle: stage.state.filters_idle,
            quality: stage.quality.level(),
            controllers: stage.controllers.status(),
            counters: stage.controllers.counters(),
            ledger: stage.ledger.stats(),
            animations: stage.coordinator.stats(),
            pending_updates: stage.scheduler.pending_len(),
            pending_textures: stage.textures.pending_len(),
            engine: stage.render.diagnostics(),
        }
    }
}

impl Drop for Slider {
    fn drop(&mut self) {
        if !matches!(self.lifecycle, Lifecycle::Disposed) {
            self.dispose();
        }
    }
}
