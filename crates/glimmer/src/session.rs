//! Scripted input sessions against a headless slider.
//!
//! Time is simulated: frame `n` happens at `start + n / fps`, so a session of
//! any length runs as fast as the machine allows and is reproducible for a
//! given seed.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use carousel::{DisposalReport, Key, LedgerStats, Point, QualityLevel, Size, Slider, SliderStatus};
use clap::ValueEnum;
use rand::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// Pointer random walk with occasional key presses and resizes.
    Wander,
    /// Repeated horizontal drags in random directions.
    Swipe,
    /// Brief wander, then a still pointer long enough for effects to go idle.
    Idle,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionPlan {
    pub script: Script,
    pub frames: u32,
    pub fps: f32,
    pub seed: u64,
}

impl SessionPlan {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps)
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct UpdateTotals {
    pub executed: usize,
    pub failed: usize,
    pub coalesced: usize,
    pub timers_fired: usize,
    pub tweens_completed: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub script: Script,
    pub seed: u64,
    pub frames: u32,
    pub simulated_ms: u128,
    pub slide_changes: u32,
    pub final_index: usize,
    pub updates: UpdateTotals,
    pub quality_changes: Vec<QualityLevel>,
    pub status: SliderStatus,
    pub disposal: DisposalReport,
    /// Ledger contents after disposal; all zero unless something leaked.
    pub leaked: LedgerStats,
}

struct Driver {
    plan: SessionPlan,
    rng: StdRng,
    viewport: Size,
    pointer: Point,
    entered: bool,
    drag: Option<(f32, f32)>,
}

const DRAG_FRAMES: u32 = 10;

impl Driver {
    fn new(plan: SessionPlan, viewport: Size) -> Self {
        Self {
            plan,
            rng: StdRng::seed_from_u64(plan.seed),
            viewport,
            pointer: viewport.center(),
            entered: false,
            drag: None,
        }
    }

    fn input(&mut self, slider: &mut Slider, frame: u32, now: Instant) {
        match self.plan.script {
            Script::Wander => self.wander(slider, frame, now),
            Script::Swipe => self.swipe(slider, frame, now),
            Script::Idle => {
                let still_from = self.plan.frames / 3;
                let wake_at = self.plan.frames * 17 / 20;
                if frame < still_from {
                    self.wander(slider, frame, now);
                } else if frame == wake_at {
                    self.step_pointer();
                    slider.pointer_move(self.pointer, now);
                }
            }
        }
    }

    fn step_pointer(&mut self) {
        let dx = self.rng.gen_range(-12.0..=12.0);
        let dy = self.rng.gen_range(-12.0..=12.0);
        self.pointer = Point::new(
            (self.pointer.x + dx).clamp(0.0, self.viewport.width),
            (self.pointer.y + dy).clamp(0.0, self.viewport.height),
        );
    }

    fn wander(&mut self, slider: &mut Slider, frame: u32, now: Instant) {
        if !self.entered {
            slider.pointer_enter(self.pointer, now);
            self.entered = true;
        }
        self.step_pointer();
        slider.pointer_move(self.pointer, now);

        if self.rng.gen_ratio(1, 180) {
            let key = if self.rng.gen_bool(0.5) {
                Key::ArrowRight
            } else {
                Key::ArrowLeft
            };
            slider.key_down(key, now);
        }
        if frame > 0 && frame % 240 == 0 {
            let factor = self.rng.gen_range(0.8..1.2);
            let size = Size::new(
                (self.viewport.width * factor).round(),
                (self.viewport.height * factor).round(),
            );
            tracing::debug!(width = size.width, height = size.height, "scripted resize");
            slider.resize(size, now);
        }
    }

    fn swipe(&mut self, slider: &mut Slider, frame: u32, now: Instant) {
        let phase = frame % 90;
        let width = self.viewport.width;
        let y = self.viewport.height / 2.0;
        if phase == 0 {
            let (from, to) = if self.rng.gen_bool(0.5) {
                (width * 0.8, width * 0.2)
            } else {
                (width * 0.2, width * 0.8)
            };
            self.drag = Some((from, to));
            self.pointer = Point::new(from, y);
            slider.pointer_enter(self.pointer, now);
            slider.pointer_down(self.pointer, now);
        } else if let Some((from, to)) = self.drag {
            let progress = (phase as f32 / DRAG_FRAMES as f32).min(1.0);
            self.pointer = Point::new(from + (to - from) * progress, y);
            slider.pointer_move(self.pointer, now);
            if phase >= DRAG_FRAMES {
                slider.pointer_up(self.pointer, now);
                self.drag = None;
            }
        }
    }
}

/// Runs `plan` against an initialised slider, then disposes it. The first
/// frame mounts the slider, so input starts once it reports ready.
pub fn drive(slider: &mut Slider, plan: SessionPlan, viewport: Size, start: Instant) -> SessionReport {
    let mut driver = Driver::new(plan, viewport);
    let interval = plan.frame_interval();

    let mut updates = UpdateTotals::default();
    let heard = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&heard);
    slider.on_quality_change(move |level| sink.borrow_mut().push(level));
    let mut slide_changes = 0;
    let mut last_index = slider.current_index();
    let mut now = start;

    for frame in 0..plan.frames {
        now = start + interval * frame;
        if slider.is_ready() {
            driver.input(slider, frame, now);
        }
        let report = slider.frame(now);
        updates.executed += report.flush.executed;
        updates.failed += report.flush.failed;
        updates.coalesced += report.flush.coalesced;
        updates.timers_fired += report.timers_fired;
        updates.tweens_completed += report.tweens_completed;
        let index = slider.current_index();
        if index != last_index {
            slide_changes += 1;
            last_index = index;
        }
    }

    let quality_changes = heard.take();
    let status = slider.status();
    let disposal = slider.dispose();
    let leaked = slider.status().ledger;
    if !leaked.is_empty() {
        tracing::warn!(?leaked, "resources outlived disposal");
    }

    SessionReport {
        script: plan.script,
        seed: plan.seed,
        frames: plan.frames,
        simulated_ms: now.duration_since(start).as_millis(),
        slide_changes,
        final_index: status.current_index,
        updates,
        quality_changes,
        status,
        disposal,
        leaked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousel::headless::{HeadlessRenderer, TweenEngine};
    use carousel::SliderProps;

    fn session(script: Script, frames: u32, seed: u64) -> SessionReport {
        let mut props = SliderProps::from_images(["mem://1600x900/a", "mem://1600x900/b", "mem://1600x900/c"]);
        props.viewport = Size::new(800.0, 600.0);
        props.displacement_map = Some("mem://512x512/map".into());
        props.idle_timeout = Duration::from_millis(500);
        let mut slider = Slider::new(
            Box::new(HeadlessRenderer::default()),
            Box::new(TweenEngine::new()),
            props,
        )
        .unwrap();
        let start = Instant::now();
        slider.initialize(Size::new(800.0, 600.0), start).unwrap();
        let plan = SessionPlan {
            script,
            frames,
            fps: 60.0,
            seed,
        };
        drive(&mut slider, plan, Size::new(800.0, 600.0), start)
    }

    #[test]
    fn swipes_change_slides_and_leave_nothing_behind() {
        let report = session(Script::Swipe, 300, 1);
        assert!(report.slide_changes >= 3, "changes {}", report.slide_changes);
        assert!(report.status.ready);
        assert!(report.leaked.is_empty());
        assert_eq!(report.disposal.errors, 0);
        assert!(!report.disposal.already_disposed);
    }

    #[test]
    fn idle_script_reaches_the_idle_state() {
        let report = session(Script::Idle, 240, 3);
        assert!(report.status.counters.idle_expirations >= 1);
        assert!(report.leaked.is_empty());
    }

    #[test]
    fn pointer_bursts_are_coalesced_per_frame() {
        let report = session(Script::Wander, 120, 9);
        assert!(report.status.counters.pointer_responses > 0);
        assert!(report.status.counters.pointer_responses <= 120);
        assert_eq!(report.updates.failed, 0);
    }

    #[test]
    fn same_seed_replays_the_same_session() {
        let first = session(Script::Wander, 400, 42);
        let second = session(Script::Wander, 400, 42);
        assert_eq!(first.final_index, second.final_index);
        assert_eq!(first.slide_changes, second.slide_changes);
        assert_eq!(first.status.counters, second.status.counters);
    }
}
