//! Effect controllers.
//!
//! Each controller is a small state struct inside [`Controllers`] plus free
//! functions over `&mut Stage`. Controllers react to input through ledger
//! listeners, defer visual work to the scheduler and animate through the
//! coordinator, so one controller never calls into another's state.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::coordinator::AnimationGroup;
use crate::stage::Stage;

pub mod autoplay;
pub mod drag;
pub mod idle;
pub mod keyboard;
pub mod pointer;
pub mod resize;
pub mod tilt;
pub mod transition;

pub use resize::cover_scale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Initializing,
    Active,
    Disposing,
    Disposed,
}

impl Lifecycle {
    /// Enters `Initializing`. Re-entrant or post-disposal calls return
    /// `false` and change nothing.
    pub fn begin_init(&mut self) -> bool {
        if *self != Lifecycle::Uninitialized {
            return false;
        }
        *self = Lifecycle::Initializing;
        true
    }

    /// Leaves `Initializing`: `Active` on success, back to `Uninitialized`
    /// on failure so a later attempt can retry.
    pub fn finish_init(&mut self, succeeded: bool) {
        if *self != Lifecycle::Initializing {
            return;
        }
        *self = if succeeded {
            Lifecycle::Active
        } else {
            Lifecycle::Uninitialized
        };
    }

    pub fn begin_dispose(&mut self) -> bool {
        if matches!(self, Lifecycle::Disposing | Lifecycle::Disposed) {
            return false;
        }
        *self = Lifecycle::Disposing;
        true
    }

    pub fn finish_dispose(&mut self) {
        *self = Lifecycle::Disposed;
    }

    pub fn is_active(self) -> bool {
        self == Lifecycle::Active
    }
}

/// Lets an input through at most once per interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Time left in the current window.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last.map_or(Duration::ZERO, |last| {
            self.interval.saturating_sub(now.saturating_duration_since(last))
        })
    }

    /// Opens a new window at `now` regardless of the current one.
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Debug, Default)]
pub struct Controllers {
    pub(crate) pointer: pointer::PointerState,
    pub(crate) idle: idle::IdleState,
    pub(crate) resize: resize::ResizeState,
    pub(crate) transition: transition::TransitionState,
    pub(crate) drag: drag::DragState,
    pub(crate) tilt: tilt::TiltState,
    pub(crate) autoplay: autoplay::AutoplayState,
    pub(crate) keyboard: keyboard::KeyboardState,
}

/// Lifecycle of every controller, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControllerStatus {
    pub pointer: Lifecycle,
    pub idle: Lifecycle,
    pub resize: Lifecycle,
    pub transition: Lifecycle,
    pub drag: Lifecycle,
    pub tilt: Lifecycle,
    pub autoplay: Lifecycle,
    pub keyboard: Lifecycle,
}

/// Effects each controller has applied since mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControllerCounters {
    pub pointer_responses: u64,
    /// Pointer responses handed to the scheduler after throttling.
    pub pointer_submissions: u64,
    pub idle_expirations: u64,
    pub resizes: u64,
    pub transitions: u64,
    pub swipes: u64,
    pub tilt_resets: u64,
    pub autoplay_advances: u64,
}

impl Controllers {
    pub fn counters(&self) -> ControllerCounters {
        ControllerCounters {
            pointer_responses: self.pointer.responses,
            pointer_submissions: self.pointer.submissions,
            idle_expirations: self.idle.expirations,
            resizes: self.resize.applications,
            transitions: self.transition.completed,
            swipes: self.drag.swipes,
            tilt_resets: self.tilt.resets,
            autoplay_advances: self.autoplay.advances,
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            pointer: self.pointer.lifecycle,
            idle: self.idle.lifecycle,
            resize: self.resize.lifecycle,
            transition: self.transition.lifecycle,
            drag: self.drag.lifecycle,
            tilt: self.tilt.lifecycle,
            autoplay: self.autoplay.lifecycle,
            keyboard: self.keyboard.lifecycle,
        }
    }
}

/// Mounts every controller in dependency order.
pub(crate) fn init_all(stage: &mut Stage) {
    resize::init(stage);
    transition::init(stage);
    pointer::init(stage);
    idle::init(stage);
    drag::init(stage);
    tilt::init(stage);
    autoplay::init(stage);
    keyboard::init(stage);
}

/// Tears controllers down in reverse mount order.
pub(crate) fn dispose_all(stage: &mut Stage) {
    keyboard::dispose(stage);
    autoplay::dispose(stage);
    tilt::dispose(stage);
    drag::dispose(stage);
    idle::dispose(stage);
    pointer::dispose(stage);
    transition::dispose(stage);
    resize::dispose(stage);
}

/// Cancels everything a controller left with the shared services.
pub(crate) fn release_owner(stage: &mut Stage, owner: &str, group: Option<AnimationGroup>) {
    let updates = stage.scheduler.cancel_owner(owner);
    let listeners = stage.ledger.remove_listeners_for(owner);
    let timers = stage.ledger.clear_timers_for(owner);
    let tweens = match group {
        Some(group) => stage.coordinator.kill_animation_group(
            group,
            stage.tweens.as_mut(),
            &mut stage.ledger,
        ),
        None => 0,
    };
    tracing::debug!(owner, updates, listeners, timers, tweens, "controller released");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_init_is_a_no_op() {
        let mut lifecycle = Lifecycle::default();
        assert!(lifecycle.begin_init());
        assert!(!lifecycle.begin_init());
        lifecycle.finish_init(true);
        assert!(lifecycle.is_active());
        assert!(!lifecycle.begin_init());
    }

    #[test]
    fn failed_init_can_retry() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.begin_init();
        lifecycle.finish_init(false);
        assert_eq!(lifecycle, Lifecycle::Uninitialized);
        assert!(lifecycle.begin_init());
    }

    #[test]
    fn dispose_happens_once() {
        let mut lifecycle = Lifecycle::Active;
        assert!(lifecycle.begin_dispose());
        assert!(!lifecycle.begin_dispose());
        lifecycle.finish_dispose();
        assert!(!lifecycle.begin_dispose());
        assert!(!lifecycle.begin_init());
    }

    #[test]
    fn throttle_spaces_inputs() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(16));
        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(10)));
        assert!(throttle.ready(start + Duration::from_millis(16)));
        throttle.reset();
        assert!(throttle.ready(start + Duration::from_millis(17)));
        assert_eq!(throttle.remaining(start + Duration::from_millis(21)), Duration::from_millis(12));
        assert_eq!(throttle.remaining(start + Duration::from_millis(40)), Duration::ZERO);
        throttle.mark(start + Duration::from_millis(40));
        assert!(!throttle.ready(start + Duration::from_millis(50)));
    }
}
