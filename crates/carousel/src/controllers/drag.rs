//! Horizontal drag and swipe navigation.

use std::time::Duration;

use super::{release_owner, transition, Lifecycle};
use crate::coordinator::{create_animation, kill_animation, AnimationGroup, TweenRequest};
use crate::easing::Easing;
use crate::ledger::{EventTarget, EventType, InputEvent, ListenerCallback};
use crate::stage::Stage;
use crate::types::{Point, Property, Target, TweenId};

const NAME: &str = "drag";

/// Scale of the current slide, relative to its cover scale, while pressed.
const PRESS_SCALE: f32 = 0.96;
const PRESS: Duration = Duration::from_millis(200);
const SNAP_BACK: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
pub(crate) struct DragState {
    pub(crate) lifecycle: Lifecycle,
    start: Option<Point>,
    last: Option<Point>,
    pub(crate) press: Option<TweenId>,
    pub(crate) swipes: u64,
}

/// Navigation a finished drag asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Next,
    Prev,
    None,
}

/// Classifies a horizontal drag. Leftward drags past the threshold go to the
/// next slide, rightward ones to the previous slide.
pub fn classify(delta_x: f32, viewport_width: f32, threshold: f32) -> Swipe {
    let limit = threshold * viewport_width;
    if delta_x.abs() <= limit {
        Swipe::None
    } else if delta_x < 0.0 {
        Swipe::Next
    } else {
        Swipe::Prev
    }
}

pub(crate) fn init(stage: &mut Stage) {
    if !stage.props.drag || !stage.controllers.drag.lifecycle.begin_init() {
        return;
    }
    let owner = stage.owner(NAME);
    let bindings: Vec<(EventTarget, EventType, ListenerCallback<Stage>)> = vec![
        (
            EventTarget::Container,
            EventType::PointerDown,
            Box::new(|stage: &mut Stage, event: &InputEvent| {
                if let Some(position) = event.position() {
                    on_down(stage, position);
                }
                Ok(())
            }),
        ),
        (
            EventTarget::Container,
            EventType::PointerMove,
            Box::new(|stage: &mut Stage, event: &InputEvent| {
                if stage.controllers.drag.start.is_some() {
                    stage.controllers.drag.last = event.position();
                }
                Ok(())
            }),
        ),
        (
            EventTarget::Container,
            EventType::PointerUp,
            Box::new(|stage: &mut Stage, event: &InputEvent| {
                on_up(stage, event.position());
                Ok(())
            }),
        ),
        (
            EventTarget::Container,
            EventType::PointerLeave,
            Box::new(|stage: &mut Stage, _: &InputEvent| {
                on_up(stage, None);
                Ok(())
            }),
        ),
    ];
    let expected = bindings.len();
    let bound = stage.ledger.add_event_listeners(&owner, bindings).len();
    stage.controllers.drag.lifecycle.finish_init(bound == expected);
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.drag.lifecycle.begin_dispose() {
        return;
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, None);
    if let Some(press) = stage.controllers.drag.press.take() {
        kill_animation(stage, press);
    }
    let state = &mut stage.controllers.drag;
    state.start = None;
    state.last = None;
    state.lifecycle.finish_dispose();
}

fn current_slide(stage: &Stage) -> Option<(Target, f32)> {
    let scene = stage.scene.as_ref()?;
    let index = stage.state.current_index;
    let slide = scene.slides.get(index)?;
    Some((Target::Node(*slide), scene.base_scale(index)))
}

fn scale_current(stage: &mut Stage, factor: f32, duration: Duration, easing: Easing) -> Option<TweenId> {
    let (target, base) = current_slide(stage)?;
    let request = TweenRequest::new(target, AnimationGroup::SlideTransition)
        .to(Property::ScaleX, base * factor)
        .to(Property::ScaleY, base * factor)
        .duration(duration)
        .easing(easing);
    create_animation(stage, request)
}

fn on_down(stage: &mut Stage, position: Point) {
    let state = &mut stage.controllers.drag;
    state.start = Some(position);
    state.last = Some(position);
    if stage.state.transitioning {
        return;
    }
    stage.controllers.drag.press = scale_current(stage, PRESS_SCALE, PRESS, Easing::QuadOut);
}

fn on_up(stage: &mut Stage, position: Option<Point>) {
    let Some(start) = stage.controllers.drag.start.take() else {
        return;
    };
    let end = position
        .or(stage.controllers.drag.last.take())
        .unwrap_or(start);
    if let Some(press) = stage.controllers.drag.press.take() {
        kill_animation(stage, press);
    }
    let width = stage
        .scene
        .as_ref()
        .map_or(stage.props.viewport.width, |scene| scene.viewport.width);
    let swipe = classify(end.x - start.x, width, stage.props.swipe_threshold);
    tracing::debug!(delta = end.x - start.x, ?swipe, "drag released");
    let navigated = match swipe {
        Swipe::Next => transition::go_next(stage),
        Swipe::Prev => transition::go_prev(stage),
        Swipe::None => false,
    };
    if navigated {
        stage.controllers.drag.swipes += 1;
    } else if !stage.state.transitioning {
        scale_current(stage, 1.0, SNAP_BACK, Easing::CubicOut);
    }
}
