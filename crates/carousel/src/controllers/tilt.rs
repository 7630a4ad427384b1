//! Parallax shift of the caption text toward the cursor.

use std::time::Duration;

use scheduler::UpdateKind;

use super::{release_owner, Lifecycle, Throttle};
use crate::coordinator::{create_animation, AnimationGroup, TweenRequest};
use crate::easing::Easing;
use crate::ledger::{EventTarget, EventType, InputEvent};
use crate::props::TiltProps;
use crate::stage::{Stage, SUBTITLE_OFFSET_Y, TITLE_OFFSET_Y};
use crate::types::{NodeId, Point, Property, Size, Target, TimerId};

const NAME: &str = "tilt";

const FOLLOW: Duration = Duration::from_millis(400);
const SETTLE: Duration = Duration::from_millis(800);

#[derive(Debug, Default)]
pub(crate) struct TiltState {
    pub(crate) lifecycle: Lifecycle,
    throttle: Throttle,
    /// Normalised offset the next scheduled update moves toward.
    offset: (f32, f32),
    reset_timer: Option<TimerId>,
    pub(crate) resets: u64,
}

/// Offset of `position` from the viewport centre, each axis in [-1, 1].
pub fn normalized_offset(position: Point, viewport: Size) -> (f32, f32) {
    if viewport.is_empty() {
        return (0.0, 0.0);
    }
    let center = viewport.center();
    (
        ((position.x - center.x) / center.x).clamp(-1.0, 1.0),
        ((position.y - center.y) / center.y).clamp(-1.0, 1.0),
    )
}

/// Per-layer shifts for a normalised offset: container, title, subtitle.
pub fn shifts(offset: (f32, f32), tilt: &TiltProps) -> [(f32, f32); 3] {
    let (x, y) = offset;
    [
        (x * tilt.container_shift, y * tilt.container_shift),
        (x * tilt.title_shift, y * tilt.title_shift),
        (x * tilt.subtitle_shift, y * tilt.subtitle_shift),
    ]
}

pub(crate) fn init(stage: &mut Stage) {
    let enabled = stage.props.tilt.enabled && stage.props.has_texts();
    if !enabled || !stage.controllers.tilt.lifecycle.begin_init() {
        return;
    }
    stage.controllers.tilt.throttle = Throttle::new(stage.props.throttle);
    let owner = stage.owner(NAME);
    let bound = stage
        .ledger
        .add_event_listener(
            EventTarget::Container,
            EventType::PointerMove,
            &owner,
            |stage: &mut Stage, event: &InputEvent| {
                if let Some(position) = event.position() {
                    on_move(stage, position);
                }
                Ok(())
            },
        )
        .is_some();
    stage.controllers.tilt.lifecycle.finish_init(bound);
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.tilt.lifecycle.begin_dispose() {
        return;
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, Some(AnimationGroup::TextEffects));
    let state = &mut stage.controllers.tilt;
    state.reset_timer = None;
    state.throttle.reset();
    state.lifecycle.finish_dispose();
}

fn on_move(stage: &mut Stage, position: Point) {
    let now = stage.now;
    if !stage.controllers.tilt.throttle.ready(now) {
        return;
    }
    let Some(viewport) = stage.scene.as_ref().map(|scene| scene.viewport) else {
        return;
    };
    stage.controllers.tilt.offset = normalized_offset(position, viewport);
    let owner = stage.owner(NAME);
    stage.scheduler.schedule(&owner, UpdateKind::TextPosition, |stage: &mut Stage| {
        shift_text(stage, FOLLOW, Easing::QuadOut);
        Ok(())
    });

    if let Some(timer) = stage.controllers.tilt.reset_timer.take() {
        stage.ledger.clear_timeout(timer);
    }
    let window = stage.props.tilt.reset_after;
    stage.controllers.tilt.reset_timer = stage.ledger.set_timeout(&owner, window, now, reset);
}

fn reset(stage: &mut Stage) -> anyhow::Result<()> {
    let state = &mut stage.controllers.tilt;
    state.reset_timer = None;
    state.offset = (0.0, 0.0);
    state.resets += 1;
    let owner = stage.owner(NAME);
    stage.scheduler.schedule(&owner, UpdateKind::TextPosition, |stage: &mut Stage| {
        shift_text(stage, SETTLE, Easing::EaseInOut);
        let cursor = stage
            .scene
            .as_ref()
            .and_then(|scene| scene.cursor)
            .and_then(|rig| rig.filter);
        if let Some(filter) = cursor {
            stage.render.set_property(Target::Filter(filter), Property::FilterScaleX, 0.0);
            stage.render.set_property(Target::Filter(filter), Property::FilterScaleY, 0.0);
        }
        Ok(())
    });
    Ok(())
}

fn shift_text(stage: &mut Stage, duration: Duration, easing: Easing) {
    stage.coordinator.cancel_animations_by_type(
        AnimationGroup::TextEffects,
        stage.tweens.as_mut(),
        &mut stage.ledger,
    );
    let Some(scene) = stage.scene.as_ref() else {
        return;
    };
    let center = scene.viewport.center();
    let [container, title, subtitle] = shifts(stage.controllers.tilt.offset, &stage.props.tilt);
    let mut moves: Vec<(NodeId, f32, f32)> = Vec::new();
    for group in &scene.texts {
        moves.push((group.container, center.x + container.0, center.y + container.1));
        if let Some(node) = group.title {
            moves.push((node, title.0, TITLE_OFFSET_Y + title.1));
        }
        if let Some(node) = group.subtitle {
            moves.push((node, subtitle.0, SUBTITLE_OFFSET_Y + subtitle.1));
        }
    }
    for (node, x, y) in moves {
        let request = TweenRequest::new(Target::Node(node), AnimationGroup::TextEffects)
            .to(Property::X, x)
            .to(Property::Y, y)
            .duration(duration)
            .easing(easing);
        create_animation(stage, request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_clamped_per_axis() {
        let viewport = Size::new(800.0, 600.0);
        assert_eq!(normalized_offset(Point::new(400.0, 300.0), viewport), (0.0, 0.0));
        assert_eq!(normalized_offset(Point::new(800.0, 0.0), viewport), (1.0, -1.0));
        assert_eq!(normalized_offset(Point::new(2000.0, 450.0), viewport), (1.0, 0.5));
        assert_eq!(normalized_offset(Point::new(1.0, 1.0), Size::default()), (0.0, 0.0));
    }

    #[test]
    fn layers_shift_by_their_own_depth() {
        let tilt = TiltProps::default();
        let [container, title, subtitle] = shifts((1.0, -0.5), &tilt);
        assert_eq!(container, (20.0, -10.0));
        assert_eq!(title, (12.0, -6.0));
        assert_eq!(subtitle, (8.0, -4.0));
    }
}
