//! Cursor-following displacement.

use scheduler::UpdateKind;

use super::{release_owner, Lifecycle, Throttle};
use crate::coordinator::{create_animation, AnimationGroup, TweenRequest};
use crate::easing::Easing;
use crate::ledger::{EventTarget, EventType, InputEvent, ListenerCallback};
use crate::stage::Stage;
use crate::types::{NodeId, Point, Property, Size, Target, TimerId};

const NAME: &str = "pointer";

/// Share of the active background scale kept at the container centre.
const BASE_FLOOR: f32 = 0.35;

#[derive(Debug, Default)]
pub(crate) struct PointerState {
    pub(crate) lifecycle: Lifecycle,
    throttle: Throttle,
    /// Latest position; read by the pending response so only the newest move
    /// of a throttle window is applied.
    latest: Option<Point>,
    /// Fires at the end of a window that swallowed moves.
    trailing: Option<TimerId>,
    pub(crate) responses: u64,
    pub(crate) submissions: u64,
}

/// Distance from the viewport centre normalised by the half diagonal.
pub fn intensity(position: Point, viewport: Size) -> f32 {
    let half_diagonal = (viewport.width.powi(2) + viewport.height.powi(2)).sqrt() / 2.0;
    if half_diagonal <= 0.0 {
        return 0.0;
    }
    (position.distance(viewport.center()) / half_diagonal).clamp(0.0, 1.0)
}

/// Background displacement scale for the latest pointer position, or the
/// full active scale when the pointer has not moved yet.
pub(crate) fn base_scale(stage: &Stage) -> f32 {
    let active = stage.active_displacement_scale();
    let viewport = stage.scene.as_ref().map(|scene| scene.viewport);
    match (stage.controllers.pointer.latest, viewport) {
        (Some(position), Some(viewport)) => {
            active * (BASE_FLOOR + (1.0 - BASE_FLOOR) * intensity(position, viewport))
        }
        _ => active,
    }
}

pub(crate) fn init(stage: &mut Stage) {
    if !stage.controllers.pointer.lifecycle.begin_init() {
        return;
    }
    stage.controllers.pointer.throttle = Throttle::new(stage.props.throttle);
    let owner = stage.owner(NAME);
    let bindings: Vec<(EventTarget, EventType, ListenerCallback<Stage>)> = vec![
        (
            EventTarget::Container,
            EventType::PointerMove,
            Box::new(|stage: &mut Stage, event: &InputEvent| match event.position() {
                Some(position) => on_move(stage, position),
                None => Ok(()),
            }),
        ),
        (
            EventTarget::Container,
            EventType::PointerEnter,
            Box::new(|stage: &mut Stage, _: &InputEvent| {
                engage(stage);
                Ok(())
            }),
        ),
        (
            EventTarget::Container,
            EventType::PointerLeave,
            Box::new(|stage: &mut Stage, _: &InputEvent| {
                on_leave(stage);
                Ok(())
            }),
        ),
    ];
    let expected = bindings.len();
    let bound = stage.ledger.add_event_listeners(&owner, bindings).len();
    stage.controllers.pointer.lifecycle.finish_init(bound == expected);
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.pointer.lifecycle.begin_dispose() {
        return;
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, Some(AnimationGroup::MouseMovement));
    let state = &mut stage.controllers.pointer;
    state.latest = None;
    state.trailing = None;
    state.throttle.reset();
    state.lifecycle.finish_dispose();
}

fn engage(stage: &mut Stage) {
    if stage.state.engaged {
        return;
    }
    stage.state.engaged = true;
    if !stage.state.filters_idle {
        stage.activate_filters();
    }
}

fn on_move(stage: &mut Stage, position: Point) -> anyhow::Result<()> {
    if stage.scene.is_none() {
        return Ok(());
    }
    engage(stage);
    stage.controllers.pointer.latest = Some(position);
    let now = stage.now;
    if stage.controllers.pointer.throttle.ready(now) {
        submit(stage);
    } else if stage.controllers.pointer.trailing.is_none() {
        let owner = stage.owner(NAME);
        let delay = stage.controllers.pointer.throttle.remaining(now);
        stage.controllers.pointer.trailing = stage.ledger.set_timeout(&owner, delay, now, |stage: &mut Stage| {
            stage.controllers.pointer.trailing = None;
            if stage.controllers.pointer.latest.is_some() {
                let now = stage.now;
                stage.controllers.pointer.throttle.mark(now);
                submit(stage);
            }
            Ok(())
        });
    }
    Ok(())
}

fn submit(stage: &mut Stage) {
    stage.controllers.pointer.submissions += 1;
    let owner = stage.owner(NAME);
    stage.scheduler.schedule(&owner, UpdateKind::MouseResponse, apply_response);
}

fn on_leave(stage: &mut Stage) {
    stage.state.engaged = false;
    stage.controllers.pointer.latest = None;
    if let Some(timer) = stage.controllers.pointer.trailing.take() {
        stage.ledger.clear_timeout(timer);
    }
    let owner = stage.owner(NAME);
    stage.scheduler.cancel(&owner, UpdateKind::MouseResponse, None);
    stage.coordinator.cancel_animations_by_type(
        AnimationGroup::MouseMovement,
        stage.tweens.as_mut(),
        &mut stage.ledger,
    );
    stage.deactivate_filters();
}

fn apply_response(stage: &mut Stage) -> anyhow::Result<()> {
    let Some(position) = stage.controllers.pointer.latest else {
        return Ok(());
    };
    let Some(scene) = stage.scene.as_ref() else {
        return Ok(());
    };
    let viewport = scene.viewport;
    let sprites: Vec<NodeId> = scene
        .displacement
        .iter()
        .chain(scene.cursor.iter())
        .map(|rig| rig.sprite)
        .collect();
    let base_filter = scene.displacement.and_then(|rig| rig.filter);
    let cursor_filter = scene.cursor.and_then(|rig| rig.filter);
    stage.controllers.pointer.responses += 1;

    stage.coordinator.cancel_animations_by_type(
        AnimationGroup::MouseMovement,
        stage.tweens.as_mut(),
        &mut stage.ledger,
    );
    let ease = stage.props.pointer_ease;
    for sprite in sprites {
        let request = TweenRequest::new(Target::Node(sprite), AnimationGroup::MouseMovement)
            .to(Property::X, position.x)
            .to(Property::Y, position.y)
            .duration(ease)
            .easing(Easing::QuadOut);
        create_animation(stage, request);
    }

    if stage.state.filters_idle {
        return Ok(());
    }
    // The response owns the base scale from here; drop any restore ramp.
    stage.coordinator.cancel_animations_by_type(
        AnimationGroup::FilterEffects,
        stage.tweens.as_mut(),
        &mut stage.ledger,
    );
    let intensity = intensity(position, viewport);
    if let Some(filter) = base_filter {
        let scale = base_scale(stage);
        stage.render.set_property(Target::Filter(filter), Property::FilterScaleX, scale);
        stage.render.set_property(Target::Filter(filter), Property::FilterScaleY, scale);
    }
    if let Some(filter) = cursor_filter {
        let scale = stage.active_cursor_scale() * intensity;
        stage.render.set_property(Target::Filter(filter), Property::FilterScaleX, scale);
        stage.render.set_property(Target::Filter(filter), Property::FilterScaleY, scale);
    }
    tracing::trace!(x = position.x, y = position.y, intensity, "pointer response applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_grows_toward_the_corners() {
        let viewport = Size::new(800.0, 600.0);
        assert_eq!(intensity(viewport.center(), viewport), 0.0);
        assert!((intensity(Point::new(0.0, 0.0), viewport) - 1.0).abs() < 1e-6);
        assert!((intensity(Point::new(400.0, 0.0), viewport) - 0.6).abs() < 1e-6);
        assert_eq!(intensity(Point::new(-500.0, -500.0), viewport), 1.0);
        assert_eq!(intensity(Point::new(10.0, 10.0), Size::default()), 0.0);
    }
}
