//! Fades displacement out after a period without input.

use std::time::Duration;

use scheduler::UpdateKind;

use super::{pointer, release_owner, Lifecycle};
use crate::coordinator::{create_animation, AnimationGroup, TweenRequest};
use crate::easing::Easing;
use crate::ledger::{EventTarget, EventType, InputEvent, ListenerCallback};
use crate::stage::Stage;
use crate::types::{FilterId, Property, Target, TimerId};

const NAME: &str = "idle";

const FADE_OUT: Duration = Duration::from_secs(1);
const FADE_IN: Duration = Duration::from_millis(400);

#[derive(Debug, Default)]
pub(crate) struct IdleState {
    pub(crate) lifecycle: Lifecycle,
    timer: Option<TimerId>,
    pub(crate) expirations: u64,
}

pub(crate) fn init(stage: &mut Stage) {
    if !stage.controllers.idle.lifecycle.begin_init() {
        return;
    }
    let owner = stage.owner(NAME);
    let activity = [
        (EventTarget::Container, EventType::PointerMove),
        (EventTarget::Container, EventType::PointerDown),
        (EventTarget::Container, EventType::PointerEnter),
        (EventTarget::Document, EventType::KeyDown),
    ];
    let bindings: Vec<(EventTarget, EventType, ListenerCallback<Stage>)> = activity
        .into_iter()
        .map(|(target, event)| {
            let callback: ListenerCallback<Stage> =
                Box::new(|stage: &mut Stage, _: &InputEvent| on_activity(stage));
            (target, event, callback)
        })
        .collect();
    let bound = stage.ledger.add_event_listeners(&owner, bindings).len();
    arm(stage);
    let armed = stage.controllers.idle.timer.is_some();
    stage
        .controllers
        .idle
        .lifecycle
        .finish_init(bound == activity.len() && armed);
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.idle.lifecycle.begin_dispose() {
        return;
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, Some(AnimationGroup::Idle));
    stage.controllers.idle.timer = None;
    stage.controllers.idle.lifecycle.finish_dispose();
}

/// Replaces the pending idle timer with a fresh one.
fn arm(stage: &mut Stage) {
    if let Some(timer) = stage.controllers.idle.timer.take() {
        stage.ledger.clear_timeout(timer);
    }
    let owner = stage.owner(NAME);
    let delay = stage.props.idle_timeout;
    let now = stage.now;
    stage.controllers.idle.timer = stage.ledger.set_timeout(&owner, delay, now, on_expiry);
}

fn on_activity(stage: &mut Stage) -> anyhow::Result<()> {
    let owner = stage.owner(NAME);
    stage.scheduler.cancel(&owner, UpdateKind::IdleEffect, None);
    if stage.state.filters_idle && stage.state.engaged {
        stage.state.filters_idle = false;
        stage.scheduler.schedule(&owner, UpdateKind::FilterUpdate, restore);
    }
    arm(stage);
    Ok(())
}

fn on_expiry(stage: &mut Stage) -> anyhow::Result<()> {
    stage.controllers.idle.timer = None;
    if !stage.state.engaged {
        return Ok(());
    }
    let owner = stage.owner(NAME);
    stage.scheduler.schedule(&owner, UpdateKind::IdleEffect, fade_out);
    Ok(())
}

fn base_filter(stage: &Stage) -> Option<FilterId> {
    stage
        .scene
        .as_ref()
        .and_then(|scene| scene.displacement)
        .and_then(|rig| rig.filter)
}

fn fade_out(stage: &mut Stage) -> anyhow::Result<()> {
    if !stage.state.engaged {
        return Ok(());
    }
    for group in [AnimationGroup::FilterEffects, AnimationGroup::MouseMovement] {
        stage
            .coordinator
            .cancel_animations_by_type(group, stage.tweens.as_mut(), &mut stage.ledger);
    }
    if let Some(filter) = base_filter(stage) {
        let request = TweenRequest::new(Target::Filter(filter), AnimationGroup::Idle)
            .to(Property::FilterScaleX, 0.0)
            .to(Property::FilterScaleY, 0.0)
            .duration(FADE_OUT)
            .easing(Easing::EaseInOut);
        create_animation(stage, request);
    }
    stage.deactivate_filters();
    stage.state.filters_idle = true;
    stage.controllers.idle.expirations += 1;
    tracing::debug!(instance = %stage.instance, "idle: fading filters out");
    Ok(())
}

fn restore(stage: &mut Stage) -> anyhow::Result<()> {
    stage
        .coordinator
        .cancel_animations_by_type(AnimationGroup::Idle, stage.tweens.as_mut(), &mut stage.ledger);
    stage.state.filters_idle = false;
    if stage.state.engaged {
        stage.activate_filters();
    }
    if let Some(filter) = base_filter(stage) {
        let scale = pointer::base_scale(stage);
        let request = TweenRequest::new(Target::Filter(filter), AnimationGroup::FilterEffects)
            .to(Property::FilterScaleX, scale)
            .to(Property::FilterScaleY, scale)
            .duration(FADE_IN)
            .easing(Easing::EaseInOut);
        create_animation(stage, request);
    }
    tracing::debug!(instance = %stage.instance, "idle: filters restored");
    Ok(())
}
