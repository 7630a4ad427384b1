//! Slide-to-slide transitions.
//!
//! Navigation updates `current_index` right away; the visual change runs as a
//! critical scheduler update on the next frame, so several navigation calls
//! in one frame collapse into a single transition to the final index.
//! Interrupting a transition snaps the scene to the last displayed slide
//! before the next one starts.

use std::time::Duration;

use scheduler::{UpdateKind, UpdatePriority};

use super::{release_owner, Lifecycle};
use crate::coordinator::{create_timeline, kill_animation, AnimationGroup};
use crate::easing::Easing;
use crate::stage::Stage;
use crate::types::{NodeId, Property, Target, TweenId};

const NAME: &str = "transition";

/// Scale factor the outgoing slide grows to and the incoming one starts at.
pub(crate) const ZOOM: f32 = 1.15;

#[derive(Debug, Default)]
pub(crate) struct TransitionState {
    pub(crate) lifecycle: Lifecycle,
    /// Slide the scene currently shows, lagging `current_index` until the
    /// scheduled transition runs.
    displayed: usize,
    timeline: Option<TweenId>,
    pub(crate) completed: u64,
}

pub(crate) fn init(stage: &mut Stage) {
    if !stage.controllers.transition.lifecycle.begin_init() {
        return;
    }
    stage.controllers.transition.displayed = stage.state.current_index;
    let ready = stage.scene.is_some();
    stage.controllers.transition.lifecycle.finish_init(ready);
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.transition.lifecycle.begin_dispose() {
        return;
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, Some(AnimationGroup::SlideTransition));
    stage.controllers.transition.timeline = None;
    stage.state.transitioning = false;
    stage.controllers.transition.lifecycle.finish_dispose();
}

/// Requests a transition to `index`. Invalid requests are logged and
/// ignored.
pub(crate) fn transition_to(stage: &mut Stage, index: usize) -> bool {
    if !stage.controllers.transition.lifecycle.is_active() {
        tracing::warn!(index, "slider not ready; ignoring navigation");
        return false;
    }
    let count = stage.slide_count();
    if index >= count {
        tracing::warn!(index, count, "slide index out of range");
        return false;
    }
    if index == stage.state.current_index {
        return false;
    }
    tracing::debug!(from = stage.state.current_index, index, "slide transition requested");
    stage.state.current_index = index;
    stage.state.transitioning = true;
    let owner = stage.owner(NAME);
    stage.scheduler.schedule(&owner, UpdateKind::SlideTransition, run);
    true
}

pub(crate) fn go_next(stage: &mut Stage) -> bool {
    let count = stage.slide_count();
    if count == 0 {
        return false;
    }
    let next = (stage.state.current_index + 1) % count;
    transition_to(stage, next)
}

pub(crate) fn go_prev(stage: &mut Stage) -> bool {
    let count = stage.slide_count();
    if count == 0 {
        return false;
    }
    let prev = (stage.state.current_index + count - 1) % count;
    transition_to(stage, prev)
}

/// Kills the in-flight timeline along with any press or snap-back tween on
/// the slides, then shows only the displayed slide.
fn interrupt(stage: &mut Stage) {
    if let Some(timeline) = stage.controllers.transition.timeline.take() {
        kill_animation(stage, timeline);
        tracing::debug!(displayed = stage.controllers.transition.displayed, "transition interrupted");
    }
    stage.controllers.drag.press = None;
    stage.coordinator.cancel_animations_by_type(
        AnimationGroup::SlideTransition,
        stage.tweens.as_mut(),
        &mut stage.ledger,
    );
    normalize(stage);
}

/// Exactly the displayed slide and its caption visible at full alpha.
fn normalize(stage: &mut Stage) {
    let displayed = stage.controllers.transition.displayed;
    let Some(scene) = stage.scene.as_ref() else {
        return;
    };
    for (index, slide) in scene.slides.iter().enumerate() {
        let shown = index == displayed;
        let target = Target::Node(*slide);
        stage.render.set_visible(*slide, shown);
        stage.render.set_property(target, Property::Alpha, if shown { 1.0 } else { 0.0 });
        let scale = scene.base_scale(index);
        stage.render.set_property(target, Property::ScaleX, scale);
        stage.render.set_property(target, Property::ScaleY, scale);
    }
    for (index, group) in scene.texts.iter().enumerate() {
        let shown = index == displayed;
        stage.render.set_visible(group.container, shown);
        stage
            .render
            .set_property(Target::Node(group.container), Property::Alpha, if shown { 1.0 } else { 0.0 });
    }
}

fn run(stage: &mut Stage) -> anyhow::Result<()> {
    interrupt(stage);
    let target = stage.state.current_index;
    let from = stage.controllers.transition.displayed;
    if from == target {
        stage.state.transitioning = false;
        return Ok(());
    }
    let Some(scene) = stage.scene.as_ref() else {
        stage.state.transitioning = false;
        return Ok(());
    };
    let (Some(&outgoing), Some(&incoming)) = (scene.slides.get(from), scene.slides.get(target)) else {
        tracing::warn!(from, target, "transition handles missing");
        stage.state.transitioning = false;
        return Ok(());
    };
    let from_scale = scene.base_scale(from);
    let to_scale = scene.base_scale(target);
    let texts = (
        scene.text(from).map(|group| group.container),
        scene.text(target).map(|group| group.container),
    );

    stage.render.set_visible(incoming, true);
    let incoming_node = Target::Node(incoming);
    stage.render.set_property(incoming_node, Property::Alpha, 0.0);
    stage.render.set_property(incoming_node, Property::ScaleX, to_scale * ZOOM);
    stage.render.set_property(incoming_node, Property::ScaleY, to_scale * ZOOM);
    if let (_, Some(container)) = texts {
        stage.render.set_visible(container, true);
        stage.render.set_property(Target::Node(container), Property::Alpha, 0.0);
    }

    let Some(timeline) = create_timeline(stage, AnimationGroup::SlideTransition, UpdatePriority::Critical, true)
    else {
        return Ok(());
    };
    stage.controllers.transition.timeline = Some(timeline);
    stage.controllers.transition.displayed = target;

    let duration = stage.props.transition;
    let half = duration / 2;
    let tracks: Vec<(NodeId, Vec<(Property, f32)>, Duration, Duration)> = [
        Some((
            outgoing,
            vec![
                (Property::ScaleX, from_scale * ZOOM),
                (Property::ScaleY, from_scale * ZOOM),
                (Property::Alpha, 0.0),
            ],
            duration,
            Duration::ZERO,
        )),
        Some((
            incoming,
            vec![
                (Property::ScaleX, to_scale),
                (Property::ScaleY, to_scale),
                (Property::Alpha, 1.0),
            ],
            duration,
            Duration::ZERO,
        )),
        texts.0.map(|node| (node, vec![(Property::Alpha, 0.0)], half, Duration::ZERO)),
        texts.1.map(|node| (node, vec![(Property::Alpha, 1.0)], half, half)),
    ]
    .into_iter()
    .flatten()
    .collect();
    for (node, properties, length, at) in tracks {
        let added = stage
            .tweens
            .timeline_add(timeline, Target::Node(node), &properties, length, Easing::EaseInOut, at);
        if let Err(error) = added {
            // Land on the target without animating.
            stage.controllers.transition.timeline = None;
            kill_animation(stage, timeline);
            normalize(stage);
            stage.state.transitioning = false;
            return Err(error.into());
        }
    }

    stage.coordinator.on_complete(timeline, move |stage: &mut Stage| {
        // An interrupted timeline was already detached and normalised.
        if stage.controllers.transition.timeline != Some(timeline) {
            return Ok(());
        }
        stage.controllers.transition.timeline = None;
        normalize(stage);
        stage.controllers.transition.completed += 1;
        let owner = stage.owner(NAME);
        stage.state.transitioning = stage.scheduler.is_pending(&owner, UpdateKind::SlideTransition, None);
        tracing::debug!(index = stage.controllers.transition.displayed, "slide transition complete");
        Ok(())
    });
    Ok(())
}
