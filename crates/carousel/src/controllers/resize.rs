//! Keeps slides covering the viewport.

use scheduler::UpdateKind;

use super::{release_owner, Lifecycle};
use crate::ledger::{EventTarget, EventType, InputEvent};
use crate::stage::Stage;
use crate::types::{NodeId, Property, Size, Target, TimerId};

const NAME: &str = "resize";

#[derive(Debug, Default)]
pub(crate) struct ResizeState {
    pub(crate) lifecycle: Lifecycle,
    requested: Option<Size>,
    applied: Option<Size>,
    timer: Option<TimerId>,
    pub(crate) applications: u64,
}

/// Scale that makes `texture` cover `container` without letterboxing.
///
/// Wider-than-container images are fitted by height, the rest by width.
pub fn cover_scale(texture: Size, container: Size) -> f32 {
    if texture.is_empty() || container.is_empty() {
        return 1.0;
    }
    if texture.aspect() > container.aspect() {
        container.height / texture.height
    } else {
        container.width / texture.width
    }
}

pub(crate) fn init(stage: &mut Stage) {
    if !stage.controllers.resize.lifecycle.begin_init() {
        return;
    }
    let owner = stage.owner(NAME);
    let bound = stage
        .ledger
        .add_event_listener(
            EventTarget::Window,
            EventType::Resize,
            &owner,
            |stage: &mut Stage, event: &InputEvent| {
                if let InputEvent::Resize(size) = *event {
                    on_resize(stage, size);
                }
                Ok(())
            },
        )
        .is_some();
    let viewport = stage.scene.as_ref().map(|scene| scene.viewport);
    if let Some(viewport) = viewport {
        apply(stage, viewport);
    }
    stage.controllers.resize.lifecycle.finish_init(bound);
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.resize.lifecycle.begin_dispose() {
        return;
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, None);
    let state = &mut stage.controllers.resize;
    state.timer = None;
    state.requested = None;
    state.lifecycle.finish_dispose();
}

/// Debounces window resizes; only the last size of a burst is applied.
fn on_resize(stage: &mut Stage, size: Size) {
    stage.controllers.resize.requested = Some(size);
    if let Some(timer) = stage.controllers.resize.timer.take() {
        stage.ledger.clear_timeout(timer);
    }
    let owner = stage.owner(NAME);
    let delay = stage.props.resize_debounce;
    let now = stage.now;
    stage.controllers.resize.timer = stage.ledger.set_timeout(&owner, delay, now, |stage: &mut Stage| {
        stage.controllers.resize.timer = None;
        let owner = stage.owner(NAME);
        stage.scheduler.schedule(&owner, UpdateKind::SlideTransform, |stage: &mut Stage| {
            if let Some(size) = stage.controllers.resize.requested.take() {
                apply(stage, size);
            }
            Ok(())
        });
        Ok(())
    });
}

/// Recomputes cover scales and recentres every positioned node. Returns
/// `false` when nothing changed.
pub(crate) fn apply(stage: &mut Stage, size: Size) -> bool {
    if size.is_empty() {
        tracing::warn!(width = size.width, height = size.height, "ignoring empty viewport");
        return false;
    }
    if stage.controllers.resize.applied == Some(size) {
        return false;
    }
    if let Some(app) = stage.app {
        if let Err(error) = stage.render.resize(app, size) {
            tracing::warn!(error = %error, "renderer resize failed");
        }
    }
    let Some(scene) = stage.scene.as_mut() else {
        return false;
    };
    scene.viewport = size;
    scene.base_scales = scene
        .texture_sizes
        .iter()
        .map(|texture| cover_scale(*texture, size))
        .collect();

    let center = size.center();
    for (slide, scale) in scene.slides.iter().zip(&scene.base_scales) {
        let target = Target::Node(*slide);
        stage.render.set_property(target, Property::ScaleX, *scale);
        stage.render.set_property(target, Property::ScaleY, *scale);
        stage.render.set_property(target, Property::X, center.x);
        stage.render.set_property(target, Property::Y, center.y);
    }
    let centred: Vec<NodeId> = scene
        .texts
        .iter()
        .map(|group| group.container)
        .chain(scene.displacement.iter().map(|rig| rig.sprite))
        .chain(scene.cursor.iter().map(|rig| rig.sprite))
        .collect();
    for node in centred {
        stage.render.set_property(Target::Node(node), Property::X, center.x);
        stage.render.set_property(Target::Node(node), Property::Y, center.y);
    }

    let state = &mut stage.controllers.resize;
    state.applied = Some(size);
    state.applications += 1;
    tracing::debug!(width = size.width, height = size.height, "viewport applied");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_images_fit_by_height() {
        let scale = cover_scale(Size::new(1600.0, 900.0), Size::new(800.0, 600.0));
        assert!((scale - 600.0 / 900.0).abs() < 1e-6);
        assert!(1600.0 * scale >= 800.0);
    }

    #[test]
    fn tall_images_fit_by_width() {
        let scale = cover_scale(Size::new(600.0, 1200.0), Size::new(800.0, 600.0));
        assert!((scale - 800.0 / 600.0).abs() < 1e-6);
        assert!(1200.0 * scale >= 600.0);
    }

    #[test]
    fn degenerate_sizes_keep_unit_scale() {
        assert_eq!(cover_scale(Size::default(), Size::new(800.0, 600.0)), 1.0);
        assert_eq!(cover_scale(Size::new(10.0, 10.0), Size::new(0.0, 600.0)), 1.0);
    }
}
