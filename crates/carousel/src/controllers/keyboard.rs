use super::{release_owner, transition, Lifecycle};
use crate::ledger::{EventTarget, EventType, InputEvent};
use crate::stage::Stage;
use crate::types::Key;

const NAME: &str = "keyboard";

#[derive(Debug, Default)]
pub(crate) struct KeyboardState {
    pub(crate) lifecycle: Lifecycle,
}

pub(crate) fn init(stage: &mut Stage) {
    if !stage.props.keyboard || !stage.controllers.keyboard.lifecycle.begin_init() {
        return;
    }
    let owner = stage.owner(NAME);
    let bound = stage
        .ledger
        .add_event_listener(
            EventTarget::Document,
            EventType::KeyDown,
            &owner,
            |stage: &mut Stage, event: &InputEvent| {
                match *event {
                    InputEvent::KeyDown(Key::ArrowLeft) => {
                        transition::go_prev(stage);
                    }
                    InputEvent::KeyDown(Key::ArrowRight) => {
                        transition::go_next(stage);
                    }
                    _ => {}
                }
                Ok(())
            },
        )
        .is_some();
    stage.controllers.keyboard.lifecycle.finish_init(bound);
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.keyboard.lifecycle.begin_dispose() {
        return;
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, None);
    stage.controllers.keyboard.lifecycle.finish_dispose();
}
