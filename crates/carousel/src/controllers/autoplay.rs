use super::{release_owner, transition, Lifecycle};
use crate::stage::Stage;
use crate::types::TimerId;

const NAME: &str = "autoplay";

#[derive(Debug, Default)]
pub(crate) struct AutoplayState {
    pub(crate) lifecycle: Lifecycle,
    timer: Option<TimerId>,
    pub(crate) advances: u64,
}

/// Advances on a fixed period unless the pointer is engaged or a transition
/// is still running.
pub(crate) fn init(stage: &mut Stage) {
    let Some(period) = stage.props.autoplay else {
        return;
    };
    if !stage.controllers.autoplay.lifecycle.begin_init() {
        return;
    }
    let owner = stage.owner(NAME);
    let now = stage.now;
    let timer = stage.ledger.set_interval(&owner, period, now, |stage: &mut Stage| {
        if stage.state.engaged || stage.state.transitioning {
            return Ok(());
        }
        if transition::go_next(stage) {
            stage.controllers.autoplay.advances += 1;
        }
        Ok(())
    });
    stage.controllers.autoplay.timer = timer;
    stage.controllers.autoplay.lifecycle.finish_init(timer.is_some());
}

pub(crate) fn dispose(stage: &mut Stage) {
    if !stage.controllers.autoplay.lifecycle.begin_dispose() {
        return;
    }
    if let Some(timer) = stage.controllers.autoplay.timer.take() {
        stage.ledger.clear_interval(timer);
    }
    let owner = stage.owner(NAME);
    release_owner(stage, &owner, None);
    stage.controllers.autoplay.lifecycle.finish_dispose();
}
