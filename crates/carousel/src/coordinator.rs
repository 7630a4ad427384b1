//! Groups tweens by effect so they can be started on the frame pipeline and
//! killed together.
//!
//! Critical tweens play as soon as they are created. Everything else is
//! created paused and started by a scheduler update of the group's kind, so a
//! burst of pointer events or filter changes starts at most one wave of
//! tweens per frame.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use scheduler::{RenderScheduler, UpdateKind, UpdatePriority};
use serde::Serialize;

use crate::easing::Easing;
use crate::engine::AnimationEngine;
use crate::ledger::ResourceLedger;
use crate::types::{Property, Target, TweenId};

pub type CompletionCallback<C> = Box<dyn FnOnce(&mut C) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationGroup {
    MouseMovement,
    SlideTransition,
    TextEffects,
    FilterEffects,
    Displacement,
    Idle,
}

impl AnimationGroup {
    pub const ALL: [AnimationGroup; 6] = [
        AnimationGroup::MouseMovement,
        AnimationGroup::SlideTransition,
        AnimationGroup::TextEffects,
        AnimationGroup::FilterEffects,
        AnimationGroup::Displacement,
        AnimationGroup::Idle,
    ];

    pub fn for_update(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::MouseResponse => AnimationGroup::MouseMovement,
            UpdateKind::SlideTransition | UpdateKind::SlideTransform => {
                AnimationGroup::SlideTransition
            }
            UpdateKind::FilterUpdate => AnimationGroup::FilterEffects,
            UpdateKind::DisplacementEffect => AnimationGroup::Displacement,
            UpdateKind::IdleEffect => AnimationGroup::Idle,
            UpdateKind::TextPosition => AnimationGroup::TextEffects,
        }
    }

    /// Update kind used to schedule this group's execution.
    pub fn update_kind(self) -> UpdateKind {
        match self {
            AnimationGroup::MouseMovement => UpdateKind::MouseResponse,
            AnimationGroup::SlideTransition => UpdateKind::SlideTransition,
            AnimationGroup::TextEffects => UpdateKind::TextPosition,
            AnimationGroup::FilterEffects => UpdateKind::FilterUpdate,
            AnimationGroup::Displacement => UpdateKind::DisplacementEffect,
            AnimationGroup::Idle => UpdateKind::IdleEffect,
        }
    }
}

impl fmt::Display for AnimationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnimationGroup::MouseMovement => "mouse-movement",
            AnimationGroup::SlideTransition => "slide-transition",
            AnimationGroup::TextEffects => "text-effects",
            AnimationGroup::FilterEffects => "filter-effects",
            AnimationGroup::Displacement => "displacement",
            AnimationGroup::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Parameters for [`create_animation`].
#[derive(Debug, Clone, PartialEq)]
pub struct TweenRequest {
    pub target: Target,
    pub properties: Vec<(Property, f32)>,
    pub duration: Duration,
    pub easing: Easing,
    pub group: AnimationGroup,
    pub priority: UpdatePriority,
    pub critical: bool,
}

impl TweenRequest {
    pub fn new(target: Target, group: AnimationGroup) -> Self {
        Self {
            target,
            properties: Vec::new(),
            duration: Duration::from_millis(300),
            easing: Easing::default(),
            group,
            priority: group.update_kind().priority(),
            critical: false,
        }
    }

    pub fn to(mut self, property: Property, value: f32) -> Self {
        self.properties.push((property, value));
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn priority(mut self, priority: UpdatePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

/// Tweens that complete together and share one completion callback.
pub struct AnimationBatch<C> {
    pub id: String,
    pub group: AnimationGroup,
    pub animations: Vec<TweenId>,
    pub on_complete: Option<CompletionCallback<C>>,
}

struct PendingBatch<C> {
    id: String,
    group: AnimationGroup,
    remaining: BTreeSet<TweenId>,
    on_complete: Option<CompletionCallback<C>>,
}

#[derive(Debug, Clone, Copy)]
struct Member {
    group: AnimationGroup,
    priority: UpdatePriority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub groups: usize,
    pub live: usize,
    pub queued: usize,
    pub batches: usize,
    pub callbacks: usize,
}

pub struct AnimationCoordinator<C> {
    owner: String,
    groups: BTreeMap<AnimationGroup, BTreeSet<TweenId>>,
    queued: BTreeMap<AnimationGroup, Vec<TweenId>>,
    members: HashMap<TweenId, Member>,
    callbacks: HashMap<TweenId, CompletionCallback<C>>,
    batches: Vec<PendingBatch<C>>,
}

impl<C> fmt::Debug for AnimationCoordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationCoordinator")
            .field("owner", &self.owner)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<C> AnimationCoordinator<C> {
    /// `owner` keys the scheduler updates that start queued groups.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            groups: BTreeMap::new(),
            queued: BTreeMap::new(),
            members: HashMap::new(),
            callbacks: HashMap::new(),
            batches: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn register(&mut self, tween: TweenId, group: AnimationGroup, priority: UpdatePriority, queued: bool) {
        self.groups.entry(group).or_default().insert(tween);
        self.members.insert(tween, Member { group, priority });
        if queued {
            self.queued.entry(group).or_default().push(tween);
        }
    }

    /// Live members of `group`.
    pub fn group_members(&self, group: AnimationGroup) -> Vec<TweenId> {
        self.groups
            .get(&group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn group_of(&self, tween: TweenId) -> Option<AnimationGroup> {
        self.members.get(&tween).map(|m| m.group)
    }

    pub fn queued_len(&self, group: AnimationGroup) -> usize {
        self.queued.get(&group).map_or(0, Vec::len)
    }

    /// Runs `callback` once `tween` completes. Dropped if the tween is killed.
    pub fn on_complete<F>(&mut self, tween: TweenId, callback: F)
    where
        F: FnOnce(&mut C) -> anyhow::Result<()> + 'static,
    {
        self.callbacks.insert(tween, Box::new(callback));
    }

    /// Starts every queued tween of `group`, highest priority first, and
    /// clears the queue. Returns how many were started.
    pub fn execute_group(&mut self, group: AnimationGroup, tweens: &mut dyn AnimationEngine) -> usize {
        let mut queued = self.queued.remove(&group).unwrap_or_default();
        queued.sort_by_key(|id| {
            std::cmp::Reverse(self.members.get(id).map(|m| m.priority))
        });
        let mut started = 0;
        for tween in queued {
            if tweens.is_alive(tween) && !tweens.is_active(tween) && tweens.play(tween) {
                started += 1;
            }
        }
        if started > 0 {
            tracing::trace!(owner = %self.owner, %group, started, "animation group started");
        }
        started
    }

    fn forget(&mut self, tween: TweenId) -> Option<AnimationGroup> {
        let member = self.members.remove(&tween)?;
        if let Some(bucket) = self.groups.get_mut(&member.group) {
            bucket.remove(&tween);
        }
        if let Some(queue) = self.queued.get_mut(&member.group) {
            queue.retain(|id| *id != tween);
        }
        Some(member.group)
    }

    fn settle_batches(&mut self, tween: TweenId) -> Vec<CompletionCallback<C>> {
        let mut settled = Vec::new();
        self.batches.retain_mut(|batch| {
            batch.remaining.remove(&tween);
            if !batch.remaining.is_empty() {
                return true;
            }
            tracing::trace!(batch = %batch.id, group = %batch.group, "animation batch settled");
            if let Some(callback) = batch.on_complete.take() {
                settled.push(callback);
            }
            false
        });
        settled
    }

    /// Routes a finished tween: returns its own completion callback followed
    /// by those of any batch it settled.
    pub fn on_tween_completed(&mut self, tween: TweenId) -> Vec<CompletionCallback<C>> {
        self.forget(tween);
        let mut ready: Vec<CompletionCallback<C>> = self.callbacks.remove(&tween).into_iter().collect();
        ready.extend(self.settle_batches(tween));
        ready
    }

    /// Like [`on_tween_completed`](Self::on_tween_completed) for a tween that
    /// was killed: its own callback is dropped, batches still settle.
    pub fn on_tween_killed(&mut self, tween: TweenId) -> Vec<CompletionCallback<C>> {
        self.forget(tween);
        self.callbacks.remove(&tween);
        self.settle_batches(tween)
    }

    /// Kills every member of `group` and empties it. Pending callbacks and
    /// batches of the group are dropped without running.
    pub fn cancel_animations_by_type(
        &mut self,
        group: AnimationGroup,
        tweens: &mut dyn AnimationEngine,
        ledger: &mut ResourceLedger<C>,
    ) -> usize {
        let members = self.groups.get_mut(&group).map(std::mem::take).unwrap_or_default();
        self.queued.remove(&group);
        for tween in &members {
            tweens.kill(*tween);
            ledger.forget_animation(*tween);
            self.members.remove(tween);
            self.callbacks.remove(tween);
        }
        self.batches.retain(|batch| batch.group != group);
        if !members.is_empty() {
            tracing::trace!(owner = %self.owner, %group, killed = members.len(), "animation group cancelled");
        }
        members.len()
    }

    /// Teardown variant of [`cancel_animations_by_type`](Self::cancel_animations_by_type)
    /// that also drops the group's bucket.
    pub fn kill_animation_group(
        &mut self,
        group: AnimationGroup,
        tweens: &mut dyn AnimationEngine,
        ledger: &mut ResourceLedger<C>,
    ) -> usize {
        let killed = self.cancel_animations_by_type(group, tweens, ledger);
        self.groups.remove(&group);
        killed
    }

    pub fn kill_all_animations(
        &mut self,
        tweens: &mut dyn AnimationEngine,
        ledger: &mut ResourceLedger<C>,
    ) -> usize {
        let killed = AnimationGroup::ALL
            .into_iter()
            .map(|group| self.kill_animation_group(group, tweens, ledger))
            .sum();
        self.callbacks.clear();
        self.batches.clear();
        killed
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            groups: self.groups.len(),
            live: self.members.len(),
            queued: self.queued.values().map(Vec::len).sum(),
            batches: self.batches.len(),
            callbacks: self.callbacks.len(),
        }
    }
}

/// Split borrow of the pieces animation routing needs from a frame context.
pub struct AnimationParts<'a, C> {
    pub coordinator: &'a mut AnimationCoordinator<C>,
    pub tweens: &'a mut dyn AnimationEngine,
    pub ledger: &'a mut ResourceLedger<C>,
    pub scheduler: &'a mut RenderScheduler<C>,
}

/// Frame context that owns a coordinator and the services it drives.
pub trait AnimationHost: Sized + 'static {
    fn animation_parts(&mut self) -> AnimationParts<'_, Self>;
}

fn schedule_group<C: AnimationHost>(parts: &mut AnimationParts<'_, C>, group: AnimationGroup) {
    let owner = parts.coordinator.owner().to_string();
    parts.scheduler.schedule(&owner, group.update_kind(), move |ctx: &mut C| {
        let parts = ctx.animation_parts();
        parts.coordinator.execute_group(group, parts.tweens);
        Ok(())
    });
}

/// Creates a tracked tween. Returns `None` once the ledger is unmounting.
pub fn create_animation<C: AnimationHost>(ctx: &mut C, request: TweenRequest) -> Option<TweenId> {
    let mut parts = ctx.animation_parts();
    let tween = parts.tweens.animate_to(
        request.target,
        &request.properties,
        request.duration,
        request.easing,
        !request.critical,
    );
    parts.ledger.track_animation(parts.tweens, tween)?;
    parts
        .coordinator
        .register(tween, request.group, request.priority, !request.critical);
    if !request.critical {
        schedule_group(&mut parts, request.group);
    }
    Some(tween)
}

/// Creates an empty tracked timeline for `group`.
pub fn create_timeline<C: AnimationHost>(
    ctx: &mut C,
    group: AnimationGroup,
    priority: UpdatePriority,
    critical: bool,
) -> Option<TweenId> {
    let mut parts = ctx.animation_parts();
    let timeline = parts.tweens.create_timeline(!critical);
    parts.ledger.track_animation(parts.tweens, timeline)?;
    parts.coordinator.register(timeline, group, priority, !critical);
    if !critical {
        schedule_group(&mut parts, group);
    }
    Some(timeline)
}

/// Registers a batch whose callback fires once every member has finished.
pub fn queue_animation_group<C: AnimationHost>(ctx: &mut C, batch: AnimationBatch<C>) {
    let mut parts = ctx.animation_parts();
    let remaining: BTreeSet<TweenId> = batch
        .animations
        .iter()
        .copied()
        .filter(|tween| parts.tweens.is_alive(*tween))
        .collect();
    for tween in &remaining {
        if parts.coordinator.group_of(*tween).is_none() {
            parts.coordinator.register(*tween, batch.group, batch.group.update_kind().priority(), true);
        }
        if !parts.tweens.is_active(*tween) {
            let queue = parts.coordinator.queued.entry(batch.group).or_default();
            if !queue.contains(tween) {
                queue.push(*tween);
            }
        }
    }
    let empty = remaining.is_empty();
    parts.coordinator.batches.push(PendingBatch {
        id: batch.id,
        group: batch.group,
        remaining,
        on_complete: batch.on_complete,
    });
    if empty {
        // Nothing left to wait for: settle on the group's next tick.
        let owner = parts.coordinator.owner().to_string();
        let group = batch.group;
        parts.scheduler.schedule_with_suffix(&owner, group.update_kind(), "settle", move |ctx: &mut C| {
            let ready: Vec<CompletionCallback<C>> = {
                let coordinator = ctx.animation_parts().coordinator;
                let mut ready = Vec::new();
                coordinator.batches.retain_mut(|batch| {
                    if batch.group == group && batch.remaining.is_empty() {
                        ready.extend(batch.on_complete.take());
                        false
                    } else {
                        true
                    }
                });
                ready
            };
            run_callbacks(ctx, ready);
            Ok(())
        });
    } else {
        schedule_group(&mut parts, batch.group);
    }
}

/// Feeds finished tweens back into the coordinator and runs their callbacks.
pub fn complete_animations<C: AnimationHost>(ctx: &mut C, finished: &[TweenId]) -> usize {
    let mut ran = 0;
    for tween in finished {
        let ready = {
            let parts = ctx.animation_parts();
            parts.ledger.forget_animation(*tween);
            parts.coordinator.on_tween_completed(*tween)
        };
        ran += run_callbacks(ctx, ready);
    }
    ran
}

/// Kills one tween. Batches it belonged to may settle and fire.
pub fn kill_animation<C: AnimationHost>(ctx: &mut C, tween: TweenId) -> bool {
    let (killed, ready) = {
        let parts = ctx.animation_parts();
        let killed = parts.tweens.kill(tween);
        parts.ledger.forget_animation(tween);
        (killed, parts.coordinator.on_tween_killed(tween))
    };
    run_callbacks(ctx, ready);
    killed
}

fn run_callbacks<C>(ctx: &mut C, callbacks: Vec<CompletionCallback<C>>) -> usize {
    let count = callbacks.len();
    for callback in callbacks {
        if let Err(error) = callback(ctx) {
            tracing::warn!(error = %error, "animation completion callback failed");
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PropertyAccess, RenderEngine};
    use crate::headless::{HeadlessRenderer, TweenEngine};
    use crate::types::NodeId;

    const FRAME: Duration = Duration::from_millis(16);

    struct Ctx {
        render: HeadlessRenderer,
        tweens: TweenEngine,
        ledger: ResourceLedger<Ctx>,
        scheduler: RenderScheduler<Ctx>,
        coordinator: AnimationCoordinator<Ctx>,
        log: Vec<String>,
    }

    impl AnimationHost for Ctx {
        fn animation_parts(&mut self) -> AnimationParts<'_, Self> {
            AnimationParts {
                coordinator: &mut self.coordinator,
                tweens: &mut self.tweens,
                ledger: &mut self.ledger,
                scheduler: &mut self.scheduler,
            }
        }
    }

    impl Ctx {
        fn new() -> Self {
            Self {
                render: HeadlessRenderer::default(),
                tweens: TweenEngine::new(),
                ledger: ResourceLedger::new("test"),
                scheduler: RenderScheduler::new(),
                coordinator: AnimationCoordinator::new("test:animations"),
                log: Vec::new(),
            }
        }

        fn node(&mut self) -> NodeId {
            self.render.create_container().unwrap()
        }

        fn frame(&mut self) {
            scheduler::flush(self, |ctx| &mut ctx.scheduler);
            let finished = self.tweens.advance(FRAME, &mut self.render);
            complete_animations(self, &finished);
        }

        fn x(&self, node: NodeId) -> f32 {
            self.render.property(Target::Node(node), Property::X).unwrap()
        }
    }

    fn slide(node: NodeId, group: AnimationGroup) -> TweenRequest {
        TweenRequest::new(Target::Node(node), group)
            .to(Property::X, 32.0)
            .duration(FRAME * 2)
            .easing(Easing::Linear)
    }

    #[test]
    fn update_kinds_map_to_groups_and_back() {
        for group in AnimationGroup::ALL {
            assert_eq!(AnimationGroup::for_update(group.update_kind()), group);
        }
        assert_eq!(
            AnimationGroup::for_update(UpdateKind::SlideTransform),
            AnimationGroup::SlideTransition
        );
    }

    #[test]
    fn critical_tweens_start_immediately() {
        let mut ctx = Ctx::new();
        let node = ctx.node();
        let tween = create_animation(&mut ctx, slide(node, AnimationGroup::SlideTransition).critical()).unwrap();
        assert!(ctx.tweens.is_active(tween));
        assert!(ctx.scheduler.is_empty());
    }

    #[test]
    fn deferred_tweens_start_on_their_group_tick() {
        let mut ctx = Ctx::new();
        let node = ctx.node();
        let tween = create_animation(&mut ctx, slide(node, AnimationGroup::MouseMovement)).unwrap();
        assert!(!ctx.tweens.is_active(tween));
        assert!(ctx
            .scheduler
            .is_pending("test:animations", UpdateKind::MouseResponse, None));

        ctx.frame();
        // Started during the flush, then advanced in the same frame.
        assert!((ctx.x(node) - 16.0).abs() < 1e-3);
        assert_eq!(ctx.coordinator.queued_len(AnimationGroup::MouseMovement), 0);
        ctx.frame();
        assert_eq!(ctx.coordinator.stats().live, 0);
        assert_eq!(ctx.ledger.stats().animations, 0);
    }

    #[test]
    fn completion_callbacks_run_once() {
        let mut ctx = Ctx::new();
        let node = ctx.node();
        let tween = create_animation(&mut ctx, slide(node, AnimationGroup::TextEffects).critical()).unwrap();
        ctx.coordinator.on_complete(tween, |ctx: &mut Ctx| {
            ctx.log.push("done".into());
            Ok(())
        });
        for _ in 0..5 {
            ctx.frame();
        }
        assert_eq!(ctx.log, vec!["done"]);
    }

    #[test]
    fn batch_fires_after_last_member() {
        let mut ctx = Ctx::new();
        let a = ctx.node();
        let b = ctx.node();
        let short = create_animation(&mut ctx, slide(a, AnimationGroup::FilterEffects)).unwrap();
        let long = create_animation(&mut ctx, slide(b, AnimationGroup::FilterEffects).duration(FRAME * 4)).unwrap();
        queue_animation_group(
            &mut ctx,
            AnimationBatch {
                id: "restore".into(),
                group: AnimationGroup::FilterEffects,
                animations: vec![short, long],
                on_complete: Some(Box::new(|ctx: &mut Ctx| {
                    ctx.log.push("batch".into());
                    Ok(())
                })),
            },
        );
        ctx.frame();
        ctx.frame();
        assert!(ctx.log.is_empty());
        ctx.frame();
        ctx.frame();
        assert_eq!(ctx.log, vec!["batch"]);
        assert_eq!(ctx.coordinator.stats().batches, 0);
    }

    #[test]
    fn killed_member_settles_batch_without_own_callback() {
        let mut ctx = Ctx::new();
        let node = ctx.node();
        let tween = create_animation(&mut ctx, slide(node, AnimationGroup::Idle).critical()).unwrap();
        ctx.coordinator.on_complete(tween, |ctx: &mut Ctx| {
            ctx.log.push("tween".into());
            Ok(())
        });
        queue_animation_group(
            &mut ctx,
            AnimationBatch {
                id: "idle-fade".into(),
                group: AnimationGroup::Idle,
                animations: vec![tween],
                on_complete: Some(Box::new(|ctx: &mut Ctx| {
                    ctx.log.push("batch".into());
                    Ok(())
                })),
            },
        );
        assert!(kill_animation(&mut ctx, tween));
        assert_eq!(ctx.log, vec!["batch"]);
    }

    #[test]
    fn cancel_by_type_kills_members_and_drops_callbacks() {
        let mut ctx = Ctx::new();
        let node = ctx.node();
        let other = ctx.node();
        let doomed = create_animation(&mut ctx, slide(node, AnimationGroup::MouseMovement).critical()).unwrap();
        let kept = create_animation(&mut ctx, slide(other, AnimationGroup::TextEffects).critical()).unwrap();
        ctx.coordinator.on_complete(doomed, |ctx: &mut Ctx| {
            ctx.log.push("never".into());
            Ok(())
        });

        let parts = ctx.animation_parts();
        let killed = parts
            .coordinator
            .cancel_animations_by_type(AnimationGroup::MouseMovement, parts.tweens, parts.ledger);
        assert_eq!(killed, 1);
        assert!(!ctx.tweens.is_alive(doomed));
        assert!(ctx.tweens.is_alive(kept));
        assert!(ctx.coordinator.group_members(AnimationGroup::MouseMovement).is_empty());
        for _ in 0..4 {
            ctx.frame();
        }
        assert!(ctx.log.is_empty());
        assert_eq!(ctx.x(other), 32.0);
    }

    #[test]
    fn kill_all_leaves_nothing_behind() {
        let mut ctx = Ctx::new();
        for group in AnimationGroup::ALL {
            let node = ctx.node();
            create_animation(&mut ctx, slide(node, group)).unwrap();
        }
        let parts = ctx.animation_parts();
        assert_eq!(parts.coordinator.kill_all_animations(parts.tweens, parts.ledger), 6);
        assert_eq!(ctx.coordinator.stats(), CoordinatorStats::default());
        assert_eq!(ctx.tweens.live_count(), 0);
        assert_eq!(ctx.ledger.stats().animations, 0);
        // Queued group ticks find nothing to start.
        ctx.frame();
        assert_eq!(ctx.tweens.live_count(), 0);
    }

    #[test]
    fn unmounting_ledger_refuses_new_tweens() {
        let mut ctx = Ctx::new();
        let node = ctx.node();
        ctx.ledger.mark_unmounting();
        assert!(create_animation(&mut ctx, slide(node, AnimationGroup::Idle)).is_none());
        assert_eq!(ctx.tweens.live_count(), 0);
        assert!(ctx.scheduler.is_empty());
    }
}
