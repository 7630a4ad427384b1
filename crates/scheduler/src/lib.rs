//! Frame-aligned update scheduler.
//!
//! Effect sources (pointer movement, idle timers, resize, slide navigation)
//! submit named updates at whatever rate their inputs fire. The scheduler
//! keeps at most one pending update per `(owner, kind, suffix)` key and runs
//! the surviving callbacks once per animation frame in priority order:
//!
//! ```text
//!   schedule(owner, kind, cb) ──▶ pending map (last submission wins)
//!                                      │ take_batch()
//!                                      ▼
//!   frame tick ──▶ FlushBatch (stable-sorted by priority) ──▶ run(&mut ctx)
//! ```
//!
//! Callbacks receive `&mut C`, the caller's frame context. The scheduler is
//! usually a field of that context; [`flush`] drains the queue before any
//! callback runs, so anything submitted from inside a callback waits for the
//! next frame.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Result type returned by every scheduled callback.
pub type UpdateResult = anyhow::Result<()>;

/// Boxed callback stored in the pending queue.
pub type UpdateCallback<C> = Box<dyn FnOnce(&mut C) -> UpdateResult>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("unknown update kind '{0}'")]
    UnknownKind(String),
}

/// Categories of deferred work. Each maps to a fixed priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateKind {
    MouseResponse,
    FilterUpdate,
    SlideTransition,
    DisplacementEffect,
    IdleEffect,
    TextPosition,
    SlideTransform,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 7] = [
        UpdateKind::MouseResponse,
        UpdateKind::FilterUpdate,
        UpdateKind::SlideTransition,
        UpdateKind::DisplacementEffect,
        UpdateKind::IdleEffect,
        UpdateKind::TextPosition,
        UpdateKind::SlideTransform,
    ];

    pub fn priority(self) -> UpdatePriority {
        match self {
            UpdateKind::SlideTransition => UpdatePriority::Critical,
            UpdateKind::MouseResponse | UpdateKind::SlideTransform => UpdatePriority::High,
            UpdateKind::FilterUpdate | UpdateKind::IdleEffect | UpdateKind::TextPosition => {
                UpdatePriority::Normal
            }
            UpdateKind::DisplacementEffect => UpdatePriority::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateKind::MouseResponse => "mouse-response",
            UpdateKind::FilterUpdate => "filter-update",
            UpdateKind::SlideTransition => "slide-transition",
            UpdateKind::DisplacementEffect => "displacement-effect",
            UpdateKind::IdleEffect => "idle-effect",
            UpdateKind::TextPosition => "text-position",
            UpdateKind::SlideTransform => "slide-transform",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UpdateKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpdateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| SchedulerError::UnknownKind(s.to_string()))
    }
}

/// Execution tiers; higher tiers run first within a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdatePriority {
    Low,
    Normal,
    High,
    Critical,
}

/// De-duplication key for a pending update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateKey {
    pub owner: String,
    pub kind: UpdateKind,
    pub suffix: Option<String>,
}

impl UpdateKey {
    pub fn new(owner: impl Into<String>, kind: UpdateKind, suffix: Option<&str>) -> Self {
        Self {
            owner: owner.into(),
            kind,
            suffix: suffix.map(str::to_string),
        }
    }
}

impl fmt::Display for UpdateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{}:{}:{}", self.owner, self.kind, suffix),
            None => write!(f, "{}:{}", self.owner, self.kind),
        }
    }
}

struct PendingUpdate<C> {
    key: UpdateKey,
    callback: UpdateCallback<C>,
    replaced: u32,
}

/// Per-frame coalescing queue of update callbacks.
pub struct RenderScheduler<C> {
    pending: BTreeMap<u64, PendingUpdate<C>>,
    index: HashMap<UpdateKey, u64>,
    next_seq: u64,
    frame: u64,
}

impl<C> Default for RenderScheduler<C> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            frame: 0,
        }
    }
}

impl<C> fmt::Debug for RenderScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("pending", &self.pending.len())
            .field("frame", &self.frame)
            .finish()
    }
}

impl<C> RenderScheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts an update for `(owner, kind)`. Returns `true` when an already
    /// pending callback was replaced.
    pub fn schedule<F>(&mut self, owner: &str, kind: UpdateKind, callback: F) -> bool
    where
        F: FnOnce(&mut C) -> UpdateResult + 'static,
    {
        self.schedule_keyed(UpdateKey::new(owner, kind, None), Box::new(callback))
    }

    /// Like [`schedule`](Self::schedule) but with an extra key component so a
    /// single owner can keep several updates of the same kind in flight.
    pub fn schedule_with_suffix<F>(
        &mut self,
        owner: &str,
        kind: UpdateKind,
        suffix: &str,
        callback: F,
    ) -> bool
    where
        F: FnOnce(&mut C) -> UpdateResult + 'static,
    {
        self.schedule_keyed(UpdateKey::new(owner, kind, Some(suffix)), Box::new(callback))
    }

    pub fn schedule_keyed(&mut self, key: UpdateKey, callback: UpdateCallback<C>) -> bool {
        if let Some(seq) = self.index.get(&key) {
            if let Some(entry) = self.pending.get_mut(seq) {
                // Keeps the original queue slot so same-tier ordering stays
                // first-submission order.
                entry.callback = callback;
                entry.replaced += 1;
                return true;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(key.clone(), seq);
        self.pending.insert(
            seq,
            PendingUpdate {
                key,
                callback,
                replaced: 0,
            },
        );
        false
    }

    /// Removes a pending update without running it.
    pub fn cancel(&mut self, owner: &str, kind: UpdateKind, suffix: Option<&str>) -> bool {
        let key = UpdateKey::new(owner, kind, suffix);
        match self.index.remove(&key) {
            Some(seq) => self.pending.remove(&seq).is_some(),
            None => false,
        }
    }

    /// Removes every pending update submitted by `owner`.
    pub fn cancel_owner(&mut self, owner: &str) -> usize {
        let doomed: Vec<UpdateKey> = self
            .index
            .keys()
            .filter(|key| key.owner == owner)
            .cloned()
            .collect();
        let mut removed = 0;
        for key in doomed {
            if let Some(seq) = self.index.remove(&key) {
                if self.pending.remove(&seq).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    pub fn is_pending(&self, owner: &str, kind: UpdateKind, suffix: Option<&str>) -> bool {
        self.index.contains_key(&UpdateKey::new(owner, kind, suffix))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of batches taken so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Drops everything pending without running it.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.index.clear();
        dropped
    }

    /// Drains the queue into a priority-ordered batch for this frame.
    pub fn take_batch(&mut self) -> FlushBatch<C> {
        self.frame += 1;
        self.index.clear();
        let mut entries: Vec<PendingUpdate<C>> =
            std::mem::take(&mut self.pending).into_values().collect();
        // `sort_by` is stable: equal tiers keep submission order.
        entries.sort_by(|a, b| b.key.kind.priority().cmp(&a.key.kind.priority()));
        FlushBatch {
            frame: self.frame,
            entries,
        }
    }
}

/// Updates captured for one frame, already in execution order.
pub struct FlushBatch<C> {
    frame: u64,
    entries: Vec<PendingUpdate<C>>,
}

impl<C> FlushBatch<C> {
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &UpdateKey> {
        self.entries.iter().map(|entry| &entry.key)
    }

    /// Runs every callback. A failing callback is logged and skipped; the
    /// rest of the batch still runs.
    pub fn run(self, ctx: &mut C) -> FlushReport {
        let mut report = FlushReport {
            frame: self.frame,
            ..FlushReport::default()
        };
        for entry in self.entries {
            report.coalesced += entry.replaced as usize;
            let key = entry.key;
            match (entry.callback)(ctx) {
                Ok(()) => report.executed += 1,
                Err(error) => {
                    tracing::warn!(
                        owner = %key.owner,
                        kind = %key.kind,
                        suffix = ?key.suffix,
                        error = %error,
                        "scheduled update failed"
                    );
                    report.failed += 1;
                }
            }
            report.order.push(key);
        }
        report
    }
}

/// Outcome of one flush.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub frame: u64,
    pub executed: usize,
    pub failed: usize,
    /// Submissions absorbed by de-duplication before this flush.
    pub coalesced: usize,
    pub order: Vec<UpdateKey>,
}

impl FlushReport {
    pub fn kinds(&self) -> Vec<UpdateKind> {
        self.order.iter().map(|key| key.kind).collect()
    }
}

/// Flushes the scheduler that lives inside `ctx`.
///
/// The queue is drained before the first callback runs, so updates scheduled
/// by callbacks are deferred to the next call.
pub fn flush<C, F>(ctx: &mut C, scheduler: F) -> FlushReport
where
    F: Fn(&mut C) -> &mut RenderScheduler<C>,
{
    let batch = scheduler(ctx).take_batch();
    if batch.is_empty() {
        return FlushReport {
            frame: batch.frame(),
            ..FlushReport::default()
        };
    }
    tracing::trace!(frame = batch.frame(), updates = batch.len(), "flushing updates");
    batch.run(ctx)
}

/// Runs `callback` right away, outside any frame. Used by teardown paths
/// that must not wait for the next tick.
pub fn execute_immediate<C, F>(ctx: &mut C, callback: F) -> bool
where
    F: FnOnce(&mut C) -> UpdateResult,
{
    match callback(ctx) {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(error = %error, "immediate update failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ctx {
        scheduler: RenderScheduler<Ctx>,
        log: Vec<String>,
        counter: u32,
    }

    fn flush_ctx(ctx: &mut Ctx) -> FlushReport {
        flush(ctx, |ctx| &mut ctx.scheduler)
    }

    #[test]
    fn same_key_submissions_collapse_to_last() {
        let mut ctx = Ctx::default();
        for i in 0..200 {
            ctx.scheduler
                .schedule("slider-1", UpdateKind::DisplacementEffect, move |ctx: &mut Ctx| {
                    ctx.counter += 1;
                    ctx.log.push(format!("move-{i}"));
                    Ok(())
                });
        }
        assert_eq!(ctx.scheduler.pending_len(), 1);

        let report = flush_ctx(&mut ctx);
        assert_eq!(report.executed, 1);
        assert_eq!(report.coalesced, 199);
        assert_eq!(ctx.counter, 1);
        assert_eq!(ctx.log, vec!["move-199".to_string()]);
    }

    #[test]
    fn different_kinds_for_same_owner_do_not_overwrite() {
        let mut ctx = Ctx::default();
        ctx.scheduler
            .schedule("a", UpdateKind::IdleEffect, |ctx: &mut Ctx| {
                ctx.log.push("idle".into());
                Ok(())
            });
        ctx.scheduler
            .schedule("a", UpdateKind::FilterUpdate, |ctx: &mut Ctx| {
                ctx.log.push("filter".into());
                Ok(())
            });
        ctx.scheduler
            .schedule_with_suffix("a", UpdateKind::FilterUpdate, "rgb", |ctx: &mut Ctx| {
                ctx.log.push("filter-rgb".into());
                Ok(())
            });
        assert_eq!(ctx.scheduler.pending_len(), 3);
        flush_ctx(&mut ctx);
        assert_eq!(ctx.log, vec!["idle", "filter", "filter-rgb"]);
    }

    #[test]
    fn flush_runs_higher_priority_first_and_keeps_submission_order() {
        let mut ctx = Ctx::default();
        let kinds = [
            UpdateKind::DisplacementEffect,
            UpdateKind::IdleEffect,
            UpdateKind::MouseResponse,
            UpdateKind::TextPosition,
            UpdateKind::SlideTransition,
            UpdateKind::SlideTransform,
            UpdateKind::FilterUpdate,
        ];
        for kind in kinds {
            ctx.scheduler.schedule("owner", kind, move |ctx: &mut Ctx| {
                ctx.log.push(kind.to_string());
                Ok(())
            });
        }

        let report = flush_ctx(&mut ctx);
        assert_eq!(
            report.kinds(),
            vec![
                UpdateKind::SlideTransition,
                UpdateKind::MouseResponse,
                UpdateKind::SlideTransform,
                UpdateKind::IdleEffect,
                UpdateKind::TextPosition,
                UpdateKind::FilterUpdate,
                UpdateKind::DisplacementEffect,
            ]
        );
        let priorities: Vec<UpdatePriority> =
            report.kinds().into_iter().map(UpdateKind::priority).collect();
        assert!(priorities.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn replacement_keeps_original_slot() {
        let mut ctx = Ctx::default();
        ctx.scheduler.schedule("first", UpdateKind::IdleEffect, |ctx: &mut Ctx| {
            ctx.log.push("first-old".into());
            Ok(())
        });
        ctx.scheduler.schedule("second", UpdateKind::IdleEffect, |ctx: &mut Ctx| {
            ctx.log.push("second".into());
            Ok(())
        });
        ctx.scheduler.schedule("first", UpdateKind::IdleEffect, |ctx: &mut Ctx| {
            ctx.log.push("first-new".into());
            Ok(())
        });
        flush_ctx(&mut ctx);
        assert_eq!(ctx.log, vec!["first-new", "second"]);
    }

    #[test]
    fn submissions_during_flush_wait_for_next_frame() {
        let mut ctx = Ctx::default();
        ctx.scheduler
            .schedule("chain", UpdateKind::MouseResponse, |ctx: &mut Ctx| {
                ctx.log.push("outer".into());
                ctx.scheduler
                    .schedule("chain", UpdateKind::MouseResponse, |ctx: &mut Ctx| {
                        ctx.log.push("inner".into());
                        Ok(())
                    });
                Ok(())
            });

        let first = flush_ctx(&mut ctx);
        assert_eq!(first.executed, 1);
        assert_eq!(ctx.log, vec!["outer"]);
        assert!(ctx.scheduler.is_pending("chain", UpdateKind::MouseResponse, None));

        let second = flush_ctx(&mut ctx);
        assert_eq!(second.executed, 1);
        assert_eq!(ctx.log, vec!["outer", "inner"]);
        assert_eq!(second.frame, first.frame + 1);
    }

    #[test]
    fn failing_callback_does_not_abort_flush() {
        let mut ctx = Ctx::default();
        ctx.scheduler
            .schedule("bad", UpdateKind::SlideTransition, |_ctx: &mut Ctx| {
                anyhow::bail!("filter failed to construct")
            });
        ctx.scheduler.schedule("good", UpdateKind::IdleEffect, |ctx: &mut Ctx| {
            ctx.counter += 1;
            Ok(())
        });
        let report = flush_ctx(&mut ctx);
        assert_eq!(report.failed, 1);
        assert_eq!(report.executed, 1);
        assert_eq!(ctx.counter, 1);
    }

    #[test]
    fn cancel_removes_without_running() {
        let mut ctx = Ctx::default();
        ctx.scheduler.schedule("x", UpdateKind::IdleEffect, |ctx: &mut Ctx| {
            ctx.counter += 1;
            Ok(())
        });
        assert!(ctx.scheduler.cancel("x", UpdateKind::IdleEffect, None));
        assert!(!ctx.scheduler.cancel("x", UpdateKind::IdleEffect, None));
        flush_ctx(&mut ctx);
        assert_eq!(ctx.counter, 0);
    }

    #[test]
    fn cancel_owner_leaves_other_owners() {
        let mut ctx = Ctx::default();
        for kind in [UpdateKind::IdleEffect, UpdateKind::MouseResponse] {
            ctx.scheduler.schedule("gone", kind, |_ctx: &mut Ctx| Ok(()));
        }
        ctx.scheduler
            .schedule("kept", UpdateKind::IdleEffect, |_ctx: &mut Ctx| Ok(()));
        assert_eq!(ctx.scheduler.cancel_owner("gone"), 2);
        assert_eq!(ctx.scheduler.pending_len(), 1);
        assert!(ctx.scheduler.is_pending("kept", UpdateKind::IdleEffect, None));
    }

    #[test]
    fn execute_immediate_bypasses_queue() {
        let mut ctx = Ctx::default();
        ctx.scheduler.schedule("q", UpdateKind::IdleEffect, |ctx: &mut Ctx| {
            ctx.log.push("queued".into());
            Ok(())
        });
        assert!(execute_immediate(&mut ctx, |ctx: &mut Ctx| {
            ctx.log.push("now".into());
            Ok(())
        }));
        assert!(!execute_immediate(&mut ctx, |_ctx: &mut Ctx| anyhow::bail!("boom")));
        assert_eq!(ctx.log, vec!["now"]);
        assert_eq!(ctx.scheduler.pending_len(), 1);
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!(
            "slide-transform".parse::<UpdateKind>().unwrap(),
            UpdateKind::SlideTransform
        );
        assert!(matches!(
            "teleport".parse::<UpdateKind>(),
            Err(SchedulerError::UnknownKind(_))
        ));
    }
}
