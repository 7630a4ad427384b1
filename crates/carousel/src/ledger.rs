//! Ownership registry for every engine-backed object a slider creates.
//!
//! Textures are reference counted per key (normally the source URL). Every
//! other kind is tracked one-to-one until [`ResourceLedger::dispose`] tears
//! the whole set down in a fixed order. Once [`mark_unmounting`] has been
//! called, late arrivals from asynchronous work are destroyed on the spot
//! instead of being adopted.
//!
//! [`mark_unmounting`]: ResourceLedger::mark_unmounting

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::engine::{AnimationEngine, RenderEngine};
use crate::types::{AppId, FilterId, Key, ListenerId, NodeId, Point, Size, TextureId, TimerId, TweenId};

pub type ListenerCallback<C> = Box<dyn FnMut(&mut C, &InputEvent) -> anyhow::Result<()>>;
pub type TimerCallback<C> = Box<dyn FnMut(&mut C) -> anyhow::Result<()>>;

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTarget {
    /// The slider's host element.
    Container,
    Window,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    PointerMove,
    PointerDown,
    PointerUp,
    PointerEnter,
    PointerLeave,
    KeyDown,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove(Point),
    PointerDown(Point),
    PointerUp(Point),
    PointerEnter(Point),
    PointerLeave,
    KeyDown(Key),
    Resize(Size),
}

impl InputEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            InputEvent::PointerMove(_) => EventType::PointerMove,
            InputEvent::PointerDown(_) => EventType::PointerDown,
            InputEvent::PointerUp(_) => EventType::PointerUp,
            InputEvent::PointerEnter(_) => EventType::PointerEnter,
            InputEvent::PointerLeave => EventType::PointerLeave,
            InputEvent::KeyDown(_) => EventType::KeyDown,
            InputEvent::Resize(_) => EventType::Resize,
        }
    }

    pub fn position(&self) -> Option<Point> {
        match *self {
            InputEvent::PointerMove(p)
            | InputEvent::PointerDown(p)
            | InputEvent::PointerUp(p)
            | InputEvent::PointerEnter(p) => Some(p),
            _ => None,
        }
    }
}

struct TextureEntry {
    handle: TextureId,
    refs: usize,
}

struct Listener<C> {
    target: EventTarget,
    event: EventType,
    owner: String,
    callback: Option<ListenerCallback<C>>,
}

struct Timer<C> {
    owner: String,
    due: Instant,
    interval: Option<Duration>,
    callback: Option<TimerCallback<C>>,
}

/// Live counts per resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub textures: usize,
    pub texture_refs: usize,
    pub filters: usize,
    pub display_objects: usize,
    pub animations: usize,
    pub applications: usize,
    pub listeners: usize,
    pub timers: usize,
}

impl LedgerStats {
    pub fn is_empty(&self) -> bool {
        *self == LedgerStats::default()
    }
}

/// What a call to [`ResourceLedger::dispose`] released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisposalReport {
    pub animations_killed: usize,
    pub listeners_removed: usize,
    pub display_objects_destroyed: usize,
    pub filters_destroyed: usize,
    pub applications_destroyed: usize,
    pub textures_destroyed: usize,
    pub timers_cleared: usize,
    pub errors: usize,
    pub already_disposed: bool,
}

pub struct ResourceLedger<C> {
    instance: String,
    textures: BTreeMap<String, TextureEntry>,
    filters: BTreeSet<FilterId>,
    display_objects: Vec<NodeId>,
    animations: BTreeSet<TweenId>,
    applications: Vec<AppId>,
    listeners: BTreeMap<ListenerId, Listener<C>>,
    timers: BTreeMap<TimerId, Timer<C>>,
    next_id: u64,
    unmounting: bool,
    disposed: bool,
    refused: usize,
}

impl<C> fmt::Debug for ResourceLedger<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLedger")
            .field("instance", &self.instance)
            .field("stats", &self.stats())
            .field("unmounting", &self.unmounting)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<C> ResourceLedger<C> {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            textures: BTreeMap::new(),
            filters: BTreeSet::new(),
            display_objects: Vec::new(),
            animations: BTreeSet::new(),
            applications: Vec::new(),
            listeners: BTreeMap::new(),
            timers: BTreeMap::new(),
            next_id: 0,
            unmounting: false,
            disposed: false,
            refused: 0,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Refuses every later adoption. Cannot be undone.
    pub fn mark_unmounting(&mut self) {
        if !self.unmounting {
            tracing::debug!(instance = %self.instance, "ledger unmounting");
        }
        self.unmounting = true;
    }

    pub fn is_unmounting(&self) -> bool {
        self.unmounting
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Handles destroyed on arrival because the ledger was unmounting.
    pub fn refused(&self) -> usize {
        self.refused
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn refuse(&mut self, what: &str, raw: u64) {
        self.refused += 1;
        tracing::debug!(instance = %self.instance, kind = what, handle = raw, "refused adoption while unmounting");
    }

    // Textures

    /// Adds a reference to `key`. The first call stores `handle`; later calls
    /// return the stored handle and destroy a differing duplicate.
    pub fn track_texture(
        &mut self,
        render: &mut dyn RenderEngine,
        key: &str,
        handle: TextureId,
    ) -> Option<TextureId> {
        if self.unmounting {
            let owned = self.textures.values().any(|entry| entry.handle == handle);
            if !owned {
                if let Err(error) = render.destroy_texture(handle) {
                    tracing::warn!(url = key, error = %error, "failed to destroy refused texture");
                }
            }
            self.refuse("texture", handle.0);
            return None;
        }
        match self.textures.get_mut(key) {
            Some(entry) => {
                entry.refs += 1;
                let stored = entry.handle;
                if stored != handle {
                    if let Err(error) = render.destroy_texture(handle) {
                        tracing::warn!(url = key, error = %error, "failed to destroy duplicate texture");
                    }
                }
                Some(stored)
            }
            None => {
                self.textures
                    .insert(key.to_string(), TextureEntry { handle, refs: 1 });
                Some(handle)
            }
        }
    }

    /// Adds a reference to an already tracked texture.
    pub fn retain_texture(&mut self, key: &str) -> Option<TextureId> {
        if self.unmounting {
            return None;
        }
        let entry = self.textures.get_mut(key)?;
        entry.refs += 1;
        Some(entry.handle)
    }

    /// Drops one reference. Returns `true` when the texture was destroyed.
    pub fn release_texture(&mut self, render: &mut dyn RenderEngine, key: &str) -> bool {
        let Some(entry) = self.textures.get_mut(key) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return false;
        }
        self.force_release_texture(render, key)
    }

    /// Destroys the texture regardless of outstanding references.
    pub fn force_release_texture(&mut self, render: &mut dyn RenderEngine, key: &str) -> bool {
        let Some(entry) = self.textures.remove(key) else {
            return false;
        };
        if let Err(error) = render.destroy_texture(entry.handle) {
            tracing::warn!(url = key, error = %error, "failed to destroy texture");
        }
        true
    }

    pub fn texture(&self, key: &str) -> Option<TextureId> {
        self.textures.get(key).map(|entry| entry.handle)
    }

    pub fn texture_refs(&self, key: &str) -> usize {
        self.textures.get(key).map_or(0, |entry| entry.refs)
    }

    // One-to-one resources

    pub fn track_filter(&mut self, render: &mut dyn RenderEngine, filter: FilterId) -> Option<FilterId> {
        if self.unmounting {
            if let Err(error) = render.destroy_filter(filter) {
                tracing::warn!(error = %error, "failed to destroy refused filter");
            }
            self.refuse("filter", filter.0);
            return None;
        }
        self.filters.insert(filter);
        Some(filter)
    }

    /// Destroys a tracked filter ahead of disposal.
    pub fn release_filter(&mut self, render: &mut dyn RenderEngine, filter: FilterId) -> bool {
        if !self.filters.remove(&filter) {
            return false;
        }
        if let Err(error) = render.destroy_filter(filter) {
            tracing::warn!(error = %error, "failed to destroy filter");
        }
        true
    }

    pub fn track_display_object(
        &mut self,
        render: &mut dyn RenderEngine,
        node: NodeId,
    ) -> Option<NodeId> {
        if self.unmounting {
            render.remove_from_parent(node);
            if let Err(error) = render.destroy_node(node) {
                tracing::warn!(error = %error, "failed to destroy refused display object");
            }
            self.refuse("display-object", node.0);
            return None;
        }
        if !self.display_objects.contains(&node) {
            self.display_objects.push(node);
        }
        Some(node)
    }

    pub fn release_display_object(&mut self, render: &mut dyn RenderEngine, node: NodeId) -> bool {
        let Some(position) = self.display_objects.iter().position(|n| *n == node) else {
            return false;
        };
        self.display_objects.remove(position);
        render.remove_from_parent(node);
        if let Err(error) = render.destroy_node(node) {
            tracing::warn!(error = %error, "failed to destroy display object");
        }
        true
    }

    pub fn track_animation(
        &mut self,
        tweens: &mut dyn AnimationEngine,
        tween: TweenId,
    ) -> Option<TweenId> {
        if self.unmounting {
            tweens.kill(tween);
            self.refuse("animation", tween.0);
            return None;
        }
        self.animations.insert(tween);
        Some(tween)
    }

    /// Stops tracking a tween that completed or was killed elsewhere.
    pub fn forget_animation(&mut self, tween: TweenId) -> bool {
        self.animations.remove(&tween)
    }

    pub fn track_application(&mut self, render: &mut dyn RenderEngine, app: AppId) -> Option<AppId> {
        if self.unmounting {
            destroy_application(render, app);
            self.refuse("application", app.0);
            return None;
        }
        if !self.applications.contains(&app) {
            self.applications.push(app);
        }
        Some(app)
    }

    pub fn applications(&self) -> &[AppId] {
        &self.applications
    }

    // Listeners

    /// Registers a listener. The same `(target, event, owner)` triple maps to
    /// one binding; repeats return the existing id.
    pub fn add_event_listener<F>(
        &mut self,
        target: EventTarget,
        event: EventType,
        owner: &str,
        callback: F,
    ) -> Option<ListenerId>
    where
        F: FnMut(&mut C, &InputEvent) -> anyhow::Result<()> + 'static,
    {
        if self.unmounting {
            self.refuse("listener", 0);
            return None;
        }
        let existing = self.listeners.iter().find(|(_, l)| {
            l.target == target && l.event == event && l.owner == owner
        });
        if let Some((id, _)) = existing {
            return Some(*id);
        }
        let id = ListenerId(self.next_id());
        self.listeners.insert(
            id,
            Listener {
                target,
                event,
                owner: owner.to_string(),
                callback: Some(Box::new(callback)),
            },
        );
        Some(id)
    }

    /// Registers several listeners for one owner.
    pub fn add_event_listeners(
        &mut self,
        owner: &str,
        bindings: Vec<(EventTarget, EventType, ListenerCallback<C>)>,
    ) -> Vec<ListenerId>
    where
        C: 'static,
    {
        bindings
            .into_iter()
            .filter_map(|(target, event, callback)| {
                self.add_event_listener(target, event, owner, callback)
            })
            .collect()
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn remove_listeners_for(&mut self, owner: &str) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|_, l| l.owner != owner);
        before - self.listeners.len()
    }

    /// Bindings for one target and event, in registration order.
    pub fn listeners_for(&self, target: EventTarget, event: EventType) -> Vec<ListenerId> {
        self.listeners
            .iter()
            .filter(|(_, l)| l.target == target && l.event == event)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Lends a listener's callback out for the duration of a dispatch.
    pub fn take_listener(&mut self, id: ListenerId) -> Option<ListenerCallback<C>> {
        self.listeners.get_mut(&id)?.callback.take()
    }

    /// Returns a lent callback. Dropped if the binding was removed meanwhile.
    pub fn restore_listener(&mut self, id: ListenerId, callback: ListenerCallback<C>) {
        if let Some(listener) = self.listeners.get_mut(&id) {
            listener.callback = Some(callback);
        }
    }

    // Timers

    pub fn set_timeout<F>(&mut self, owner: &str, delay: Duration, now: Instant, callback: F) -> Option<TimerId>
    where
        F: FnOnce(&mut C) -> anyhow::Result<()> + 'static,
    {
        let mut once = Some(callback);
        self.insert_timer(
            owner,
            now + delay,
            None,
            Box::new(move |ctx: &mut C| match once.take() {
                Some(callback) => callback(ctx),
                None => Ok(()),
            }),
        )
    }

    pub fn set_interval<F>(&mut self, owner: &str, period: Duration, now: Instant, callback: F) -> Option<TimerId>
    where
        F: FnMut(&mut C) -> anyhow::Result<()> + 'static,
    {
        self.insert_timer(owner, now + period, Some(period), Box::new(callback))
    }

    fn insert_timer(
        &mut self,
        owner: &str,
        due: Instant,
        interval: Option<Duration>,
        callback: TimerCallback<C>,
    ) -> Option<TimerId> {
        if self.unmounting {
            self.refuse("timer", 0);
            return None;
        }
        let id = TimerId(self.next_id());
        self.timers.insert(
            id,
            Timer {
                owner: owner.to_string(),
                due,
                interval,
                callback: Some(callback),
            },
        );
        Some(id)
    }

    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn clear_interval(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn clear_timers_for(&mut self, owner: &str) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, t| t.owner != owner);
        before - self.timers.len()
    }

    pub fn has_timer(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn timer_due(&self, id: TimerId) -> Option<Instant> {
        self.timers.get(&id).map(|t| t.due)
    }

    /// Timers due at `now`, earliest first.
    pub fn due_timers(&self, now: Instant) -> Vec<TimerId> {
        let mut due: Vec<(Instant, TimerId)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now && t.callback.is_some())
            .map(|(id, t)| (t.due, *id))
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    /// Takes the callback of a due timer. Timeouts are removed; intervals are
    /// re-armed one period after `now` and expect their callback back through
    /// [`restore_timer`](Self::restore_timer).
    pub fn take_timer(&mut self, id: TimerId, now: Instant) -> Option<TimerCallback<C>> {
        let timer = self.timers.get_mut(&id)?;
        if timer.due > now {
            return None;
        }
        if let Some(period) = timer.interval {
            timer.due = now + period;
            return timer.callback.take();
        }
        self.timers.remove(&id).and_then(|t| t.callback)
    }

    /// Takes the callbacks of every timer due at `now`, earliest first.
    pub fn take_due_timers(&mut self, now: Instant) -> Vec<(TimerId, TimerCallback<C>)> {
        self.due_timers(now)
            .into_iter()
            .filter_map(|id| self.take_timer(id, now).map(|callback| (id, callback)))
            .collect()
    }

    pub fn restore_timer(&mut self, id: TimerId, callback: TimerCallback<C>) {
        if let Some(timer) = self.timers.get_mut(&id) {
            timer.callback = Some(callback);
        }
    }

    // Lifecycle

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            textures: self.textures.len(),
            texture_refs: self.textures.values().map(|entry| entry.refs).sum(),
            filters: self.filters.len(),
            display_objects: self.display_objects.len(),
            animations: self.animations.len(),
            applications: self.applications.len(),
            listeners: self.listeners.len(),
            timers: self.timers.len(),
        }
    }

    /// Releases everything. Safe to call more than once; later calls do
    /// nothing and report `already_disposed`.
    pub fn dispose(
        &mut self,
        render: &mut dyn RenderEngine,
        tweens: &mut dyn AnimationEngine,
    ) -> DisposalReport {
        self.unmounting = true;
        if self.disposed {
            return DisposalReport {
                already_disposed: true,
                ..DisposalReport::default()
            };
        }
        self.disposed = true;
        let mut report = DisposalReport::default();

        for tween in std::mem::take(&mut self.animations) {
            // Completed tweens are already gone from the engine.
            tweens.kill(tween);
            report.animations_killed += 1;
        }

        report.listeners_removed = self.listeners.len();
        self.listeners.clear();

        for node in std::mem::take(&mut self.display_objects) {
            render.remove_from_parent(node);
            for filter in render.filters(node) {
                self.filters.remove(&filter);
                match render.destroy_filter(filter) {
                    Ok(()) => report.filters_destroyed += 1,
                    Err(error) => {
                        report.errors += 1;
                        tracing::warn!(instance = %self.instance, error = %error, "failed to destroy attached filter");
                    }
                }
            }
            match render.destroy_node(node) {
                Ok(()) => report.display_objects_destroyed += 1,
                Err(error) => {
                    report.errors += 1;
                    tracing::warn!(instance = %self.instance, error = %error, "failed to destroy display object");
                }
            }
        }

        for filter in std::mem::take(&mut self.filters) {
            match render.destroy_filter(filter) {
                Ok(()) => report.filters_destroyed += 1,
                Err(error) => {
                    report.errors += 1;
                    tracing::warn!(instance = %self.instance, error = %error, "failed to destroy filter");
                }
            }
        }

        for app in std::mem::take(&mut self.applications) {
            if destroy_application(render, app) {
                report.applications_destroyed += 1;
            } else {
                report.errors += 1;
            }
        }

        for (url, entry) in std::mem::take(&mut self.textures) {
            match render.destroy_texture(entry.handle) {
                Ok(()) => report.textures_destroyed += 1,
                Err(error) => {
                    report.errors += 1;
                    tracing::warn!(instance = %self.instance, url = %url, error = %error, "failed to destroy texture");
                }
            }
        }

        report.timers_cleared = self.timers.len();
        self.timers.clear();

        tracing::debug!(instance = %self.instance, ?report, "ledger disposed");
        report
    }
}

fn destroy_application(render: &mut dyn RenderEngine, app: AppId) -> bool {
    render.stop_ticker(app);
    render.detach_view(app);
    match render.destroy_application(app) {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(error = %error, "failed to destroy render root");
            false
        }
    }
}

/// Delivers `event` to every listener bound to `target`.
///
/// Callbacks may add or remove listeners, including their own binding.
pub fn dispatch_event<C, F>(ctx: &mut C, ledger: F, target: EventTarget, event: &InputEvent) -> usize
where
    F: Fn(&mut C) -> &mut ResourceLedger<C>,
{
    let ids = ledger(ctx).listeners_for(target, event.event_type());
    let mut delivered = 0;
    for id in ids {
        let Some(mut callback) = ledger(ctx).take_listener(id) else {
            continue;
        };
        if let Err(error) = callback(ctx, event) {
            tracing::warn!(event = ?event.event_type(), error = %error, "listener failed");
        }
        ledger(ctx).restore_listener(id, callback);
        delivered += 1;
    }
    delivered
}

/// Runs every timer due at `now`. Returns how many fired.
///
/// A timer cleared by an earlier callback in the same pass does not fire.
pub fn fire_due_timers<C, F>(ctx: &mut C, ledger: F, now: Instant) -> usize
where
    F: Fn(&mut C) -> &mut ResourceLedger<C>,
{
    let due = ledger(ctx).due_timers(now);
    let mut fired = 0;
    for id in due {
        let Some(mut callback) = ledger(ctx).take_timer(id, now) else {
            continue;
        };
        if let Err(error) = callback(ctx) {
            tracing::warn!(timer = id.0, error = %error, "timer callback failed");
        }
        ledger(ctx).restore_timer(id, callback);
        fired += 1;
    }
    fired
}
