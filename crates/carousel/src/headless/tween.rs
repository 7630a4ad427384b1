use std::collections::BTreeMap;
use std::time::Duration;

use crate::easing::Easing;
use crate::engine::{AnimationEngine, EngineError, PropertyAccess};
use crate::types::{Property, Target, TweenId};

#[derive(Debug, Clone)]
struct Track {
    target: Target,
    property: Property,
    to: f32,
    /// Captured from the scene when the track first runs.
    from: Option<f32>,
    at: Duration,
    duration: Duration,
    easing: Easing,
    dead: bool,
}

impl Track {
    fn end(&self) -> Duration {
        self.at + self.duration
    }

    fn step(&mut self, elapsed: Duration, scene: &mut dyn PropertyAccess) {
        if self.dead || elapsed < self.at {
            return;
        }
        let from = match self.from {
            Some(from) => from,
            None => match scene.property(self.target, self.property) {
                Some(current) => *self.from.insert(current),
                None => {
                    self.dead = true;
                    return;
                }
            },
        };
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed - self.at).as_secs_f32() / self.duration.as_secs_f32()
        };
        let value = self.easing.lerp(from, self.to, progress);
        if !scene.set_property(self.target, self.property, value) {
            self.dead = true;
        }
    }
}

#[derive(Debug)]
struct Tween {
    tracks: Vec<Track>,
    elapsed: Duration,
    playing: bool,
}

impl Tween {
    fn total(&self) -> Duration {
        self.tracks
            .iter()
            .map(Track::end)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

/// Interpolating [`AnimationEngine`] driven by explicit time steps.
///
/// Finished and killed tweens are dropped from the engine, so
/// [`live_count`](AnimationEngine::live_count) only reports work in flight.
#[derive(Debug, Default)]
pub struct TweenEngine {
    next_id: u64,
    tweens: BTreeMap<TweenId, Tween>,
    killed: usize,
    completed: usize,
    fail_timelines: bool,
}

impl TweenEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn killed(&self) -> usize {
        self.killed
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Makes every later `timeline_add` fail.
    pub fn set_fail_timelines(&mut self, fail: bool) {
        self.fail_timelines = fail;
    }

    /// Tweens that are alive but not playing.
    pub fn paused_count(&self) -> usize {
        self.tweens.values().filter(|t| !t.playing).count()
    }

    fn insert(&mut self, tween: Tween) -> TweenId {
        self.next_id += 1;
        let id = TweenId(self.next_id);
        self.tweens.insert(id, tween);
        id
    }
}

fn tracks_for(
    target: Target,
    properties: &[(Property, f32)],
    duration: Duration,
    easing: Easing,
    at: Duration,
) -> impl Iterator<Item = Track> + '_ {
    properties.iter().map(move |&(property, to)| Track {
        target,
        property,
        to,
        from: None,
        at,
        duration,
        easing,
        dead: false,
    })
}

impl AnimationEngine for TweenEngine {
    fn animate_to(
        &mut self,
        target: Target,
        properties: &[(Property, f32)],
        duration: Duration,
        easing: Easing,
        paused: bool,
    ) -> TweenId {
        let tracks = tracks_for(target, properties, duration, easing, Duration::ZERO).collect();
        self.insert(Tween {
            tracks,
            elapsed: Duration::ZERO,
            playing: !paused,
        })
    }

    fn create_timeline(&mut self, paused: bool) -> TweenId {
        self.insert(Tween {
            tracks: Vec::new(),
            elapsed: Duration::ZERO,
            playing: !paused,
        })
    }

    fn timeline_add(
        &mut self,
        timeline: TweenId,
        target: Target,
        properties: &[(Property, f32)],
        duration: Duration,
        easing: Easing,
        at: Duration,
    ) -> Result<(), EngineError> {
        if self.fail_timelines {
            return Err(EngineError::Unavailable("timeline segments rejected".into()));
        }
        let tween = self
            .tweens
            .get_mut(&timeline)
            .ok_or_else(|| EngineError::UnknownHandle(format!("{timeline:?}")))?;
        tween
            .tracks
            .extend(tracks_for(target, properties, duration, easing, at));
        Ok(())
    }

    fn play(&mut self, tween: TweenId) -> bool {
        match self.tweens.get_mut(&tween) {
            Some(entry) => {
                entry.playing = true;
                true
            }
            None => false,
        }
    }

    fn kill(&mut self, tween: TweenId) -> bool {
        let removed = self.tweens.remove(&tween).is_some();
        if removed {
            self.killed += 1;
        }
        removed
    }

    fn is_active(&self, tween: TweenId) -> bool {
        self.tweens.get(&tween).is_some_and(|t| t.playing)
    }

    fn is_alive(&self, tween: TweenId) -> bool {
        self.tweens.contains_key(&tween)
    }

    fn advance(&mut self, dt: Duration, scene: &mut dyn PropertyAccess) -> Vec<TweenId> {
        let mut finished = Vec::new();
        for (id, tween) in self.tweens.iter_mut() {
            if !tween.playing {
                continue;
            }
            tween.elapsed += dt;
            for track in &mut tween.tracks {
                track.step(tween.elapsed, scene);
            }
            if tween.elapsed >= tween.total() {
                finished.push(*id);
            }
        }
        for id in &finished {
            self.tweens.remove(id);
        }
        self.completed += finished.len();
        finished
    }

    fn live_count(&self) -> usize {
        self.tweens.len()
    }
}
