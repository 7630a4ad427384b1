use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::engine::PerformanceSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl QualityLevel {
    /// Custom filters allowed on the slide container at this level.
    pub fn filter_budget(self) -> usize {
        match self {
            QualityLevel::Low => 1,
            QualityLevel::Medium => 2,
            QualityLevel::High => 3,
        }
    }

    /// Multiplier applied to configured displacement scales.
    pub fn displacement_factor(self) -> f32 {
        match self {
            QualityLevel::Low => 0.4,
            QualityLevel::Medium => 0.7,
            QualityLevel::High => 1.0,
        }
    }

    /// Canvas resolution relative to the device pixel ratio.
    pub fn resolution(self) -> f32 {
        match self {
            QualityLevel::Low => 0.5,
            QualityLevel::Medium => 0.75,
            QualityLevel::High => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(QualityLevel::Low),
            "medium" => Ok(QualityLevel::Medium),
            "high" => Ok(QualityLevel::High),
            other => Err(format!("unknown quality level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySettings {
    pub default: QualityLevel,
    pub sample_interval: Duration,
    /// Samples averaged per evaluation.
    pub samples: usize,
    pub fps_floor: f32,
    pub fps_ceiling: f32,
    pub memory_ceiling_mb: Option<f32>,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            default: QualityLevel::High,
            sample_interval: Duration::from_secs(1),
            samples: 5,
            fps_floor: 30.0,
            fps_ceiling: 50.0,
            memory_ceiling_mb: None,
        }
    }
}

type QualityListener = Box<dyn FnMut(QualityLevel)>;

/// Adapts rendering quality to measured frame rate and heap usage.
pub struct QualityManager {
    settings: QualitySettings,
    level: QualityLevel,
    window: VecDeque<PerformanceSample>,
    last_sample: Option<Instant>,
    last_change: Option<Instant>,
    listeners: Vec<(u64, QualityListener)>,
    next_listener: u64,
}

impl fmt::Debug for QualityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityManager")
            .field("level", &self.level)
            .field("samples", &self.window.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl QualityManager {
    pub fn new(settings: QualitySettings) -> Self {
        Self {
            level: settings.default,
            window: VecDeque::with_capacity(settings.samples.max(1)),
            settings,
            last_sample: None,
            last_change: None,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn level(&self) -> QualityLevel {
        self.level
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// Level the averaged samples call for, if there are any.
    pub fn evaluate(samples: &[PerformanceSample], settings: &QualitySettings) -> Option<QualityLevel> {
        if samples.is_empty() {
            return None;
        }
        let count = samples.len() as f32;
        let fps = samples.iter().map(|s| s.fps).sum::<f32>() / count;
        let mut level = if fps < settings.fps_floor {
            QualityLevel::Low
        } else if fps < settings.fps_ceiling {
            QualityLevel::Medium
        } else {
            QualityLevel::High
        };

        if let Some(ceiling) = settings.memory_ceiling_mb {
            let heap: Vec<f32> = samples.iter().filter_map(|s| s.heap_used_mb).collect();
            if !heap.is_empty() {
                let average = heap.iter().sum::<f32>() / heap.len() as f32;
                if average > ceiling {
                    level = level.min(QualityLevel::Medium);
                }
            }
        }
        Some(level)
    }

    /// True when the sampling interval has elapsed since the last sample.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_sample
            .map_or(true, |last| now.duration_since(last) >= self.settings.sample_interval)
    }

    /// Records a sample if one is due and re-evaluates. Returns the new level
    /// when it changed.
    pub fn sample(&mut self, now: Instant, sample: PerformanceSample) -> Option<QualityLevel> {
        if !self.is_due(now) {
            return None;
        }
        self.last_sample = Some(now);
        if self.window.len() == self.settings.samples.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        if self.window.len() < self.settings.samples.max(1) {
            return None;
        }

        let samples: Vec<PerformanceSample> = self.window.iter().copied().collect();
        let target = Self::evaluate(&samples, &self.settings)?;
        if target == self.level {
            return None;
        }
        if let Some(changed) = self.last_change {
            if now.duration_since(changed) < self.settings.sample_interval {
                return None;
            }
        }
        tracing::info!(from = %self.level, level = %target, fps = sample.fps, "quality level changed");
        self.level = target;
        self.last_change = Some(now);
        for (_, listener) in &mut self.listeners {
            listener(target);
        }
        Some(target)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(QualityLevel) + 'static,
    {
        self.next_listener += 1;
        self.listeners.push((self.next_listener, Box::new(listener)));
        self.next_listener
    }

    pub fn unsubscribe(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        before != self.listeners.len()
    }

    /// Back to the configured default with no history or subscribers.
    pub fn reset(&mut self) {
        self.level = self.settings.default;
        self.window.clear();
        self.last_sample = None;
        self.last_change = None;
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fps(value: f32) -> PerformanceSample {
        PerformanceSample {
            fps: value,
            heap_used_mb: None,
        }
    }

    fn settings() -> QualitySettings {
        QualitySettings {
            samples: 3,
            ..QualitySettings::default()
        }
    }

    #[test]
    fn thresholds_pick_levels() {
        let s = settings();
        assert_eq!(QualityManager::evaluate(&[], &s), None);
        assert_eq!(QualityManager::evaluate(&[fps(20.0), fps(30.0)], &s), Some(QualityLevel::Low));
        assert_eq!(QualityManager::evaluate(&[fps(45.0)], &s), Some(QualityLevel::Medium));
        assert_eq!(QualityManager::evaluate(&[fps(60.0)], &s), Some(QualityLevel::High));
    }

    #[test]
    fn heap_pressure_caps_at_medium() {
        let s = QualitySettings {
            memory_ceiling_mb: Some(256.0),
            ..settings()
        };
        let heavy = PerformanceSample {
            fps: 60.0,
            heap_used_mb: Some(300.0),
        };
        assert_eq!(QualityManager::evaluate(&[heavy], &s), Some(QualityLevel::Medium));
        let starving = PerformanceSample { fps: 10.0, ..heavy };
        assert_eq!(QualityManager::evaluate(&[starving], &s), Some(QualityLevel::Low));
    }

    #[test]
    fn samples_are_rate_limited_and_averaged() {
        let mut manager = QualityManager::new(settings());
        let start = Instant::now();
        let second = Duration::from_secs(1);

        assert_eq!(manager.sample(start, fps(10.0)), None);
        // Too soon: ignored entirely.
        assert_eq!(manager.sample(start + second / 2, fps(10.0)), None);
        assert_eq!(manager.sample(start + second, fps(10.0)), None);
        assert_eq!(manager.sample(start + second * 2, fps(10.0)), Some(QualityLevel::Low));
        assert_eq!(manager.level(), QualityLevel::Low);

        // Recovery follows the rolling average: 26.7, 43.3, then 60 fps.
        assert_eq!(manager.sample(start + second * 3, fps(60.0)), None);
        assert_eq!(manager.sample(start + second * 4, fps(60.0)), Some(QualityLevel::Medium));
        assert_eq!(manager.sample(start + second * 5, fps(60.0)), Some(QualityLevel::High));
    }

    #[test]
    fn subscribers_hear_changes_until_reset() {
        let heard = Rc::new(RefCell::new(Vec::new()));
        let mut manager = QualityManager::new(QualitySettings {
            samples: 1,
            ..QualitySettings::default()
        });
        let sink = Rc::clone(&heard);
        manager.subscribe(move |level| sink.borrow_mut().push(level));
        let start = Instant::now();
        manager.sample(start, fps(40.0));
        manager.sample(start + Duration::from_secs(1), fps(40.0));
        assert_eq!(*heard.borrow(), vec![QualityLevel::Medium]);

        manager.reset();
        assert_eq!(manager.level(), QualityLevel::High);
        manager.sample(start + Duration::from_secs(2), fps(10.0));
        assert_eq!(manager.level(), QualityLevel::Low);
        assert_eq!(heard.borrow().len(), 1);
    }

    #[test]
    fn level_properties_scale_with_quality() {
        assert!(QualityLevel::Low.filter_budget() < QualityLevel::High.filter_budget());
        assert!(QualityLevel::Medium.displacement_factor() < 1.0);
        assert_eq!("Medium".parse::<QualityLevel>(), Ok(QualityLevel::Medium));
        assert!("ultra".parse::<QualityLevel>().is_err());
    }
}
