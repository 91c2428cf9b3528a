//! Per-category hazard debounce timers

use dms::{CategoricalStatus, EyeStatus, PerceptionFrame};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Conditions that are timed, logged and may sound the alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardCategory {
    Microsleep,
    Drowsy,
    Yawn,
}

impl HazardCategory {
    /// All categories, highest display priority first
    pub const ALL: [HazardCategory; 3] = [Self::Microsleep, Self::Drowsy, Self::Yawn];

    /// Stored `status_type` value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Microsleep => "microsleep",
            Self::Drowsy => "drowsy",
            Self::Yawn => "yawn",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Human-readable name for status texts
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Microsleep => "Microsleep",
            Self::Drowsy => "Drowsy (Head Down)",
            Self::Yawn => "Yawning",
        }
    }

    /// Whether this frame shows the condition
    pub fn is_present(&self, frame: &PerceptionFrame) -> bool {
        match self {
            Self::Microsleep => frame.eye_status == EyeStatus::Microsleep,
            Self::Drowsy => frame.categorical_status == CategoricalStatus::Drowsy,
            Self::Yawn => frame.categorical_status == CategoricalStatus::Yawn,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Microsleep => 0,
            Self::Drowsy => 1,
            Self::Yawn => 2,
        }
    }
}

/// Where a timer stands after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    #[default]
    Idle,
    /// Condition present, threshold not reached yet
    Accumulating(Duration),
    /// Condition present for at least the threshold
    Sustained(Duration),
}

impl TimerPhase {
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::Idle => None,
            Self::Accumulating(elapsed) | Self::Sustained(elapsed) => Some(*elapsed),
        }
    }

    pub fn is_sustained(&self) -> bool {
        matches!(self, Self::Sustained(_))
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self, Self::Accumulating(_))
    }
}

/// Debounce timer for one category
#[derive(Debug, Clone)]
pub struct HazardTimer {
    threshold: Duration,
    active_since: Option<Instant>,
    logged: bool,
}

impl HazardTimer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            active_since: None,
            logged: false,
        }
    }

    /// Advance with this tick's condition
    pub fn update(&mut self, present: bool, now: Instant) -> TimerPhase {
        if !present {
            self.reset();
            return TimerPhase::Idle;
        }

        let since = *self.active_since.get_or_insert(now);
        let elapsed = now.saturating_duration_since(since);
        if elapsed >= self.threshold {
            TimerPhase::Sustained(elapsed)
        } else {
            TimerPhase::Accumulating(elapsed)
        }
    }

    /// Threshold reached as of `now`, without advancing the timer
    pub fn alarm_eligible(&self, now: Instant) -> bool {
        self.active_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.threshold)
    }

    /// Mark the current episode as logged; false if it already was
    pub fn mark_logged(&mut self) -> bool {
        !std::mem::replace(&mut self.logged, true)
    }

    pub fn is_logged(&self) -> bool {
        self.logged
    }

    pub fn active_since(&self) -> Option<Instant> {
        self.active_since
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.active_since = None;
        self.logged = false;
    }
}

/// Phases of every category after one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HazardPhases([TimerPhase; 3]);

impl HazardPhases {
    pub fn get(&self, category: HazardCategory) -> TimerPhase {
        self.0[category.index()]
    }

    /// Categories with their phase, in priority order
    pub fn iter(&self) -> impl Iterator<Item = (HazardCategory, TimerPhase)> + '_ {
        HazardCategory::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    pub fn any_sustained(&self) -> bool {
        self.0.iter().any(TimerPhase::is_sustained)
    }

    /// Highest-priority category in the given phase
    pub fn first_sustained(&self) -> Option<(HazardCategory, Duration)> {
        self.iter().find_map(|(c, phase)| match phase {
            TimerPhase::Sustained(elapsed) => Some((c, elapsed)),
            _ => None,
        })
    }

    pub fn first_accumulating(&self) -> Option<(HazardCategory, Duration)> {
        self.iter().find_map(|(c, phase)| match phase {
            TimerPhase::Accumulating(elapsed) => Some((c, elapsed)),
            _ => None,
        })
    }
}

/// One timer per category
#[derive(Debug, Clone)]
pub struct HazardTimerBank {
    timers: [HazardTimer; 3],
}

impl HazardTimerBank {
    pub fn new(microsleep: Duration, drowsy: Duration, yawn: Duration) -> Self {
        Self {
            timers: [
                HazardTimer::new(microsleep),
                HazardTimer::new(drowsy),
                HazardTimer::new(yawn),
            ],
        }
    }

    /// Advance every timer with this frame
    pub fn update(&mut self, frame: &PerceptionFrame, now: Instant) -> HazardPhases {
        let mut phases = HazardPhases::default();
        for category in HazardCategory::ALL {
            let present = category.is_present(frame);
            phases.0[category.index()] = self.timers[category.index()].update(present, now);
        }
        phases
    }

    /// Any category past its threshold as of `now`
    pub fn alarm_eligible(&self, now: Instant) -> bool {
        self.timers.iter().any(|t| t.alarm_eligible(now))
    }

    pub fn timer(&self, category: HazardCategory) -> &HazardTimer {
        &self.timers[category.index()]
    }

    pub fn timer_mut(&mut self, category: HazardCategory) -> &mut HazardTimer {
        &mut self.timers[category.index()]
    }

    pub fn reset(&mut self) {
        self.timers.iter_mut().for_each(HazardTimer::reset);
    }
}
