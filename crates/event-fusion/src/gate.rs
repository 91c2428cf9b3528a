//! One log entry per continuous hazard episode

use crate::timer::{HazardCategory, HazardPhases, HazardTimerBank, TimerPhase};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// A hazard that just crossed its threshold and should be persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardEpisode {
    pub category: HazardCategory,
    pub elapsed: Duration,
    /// Eye aspect ratio at the time of logging
    pub eye_ratio: Option<f32>,
}

impl HazardEpisode {
    /// Free-text detail stored with the log entry
    pub fn info_text(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        match self.category {
            HazardCategory::Microsleep => match self.eye_ratio {
                Some(ear) => format!("Eyes closed. Duration: {:.1}s, EAR: {:.2}", secs, ear),
                None => format!("Eyes closed. Duration: {:.1}s", secs),
            },
            HazardCategory::Drowsy => format!("Head down/tilted. Duration: {:.1}s", secs),
            HazardCategory::Yawn => format!("Yawning detected. Duration: {:.1}s", secs),
        }
    }
}

/// Per-session event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub drowsy: u32,
    pub microsleep: u32,
    pub yawn: u32,
    /// Stored for schema compatibility; never incremented
    pub awake: u32,
    /// Stored for schema compatibility; never incremented
    pub no_yawn: u32,
}

impl SessionCounters {
    pub fn record(&mut self, category: HazardCategory) {
        match category {
            HazardCategory::Microsleep => self.microsleep += 1,
            HazardCategory::Drowsy => self.drowsy += 1,
            HazardCategory::Yawn => self.yawn += 1,
        }
    }

    pub fn get(&self, category: HazardCategory) -> u32 {
        match category {
            HazardCategory::Microsleep => self.microsleep,
            HazardCategory::Drowsy => self.drowsy,
            HazardCategory::Yawn => self.yawn,
        }
    }
}

/// Emits episodes for sustained timers that have not been logged yet
#[derive(Debug, Clone, Default)]
pub struct EventLoggerGate {
    counters: SessionCounters,
}

impl EventLoggerGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(
        &mut self,
        timers: &mut HazardTimerBank,
        phases: &HazardPhases,
        eye_ratio: Option<f32>,
    ) -> Vec<HazardEpisode> {
        let mut episodes = Vec::new();
        for (category, phase) in phases.iter() {
            let TimerPhase::Sustained(elapsed) = phase else {
                continue;
            };
            if !timers.timer_mut(category).mark_logged() {
                continue;
            }

            self.counters.record(category);
            info!("{} episode after {:.1}s", category.as_str(), elapsed.as_secs_f64());
            episodes.push(HazardEpisode {
                category,
                elapsed,
                eye_ratio,
            });
        }
        episodes
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn reset(&mut self) {
        self.counters = SessionCounters::default();
    }
}
