//! Hazard fusion
//!
//! Turns the per-frame perception stream into driver-facing decisions:
//! - Debounce timers per hazard category (microsleep, drowsy, yawn)
//! - Exactly one log episode per continuous hazard
//! - A single prioritized status line and the alarm on/off decision

pub mod gate;
pub mod status;
pub mod timer;

pub use gate::{EventLoggerGate, HazardEpisode, SessionCounters};
pub use status::{DisplayStatus, SeverityTier, StatusArbitrator, StatusTone};
pub use timer::{HazardCategory, HazardPhases, HazardTimer, HazardTimerBank, TimerPhase};

use dms::PerceptionFrame;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Eyes-closed duration before alarm (ms)
    pub microsleep_threshold_ms: u64,

    /// Head-down duration before alarm (ms)
    pub drowsy_threshold_ms: u64,

    /// Yawn duration before alarm (ms)
    pub yawn_threshold_ms: u64,

    /// Delay between ticks of the live loop (ms)
    pub tick_period_ms: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            microsleep_threshold_ms: 2000,
            drowsy_threshold_ms: 2000,
            yawn_threshold_ms: 2000,
            tick_period_ms: 30,
        }
    }
}

impl FusionConfig {
    pub fn threshold(&self, category: HazardCategory) -> Duration {
        Duration::from_millis(match category {
            HazardCategory::Microsleep => self.microsleep_threshold_ms,
            HazardCategory::Drowsy => self.drowsy_threshold_ms,
            HazardCategory::Yawn => self.yawn_threshold_ms,
        })
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

/// Result of one fusion tick
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    pub status: DisplayStatus,
    /// Alarm should sound (some category is sustained)
    pub play_alarm: bool,
    /// Newly sustained hazards to persist
    pub episodes: Vec<HazardEpisode>,
    pub phases: HazardPhases,
}

/// Timers, logging gate and status arbitration for one session
pub struct FusionEngine {
    config: FusionConfig,
    timers: HazardTimerBank,
    gate: EventLoggerGate,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        let timers = HazardTimerBank::new(
            config.threshold(HazardCategory::Microsleep),
            config.threshold(HazardCategory::Drowsy),
            config.threshold(HazardCategory::Yawn),
        );
        Self {
            config,
            timers,
            gate: EventLoggerGate::new(),
        }
    }

    /// Process one perception frame observed at `now`
    pub fn tick(&mut self, frame: &PerceptionFrame, now: Instant) -> FusionOutcome {
        let phases = self.timers.update(frame, now);
        let episodes = self.gate.pass(&mut self.timers, &phases, frame.eye_ratio);
        let status = StatusArbitrator::decide(&phases, frame);
        let play_alarm = phases.any_sustained();

        debug!("Fusion: {} (alarm: {})", status.text, play_alarm);

        FusionOutcome {
            status,
            play_alarm,
            episodes,
            phases,
        }
    }

    /// Whether any hazard is past its threshold at `now`, recomputed from the timers
    pub fn alarm_eligible(&self, now: Instant) -> bool {
        self.timers.alarm_eligible(now)
    }

    pub fn counters(&self) -> SessionCounters {
        self.gate.counters()
    }

    pub fn timers(&self) -> &HazardTimerBank {
        &self.timers
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Clear timers and counters for a new session
    pub fn reset(&mut self) {
        self.timers.reset();
        self.gate.reset();
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}
