//! Display status arbitration

use crate::timer::HazardPhases;
use dms::{CategoricalStatus, EyeStatus, PerceptionFrame};
use serde::{Deserialize, Serialize};

/// Colour family of the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Red,
    Amber,
    Green,
    Teal,
    Gray,
}

impl StatusTone {
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Red => "#dc3545",
            Self::Amber => "#ffc107",
            Self::Green => "#28a745",
            Self::Teal => "#17a2b8",
            Self::Gray => "#6c757d",
        }
    }

    pub fn tier(&self) -> SeverityTier {
        match self {
            Self::Red => SeverityTier::Alarm,
            Self::Amber => SeverityTier::Warning,
            Self::Green | Self::Teal | Self::Gray => SeverityTier::Normal,
        }
    }
}

/// Three-level severity used by presenters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Normal,
    Warning,
    Alarm,
}

/// Status line shown to the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayStatus {
    pub text: String,
    pub tone: StatusTone,
}

impl DisplayStatus {
    pub fn new(text: impl Into<String>, tone: StatusTone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    /// Shown before the first tick
    pub fn analyzing() -> Self {
        Self::new("Analyzing...", StatusTone::Gray)
    }

    pub fn tier(&self) -> SeverityTier {
        self.tone.tier()
    }
}

impl Default for DisplayStatus {
    fn default() -> Self {
        Self::analyzing()
    }
}

/// Picks the single status line for a tick
///
/// Sustained hazards win over accumulating ones, which win over the
/// normal states. Among hazards microsleep beats drowsy beats yawn.
pub struct StatusArbitrator;

impl StatusArbitrator {
    pub fn decide(phases: &HazardPhases, frame: &PerceptionFrame) -> DisplayStatus {
        if let Some((category, elapsed)) = phases.first_sustained() {
            return DisplayStatus::new(
                format!("ALERT! {}! ({}s)", category.display_name(), elapsed.as_secs()),
                StatusTone::Red,
            );
        }
        if let Some((category, elapsed)) = phases.first_accumulating() {
            return DisplayStatus::new(
                format!("{}! ({}s)", category.display_name(), elapsed.as_secs()),
                StatusTone::Amber,
            );
        }

        match (frame.categorical_status, frame.eye_status) {
            (_, EyeStatus::NoFace) => DisplayStatus::new("Face Not Detected!", StatusTone::Gray),
            (CategoricalStatus::Awake, EyeStatus::EyesOpen) => {
                DisplayStatus::new("Awake & Eyes Open", StatusTone::Green)
            }
            (CategoricalStatus::NoYawn, EyeStatus::EyesOpen) => {
                DisplayStatus::new("No Yawn & Eyes Open", StatusTone::Teal)
            }
            _ => DisplayStatus::analyzing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::HazardTimerBank;
    use std::time::{Duration, Instant};

    fn decide_after(frames: &[(PerceptionFrame, u64)]) -> DisplayStatus {
        let t0 = Instant::now();
        let two = Duration::from_secs(2);
        let mut bank = HazardTimerBank::new(two, two, two);
        let mut status = DisplayStatus::default();
        for (frame, at_ms) in frames {
            let phases = bank.update(frame, t0 + Duration::from_millis(*at_ms));
            status = StatusArbitrator::decide(&phases, frame);
        }
        status
    }

    fn frame(categorical: CategoricalStatus, eye_ratio: Option<f32>) -> PerceptionFrame {
        PerceptionFrame::new(categorical, eye_ratio, 0.25)
    }

    #[test]
    fn test_normal_states() {
        let status = decide_after(&[(frame(CategoricalStatus::Awake, Some(0.3)), 0)]);
        assert_eq!(status, DisplayStatus::new("Awake & Eyes Open", StatusTone::Green));

        let status = decide_after(&[(frame(CategoricalStatus::NoYawn, Some(0.3)), 0)]);
        assert_eq!(status, DisplayStatus::new("No Yawn & Eyes Open", StatusTone::Teal));

        let status = decide_after(&[(frame(CategoricalStatus::Awake, None), 0)]);
        assert_eq!(status, DisplayStatus::new("Face Not Detected!", StatusTone::Gray));
        assert_eq!(status.tier(), SeverityTier::Normal);
    }

    #[test]
    fn test_accumulating_is_amber_with_truncated_seconds() {
        let yawn = frame(CategoricalStatus::Yawn, Some(0.3));
        let status = decide_after(&[(yawn, 0), (yawn, 1990)]);
        assert_eq!(status.text, "Yawning! (1s)");
        assert_eq!(status.tone, StatusTone::Amber);
        assert_eq!(status.tier(), SeverityTier::Warning);
    }

    #[test]
    fn test_sustained_is_red() {
        let closed = frame(CategoricalStatus::Awake, Some(0.1));
        let status = decide_after(&[(closed, 0), (closed, 3500)]);
        assert_eq!(status.text, "ALERT! Microsleep! (3s)");
        assert_eq!(status.tone.hex(), "#dc3545");
        assert_eq!(status.tier(), SeverityTier::Alarm);
    }

    #[test]
    fn test_sustained_beats_accumulating_of_higher_priority() {
        let drowsy_open = frame(CategoricalStatus::Drowsy, Some(0.3));
        let drowsy_closed = frame(CategoricalStatus::Drowsy, Some(0.1));
        let status = decide_after(&[(drowsy_open, 0), (drowsy_closed, 2100)]);
        assert_eq!(status.text, "ALERT! Drowsy (Head Down)! (2s)");
    }

    #[test]
    fn test_tie_break_order() {
        // drowsy and yawn cannot co-occur; microsleep outranks both
        let drowsy_closed = frame(CategoricalStatus::Drowsy, Some(0.1));
        let status = decide_after(&[(drowsy_closed, 0), (drowsy_closed, 500)]);
        assert_eq!(status.text, "Microsleep! (0s)");

        let status = decide_after(&[(drowsy_closed, 0), (drowsy_closed, 2500)]);
        assert_eq!(status.text, "ALERT! Microsleep! (2s)");
    }
}
