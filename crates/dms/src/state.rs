//! Per-frame driver state

use crate::config::ConfidenceThresholds;
use crate::detector::Detection;
use serde::{Deserialize, Serialize};

/// Head/mouth state reported by the object detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalStatus {
    #[default]
    Awake,
    Drowsy,
    Yawn,
    NoYawn,
}

impl CategoricalStatus {
    /// Map a detector label onto a status
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "awake" => Some(Self::Awake),
            "drowsy" => Some(Self::Drowsy),
            "yawn" => Some(Self::Yawn),
            "no_yawn" => Some(Self::NoYawn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Awake => "awake",
            Self::Drowsy => "drowsy",
            Self::Yawn => "yawn",
            Self::NoYawn => "no_yawn",
        }
    }

    /// Resolution rank: drowsy > yawn > no_yawn > awake
    fn rank(&self) -> u8 {
        match self {
            Self::Drowsy => 3,
            Self::Yawn => 2,
            Self::NoYawn => 1,
            Self::Awake => 0,
        }
    }

    /// Whether a detection clears its class threshold
    pub fn qualifies(detection: &Detection, thresholds: &ConfidenceThresholds) -> Option<Self> {
        let status = Self::from_label(&detection.label)?;
        (detection.confidence >= thresholds.threshold_for(status)).then_some(status)
    }

    /// Highest-ranked status among qualifying detections, `Awake` when none qualify
    pub fn resolve(detections: &[Detection], thresholds: &ConfidenceThresholds) -> Self {
        detections
            .iter()
            .filter_map(|d| Self::qualifies(d, thresholds))
            .max_by_key(|s| s.rank())
            .unwrap_or_default()
    }
}

/// Eye state derived from the eye aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeStatus {
    EyesOpen,
    Microsleep,
    NoFace,
}

impl EyeStatus {
    /// Classify a ratio; closed strictly below `threshold`
    pub fn classify(eye_ratio: Option<f32>, threshold: f32) -> Self {
        match eye_ratio {
            None => Self::NoFace,
            Some(ratio) if ratio < threshold => Self::Microsleep,
            Some(_) => Self::EyesOpen,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EyesOpen => "eyes_open",
            Self::Microsleep => "microsleep",
            Self::NoFace => "no_face",
        }
    }
}

/// Normalized perception result for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerceptionFrame {
    pub categorical_status: CategoricalStatus,
    pub eye_status: EyeStatus,
    /// Mean eye aspect ratio; absent when no face was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_ratio: Option<f32>,
}

impl PerceptionFrame {
    pub fn new(
        categorical_status: CategoricalStatus,
        eye_ratio: Option<f32>,
        ear_threshold: f32,
    ) -> Self {
        Self {
            categorical_status,
            eye_status: EyeStatus::classify(eye_ratio, ear_threshold),
            eye_ratio,
        }
    }
}

impl Default for PerceptionFrame {
    fn default() -> Self {
        Self {
            categorical_status: CategoricalStatus::Awake,
            eye_status: EyeStatus::NoFace,
            eye_ratio: None,
        }
    }
}
