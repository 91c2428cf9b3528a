//! DMS configuration

use crate::state::CategoricalStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum confidence per detector class.
///
/// Kept per class so each can be tuned independently, even though the
/// shipped model works well with one shared value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub awake: f32,
    pub drowsy: f32,
    pub yawn: f32,
    pub no_yawn: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            awake: 0.5,
            drowsy: 0.5,
            yawn: 0.5,
            no_yawn: 0.5,
        }
    }
}

impl ConfidenceThresholds {
    /// Same threshold for every class
    pub fn uniform(value: f32) -> Self {
        Self {
            awake: value,
            drowsy: value,
            yawn: value,
            no_yawn: value,
        }
    }

    /// Threshold for a class
    pub fn threshold_for(&self, status: CategoricalStatus) -> f32 {
        match status {
            CategoricalStatus::Awake => self.awake,
            CategoricalStatus::Drowsy => self.drowsy,
            CategoricalStatus::Yawn => self.yawn,
            CategoricalStatus::NoYawn => self.no_yawn,
        }
    }
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Per-class confidence table applied after decoding
    pub class_thresholds: ConfidenceThresholds,

    /// Eye aspect ratio below which the eyes count as closed
    pub ear_threshold: f32,

    /// Global confidence pre-filter applied while decoding detector output
    pub detector_confidence: f32,

    /// IoU above which overlapping same-class boxes are suppressed
    pub nms_iou: f32,

    /// Square detector input size (pixels)
    pub detector_input_size: u32,

    /// Detector class names, in model output order
    pub class_names: Vec<String>,

    /// Square face-mesh input size (pixels)
    pub face_mesh_input_size: u32,

    /// Minimum face-presence probability from the face-mesh model
    pub face_presence_threshold: f32,

    /// Model paths
    pub detector_model_path: Option<PathBuf>,
    pub face_mesh_model_path: Option<PathBuf>,

    /// TrueType font for frame text; common system fonts are tried when unset
    pub overlay_font_path: Option<PathBuf>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            class_thresholds: ConfidenceThresholds::default(),
            ear_threshold: 0.25,
            detector_confidence: 0.3,
            nms_iou: 0.4,
            detector_input_size: 640,
            class_names: vec![
                "awake".to_string(),
                "drowsy".to_string(),
                "no_yawn".to_string(),
                "yawn".to_string(),
            ],
            face_mesh_input_size: 192,
            face_presence_threshold: 0.5,
            detector_model_path: None,
            face_mesh_model_path: None,
            overlay_font_path: None,
        }
    }
}
