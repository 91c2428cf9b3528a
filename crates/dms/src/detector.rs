//! Driver-state object detection

use crate::{DmsConfig, DmsError};
use camera_capture::frame::VideoFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use tract_onnx::prelude::*;

pub(crate) type OnnxPlan =
    SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Axis-aligned box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from centre/size as emitted by YOLO heads
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// One labelled detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Produces labelled detections for a frame.
///
/// An empty result is a normal outcome, not an error.
pub trait ObjectDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>, DmsError>;
}

/// YOLOv8 detector running an ONNX export through tract
pub struct YoloDetector {
    plan: OnnxPlan,
    input_size: u32,
    class_names: Vec<String>,
    min_confidence: f32,
    nms_iou: f32,
}

impl YoloDetector {
    /// Load the detector model configured in `config`
    pub fn new(config: &DmsConfig) -> Result<Self, DmsError> {
        let path = config
            .detector_model_path
            .as_deref()
            .ok_or_else(|| DmsError::ModelLoad("no detector model path configured".into()))?;
        Self::load(path, config)
    }

    pub fn load(path: &Path, config: &DmsConfig) -> Result<Self, DmsError> {
        info!("Loading detector model from {}", path.display());
        let size = config.detector_input_size as usize;
        let plan = load_plan(path, [1, 3, size, size])?;

        Ok(Self {
            plan,
            input_size: config.detector_input_size,
            class_names: config.class_names.clone(),
            min_confidence: config.detector_confidence,
            nms_iou: config.nms_iou,
        })
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>, DmsError> {
        let img = frame
            .to_rgb_image()
            .ok_or_else(|| DmsError::ImageProcessing("Failed to create image buffer".into()))?;

        // 1. Preprocess: resize and scale to 0..1, NCHW
        let size = self.input_size;
        let resized =
            image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);
        let s = size as usize;
        let input: Tensor = tract_ndarray::Array4::from_shape_fn((1, 3, s, s), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
        .into();

        // 2. Inference
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let view = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        let shape = view.shape().to_vec();
        if shape.len() != 3 {
            return Err(DmsError::Inference(format!(
                "unexpected detector output shape {:?}",
                shape
            )));
        }
        let data: Vec<f32> = view.iter().copied().collect();

        // 3. Post-process
        let layout = OutputLayout::from_shape(shape[1], shape[2], self.class_names.len())?;
        let candidates = decode_predictions(
            &data,
            layout,
            &self.class_names,
            frame.width as f32 / size as f32,
            frame.height as f32 / size as f32,
            self.min_confidence,
        );
        let detections = non_max_suppression(candidates, self.nms_iou);
        debug!("Detector produced {} detections", detections.len());
        Ok(detections)
    }
}

pub(crate) fn load_plan(path: &Path, shape: [usize; 4]) -> Result<OnnxPlan, DmsError> {
    tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|model| model.with_input_fact(0, f32::fact(shape).into()))
        .and_then(|model| model.into_optimized())
        .and_then(|model| model.into_runnable())
        .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path.display(), e)))
}

/// Memory layout of a YOLOv8 head: `[4 + classes][anchors]`, or transposed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    pub channels: usize,
    pub anchors: usize,
    pub transposed: bool,
}

impl OutputLayout {
    /// Work out the layout from the two trailing output dimensions
    pub fn from_shape(dim1: usize, dim2: usize, classes: usize) -> Result<Self, DmsError> {
        let channels = 4 + classes;
        if dim1 == channels {
            Ok(Self {
                channels,
                anchors: dim2,
                transposed: false,
            })
        } else if dim2 == channels {
            Ok(Self {
                channels,
                anchors: dim1,
                transposed: true,
            })
        } else {
            Err(DmsError::Inference(format!(
                "detector output [{}, {}] does not match {} classes",
                dim1, dim2, classes
            )))
        }
    }

    fn at(&self, data: &[f32], channel: usize, anchor: usize) -> f32 {
        if self.transposed {
            data[anchor * self.channels + channel]
        } else {
            data[channel * self.anchors + anchor]
        }
    }
}

/// Decode raw head output into frame-space detections above `min_confidence`
pub fn decode_predictions(
    data: &[f32],
    layout: OutputLayout,
    class_names: &[String],
    scale_x: f32,
    scale_y: f32,
    min_confidence: f32,
) -> Vec<Detection> {
    let classes = layout.channels - 4;
    if data.len() < layout.channels * layout.anchors {
        return Vec::new();
    }

    (0..layout.anchors)
        .filter_map(|anchor| {
            let (class, confidence) = (0..classes)
                .map(|c| (c, layout.at(data, 4 + c, anchor)))
                .max_by(|a, b| a.1.total_cmp(&b.1))?;
            if confidence < min_confidence {
                return None;
            }

            let cx = layout.at(data, 0, anchor) * scale_x;
            let cy = layout.at(data, 1, anchor) * scale_y;
            let w = layout.at(data, 2, anchor) * scale_x;
            let h = layout.at(data, 3, anchor) * scale_y;

            Some(Detection {
                label: class_names
                    .get(class)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", class)),
                confidence,
                bbox: BoundingBox::from_center(cx, cy, w, h),
            })
        })
        .collect()
}

/// Class-aware greedy non-maximum suppression, highest confidence first
pub fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.label == candidate.label && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
