//! Facial landmarks and eye aspect ratio

use crate::detector::{load_plan, OnnxPlan};
use crate::{DmsConfig, DmsError};
use camera_capture::frame::VideoFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use tract_onnx::prelude::*;

/// Face-mesh indices of the left eye contour (p1..p6)
pub const LEFT_EYE_INDICES: [usize; 6] = [362, 385, 387, 263, 373, 380];
/// Face-mesh indices of the right eye contour (p1..p6)
pub const RIGHT_EYE_INDICES: [usize; 6] = [33, 160, 158, 133, 153, 144];

const MESH_POINTS: usize = 468;

/// Image-space point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Six-point contours of both eyes, ordered p1 (outer corner) .. p6
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub left: [Point; 6],
    pub right: [Point; 6],
}

impl EyeLandmarks {
    /// Mean of both eyes' aspect ratios; `None` if either eye is degenerate
    pub fn mean_ratio(&self) -> Option<f32> {
        let left = eye_aspect_ratio(&self.left)?;
        let right = eye_aspect_ratio(&self.right)?;
        Some((left + right) / 2.0)
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.left.iter().chain(self.right.iter())
    }
}

/// EAR = (|p2-p6| + |p3-p5|) / (2 |p1-p4|)
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Option<f32> {
    let vertical_a = eye[1].distance(&eye[5]);
    let vertical_b = eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal <= f32::EPSILON {
        return None;
    }
    Some((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// Finds the driver's eye contours in a frame.
///
/// `Ok(None)` means no face was found.
pub trait LandmarkExtractor {
    fn extract(&mut self, frame: &VideoFrame) -> Result<Option<EyeLandmarks>, DmsError>;
}

/// 468-point face mesh running an ONNX export through tract
pub struct FaceMeshExtractor {
    plan: OnnxPlan,
    input_size: u32,
    presence_threshold: f32,
}

impl FaceMeshExtractor {
    /// Load the face-mesh model configured in `config`
    pub fn new(config: &DmsConfig) -> Result<Self, DmsError> {
        let path = config
            .face_mesh_model_path
            .as_deref()
            .ok_or_else(|| DmsError::ModelLoad("no face mesh model path configured".into()))?;
        Self::load(path, config)
    }

    pub fn load(path: &Path, config: &DmsConfig) -> Result<Self, DmsError> {
        info!("Loading face mesh model from {}", path.display());
        let size = config.face_mesh_input_size as usize;
        let plan = load_plan(path, [1, size, size, 3])?;

        Ok(Self {
            plan,
            input_size: config.face_mesh_input_size,
            presence_threshold: config.face_presence_threshold,
        })
    }
}

impl LandmarkExtractor for FaceMeshExtractor {
    fn extract(&mut self, frame: &VideoFrame) -> Result<Option<EyeLandmarks>, DmsError> {
        let img = frame
            .to_rgb_image()
            .ok_or_else(|| DmsError::ImageProcessing("Failed to create image buffer".into()))?;

        let size = self.input_size;
        let resized =
            image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);
        let s = size as usize;
        let input: Tensor = tract_ndarray::Array4::from_shape_fn((1, s, s, 3), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
        .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        let mut mesh: Option<Vec<f32>> = None;
        let mut presence: Option<f32> = None;
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .map_err(|e| DmsError::Inference(e.to_string()))?;
            match view.len() {
                n if n >= MESH_POINTS * 3 => mesh = Some(view.iter().copied().collect()),
                1 => presence = view.iter().next().copied(),
                _ => {}
            }
        }

        if let Some(logit) = presence {
            let probability = 1.0 / (1.0 + (-logit).exp());
            if probability < self.presence_threshold {
                debug!("Face presence {:.2} below threshold", probability);
                return Ok(None);
            }
        }

        let mesh = mesh.ok_or_else(|| DmsError::Inference("face mesh output missing".into()))?;
        Ok(eyes_from_mesh(
            &mesh,
            frame.width as f32 / size as f32,
            frame.height as f32 / size as f32,
        ))
    }
}

/// Pick both eye contours out of a flat `[x, y, z] * 468` mesh, scaling to frame pixels
pub fn eyes_from_mesh(mesh: &[f32], scale_x: f32, scale_y: f32) -> Option<EyeLandmarks> {
    if mesh.len() < MESH_POINTS * 3 {
        return None;
    }
    let pick = |indices: &[usize; 6]| -> [Point; 6] {
        indices.map(|i| Point::new(mesh[i * 3] * scale_x, mesh[i * 3 + 1] * scale_y))
    };
    Some(EyeLandmarks {
        left: pick(&LEFT_EYE_INDICES),
        right: pick(&RIGHT_EYE_INDICES),
    })
}
