//! Driver Monitoring System (DMS)
//!
//! Turns camera frames into the small vocabulary the fusion engine consumes:
//! - Head/mouth class from an object detector (awake, drowsy, yawn, no_yawn)
//! - Eye aspect ratio from facial landmarks (eyes_open, microsleep, no_face)
//! - Annotated frames for display

pub mod analysis;
pub mod config;
pub mod detector;
pub mod landmarks;
pub mod state;

pub use analysis::{DmsAnalysis, OverlayFont, TextOverlay};
pub use config::{ConfidenceThresholds, DmsConfig};
pub use detector::{BoundingBox, Detection, ObjectDetector, YoloDetector};
pub use landmarks::{EyeLandmarks, FaceMeshExtractor, LandmarkExtractor, Point};
pub use state::{CategoricalStatus, EyeStatus, PerceptionFrame};

use camera_capture::frame::VideoFrame;
use thiserror::Error;
use tracing::{debug, info};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}

/// Perception adapter wrapping the detector and the landmark extractor
pub struct DmsModule {
    config: DmsConfig,
    detector: Box<dyn ObjectDetector + Send>,
    landmarks: Box<dyn LandmarkExtractor + Send>,
    overlay_font: Option<OverlayFont>,
}

impl DmsModule {
    /// Load both ONNX models named in the configuration
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        if config.class_names.is_empty() {
            return Err(DmsError::Config("detector class_names must not be empty".into()));
        }
        let detector = YoloDetector::new(&config)?;
        let landmarks = FaceMeshExtractor::new(&config)?;
        info!("Perception models loaded");
        let overlay_font = OverlayFont::locate(config.overlay_font_path.as_deref());
        Ok(
            Self::with_backends(config, Box::new(detector), Box::new(landmarks))
                .with_overlay_font(overlay_font),
        )
    }

    /// Build around caller-supplied backends
    pub fn with_backends(
        config: DmsConfig,
        detector: Box<dyn ObjectDetector + Send>,
        landmarks: Box<dyn LandmarkExtractor + Send>,
    ) -> Self {
        Self {
            config,
            detector,
            landmarks,
            overlay_font: None,
        }
    }

    /// Font for text overlays on annotated frames
    pub fn with_overlay_font(mut self, font: Option<OverlayFont>) -> Self {
        self.overlay_font = font;
        self
    }

    /// Draw `analysis` onto a copy of `frame`
    pub fn annotate(&self, analysis: &DmsAnalysis, frame: &VideoFrame) -> VideoFrame {
        analysis.annotate(frame, self.overlay_font.as_ref())
    }

    /// Analyze a single frame
    pub fn analyze(&mut self, frame: &VideoFrame) -> Result<DmsAnalysis, DmsError> {
        let thresholds = self.config.class_thresholds;

        let detections: Vec<Detection> = self
            .detector
            .detect(frame)?
            .into_iter()
            .filter(|d| CategoricalStatus::qualifies(d, &thresholds).is_some())
            .collect();
        let categorical = CategoricalStatus::resolve(&detections, &thresholds);

        // Degenerate contours are as good as no face
        let eyes = self.landmarks.extract(frame)?;
        let eye_ratio = eyes.as_ref().and_then(EyeLandmarks::mean_ratio);
        let eyes = eye_ratio.and(eyes);

        let perception = PerceptionFrame::new(categorical, eye_ratio, self.config.ear_threshold);
        debug!(
            "Perception: {} / {} (ear {:?})",
            perception.categorical_status.as_str(),
            perception.eye_status.as_str(),
            perception.eye_ratio
        );

        Ok(DmsAnalysis {
            frame: perception,
            detections,
            eyes,
        })
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(Vec<Detection>);

    impl ObjectDetector for FixedDetector {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<Detection>, DmsError> {
            Ok(self.0.clone())
        }
    }

    struct FixedEyes(Option<EyeLandmarks>);

    impl LandmarkExtractor for FixedEyes {
        fn extract(&mut self, _frame: &VideoFrame) -> Result<Option<EyeLandmarks>, DmsError> {
            Ok(self.0)
        }
    }

    fn detection(label: &str, confidence: f32) -> Detection {
        Detection {
            label: label.into(),
            confidence,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    fn eyes(open: f32) -> EyeLandmarks {
        // horizontal width 20, both lids `open` apart -> ear = open / 20
        let eye = |cx: f32| {
            [
                Point::new(cx - 10.0, 50.0),
                Point::new(cx - 5.0, 50.0 - open / 2.0),
                Point::new(cx + 5.0, 50.0 - open / 2.0),
                Point::new(cx + 10.0, 50.0),
                Point::new(cx + 5.0, 50.0 + open / 2.0),
                Point::new(cx - 5.0, 50.0 + open / 2.0),
            ]
        };
        EyeLandmarks {
            left: eye(30.0),
            right: eye(70.0),
        }
    }

    fn module(detections: Vec<Detection>, landmarks: Option<EyeLandmarks>) -> DmsModule {
        DmsModule::with_backends(
            DmsConfig::default(),
            Box::new(FixedDetector(detections)),
            Box::new(FixedEyes(landmarks)),
        )
    }

    #[test]
    fn test_missing_model_path_is_load_error() {
        assert!(matches!(DmsModule::new(DmsConfig::default()), Err(DmsError::ModelLoad(_))));
    }

    #[test]
    fn test_analyze_fuses_both_sources() {
        let mut dms = module(
            vec![detection("yawn", 0.8), detection("drowsy", 0.2)],
            Some(eyes(2.0)),
        );
        let analysis = dms.analyze(&VideoFrame::solid(100, 100, [0, 0, 0])).unwrap();

        assert_eq!(analysis.frame.categorical_status, CategoricalStatus::Yawn);
        assert_eq!(analysis.frame.eye_status, EyeStatus::Microsleep);
        assert!((analysis.frame.eye_ratio.unwrap() - 0.1).abs() < 1e-6);
        // below-threshold drowsy box is not kept for annotation either
        assert_eq!(analysis.detections.len(), 1);
    }

    #[test]
    fn test_nothing_found_is_not_an_error() {
        let mut dms = module(vec![], None);
        let analysis = dms.analyze(&VideoFrame::solid(10, 10, [0, 0, 0])).unwrap();

        assert_eq!(analysis.frame.categorical_status, CategoricalStatus::Awake);
        assert_eq!(analysis.frame.eye_status, EyeStatus::NoFace);
        assert!(!analysis.face_detected());
    }

    #[test]
    fn test_degenerate_eyes_count_as_no_face() {
        let flat = EyeLandmarks {
            left: [Point::new(1.0, 1.0); 6],
            right: [Point::new(1.0, 1.0); 6],
        };
        let mut dms = module(vec![], Some(flat));
        let analysis = dms.analyze(&VideoFrame::solid(10, 10, [0, 0, 0])).unwrap();

        assert_eq!(analysis.frame.eye_status, EyeStatus::NoFace);
        assert!(analysis.eyes.is_none());
    }
}
