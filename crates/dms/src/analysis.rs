//! DMS analysis results and frame annotation

use crate::detector::Detection;
use crate::landmarks::EyeLandmarks;
use crate::state::{CategoricalStatus, EyeStatus, PerceptionFrame};
use crate::DmsError;
use ab_glyph::FontArc;
use camera_capture::frame::VideoFrame;
use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fonts tried when no overlay font is configured
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const EYES_OPEN_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
const EYES_CLOSED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const NO_FACE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);

/// Font for the text overlays on annotated frames
#[derive(Clone)]
pub struct OverlayFont(FontArc);

impl std::fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OverlayFont")
    }
}

impl OverlayFont {
    /// Load a TrueType/OpenType font file
    pub fn load(path: &Path) -> Result<Self, DmsError> {
        let bytes = std::fs::read(path)
            .map_err(|e| DmsError::Config(format!("overlay font {}: {}", path.display(), e)))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| DmsError::Config(format!("overlay font {}: {}", path.display(), e)))?;
        Ok(Self(font))
    }

    /// The configured font, else the first common system font found
    ///
    /// `None` means frames are annotated without text.
    pub fn locate(configured: Option<&Path>) -> Option<Self> {
        let candidates = configured
            .map(|p| vec![p.to_path_buf()])
            .unwrap_or_else(|| SYSTEM_FONTS.iter().map(PathBuf::from).collect());

        for path in candidates {
            match Self::load(&path) {
                Ok(font) => {
                    info!("Overlay font {}", path.display());
                    return Some(font);
                }
                Err(e) => debug!("{}", e),
            }
        }
        info!("No overlay font found; annotated frames carry no text");
        None
    }
}

/// One line of text drawn onto an annotated frame
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub scale: f32,
    pub color: Rgb<u8>,
}

/// Complete perception result for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Normalized state consumed by the fusion engine
    pub frame: PerceptionFrame,

    /// Detections that cleared their class threshold
    pub detections: Vec<Detection>,

    /// Eye contours (if a face was found)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eyes: Option<EyeLandmarks>,
}

impl DmsAnalysis {
    /// Whether the landmark extractor found a face
    pub fn face_detected(&self) -> bool {
        self.frame.eye_status != EyeStatus::NoFace
    }

    /// Labels, the EAR readout or the no-face warning for a frame `width` wide
    pub fn text_overlays(&self, width: u32) -> Vec<TextOverlay> {
        let mut overlays: Vec<TextOverlay> = self
            .detections
            .iter()
            .map(|d| TextOverlay {
                text: format!("{} ({:.2})", d.label, d.confidence),
                x: d.bbox.x1.round() as i32,
                y: (d.bbox.y1.round() as i32 - 18).max(0),
                scale: 16.0,
                color: CategoricalStatus::from_label(&d.label)
                    .map(class_color)
                    .unwrap_or(Rgb([255, 255, 255])),
            })
            .collect();

        let right = |offset: i32| (width as i32 - offset).max(0);
        match self.frame.eye_ratio {
            Some(ratio) => overlays.push(TextOverlay {
                text: format!("EAR: {:.3}", ratio),
                x: right(150),
                y: 12,
                scale: 22.0,
                color: if self.frame.eye_status == EyeStatus::Microsleep {
                    EYES_CLOSED_COLOR
                } else {
                    EYES_OPEN_COLOR
                },
            }),
            None => overlays.push(TextOverlay {
                text: "No Face Detected!".to_string(),
                x: right(250),
                y: 12,
                scale: 22.0,
                color: NO_FACE_COLOR,
            }),
        }
        overlays
    }

    /// Draw detections and, on eye closure, the eye contours onto a copy of `frame`
    ///
    /// Text overlays are drawn only when a `font` is available.
    pub fn annotate(&self, frame: &VideoFrame, font: Option<&OverlayFont>) -> VideoFrame {
        let Some(mut canvas) = frame.to_rgb_image() else {
            return frame.clone();
        };

        for detection in &self.detections {
            let color = CategoricalStatus::from_label(&detection.label)
                .map(class_color)
                .unwrap_or(Rgb([255, 255, 255]));
            let x = detection.bbox.x1.round() as i32;
            let y = detection.bbox.y1.round() as i32;
            let w = detection.bbox.width().round().max(1.0) as u32;
            let h = detection.bbox.height().round().max(1.0) as u32;

            // Two passes for a 2px outline
            draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w, h), color);
            if w > 2 && h > 2 {
                let inner = Rect::at(x + 1, y + 1).of_size(w - 2, h - 2);
                draw_hollow_rect_mut(&mut canvas, inner, color);
            }
        }

        if self.frame.eye_status == EyeStatus::Microsleep {
            if let Some(eyes) = &self.eyes {
                for point in eyes.points() {
                    draw_filled_circle_mut(
                        &mut canvas,
                        (point.x.round() as i32, point.y.round() as i32),
                        2,
                        EYES_CLOSED_COLOR,
                    );
                }
            }
        }

        if let Some(OverlayFont(font)) = font {
            for overlay in self.text_overlays(frame.width) {
                draw_text_mut(
                    &mut canvas,
                    overlay.color,
                    overlay.x,
                    overlay.y,
                    overlay.scale,
                    font,
                    &overlay.text,
                );
            }
        }

        VideoFrame::from_rgb_image(canvas, frame.timestamp_ns, frame.sequence)
    }
}

/// Outline colour per detector class
pub fn class_color(status: CategoricalStatus) -> Rgb<u8> {
    match status {
        CategoricalStatus::Awake => Rgb([0, 255, 0]),
        CategoricalStatus::Drowsy => Rgb([255, 0, 0]),
        CategoricalStatus::NoYawn => Rgb([0, 255, 255]),
        CategoricalStatus::Yawn => Rgb([0, 0, 255]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::BoundingBox;
    use crate::landmarks::Point;

    #[test]
    fn test_annotate_draws_box_in_class_color() {
        let frame = VideoFrame::solid(40, 40, [0, 0, 0]);
        let analysis = DmsAnalysis {
            frame: PerceptionFrame::new(CategoricalStatus::Drowsy, Some(0.3), 0.25),
            detections: vec![Detection {
                label: "drowsy".into(),
                confidence: 0.9,
                bbox: BoundingBox::new(5.0, 5.0, 25.0, 25.0),
            }],
            eyes: None,
        };

        let annotated = analysis.annotate(&frame, None);
        assert_eq!(annotated.get_pixel(5, 5), Some([255, 0, 0]));
        assert_eq!(annotated.get_pixel(15, 15), Some([0, 0, 0]));
        // source untouched
        assert_eq!(frame.get_pixel(5, 5), Some([0, 0, 0]));
    }

    #[test]
    fn test_annotate_marks_eyes_only_on_microsleep() {
        let frame = VideoFrame::solid(40, 40, [0, 0, 0]);
        let eyes = EyeLandmarks {
            left: [Point::new(10.0, 10.0); 6],
            right: [Point::new(30.0, 10.0); 6],
        };

        let open = DmsAnalysis {
            frame: PerceptionFrame::new(CategoricalStatus::Awake, Some(0.3), 0.25),
            detections: vec![],
            eyes: Some(eyes),
        };
        assert_eq!(open.annotate(&frame, None).get_pixel(10, 10), Some([0, 0, 0]));

        let closed = DmsAnalysis {
            frame: PerceptionFrame::new(CategoricalStatus::Awake, Some(0.1), 0.25),
            ..open
        };
        assert_eq!(closed.annotate(&frame, None).get_pixel(10, 10), Some([255, 0, 0]));
    }

    #[test]
    fn test_text_overlays_follow_face_state() {
        let analysis = DmsAnalysis {
            frame: PerceptionFrame::new(CategoricalStatus::Yawn, Some(0.312), 0.25),
            detections: vec![Detection {
                label: "yawn".into(),
                confidence: 0.876,
                bbox: BoundingBox::new(40.0, 10.0, 120.0, 90.0),
            }],
            eyes: None,
        };

        let overlays = analysis.text_overlays(640);
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].text, "yawn (0.88)");
        assert_eq!((overlays[0].x, overlays[0].y), (40, 0));
        assert_eq!(overlays[0].color, class_color(CategoricalStatus::Yawn));
        assert_eq!(overlays[1].text, "EAR: 0.312");
        assert_eq!(overlays[1].x, 490);
        assert_eq!(overlays[1].color, EYES_OPEN_COLOR);

        let closed = DmsAnalysis {
            frame: PerceptionFrame::new(CategoricalStatus::Awake, Some(0.1), 0.25),
            detections: vec![],
            eyes: None,
        };
        assert_eq!(closed.text_overlays(640)[0].color, EYES_CLOSED_COLOR);

        let no_face = DmsAnalysis {
            frame: PerceptionFrame::new(CategoricalStatus::Awake, None, 0.25),
            detections: vec![],
            eyes: None,
        };
        let overlays = no_face.text_overlays(200);
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].text, "No Face Detected!");
        assert_eq!(overlays[0].x, 0);
        assert_eq!(overlays[0].color, NO_FACE_COLOR);
    }

    #[test]
    fn test_overlay_font_errors() {
        assert!(matches!(
            OverlayFont::load(Path::new("/nonexistent/font.ttf")),
            Err(DmsError::Config(_))
        ));

        let path = std::env::temp_dir().join(format!("dms-not-a-font-{}.ttf", std::process::id()));
        std::fs::write(&path, b"definitely not a font").unwrap();
        assert!(matches!(OverlayFont::load(&path), Err(DmsError::Config(_))));
        assert!(OverlayFont::locate(Some(&path)).is_none());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_text_is_drawn_with_a_system_font() {
        let Some(font) = OverlayFont::locate(None) else {
            return;
        };
        let frame = VideoFrame::solid(320, 60, [0, 0, 0]);
        let analysis = DmsAnalysis {
            frame: PerceptionFrame::new(CategoricalStatus::Awake, None, 0.25),
            detections: vec![],
            eyes: None,
        };

        let plain = analysis.annotate(&frame, None);
        let lettered = analysis.annotate(&frame, Some(&font));
        assert!(plain.data.iter().all(|&b| b == 0));
        assert!(lettered.data.iter().any(|&b| b != 0));
    }
}
