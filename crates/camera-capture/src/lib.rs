//! Camera Capture Library for the Driver Monitor
//!
//! Provides the frame type shared by perception and presentation, and the
//! [`FrameSource`] seam the live session pulls frames from:
//! - `WebcamSource` captures from a V4L2/DirectShow camera through OpenCV
//!   (`webcam` feature)
//! - [`ImageSequenceSource`] replays a directory of stills (bench runs, tests)

pub mod frame;
pub mod source;
#[cfg(feature = "webcam")]
pub mod webcam;

pub use frame::VideoFrame;
pub use source::{FrameSource, ImageSequenceSource};
#[cfg(feature = "webcam")]
pub use webcam::WebcamSource;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("End of stream")]
    EndOfStream,

    #[error("Camera not initialized")]
    NotInitialized,

    #[error("Release failed: {0}")]
    Release(String),
}

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Live camera `index`
    #[default]
    Webcam,
    /// Still images from `device`
    Frames,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    /// Camera index for the webcam backend (0 = default camera)
    pub index: i32,
    /// Requested capture size; the driver may pick the nearest mode
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frame directory for replay capture
    pub device: PathBuf,
    /// Mirror frames horizontally before analysis (selfie view)
    pub mirror: bool,
    /// Restart from the first frame when the sequence is exhausted
    pub loop_playback: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Webcam,
            index: 0,
            frame_width: 640,
            frame_height: 480,
            device: PathBuf::from("frames"),
            mirror: true,
            loop_playback: false,
        }
    }
}

/// Build the frame source selected by `config`
///
/// Nothing is acquired until [`FrameSource::open`].
pub fn open_source(config: &CameraConfig) -> Box<dyn FrameSource + Send> {
    match config.backend {
        CameraBackend::Frames => Box::new(ImageSequenceSource::from_config(config)),
        #[cfg(feature = "webcam")]
        CameraBackend::Webcam => Box::new(WebcamSource::from_config(config)),
        #[cfg(not(feature = "webcam"))]
        CameraBackend::Webcam => Box::new(Unsupported),
    }
}

/// Stand-in for the webcam when built without OpenCV
#[cfg(not(feature = "webcam"))]
struct Unsupported;

#[cfg(not(feature = "webcam"))]
impl FrameSource for Unsupported {
    fn open(&mut self) -> Result<(), CameraError> {
        Err(CameraError::Open(
            "built without webcam support; enable the `webcam` feature \
             or set camera.backend = \"frames\""
                .to_string(),
        ))
    }

    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        Err(CameraError::NotInitialized)
    }

    fn release(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        false
    }
}
