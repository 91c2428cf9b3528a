//! Live camera capture through OpenCV's videoio

use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// A cabin camera opened by index
pub struct WebcamSource {
    index: i32,
    width: u32,
    height: u32,
    capture: Option<videoio::VideoCapture>,
    raw: Mat,
    rgb: Mat,
    sequence: u32,
}

impl WebcamSource {
    pub fn new(index: i32, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            capture: None,
            raw: Mat::default(),
            rgb: Mat::default(),
            sequence: 0,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.index, config.frame_width, config.frame_height)
    }
}

fn cv_error(context: &str, e: opencv::Error) -> CameraError {
    CameraError::Open(format!("{}: {}", context, e))
}

impl FrameSource for WebcamSource {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.capture.is_some() {
            return Ok(());
        }

        let camera = format!("camera {}", self.index);
        let mut capture = videoio::VideoCapture::new(self.index, videoio::CAP_ANY)
            .map_err(|e| cv_error(&camera, e))?;
        if !capture.is_opened().map_err(|e| cv_error(&camera, e))? {
            return Err(CameraError::Open(format!("{} could not be opened", camera)));
        }

        // Requested size is a hint; drivers fall back to their nearest mode
        let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(self.width));
        let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(self.height));

        info!(
            "Opened {} ({}x{})",
            camera,
            capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0),
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0)
        );
        self.capture = Some(capture);
        self.sequence = 0;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let capture = self.capture.as_mut().ok_or(CameraError::NotInitialized)?;

        let grabbed = capture
            .read(&mut self.raw)
            .map_err(|e| CameraError::Decode(e.to_string()))?;
        if !grabbed || self.raw.rows() <= 0 || self.raw.cols() <= 0 {
            return Err(CameraError::Decode(format!("camera {} returned no frame", self.index)));
        }

        imgproc::cvt_color(&self.raw, &mut self.rgb, imgproc::COLOR_BGR2RGB, 0)
            .map_err(|e| CameraError::Decode(e.to_string()))?;
        let data = self
            .rgb
            .data_bytes()
            .map_err(|e| CameraError::Decode(e.to_string()))?
            .to_vec();

        self.sequence = self.sequence.wrapping_add(1);
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Ok(VideoFrame::new(
            data,
            self.rgb.cols() as u32,
            self.rgb.rows() as u32,
            timestamp_ns,
            self.sequence,
        ))
    }

    fn release(&mut self) -> Result<(), CameraError> {
        let Some(mut capture) = self.capture.take() else {
            warn!("Release requested on a closed camera");
            return Ok(());
        };
        capture
            .release()
            .map_err(|e| CameraError::Release(e.to_string()))?;
        info!("Released camera {}", self.index);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.capture.is_some()
    }
}
