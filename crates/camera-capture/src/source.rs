//! Frame sources

use crate::{CameraConfig, CameraError, VideoFrame};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// A camera the live session can pull frames from.
///
/// `open` failing means the camera is unavailable and no session may start.
/// `read_frame` failing mid-session ends the session.
pub trait FrameSource {
    /// Acquire the device
    fn open(&mut self) -> Result<(), CameraError>;

    /// Read the next frame (blocking until one is available)
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the device
    fn release(&mut self) -> Result<(), CameraError>;

    /// Whether the device is currently held
    fn is_open(&self) -> bool;
}

/// Replays a directory of still images (PNG/JPEG) in file-name order.
pub struct ImageSequenceSource {
    directory: PathBuf,
    loop_playback: bool,
    files: Vec<PathBuf>,
    cursor: usize,
    sequence: u32,
    open: bool,
}

impl ImageSequenceSource {
    /// Create a source over `directory`
    pub fn new(directory: impl Into<PathBuf>, loop_playback: bool) -> Self {
        Self {
            directory: directory.into(),
            loop_playback,
            files: Vec::new(),
            cursor: 0,
            sequence: 0,
            open: false,
        }
    }

    /// Create a source from camera configuration
    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.device.clone(), config.loop_playback)
    }

    /// Number of frames found at `open`
    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    fn list_frames(directory: &Path) -> Result<Vec<PathBuf>, CameraError> {
        let entries = std::fs::read_dir(directory)
            .map_err(|e| CameraError::Open(format!("{}: {}", directory.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp")
                    })
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.open {
            return Ok(());
        }

        let files = Self::list_frames(&self.directory)?;
        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no frames found in {}",
                self.directory.display()
            )));
        }

        info!("Opened frame sequence {} ({} frames)", self.directory.display(), files.len());
        self.files = files;
        self.cursor = 0;
        self.sequence = 0;
        self.open = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }

        if self.cursor >= self.files.len() {
            if !self.loop_playback {
                return Err(CameraError::EndOfStream);
            }
            debug!("Frame sequence exhausted, looping");
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        let image = image::open(path)
            .map_err(|e| CameraError::Decode(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        self.cursor += 1;
        self.sequence = self.sequence.wrapping_add(1);

        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Ok(VideoFrame::from_rgb_image(image, timestamp_ns, self.sequence))
    }

    fn release(&mut self) -> Result<(), CameraError> {
        if !self.open {
            warn!("Release requested on a closed frame sequence");
            return Ok(());
        }
        self.open = false;
        self.files.clear();
        info!("Released frame sequence {}", self.directory.display());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame_dir(name: &str, frames: u32) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("camera-capture-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..frames {
            let image = RgbImage::from_pixel(4, 3, Rgb([i as u8, 0, 0]));
            image.save(dir.join(format!("frame_{:03}.png", i))).unwrap();
        }
        dir
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let mut source = ImageSequenceSource::new("/nonexistent/frames", false);
        assert!(matches!(source.open(), Err(CameraError::Open(_))));
        assert!(!source.is_open());
    }

    #[test]
    fn test_open_empty_directory_fails() {
        let dir = frame_dir("empty", 0);
        let mut source = ImageSequenceSource::new(&dir, false);
        assert!(matches!(source.open(), Err(CameraError::Open(_))));
    }

    #[test]
    fn test_reads_frames_in_order_then_ends() {
        let dir = frame_dir("ordered", 2);
        let mut source = ImageSequenceSource::new(&dir, false);
        source.open().unwrap();
        assert_eq!(source.frame_count(), 2);

        let first = source.read_frame().unwrap();
        assert_eq!(first.get_pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(first.sequence, 1);

        let second = source.read_frame().unwrap();
        assert_eq!(second.get_pixel(0, 0), Some([1, 0, 0]));

        assert!(matches!(source.read_frame(), Err(CameraError::EndOfStream)));
        source.release().unwrap();
        assert!(matches!(source.read_frame(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_loop_playback_wraps() {
        let dir = frame_dir("looping", 1);
        let mut source = ImageSequenceSource::new(&dir, true);
        source.open().unwrap();
        for _ in 0..3 {
            assert!(source.read_frame().is_ok());
        }
    }
}
