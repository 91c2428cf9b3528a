//! Alarm sound outputs

use crate::AlarmError;
use tracing::info;

/// A device that can play the alarm sound
pub trait AlarmOutput {
    /// Start playback from the beginning
    fn play(&mut self) -> Result<(), AlarmError>;

    /// Stop playback (no-op when silent)
    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    /// True once when a playback run ended on its own since the last poll
    fn poll_finished(&mut self) -> bool;
}

/// Output that only logs alarm edges
///
/// Used when no sound is configured or the audio device is unavailable.
/// Playback never ends by itself.
#[derive(Debug, Default)]
pub struct SilentAlarm {
    playing: bool,
}

impl SilentAlarm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlarmOutput for SilentAlarm {
    fn play(&mut self) -> Result<(), AlarmError> {
        if !self.playing {
            info!("Alarm ON (silent output)");
        }
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.playing {
            info!("Alarm OFF (silent output)");
        }
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn poll_finished(&mut self) -> bool {
        false
    }
}
