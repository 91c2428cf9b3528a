//! Alerting System
//!
//! Audible alarm for sustained hazards: an output abstraction, a controller that
//! starts/stops it per tick and replays the clip while the hazard persists.

mod controller;
mod output;

#[cfg(feature = "audio")]
mod audio;

pub use controller::AlarmController;
pub use output::{AlarmOutput, SilentAlarm};

#[cfg(feature = "audio")]
pub use audio::RodioAlarm;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Alarm error types
#[derive(Error, Debug)]
pub enum AlarmError {
    #[error("Audio device unavailable: {0}")]
    Device(String),

    #[error("Unusable alarm sound: {0}")]
    Sound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Sound file (wav/mp3/ogg/flac); silent output when unset
    pub sound_path: Option<PathBuf>,

    /// Playback volume, 0.0 - 1.0
    pub volume: f32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            sound_path: None,
            volume: 1.0,
        }
    }
}

/// Best available output for `config`, falling back to [`SilentAlarm`]
pub fn open_output(config: &AlarmConfig) -> Box<dyn AlarmOutput> {
    let Some(path) = &config.sound_path else {
        info!("No alarm sound configured; using silent alarm");
        return Box::new(SilentAlarm::new());
    };

    #[cfg(feature = "audio")]
    {
        match RodioAlarm::open(path, config.volume) {
            Ok(alarm) => return Box::new(alarm),
            Err(e) => warn!("Audio alarm unavailable ({}); using silent alarm", e),
        }
    }

    #[cfg(not(feature = "audio"))]
    warn!(
        "Alarm sound {} ignored: built without the `audio` feature",
        path.display()
    );

    Box::new(SilentAlarm::new())
}
