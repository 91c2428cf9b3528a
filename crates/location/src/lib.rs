//! Location tracking
//!
//! A background thread polls a [`LocationSource`] every sampling period and
//! folds accepted fixes into a shared [`LocationState`]:
//! - First fix is taken unconditionally
//! - Later fixes add their haversine segment unless it looks like a GPS jump
//! - Failures are retried on the next period

pub mod geo;
pub mod nmea;
pub mod source;
pub mod tracker;

pub use geo::{haversine_km, GeoPoint};
pub use nmea::NmeaSerialSource;
pub use source::{LocationSource, ReplaySource};
pub use tracker::{FixOutcome, LocationState, LocationTracker};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Location error types
#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Location source unavailable: {0}")]
    Unavailable(String),

    #[error("No position fix")]
    NoFix,

    #[error("Malformed position data: {0}")]
    Parse(String),

    #[error("NMEA checksum mismatch (expected {expected:02X}, got {actual:02X})")]
    Checksum { expected: u8, actual: u8 },

    #[error("Recorded track exhausted")]
    Exhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where fixes come from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LocationSourceConfig {
    /// No receiver; location stays at the origin
    #[default]
    None,
    /// NMEA 0183 receiver on a serial port
    Nmea { device: String, baud_rate: u32 },
    /// Text file of `lat,lon` lines, one consumed per sample
    Replay { path: PathBuf },
}

/// Location configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub source: LocationSourceConfig,

    /// Sampling period (ms)
    pub sample_period_ms: u64,

    /// Segments at or above this length are discarded (km)
    pub max_jump_km: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: LocationSourceConfig::None,
            sample_period_ms: 2000,
            max_jump_km: 2.0,
        }
    }
}

/// Build the configured source; `Ok(None)` when none is configured
pub fn open_source(
    config: &LocationSourceConfig,
) -> Result<Option<Box<dyn LocationSource + Send>>, LocationError> {
    Ok(match config {
        LocationSourceConfig::None => None,
        LocationSourceConfig::Nmea { device, baud_rate } => {
            Some(Box::new(NmeaSerialSource::new(device, *baud_rate)))
        }
        LocationSourceConfig::Replay { path } => Some(Box::new(ReplaySource::from_path(path)?)),
    })
}

impl LocationTracker {
    /// Tracker with the source named in `config`
    pub fn from_config(config: &LocationConfig) -> Result<Self, LocationError> {
        let source = open_source(&config.source)?;
        Ok(Self::new(config, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LocationConfig::default();
        assert_eq!(config.source, LocationSourceConfig::None);
        assert_eq!(config.sample_period_ms, 2000);
        assert_eq!(config.max_jump_km, 2.0);
    }

    #[test]
    fn test_open_source() {
        assert!(open_source(&LocationSourceConfig::None).unwrap().is_none());

        let nmea = LocationSourceConfig::Nmea {
            device: "/dev/ttyUSB0".into(),
            baud_rate: 9600,
        };
        // serial port is opened lazily on first read
        let source = open_source(&nmea).unwrap().unwrap();
        assert_eq!(source.describe(), "nmea:/dev/ttyUSB0");

        let missing = LocationSourceConfig::Replay {
            path: "/nonexistent/track.csv".into(),
        };
        assert!(open_source(&missing).is_err());
    }

    #[test]
    fn test_replay_from_file() {
        let path = std::env::temp_dir().join(format!("location-track-{}.csv", std::process::id()));
        std::fs::write(&path, "1.0,2.0\n1.001,2.0\n").unwrap();

        let config = LocationConfig {
            source: LocationSourceConfig::Replay { path: path.clone() },
            ..LocationConfig::default()
        };
        let tracker = LocationTracker::from_config(&config).unwrap();
        assert!(!tracker.is_running());

        std::fs::remove_file(&path).ok();
    }
}
