//! Driver Drowsiness Monitor
//!
//! Wires the camera, perception, hazard fusion, alarm, location tracker and
//! history store into a live monitoring session, and provides the history
//! commands of the `drowsiness-monitor` binary.

pub mod cli;
pub mod config;
pub mod history;
pub mod presenter;
pub mod session;

pub use config::{LoggingConfig, MonitorConfig, StorageConfig};
pub use session::{
    LiveSession, SessionComponents, SessionEvent, SessionReport, StopReason, TickFlow, TickReport,
};

use camera_capture::CameraError;
use dms::DmsError;
use std::str::FromStr;
use storage::{SessionId, StorageError};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Camera unavailable: {0}")]
    Camera(#[from] CameraError),

    #[error("Perception unavailable: {0}")]
    Perception(#[from] DmsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session {0} is already running")]
    SessionActive(SessionId),

    #[error("No active session")]
    NoSession,

    #[error("{0}")]
    Usage(String),
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) {
    let level = Level::from_str(&config.level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
            .expect("Failed to set tracing subscriber");
    } else {
        tracing::subscriber::set_global_default(builder.finish())
            .expect("Failed to set tracing subscriber");
    }
}
