//! Storage Layer
//!
//! SQLite persistence for session summaries and the detection log.

mod records;
mod repository;

pub use records::{
    CountDelta, DetectionLogRecord, NewLogEntry, SessionId, SessionStatus, SessionSummary,
};
pub use repository::{local_now, Database};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Session {0} not found")]
    NotFound(SessionId),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
