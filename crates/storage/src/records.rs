//! Row types for sessions and detection logs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Primary key of `session_summary`
pub type SessionId = i64;

/// Lifecycle of a stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Active" => Some(Self::Active),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One row of `session_summary`
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub total_distance_km: f64,
    pub drowsy_count: i64,
    pub microsleep_count: i64,
    pub yawn_count: i64,
    pub awake_count: i64,
    pub no_yawn_count: i64,
    pub status: String,
}

impl SessionSummary {
    pub fn session_status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    pub fn is_completed(&self) -> bool {
        self.session_status() == Some(SessionStatus::Completed)
    }
}

/// One row of `detection_log`
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DetectionLogRecord {
    pub log_id: i64,
    pub session_id: SessionId,
    pub timestamp: NaiveDateTime,
    pub status_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub info: Option<String>,
}

/// A detection log entry to append
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub session_id: SessionId,
    pub timestamp: NaiveDateTime,
    pub status_type: String,
    /// `(latitude, longitude)` when a fix was available
    pub location: Option<(f64, f64)>,
    pub info: Option<String>,
}

/// Increments applied to a session's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountDelta {
    pub drowsy: i64,
    pub microsleep: i64,
    pub yawn: i64,
    pub awake: i64,
    pub no_yawn: i64,
}

impl CountDelta {
    /// `+1` on the counter named by a `status_type`; `None` for unknown names
    pub fn single(status_type: &str) -> Option<Self> {
        let mut delta = Self::default();
        match status_type {
            "drowsy" => delta.drowsy = 1,
            "microsleep" => delta.microsleep = 1,
            "yawn" => delta.yawn = 1,
            "awake" => delta.awake = 1,
            "no_yawn" => delta.no_yawn = 1,
            _ => return None,
        }
        Some(delta)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
