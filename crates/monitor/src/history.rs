//! Session history listing

use crate::MonitorError;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{BufRead, Write};
use storage::{Database, DetectionLogRecord, SessionId, SessionSummary};

fn format_time(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Table of sessions, one per line
pub fn format_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No sessions recorded.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<19}  {:<19}  {:>9}  {:>6}  {:>10}  {:>4}  {:<9}",
        "ID", "Start", "End", "Distance", "Drowsy", "Microsleep", "Yawn", "Status"
    );
    for s in sessions {
        let end = s.end_time.as_ref().map(format_time).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>4}  {:<19}  {:<19}  {:>6.2} km  {:>6}  {:>10}  {:>4}  {:<9}",
            s.session_id,
            format_time(&s.start_time),
            end,
            s.total_distance_km,
            s.drowsy_count,
            s.microsleep_count,
            s.yawn_count,
            s.status
        );
    }
    out
}

/// Session header followed by its detection log
pub fn format_logs(session: &SessionSummary, logs: &[DetectionLogRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Session {} ({}) started {}, {:.2} km",
        session.session_id,
        session.status,
        format_time(&session.start_time),
        session.total_distance_km
    );

    if logs.is_empty() {
        out.push_str("No detection events.\n");
        return out;
    }

    for log in logs {
        let location = match (log.latitude, log.longitude) {
            (Some(lat), Some(lon)) => format!("{:.5}, {:.5}", lat, lon),
            _ => "no fix".to_string(),
        };
        let _ = writeln!(
            out,
            "{}  {:<10}  [{}]  {}",
            format_time(&log.timestamp),
            log.status_type,
            location,
            log.info.as_deref().unwrap_or("")
        );
    }
    out
}

#[derive(Serialize)]
struct SessionDetail<'a> {
    session: &'a SessionSummary,
    logs: &'a [DetectionLogRecord],
}

/// Render the session list, or one session's log when `session_id` is given
pub async fn show(
    db: &Database,
    session_id: Option<SessionId>,
    json: bool,
) -> Result<String, MonitorError> {
    match session_id {
        None => {
            let sessions = db.list_sessions().await?;
            if json {
                Ok(serde_json::to_string_pretty(&sessions)?)
            } else {
                Ok(format_sessions(&sessions))
            }
        }
        Some(id) => {
            let session = db
                .session(id)
                .await?
                .ok_or_else(|| MonitorError::Usage(format!("No session with id {}", id)))?;
            let logs = db.list_logs(id).await?;
            if json {
                Ok(serde_json::to_string_pretty(&SessionDetail {
                    session: &session,
                    logs: &logs,
                })?)
            } else {
                Ok(format_logs(&session, &logs))
            }
        }
    }
}

/// Ask before wiping history; anything but `y`/`yes` (including EOF) declines
pub fn confirm_clear<R: BufRead, W: Write>(mut input: R, mut output: W) -> std::io::Result<bool> {
    write!(
        output,
        "Delete all sessions and detection logs? This action cannot be undone. [y/N] "
    )?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Delete all history when `confirmed`; returns whether anything was cleared
pub async fn clear(db: &Database, confirmed: bool) -> Result<bool, MonitorError> {
    if !confirmed {
        return Ok(false);
    }
    db.clear_all().await?;
    Ok(true)
}
