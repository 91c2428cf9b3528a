//! SQLite-backed session history

use crate::records::{
    CountDelta, DetectionLogRecord, NewLogEntry, SessionId, SessionStatus, SessionSummary,
};
use crate::StorageError;
use chrono::{Local, NaiveDateTime, SubsecRound};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const CREATE_SESSION_SUMMARY: &str = "
    CREATE TABLE IF NOT EXISTS session_summary (
        session_id INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time TEXT NOT NULL,
        end_time TEXT,
        total_distance_km REAL NOT NULL DEFAULT 0.0,
        drowsy_count INTEGER NOT NULL DEFAULT 0,
        microsleep_count INTEGER NOT NULL DEFAULT 0,
        yawn_count INTEGER NOT NULL DEFAULT 0,
        awake_count INTEGER NOT NULL DEFAULT 0,
        no_yawn_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'Active'
    )";

const CREATE_DETECTION_LOG: &str = "
    CREATE TABLE IF NOT EXISTS detection_log (
        log_id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        status_type TEXT NOT NULL,
        latitude REAL,
        longitude REAL,
        info TEXT,
        FOREIGN KEY (session_id) REFERENCES session_summary (session_id)
    )";

/// Local wall-clock time at second resolution, as stored in rows
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Handle to the history database
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Opened history database at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database (single connection so it is never dropped)
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_SESSION_SUMMARY).execute(&self.pool).await?;
        sqlx::query(CREATE_DETECTION_LOG).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert an `Active` session starting now
    pub async fn create_session(&self) -> Result<SessionId, StorageError> {
        let id = sqlx::query("INSERT INTO session_summary (start_time, status) VALUES (?, ?)")
            .bind(local_now())
            .bind(SessionStatus::Active.as_str())
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        info!("Started session {}", id);
        Ok(id)
    }

    /// Mark a session `Completed` with its end time and distance
    pub async fn finalize_session(
        &self,
        id: SessionId,
        total_distance_km: f64,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE session_summary SET end_time = ?, total_distance_km = ?, status = ?
             WHERE session_id = ?",
        )
        .bind(local_now())
        .bind(total_distance_km)
        .bind(SessionStatus::Completed.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        info!("Session {} completed ({:.2} km)", id, total_distance_km);
        Ok(())
    }

    pub async fn increment_counts(
        &self,
        id: SessionId,
        delta: &CountDelta,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE session_summary SET
                drowsy_count = drowsy_count + ?,
                microsleep_count = microsleep_count + ?,
                yawn_count = yawn_count + ?,
                awake_count = awake_count + ?,
                no_yawn_count = no_yawn_count + ?
             WHERE session_id = ?",
        )
        .bind(delta.drowsy)
        .bind(delta.microsleep)
        .bind(delta.yawn)
        .bind(delta.awake)
        .bind(delta.no_yawn)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    /// Append to `detection_log`, returning the new `log_id`
    pub async fn append_log(&self, entry: &NewLogEntry) -> Result<i64, StorageError> {
        let (latitude, longitude) = entry.location.unzip();
        let id = sqlx::query(
            "INSERT INTO detection_log
                (session_id, timestamp, status_type, latitude, longitude, info)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.session_id)
        .bind(entry.timestamp)
        .bind(&entry.status_type)
        .bind(latitude)
        .bind(longitude)
        .bind(&entry.info)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!("Logged {} for session {} as #{}", entry.status_type, entry.session_id, id);
        Ok(id)
    }

    /// All sessions, newest first
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StorageError> {
        let rows = sqlx::query_as::<_, SessionSummary>(
            "SELECT * FROM session_summary ORDER BY start_time DESC, session_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn session(&self, id: SessionId) -> Result<Option<SessionSummary>, StorageError> {
        let row = sqlx::query_as::<_, SessionSummary>(
            "SELECT * FROM session_summary WHERE session_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Detection log of one session, oldest first
    pub async fn list_logs(&self, id: SessionId) -> Result<Vec<DetectionLogRecord>, StorageError> {
        let rows = sqlx::query_as::<_, DetectionLogRecord>(
            "SELECT * FROM detection_log WHERE session_id = ? ORDER BY timestamp ASC, log_id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete every log entry and session
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        let logs = sqlx::query("DELETE FROM detection_log").execute(&mut *tx).await?;
        let sessions = sqlx::query("DELETE FROM session_summary").execute(&mut *tx).await?;
        tx.commit().await?;

        info!(
            "Cleared history ({} sessions, {} log entries)",
            sessions.rows_affected(),
            logs.rows_affected()
        );
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        session_id: SessionId,
        status_type: &str,
        location: Option<(f64, f64)>,
    ) -> NewLogEntry {
        NewLogEntry {
            session_id,
            timestamp: local_now(),
            status_type: status_type.into(),
            location,
            info: Some(format!("{} detail", status_type)),
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_session().await.unwrap();

        let session = db.session(id).await.unwrap().unwrap();
        assert_eq!(session.session_status(), Some(SessionStatus::Active));
        assert_eq!(session.end_time, None);
        assert_eq!(session.total_distance_km, 0.0);

        db.finalize_session(id, 12.5).await.unwrap();
        let session = db.session(id).await.unwrap().unwrap();
        assert!(session.is_completed());
        assert!(session.end_time.is_some());
        assert_eq!(session.total_distance_km, 12.5);
    }

    #[tokio::test]
    async fn test_counts_accumulate() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_session().await.unwrap();

        for status in ["microsleep", "microsleep", "yawn"] {
            let delta = CountDelta::single(status).unwrap();
            db.increment_counts(id, &delta).await.unwrap();
        }

        let session = db.session(id).await.unwrap().unwrap();
        assert_eq!(session.microsleep_count, 2);
        assert_eq!(session.yawn_count, 1);
        assert_eq!(session.drowsy_count, 0);
    }

    #[tokio::test]
    async fn test_logs_in_insertion_order() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_session().await.unwrap();

        let first = db.append_log(&entry(id, "drowsy", Some((-6.2, 106.8)))).await.unwrap();
        let second = db.append_log(&entry(id, "yawn", None)).await.unwrap();
        assert!(second > first);

        let logs = db.list_logs(id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status_type, "drowsy");
        assert_eq!(logs[0].latitude, Some(-6.2));
        assert_eq!(logs[0].longitude, Some(106.8));
        assert_eq!(logs[1].status_type, "yawn");
        assert_eq!(logs[1].latitude, None);
        assert_eq!(logs[1].info.as_deref(), Some("yawn detail"));
    }

    #[tokio::test]
    async fn test_sessions_newest_first() {
        let db = Database::in_memory().await.unwrap();
        let older = db.create_session().await.unwrap();
        let newer = db.create_session().await.unwrap();

        let ids: Vec<_> = db.list_sessions().await.unwrap().iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_session().await.unwrap();
        db.append_log(&entry(id, "microsleep", None)).await.unwrap();

        db.clear_all().await.unwrap();
        assert!(db.list_sessions().await.unwrap().is_empty());
        assert!(db.list_logs(id).await.unwrap().is_empty());
        assert!(db.session(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let db = Database::in_memory().await.unwrap();
        assert!(matches!(db.finalize_session(42, 1.0).await, Err(StorageError::NotFound(42))));
        assert!(matches!(
            db.increment_counts(42, &CountDelta::default()).await,
            Err(StorageError::NotFound(42))
        ));
        // log rows must reference an existing session
        assert!(db.append_log(&entry(42, "yawn", None)).await.is_err());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = std::env::temp_dir().join(format!("storage-test-{}", std::process::id()));
        let path = dir.join("history.db");

        let db = Database::open(&path).await.unwrap();
        let id = db.create_session().await.unwrap();
        db.finalize_session(id, 3.25).await.unwrap();
        db.close().await;

        let db = Database::open(&path).await.unwrap();
        let sessions = db.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].total_distance_km, 3.25);
        db.close().await;

        std::fs::remove_dir_all(&dir).ok();
    }
}
