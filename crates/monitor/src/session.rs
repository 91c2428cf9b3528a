//! Live monitoring session
//!
//! One sequential tick loop: frame → perception → hazard timers → log gate
//! (with store writes) → status → alarm, plus the background location tracker.

use crate::config::MonitorConfig;
use crate::MonitorError;
use alerting::{open_output, AlarmController};
use camera_capture::{CameraError, FrameSource, VideoFrame};
use dms::DmsModule;
use event_fusion::{DisplayStatus, FusionEngine, HazardEpisode, SessionCounters};
use location::LocationTracker;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{local_now, CountDelta, Database, NewLogEntry, SessionId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Notifications for presenters
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started { session_id: SessionId },
    Tick(Box<TickReport>),
    Stopped(SessionReport),
}

/// What one tick produced
#[derive(Debug, Clone)]
pub struct TickReport {
    pub status: DisplayStatus,
    /// Frame with detections drawn on it
    pub frame: VideoFrame,
    pub counters: SessionCounters,
    pub distance_km: f64,
    pub alarm_on: bool,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Ctrl-C or an explicit stop
    Requested,
    /// The frame source ran out of frames
    CameraEnded,
    /// Reading a frame failed
    CameraFailed(String),
}

/// Summary of a finished session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub counters: SessionCounters,
    pub distance_km: f64,
    pub reason: StopReason,
}

/// Whether the loop should keep ticking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Ended(StopReason),
}

/// Everything a session drives
pub struct SessionComponents {
    pub camera: Box<dyn FrameSource>,
    pub perception: DmsModule,
    pub fusion: FusionEngine,
    /// Shared so the blocking thread join in `finish` can run off the runtime
    pub tracker: Arc<LocationTracker>,
    pub alarm: AlarmController,
    pub database: Database,
}

impl SessionComponents {
    /// Build every component from configuration
    ///
    /// Fails if the perception models cannot be loaded. A location source that
    /// cannot be opened degrades to no location.
    pub fn from_config(config: &MonitorConfig, database: Database) -> Result<Self, MonitorError> {
        let perception = DmsModule::new(config.perception.clone())?;
        let tracker = LocationTracker::from_config(&config.location).unwrap_or_else(|e| {
            warn!("Location source unavailable ({}); distance will not be tracked", e);
            LocationTracker::new(&config.location, None)
        });

        Ok(Self {
            camera: camera_capture::open_source(&config.camera),
            perception,
            fusion: FusionEngine::new(config.fusion.clone()),
            tracker: Arc::new(tracker),
            alarm: AlarmController::new(open_output(&config.alarm)),
            database,
        })
    }
}

/// A live monitoring session
pub struct LiveSession {
    components: SessionComponents,
    mirror: bool,
    tick_period: Duration,
    events: mpsc::Sender<SessionEvent>,
    active: Option<SessionId>,
}

impl LiveSession {
    pub fn new(components: SessionComponents, events: mpsc::Sender<SessionEvent>) -> Self {
        let tick_period = components.fusion.config().tick_period();
        Self {
            components,
            mirror: true,
            tick_period,
            events,
            active: None,
        }
    }

    /// Mirror frames horizontally before analysis
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn components(&self) -> &SessionComponents {
        &self.components
    }

    /// Acquire the camera, create the session row and start location tracking
    pub async fn start(&mut self) -> Result<SessionId, MonitorError> {
        if let Some(id) = self.active {
            return Err(MonitorError::SessionActive(id));
        }

        let c = &mut self.components;
        c.camera.open()?;

        let id = match c.database.create_session().await {
            Ok(id) => id,
            Err(e) => {
                if let Err(release) = c.camera.release() {
                    warn!("Camera release failed: {}", release);
                }
                return Err(e.into());
            }
        };

        c.fusion.reset();
        c.tracker.start();
        self.active = Some(id);

        info!("Monitoring session {} started", id);
        self.emit(SessionEvent::Started { session_id: id });
        Ok(id)
    }

    /// Run one tick now
    pub async fn tick(&mut self) -> Result<TickFlow, MonitorError> {
        self.tick_at(Instant::now()).await
    }

    /// Run one tick observed at `now`
    pub async fn tick_at(&mut self, now: Instant) -> Result<TickFlow, MonitorError> {
        let id = self.active.ok_or(MonitorError::NoSession)?;
        let c = &mut self.components;

        // A clip that ended since the last tick replays if a hazard still holds
        let fusion = &c.fusion;
        c.alarm.handle_finished(true, || fusion.alarm_eligible(now));

        let mut frame = match c.camera.read_frame() {
            Ok(frame) => frame,
            Err(CameraError::EndOfStream) => {
                info!("Frame source ended");
                return Ok(TickFlow::Ended(StopReason::CameraEnded));
            }
            Err(e) => {
                warn!("Failed to read frame: {}", e);
                return Ok(TickFlow::Ended(StopReason::CameraFailed(e.to_string())));
            }
        };
        if self.mirror {
            frame.flip_horizontal();
        }

        let analysis = match c.perception.analyze(&frame) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Perception failed, skipping tick: {}", e);
                return Ok(TickFlow::Continue);
            }
        };

        let outcome = c.fusion.tick(&analysis.frame, now);
        for episode in &outcome.episodes {
            Self::persist(&c.database, &c.tracker, id, episode).await;
        }
        c.alarm.update(outcome.play_alarm);

        let report = TickReport {
            status: outcome.status,
            frame: c.perception.annotate(&analysis, &frame),
            counters: c.fusion.counters(),
            distance_km: c.tracker.get_total_distance_km(),
            alarm_on: c.alarm.is_playing(),
        };
        self.emit(SessionEvent::Tick(Box::new(report)));
        Ok(TickFlow::Continue)
    }

    /// Write one episode to the detection log and bump the session counter
    async fn persist(
        database: &Database,
        tracker: &LocationTracker,
        id: SessionId,
        episode: &HazardEpisode,
    ) {
        let status_type = episode.category.as_str();
        let entry = NewLogEntry {
            session_id: id,
            timestamp: local_now(),
            status_type: status_type.to_string(),
            location: tracker.current_fix().map(|fix| (fix.latitude, fix.longitude)),
            info: Some(episode.info_text()),
        };

        if let Err(e) = database.append_log(&entry).await {
            warn!("Failed to log {} event: {}", status_type, e);
        }
        if let Some(delta) = CountDelta::single(status_type) {
            if let Err(e) = database.increment_counts(id, &delta).await {
                warn!("Failed to update {} count: {}", status_type, e);
            }
        }
    }

    /// Stop tracking, release the camera, silence the alarm and finalize the row
    ///
    /// Returns `None` when no session is active.
    pub async fn finish(&mut self, reason: StopReason) -> Option<SessionReport> {
        let id = self.active.take()?;
        let c = &mut self.components;

        // Joining the sampling thread can wait out a blocked serial read
        let tracker = Arc::clone(&c.tracker);
        if let Err(e) = tokio::task::spawn_blocking(move || tracker.stop()).await {
            warn!("Location tracker did not stop cleanly: {}", e);
        }
        if let Err(e) = c.camera.release() {
            warn!("Camera release failed: {}", e);
        }
        c.alarm.stop();

        let distance_km = c.tracker.get_total_distance_km();
        if let Err(e) = c.database.finalize_session(id, distance_km).await {
            warn!("Failed to finalize session {}: {}", id, e);
        }

        let report = SessionReport {
            session_id: id,
            counters: c.fusion.counters(),
            distance_km,
            reason,
        };
        info!("Monitoring session {} stopped ({:?})", id, report.reason);
        self.emit(SessionEvent::Stopped(report.clone()));
        Some(report)
    }

    /// Start, tick until the source ends or `shutdown` flips to true, then finish
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SessionReport, MonitorError> {
        self.start().await?;

        let reason = loop {
            if *shutdown.borrow() {
                break StopReason::Requested;
            }
            match self.tick().await {
                Ok(TickFlow::Continue) => {}
                Ok(TickFlow::Ended(reason)) => break reason,
                Err(e) => {
                    self.finish(StopReason::Requested).await;
                    return Err(e);
                }
            }

            // Next tick is scheduled after this one completes
            tokio::select! {
                _ = tokio::time::sleep(self.tick_period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break StopReason::Requested;
                    }
                }
            }
        };

        self.finish(reason).await.ok_or(MonitorError::NoSession)
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!("Presenter lagging, event dropped: {}", e);
        }
    }
}
