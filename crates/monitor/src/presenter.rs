//! Console presenter for session events

use crate::session::SessionEvent;
use event_fusion::SeverityTier;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Logs status-line changes instead of repainting every tick
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    last_status: Option<String>,
    last_counts: (u32, u32, u32),
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line to print for `event`, if anything changed
    pub fn render(&mut self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::Started { session_id } => {
                self.last_status = None;
                self.last_counts = (0, 0, 0);
                Some(format!("Session {} started", session_id))
            }
            SessionEvent::Tick(report) => {
                let c = &report.counters;
                let counts = (c.drowsy, c.microsleep, c.yawn);
                let status_changed =
                    self.last_status.as_deref() != Some(report.status.text.as_str());
                if !status_changed && counts == self.last_counts {
                    return None;
                }
                self.last_status = Some(report.status.text.clone());
                self.last_counts = counts;
                Some(format!(
                    "Status: {} | Drowsy: {} Microsleep: {} Yawn: {} | {:.2} km",
                    report.status.text, c.drowsy, c.microsleep, c.yawn, report.distance_km
                ))
            }
            SessionEvent::Stopped(report) => Some(format!(
                "Session {} stopped ({:?}): drowsy {}, microsleep {}, yawn {}, {:.2} km",
                report.session_id,
                report.reason,
                report.counters.drowsy,
                report.counters.microsleep,
                report.counters.yawn,
                report.distance_km
            )),
        }
    }

    /// Drain `events` until the session side hangs up
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            let tier = match &event {
                SessionEvent::Tick(report) => report.status.tier(),
                _ => SeverityTier::Normal,
            };
            if let Some(line) = self.render(&event) {
                if tier == SeverityTier::Alarm {
                    warn!("{}", line);
                } else {
                    info!("{}", line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionReport, StopReason, TickReport};
    use camera_capture::VideoFrame;
    use event_fusion::{DisplayStatus, SessionCounters, StatusTone};

    fn tick(text: &str, microsleep: u32) -> SessionEvent {
        SessionEvent::Tick(Box::new(TickReport {
            status: DisplayStatus::new(text, StatusTone::Green),
            frame: VideoFrame::solid(2, 2, [0, 0, 0]),
            counters: SessionCounters {
                microsleep,
                ..SessionCounters::default()
            },
            distance_km: 0.0,
            alarm_on: false,
        }))
    }

    #[test]
    fn test_only_changes_are_rendered() {
        let mut presenter = ConsolePresenter::new();
        assert!(presenter.render(&SessionEvent::Started { session_id: 3 }).is_some());

        assert!(presenter.render(&tick("Awake & Eyes Open", 0)).is_some());
        assert!(presenter.render(&tick("Awake & Eyes Open", 0)).is_none());
        assert!(presenter.render(&tick("Awake & Eyes Open", 1)).is_some());

        let line = presenter.render(&tick("Microsleep! (1s)", 1)).unwrap();
        assert!(line.starts_with("Status: Microsleep! (1s)"));
    }

    #[test]
    fn test_stop_summary() {
        let mut presenter = ConsolePresenter::new();
        let line = presenter
            .render(&SessionEvent::Stopped(SessionReport {
                session_id: 9,
                counters: SessionCounters {
                    yawn: 2,
                    ..SessionCounters::default()
                },
                distance_km: 1.234,
                reason: StopReason::CameraEnded,
            }))
            .unwrap();
        assert!(line.contains("Session 9 stopped"));
        assert!(line.contains("yawn 2"));
        assert!(line.contains("1.23 km"));
    }
}
