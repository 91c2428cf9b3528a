//! Alarm start/stop and replay decisions

use crate::output::AlarmOutput;
use tracing::{info, warn};

/// Drives one [`AlarmOutput`] from per-tick alarm decisions
pub struct AlarmController {
    output: Box<dyn AlarmOutput>,
}

impl AlarmController {
    pub fn new(output: Box<dyn AlarmOutput>) -> Self {
        Self { output }
    }

    /// Apply this tick's decision; start and stop are idempotent
    pub fn update(&mut self, play_alarm: bool) {
        let playing = self.output.is_playing();
        if play_alarm && !playing {
            self.start();
        } else if !play_alarm && playing {
            self.output.stop();
            info!("Alarm stopped");
        }
    }

    /// React to a clip that played to its end
    ///
    /// `eligible` is evaluated only when playback actually finished, so the
    /// caller can recompute it at that instant. Returns true if playback was
    /// restarted.
    pub fn handle_finished(
        &mut self,
        session_active: bool,
        eligible: impl FnOnce() -> bool,
    ) -> bool {
        if !self.output.poll_finished() {
            return false;
        }
        if session_active && eligible() {
            self.start();
            return self.output.is_playing();
        }
        false
    }

    pub fn stop(&mut self) {
        if self.output.is_playing() {
            self.output.stop();
            info!("Alarm stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.output.is_playing()
    }

    fn start(&mut self) {
        match self.output.play() {
            Ok(()) => info!("Alarm triggered"),
            Err(e) => warn!("Failed to start alarm: {}", e),
        }
    }
}
