//! Background location sampling with trip distance accumulation

use crate::geo::GeoPoint;
use crate::source::LocationSource;
use crate::LocationConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sleep granularity of the sampling thread
const SLEEP_SLICE: Duration = Duration::from_millis(50);

type BoxedSource = Box<dyn LocationSource + Send>;

/// Snapshot shared between the sampling thread and readers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationState {
    /// Latest accepted latitude (0.0 before any fix)
    pub latitude: f64,
    /// Latest accepted longitude (0.0 before any fix)
    pub longitude: f64,
    /// Last accepted fix since the tracker was started
    pub last_fix: Option<GeoPoint>,
    /// Accumulated distance since start (km)
    pub total_distance_km: f64,
}

/// What happened to a sampled fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// First fix after start, taken as-is
    First,
    /// Segment added to the total
    Accepted { segment_km: f64 },
    /// Segment too long to be real movement; sample dropped
    Rejected { segment_km: f64 },
    /// Not a usable coordinate (non-finite or out of range); sample dropped
    Invalid,
}

impl LocationState {
    /// Fold one fix into the state
    pub fn apply(&mut self, fix: GeoPoint, max_jump_km: f64) -> FixOutcome {
        if !fix.is_valid() {
            return FixOutcome::Invalid;
        }
        let outcome = match self.last_fix {
            None => FixOutcome::First,
            Some(previous) => {
                let segment_km = previous.distance_km(&fix);
                if segment_km < max_jump_km {
                    FixOutcome::Accepted { segment_km }
                } else {
                    return FixOutcome::Rejected { segment_km };
                }
            }
        };

        if let FixOutcome::Accepted { segment_km } = outcome {
            self.total_distance_km += segment_km;
        }
        self.latitude = fix.latitude;
        self.longitude = fix.longitude;
        self.last_fix = Some(fix);
        outcome
    }

    fn restart(&mut self) {
        self.last_fix = None;
        self.total_distance_km = 0.0;
    }
}

/// Samples a [`LocationSource`] on a background thread
pub struct LocationTracker {
    period: Duration,
    max_jump_km: f64,
    state: Arc<Mutex<LocationState>>,
    running: Arc<AtomicBool>,
    source: Mutex<Option<BoxedSource>>,
    worker: Mutex<Option<JoinHandle<BoxedSource>>>,
}

impl LocationTracker {
    /// Tracker over `source`; `None` means no position is ever reported
    pub fn new(config: &LocationConfig, source: Option<BoxedSource>) -> Self {
        Self {
            period: Duration::from_millis(config.sample_period_ms.max(1)),
            max_jump_km: config.max_jump_km,
            state: Arc::new(Mutex::new(LocationState::default())),
            running: Arc::new(AtomicBool::new(false)),
            source: Mutex::new(source),
            worker: Mutex::new(None),
        }
    }

    /// Begin sampling; resets the trip distance. No-op while running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.state).restart();

        let Some(mut source) = lock(&self.source).take() else {
            info!("No location source configured; distance stays at 0");
            return;
        };

        let running = self.running.clone();
        let state = self.state.clone();
        let period = self.period;
        let max_jump_km = self.max_jump_km;
        info!("Location tracking started ({})", source.describe());

        let handle = std::thread::spawn(move || {
            let mut failing = false;
            while running.load(Ordering::SeqCst) {
                // The source may block; never hold the state lock across it
                match source.read_fix() {
                    Ok(fix) => {
                        failing = false;
                        let outcome = lock(&state).apply(fix, max_jump_km);
                        match outcome {
                            FixOutcome::Rejected { segment_km } => {
                                debug!("Discarding location jump of {:.2} km", segment_km)
                            }
                            FixOutcome::Invalid => debug!("Discarding invalid fix {:?}", fix),
                            _ => {}
                        }
                    }
                    Err(e) if !failing => {
                        warn!("Location unavailable: {}", e);
                        failing = true;
                    }
                    Err(e) => debug!("Location still unavailable: {}", e),
                }
                sleep_while(&running, period);
            }
            source
        });

        *lock(&self.worker) = Some(handle);
    }

    /// Halt sampling and wait for the thread. No-op when stopped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(handle) = lock(&self.worker).take() else {
            return;
        };
        match handle.join() {
            Ok(source) => {
                *lock(&self.source) = Some(source);
                info!("Location tracking stopped");
            }
            Err(_) => warn!("Location thread panicked; source dropped"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest `(latitude, longitude)`, `(0.0, 0.0)` before any fix
    pub fn get_location(&self) -> (f64, f64) {
        let state = lock(&self.state);
        (state.latitude, state.longitude)
    }

    pub fn get_total_distance_km(&self) -> f64 {
        lock(&self.state).total_distance_km
    }

    /// Last accepted fix since [`start`](Self::start), if any
    pub fn current_fix(&self) -> Option<GeoPoint> {
        lock(&self.state).last_fix
    }

    pub fn snapshot(&self) -> LocationState {
        *lock(&self.state)
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sleep_while(running: &AtomicBool, period: Duration) {
    let deadline = Instant::now() + period;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
