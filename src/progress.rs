//! Progress and ETA accounting for a single job.
//!
//! Overall progress is an integer percentage in `[0, 100]` that never
//! decreases within a job. Each pipeline stage owns a fixed band of that
//! range; codec-driven stages report their own 0-100 progress which is
//! rescaled into the band with [`band_progress`].

use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Immutable snapshot delivered to a [`ProgressObserver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub stage_label: String,
    pub eta_seconds: Option<u64>,
}

/// Receives progress events for a job, in stage order.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Observer that drops every event.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Observer that writes stage changes to the log, used for unattended runs.
pub struct LoggingObserver {
    name: String,
    last_label: Mutex<Option<String>>,
}

impl LoggingObserver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_label: Mutex::new(None),
        }
    }
}

impl ProgressObserver for LoggingObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        let Ok(mut last) = self.last_label.lock() else {
            return;
        };
        if last.as_deref() != Some(event.stage_label.as_str()) {
            info!("[{}] {} ({}%)", self.name, event.stage_label, event.percent);
            *last = Some(event.stage_label.clone());
        } else {
            debug!("[{}] {}%", self.name, event.percent);
        }
    }
}

/// Map a stage-internal percentage onto the overall scale:
/// `start + inner / 100 * width`, clamped to 100.
pub fn band_progress(start: u8, width: u8, inner: u8) -> u8 {
    let inner = inner.min(100) as u32;
    let value = start as u32 + (inner * width as u32) / 100;
    value.min(100) as u8
}

/// Remaining time given the elapsed time and overall progress.
///
/// Returns `None` before any progress has been made and `Some(0)` once the
/// job is complete.
pub fn estimate_eta(elapsed: Duration, overall: u8) -> Option<u64> {
    match overall {
        0 => None,
        p if p >= 100 => Some(0),
        p => {
            let elapsed = elapsed.as_secs_f64();
            let remaining = elapsed / p as f64 * (100 - p) as f64;
            Some(remaining.max(0.0).round() as u64)
        }
    }
}

/// Filters a raw percentage stream down to strictly increasing values.
#[derive(Debug, Default)]
pub struct PercentGate {
    last: Option<u8>,
}

impl PercentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value to emit, or `None` if it repeats or regresses.
    pub fn admit(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }
}

struct TrackerState {
    percent: u8,
    eta_seconds: Option<u64>,
}

/// Tracks overall progress for one job and forwards events to an observer.
pub struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    started: Instant,
    state: Mutex<TrackerState>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            observer,
            started: Instant::now(),
            state: Mutex::new(TrackerState {
                percent: 0,
                eta_seconds: None,
            }),
        }
    }

    pub fn percent(&self) -> u8 {
        self.state.lock().map(|s| s.percent).unwrap_or(0)
    }

    pub fn eta_seconds(&self) -> Option<u64> {
        self.state.lock().ok().and_then(|s| s.eta_seconds)
    }

    /// Report overall progress. Values below the last reported percentage
    /// are raised to it so the emitted sequence never decreases.
    pub fn report(&self, percent: u8, stage_label: &str) {
        let event = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let percent = percent.min(100).max(state.percent);
            state.percent = percent;
            state.eta_seconds = estimate_eta(self.started.elapsed(), percent);
            ProgressEvent {
                percent,
                stage_label: stage_label.to_string(),
                eta_seconds: state.eta_seconds,
            }
        };
        self.observer.on_progress(&event);
    }
}
