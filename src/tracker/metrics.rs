//! Poll loop counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::tracker::logging::targets;

#[derive(Debug)]
pub struct TrackerMetrics {
    ticks: AtomicU64,
    pending: AtomicU64,
    duplicates: AtomicU64,
    accepted: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    started: Instant,
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            pending: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pending(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Failed tick; timeouts are also counted as failures.
    pub fn record_failure(&self, timed_out: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn log_summary(&self) {
        info!(
            target: targets::POLL,
            ticks = self.ticks.load(Ordering::Relaxed),
            accepted = self.accepted.load(Ordering::Relaxed),
            duplicates = self.duplicates.load(Ordering::Relaxed),
            pending = self.pending.load(Ordering::Relaxed),
            failures = self.failures.load(Ordering::Relaxed),
            timeouts = self.timeouts.load(Ordering::Relaxed),
            uptime_secs = self.uptime_secs(),
            "Tracker metrics"
        );
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ticks": self.ticks.load(Ordering::Relaxed),
            "accepted": self.accepted.load(Ordering::Relaxed),
            "duplicates": self.duplicates.load(Ordering::Relaxed),
            "pending": self.pending.load(Ordering::Relaxed),
            "failures": self.failures.load(Ordering::Relaxed),
            "timeouts": self.timeouts.load(Ordering::Relaxed),
            "uptime_seconds": self.uptime_secs(),
        })
    }
}
