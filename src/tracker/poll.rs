//! The poll loop.
//!
//! One tick: acquire snapshot → read phase → extract → dedup gate → history
//! and forecast update. Ticks never overlap and never carry anything to the
//! next tick beyond the shared tracker state. A failed or pending tick does
//! not touch the histories.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::prelude::Result;
use crate::tracker::config::{AppConfig, PollConfig};
use crate::tracker::extractor::{Extraction, Extractor, PendingReason};
use crate::tracker::logging::targets;
use crate::tracker::metrics::TrackerMetrics;
use crate::tracker::phase::{PhaseReading, PhaseTracker};
use crate::tracker::predictor::Forecaster;
use crate::tracker::source::SnapshotSource;
use crate::tracker::state::{RecordResult, SharedTracker};
use crate::{Category, Error, Outcome, SnapshotError};

/// Result of one tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// A new outcome was stored.
    Accepted {
        outcome: Outcome,
        resolved: Option<bool>,
        issued: Vec<Category>,
    },
    /// The settled outcome was already stored.
    Duplicate,
    /// Nothing settled and readable in this snapshot.
    Pending(PendingReason),
    /// Acquisition failed; retried on the next tick.
    Failed(Error),
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Delay before the next tick.
    pub next_delay: Duration,
}

/// Sequential poller feeding the shared tracker.
///
/// Generic over the generator so tests can script every draw.
pub struct PollLoop<S: SnapshotSource, R: Rng + Send = SmallRng> {
    source: S,
    phase: PhaseTracker,
    extractor: Extractor,
    forecaster: Forecaster,
    /// Only writer of the shared state.
    tracker: SharedTracker,
    metrics: Arc<TrackerMetrics>,
    /// Delays and countdown handling.
    poll: PollConfig,
    /// Hard cap on one acquisition, on top of the client timeout.
    timeout: Duration,
    /// Drives forecast tie-breaks and batch sampling.
    rng: R,
}

impl<S: SnapshotSource> PollLoop<S, SmallRng> {
    /// Production wiring with an entropy-seeded generator.
    pub fn from_config(
        config: &AppConfig,
        source: S,
        tracker: SharedTracker,
        metrics: Arc<TrackerMetrics>,
    ) -> Result<Self> {
        Self::new(config, source, tracker, metrics, SmallRng::from_entropy())
    }
}

impl<S: SnapshotSource, R: Rng + Send> PollLoop<S, R> {
    pub fn new(
        config: &AppConfig,
        source: S,
        tracker: SharedTracker,
        metrics: Arc<TrackerMetrics>,
        rng: R,
    ) -> Result<Self> {
        let selectors = config.source.selectors.compile()?;
        let phase = PhaseTracker::new(selectors.status.clone(), config.source.countdown_format);
        let extractor = Extractor::new(selectors, config.source.white_label.clone());
        Ok(Self {
            source,
            phase,
            extractor,
            forecaster: Forecaster::from_config(&config.prediction),
            tracker,
            metrics,
            poll: config.poll.clone(),
            timeout: config.source.snapshot_timeout(),
            rng,
        })
    }

    pub fn forecaster(&self) -> &Forecaster {
        &self.forecaster
    }

    /// Run one tick.
    pub async fn tick(&mut self) -> TickReport {
        self.metrics.record_tick();

        let acquired = match tokio::time::timeout(self.timeout, self.source.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(Error::from(SnapshotError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })),
        };

        let snapshot = match acquired {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(target: targets::POLL, error = %e, "Snapshot acquisition failed, skipping tick");
                self.metrics.record_failure(e.is_timeout());
                return TickReport {
                    outcome: TickOutcome::Failed(e),
                    next_delay: self.base_delay(),
                };
            }
        };

        let reading = self.phase.read(&snapshot);
        self.tracker.set_status(&reading);

        let outcome = match self.extractor.extract(&snapshot, &reading) {
            Extraction::Pending(reason) => {
                debug!(
                    target: targets::POLL,
                    phase = ?reading.state,
                    %reason,
                    captured_at = %snapshot.captured_at(),
                    "No new outcome"
                );
                self.metrics.record_pending();
                TickOutcome::Pending(reason)
            }
            Extraction::Outcome(outcome) => {
                match self
                    .tracker
                    .record(outcome.clone(), &self.forecaster, &mut self.rng)
                {
                    RecordResult::Duplicate => {
                        self.metrics.record_duplicate();
                        TickOutcome::Duplicate
                    }
                    RecordResult::Accepted { resolved, issued } => {
                        info!(
                            target: targets::POLL,
                            outcome = %outcome,
                            resolved = ?resolved,
                            issued = issued.len(),
                            "Outcome recorded"
                        );
                        self.metrics.record_accepted();
                        TickOutcome::Accepted {
                            outcome,
                            resolved,
                            issued,
                        }
                    }
                }
            }
        };
        drop(snapshot);

        TickReport {
            outcome,
            next_delay: self.next_delay(&reading),
        }
    }

    fn base_delay(&self) -> Duration {
        self.poll.base_delay(self.forecaster.mode())
    }

    /// Wait at least the base delay, or the remaining countdown while spinning.
    pub fn next_delay(&self, reading: &PhaseReading) -> Duration {
        let base = self.base_delay();
        match reading.remaining {
            Some(remaining) if self.poll.extend_for_countdown && reading.is_spinning() => {
                base.max(remaining)
            }
            _ => base,
        }
    }

    /// Tick until `shutdown` flips to true (or its sender is dropped), then
    /// release the source.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target: targets::POLL,
            mode = self.forecaster.mode().as_str(),
            base_delay_ms = self.base_delay().as_millis() as u64,
            "Poll loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let report = self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(report.next_delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.source.shutdown().await;
        info!(target: targets::POLL, ticks = self.metrics.ticks(), "Poll loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::config::PredictionMode;
    use crate::tracker::state::TrackerState;
    use crate::PageSnapshot;
    use async_trait::async_trait;
    use rand::rngs::mock::StepRng;

    struct NeverSource;

    #[async_trait]
    impl SnapshotSource for NeverSource {
        async fn acquire(&self) -> Result<PageSnapshot> {
            std::future::pending().await
        }
    }

    fn poll_loop(config: &AppConfig) -> PollLoop<NeverSource, StepRng> {
        let tracker = SharedTracker::new(TrackerState::new(40, 10));
        PollLoop::new(
            config,
            NeverSource,
            tracker,
            Arc::new(TrackerMetrics::new()),
            StepRng::new(0, 0),
        )
        .unwrap()
    }

    #[test]
    fn test_next_delay_extends_for_countdown() {
        let config = AppConfig::default();
        let looper = poll_loop(&config);

        let spinning = PhaseReading::spinning(Duration::from_secs(12));
        assert_eq!(looper.next_delay(&spinning), Duration::from_secs(12));

        let short = PhaseReading::spinning(Duration::from_secs(2));
        assert_eq!(looper.next_delay(&short), Duration::from_secs(5));

        assert_eq!(
            looper.next_delay(&PhaseReading::settled("3")),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_next_delay_fixed_when_extension_disabled() {
        let mut config = AppConfig::default();
        config.poll.extend_for_countdown = false;
        config.prediction.mode = PredictionMode::Batch;
        let looper = poll_loop(&config);

        let spinning = PhaseReading::spinning(Duration::from_secs(12));
        assert_eq!(looper.next_delay(&spinning), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_timeout_is_failed_tick() {
        let mut config = AppConfig::default();
        config.source.snapshot_timeout_ms = 50;
        let mut looper = poll_loop(&config);

        let report = looper.tick().await;
        match report.outcome {
            TickOutcome::Failed(e) => assert!(e.is_timeout()),
            other => panic!("expected failed tick, got {other:?}"),
        }
        assert_eq!(report.next_delay, Duration::from_secs(5));
        assert!(looper.tracker.recent_outcomes().is_empty());
        assert_eq!(looper.metrics.failures(), 1);
    }
}
