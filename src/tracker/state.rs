//! Owned tracker state and its shared handle.
//!
//! The poll loop is the only writer. Every accepted outcome is applied under
//! a single write lock (history push, resolution, new forecast), so readers
//! never observe a half-applied update. Readers always get owned copies.

use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::tracker::accuracy::{AccuracySummary, AccuracyTracker};
use crate::tracker::dedup::{DedupDecision, OutcomeDeduplicator};
use crate::tracker::history::BoundedHistory;
use crate::tracker::logging::targets;
use crate::tracker::phase::{PhaseReading, PhaseState};
use crate::tracker::predictor::{Forecast, Forecaster};
use crate::{Category, Outcome, Prediction};

/// What happened to a candidate outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordResult {
    Duplicate,
    Accepted {
        /// Result of resolving the oldest open forecast, if one was open.
        resolved: Option<bool>,
        /// Forecasts issued after this outcome (one in reactive mode, a full
        /// batch or none in batch mode).
        issued: Vec<Category>,
    },
}

/// Last observed phase, for `/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseStatus {
    pub phase: PhaseState,
    pub is_spinning: bool,
    /// Whole seconds left on the countdown, if one was shown.
    pub remaining_secs: Option<u64>,
}

impl From<&PhaseReading> for PhaseStatus {
    fn from(reading: &PhaseReading) -> Self {
        Self {
            phase: reading.state,
            is_spinning: reading.is_spinning(),
            remaining_secs: reading.remaining.map(|d: Duration| d.as_secs()),
        }
    }
}

/// Everything the poll loop mutates, kept behind one lock.
#[derive(Debug)]
pub struct TrackerState {
    /// Accepted outcomes, newest first.
    outcomes: BoundedHistory<Outcome>,
    accuracy: AccuracyTracker,
    /// Fresh outcomes collected toward the next batch (batch mode only).
    batch: Vec<Outcome>,
    dedup: OutcomeDeduplicator,
    /// Phase from the last successful tick.
    status: PhaseStatus,
}

impl TrackerState {
    pub fn new(outcome_capacity: usize, prediction_capacity: usize) -> Self {
        Self {
            outcomes: BoundedHistory::with_capacity(outcome_capacity),
            accuracy: AccuracyTracker::new(prediction_capacity),
            batch: Vec::new(),
            dedup: OutcomeDeduplicator::new(),
            status: PhaseStatus::default(),
        }
    }

    /// Apply a settled candidate outcome.
    ///
    /// Duplicates leave everything untouched. Otherwise the outcome is stored,
    /// the oldest open forecast is resolved against it, and new forecasts are
    /// issued according to the forecaster's mode.
    pub fn record<R: Rng + ?Sized>(
        &mut self,
        candidate: Outcome,
        forecaster: &Forecaster,
        rng: &mut R,
    ) -> RecordResult {
        if self.dedup.check(&candidate, self.outcomes.latest()) == DedupDecision::Duplicate {
            debug!(
                target: targets::POLL,
                outcome = %candidate,
                total = self.dedup.duplicates(),
                "Duplicate outcome dropped"
            );
            return RecordResult::Duplicate;
        }

        let category = candidate.category();
        self.outcomes.push(candidate.clone());
        let resolved = self.accuracy.resolve_next(category);

        let issued = match forecaster {
            Forecaster::Reactive(predictor) => {
                let history = self.outcomes.snapshot();
                let forecast = predictor.predict(&history, rng);
                self.accuracy.issue(forecast.category);
                vec![forecast.category]
            }
            Forecaster::Batch(predictor) => {
                self.batch.push(candidate);
                if self.batch.len() >= predictor.batch_size() {
                    let forecasts = predictor.predict_batch(&self.batch, rng);
                    self.accuracy.issue_batch(&forecasts);
                    self.batch.clear();
                    info!(
                        target: targets::PREDICT,
                        count = forecasts.len(),
                        "Batch forecasts issued"
                    );
                    forecasts
                } else {
                    Vec::new()
                }
            }
        };

        RecordResult::Accepted { resolved, issued }
    }

    pub fn set_status(&mut self, reading: &PhaseReading) {
        self.status = PhaseStatus::from(reading);
    }

    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.snapshot()
    }

    pub fn predictions(&self) -> Vec<Prediction> {
        self.accuracy.predictions()
    }

    /// The forecast awaiting the next outcome, or the newest one once
    /// everything is resolved.
    pub fn current_prediction(&self) -> Option<Prediction> {
        self.accuracy
            .next_open()
            .or_else(|| self.accuracy.latest())
            .cloned()
    }

    pub fn accuracy(&self) -> AccuracySummary {
        self.accuracy.summary()
    }

    /// Outcomes collected toward the next batch.
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }
}

/// Cloneable handle shared by the poll loop and the query API.
#[derive(Debug, Clone)]
pub struct SharedTracker {
    inner: Arc<RwLock<TrackerState>>,
}

impl SharedTracker {
    pub fn new(state: TrackerState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn record<R: Rng + ?Sized>(
        &self,
        candidate: Outcome,
        forecaster: &Forecaster,
        rng: &mut R,
    ) -> RecordResult {
        self.inner.write().record(candidate, forecaster, rng)
    }

    pub fn set_status(&self, reading: &PhaseReading) {
        self.inner.write().set_status(reading);
    }

    pub fn status(&self) -> PhaseStatus {
        self.inner.read().status()
    }

    pub fn recent_outcomes(&self) -> Vec<Outcome> {
        self.inner.read().outcomes()
    }

    pub fn predictions(&self) -> Vec<Prediction> {
        self.inner.read().predictions()
    }

    pub fn current_prediction(&self) -> Option<Prediction> {
        self.inner.read().current_prediction()
    }

    pub fn accuracy(&self) -> AccuracySummary {
        self.inner.read().accuracy()
    }

    pub fn batch_len(&self) -> usize {
        self.inner.read().batch_len()
    }

    /// Forecast from a copy of the current history without touching state.
    pub fn preview<R: Rng + ?Sized>(&self, forecaster: &Forecaster, rng: &mut R) -> Forecast {
        let history = self.recent_outcomes();
        forecaster.forecast(&history, rng)
    }
}
