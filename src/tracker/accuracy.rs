//! Prediction bookkeeping.
//!
//! Holds the bounded prediction history and resolves open forecasts as
//! outcomes arrive. Forecasts are resolved oldest-issued first, so a batch
//! of forecasts is matched one-to-one against the next outcomes in order.

use serde::Serialize;

use crate::tracker::history::BoundedHistory;
use crate::{Category, Prediction};

/// Running accuracy since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccuracySummary {
    /// Forecasts issued since start, evicted ones included.
    pub issued: u64,
    pub resolved: u64,
    pub correct: u64,
    /// `correct / resolved`, 0 when nothing is resolved yet.
    pub hit_rate: f64,
    /// Forecasts still waiting for an outcome.
    pub open: usize,
}

/// Bounded prediction history plus running totals that survive eviction.
#[derive(Debug, Clone)]
pub struct AccuracyTracker {
    predictions: BoundedHistory<Prediction>,
    issued: u64,
    resolved: u64,
    correct: u64,
}

impl AccuracyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            predictions: BoundedHistory::with_capacity(capacity),
            issued: 0,
            resolved: 0,
            correct: 0,
        }
    }

    /// Resolve the oldest open forecast against `actual`.
    ///
    /// Returns whether it was correct, or `None` if nothing was open.
    pub fn resolve_next(&mut self, actual: Category) -> Option<bool> {
        let open = self
            .predictions
            .iter_mut()
            .rev()
            .find(|p| !p.is_resolved())?;
        let correct = open.resolve(actual)?;
        self.resolved += 1;
        if correct {
            self.correct += 1;
        }
        Some(correct)
    }

    /// Open a single forecast.
    pub fn issue(&mut self, predicted: Category) {
        self.predictions.push(Prediction::open(predicted));
        self.issued += 1;
    }

    /// Open a batch of forecasts; `forecasts[0]` is for the next outcome.
    pub fn issue_batch(&mut self, forecasts: &[Category]) {
        for &category in forecasts {
            self.issue(category);
        }
    }

    pub fn open_count(&self) -> usize {
        self.predictions.iter().filter(|p| !p.is_resolved()).count()
    }

    /// Newest prediction.
    pub fn latest(&self) -> Option<&Prediction> {
        self.predictions.latest()
    }

    /// Oldest open prediction, the one the next outcome resolves.
    pub fn next_open(&self) -> Option<&Prediction> {
        self.predictions.iter().rev().find(|p| !p.is_resolved())
    }

    /// Copy of the prediction history, newest first.
    pub fn predictions(&self) -> Vec<Prediction> {
        self.predictions.snapshot()
    }

    pub fn summary(&self) -> AccuracySummary {
        let hit_rate = if self.resolved > 0 {
            self.correct as f64 / self.resolved as f64
        } else {
            0.0
        };
        AccuracySummary {
            issued: self.issued,
            resolved: self.resolved,
            correct: self.correct,
            hit_rate,
            open: self.open_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_open_prediction() {
        let mut tracker = AccuracyTracker::new(10);
        assert_eq!(tracker.resolve_next(Category::Red), None);
        assert_eq!(tracker.summary(), AccuracySummary::default());
    }

    #[test]
    fn test_reactive_cycle() {
        let mut tracker = AccuracyTracker::new(10);
        tracker.issue(Category::Black);
        assert_eq!(tracker.open_count(), 1);

        assert_eq!(tracker.resolve_next(Category::Black), Some(true));
        tracker.issue(Category::Red);
        assert_eq!(tracker.resolve_next(Category::Black), Some(false));
        tracker.issue(Category::Red);

        assert_eq!(tracker.open_count(), 1);
        let predictions = tracker.predictions();
        assert_eq!(predictions.len(), 3);
        assert!(!predictions[0].is_resolved());
        assert_eq!(predictions[1].correct(), Some(false));
        assert_eq!(predictions[1].actual(), Some(Category::Black));
        assert_eq!(predictions[2].correct(), Some(true));

        let summary = tracker.summary();
        assert_eq!(summary.issued, 3);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.correct, 1);
        assert!((summary.hit_rate - 0.5).abs() < 1e-12);
        assert_eq!(summary.open, 1);
    }

    #[test]
    fn test_batch_resolves_in_issue_order() {
        let mut tracker = AccuracyTracker::new(10);
        tracker.issue_batch(&[Category::Red, Category::Black, Category::White]);
        assert_eq!(tracker.open_count(), 3);

        assert_eq!(tracker.resolve_next(Category::Red), Some(true));
        assert_eq!(tracker.resolve_next(Category::Red), Some(false));
        assert_eq!(tracker.resolve_next(Category::White), Some(true));
        assert_eq!(tracker.resolve_next(Category::White), None);

        let predictions = tracker.predictions();
        // Newest first: the WHITE forecast was issued last
        assert_eq!(predictions[0].predicted(), Category::White);
        assert_eq!(predictions[2].predicted(), Category::Red);
        assert!(predictions.iter().all(|p| p.is_resolved()));
    }

    #[test]
    fn test_next_open_follows_resolution_order() {
        let mut tracker = AccuracyTracker::new(10);
        assert!(tracker.next_open().is_none());

        tracker.issue_batch(&[Category::Red, Category::Black, Category::White]);
        assert_eq!(tracker.latest().map(|p| p.predicted()), Some(Category::White));
        assert_eq!(tracker.next_open().map(|p| p.predicted()), Some(Category::Red));

        tracker.resolve_next(Category::Black);
        assert_eq!(tracker.next_open().map(|p| p.predicted()), Some(Category::Black));
        tracker.resolve_next(Category::Black);
        tracker.resolve_next(Category::Black);
        assert!(tracker.next_open().is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = AccuracyTracker::new(3);
        for _ in 0..5 {
            tracker.issue(Category::Red);
            tracker.resolve_next(Category::Red);
        }
        assert_eq!(tracker.predictions().len(), 3);
        // Running totals survive eviction
        assert_eq!(tracker.summary().resolved, 5);
    }
}
