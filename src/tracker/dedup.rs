//! Outcome deduplication.
//!
//! The same settled result stays on the page across several polls until the
//! next round finishes. Only a change of category or label counts as a new
//! spin.

use crate::Outcome;

/// Gate decision for a candidate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    Accept,
    Duplicate,
}

/// Compares a candidate against the most recently stored outcome.
#[derive(Debug, Default)]
pub struct OutcomeDeduplicator {
    duplicates: u64,
}

impl OutcomeDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject iff both category and label match `latest`.
    pub fn check(&mut self, candidate: &Outcome, latest: Option<&Outcome>) -> DedupDecision {
        match latest {
            Some(prev) if prev.same_spin_as(candidate) => {
                self.duplicates += 1;
                DedupDecision::Duplicate
            }
            _ => DedupDecision::Accept,
        }
    }

    /// Number of candidates rejected so far.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}
