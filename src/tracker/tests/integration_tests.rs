//! End-to-end tests for the poll cycle.
//!
//! A scripted in-memory source replays a fixed sequence of snapshots (or
//! failures), so every tick of the pipeline can be checked:
//! - Pending ticks and failed ticks leave the histories untouched
//! - Re-scraped settled outcomes are deduplicated
//! - Forecasts are resolved as outcomes arrive, in both prediction modes
//! - Shutdown stops the loop and releases the source

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::mock::StepRng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::prelude::Result;
use crate::tracker::extractor::test_pages::{entry, page, settled};
use crate::tracker::{
    AppConfig, PendingReason, PhaseState, PollLoop, PredictionMode, SharedTracker,
    SnapshotSource, TickOutcome, TrackerMetrics, TrackerState,
};
use crate::{Category, Error, Outcome, PageSnapshot, SnapshotError};

#[derive(Clone)]
struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<PageSnapshot>>>>,
    released: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<PageSnapshot>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            released: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn acquire(&self) -> Result<PageSnapshot> {
        self.script.lock().pop_front().unwrap_or_else(|| {
            Err(Error::from(SnapshotError::MissingStructure(
                "script exhausted".to_string(),
            )))
        })
    }

    async fn shutdown(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    poll: PollLoop<ScriptedSource, StepRng>,
    tracker: SharedTracker,
    metrics: Arc<TrackerMetrics>,
    source: ScriptedSource,
}

fn harness(config: &AppConfig, script: Vec<Result<PageSnapshot>>) -> Harness {
    let tracker = SharedTracker::new(TrackerState::new(
        config.outcome_capacity(),
        config.prediction_capacity(),
    ));
    let metrics = Arc::new(TrackerMetrics::new());
    let source = ScriptedSource::new(script);
    let poll = PollLoop::new(
        config,
        source.clone(),
        tracker.clone(),
        metrics.clone(),
        StepRng::new(0, 0),
    )
    .unwrap();
    Harness {
        poll,
        tracker,
        metrics,
        source,
    }
}

#[tokio::test]
async fn test_pending_duplicate_and_resolution_sequence() {
    let config = AppConfig::default();
    let mut h = harness(
        &config,
        vec![
            Ok(page(Some("Girando em 08:50"), vec![entry("red", Some("7"))])),
            Ok(settled("red", "3")),
            Ok(settled("red", "3")),
            Ok(settled("black", "10")),
        ],
    );

    // Tick 1: round still spinning, next poll waits out the countdown
    let report = h.poll.tick().await;
    assert!(matches!(
        report.outcome,
        TickOutcome::Pending(PendingReason::NotSettled)
    ));
    assert_eq!(report.next_delay, Duration::from_secs(9));
    assert!(h.tracker.recent_outcomes().is_empty());
    assert!(h.tracker.predictions().is_empty());
    assert!(h.tracker.status().is_spinning);

    // Tick 2: first settled outcome opens a forecast
    let report = h.poll.tick().await;
    match report.outcome {
        TickOutcome::Accepted {
            outcome,
            resolved,
            issued,
        } => {
            assert_eq!(outcome, Outcome::new(Category::Red, "3"));
            assert_eq!(resolved, None);
            assert_eq!(issued.len(), 1);
        }
        other => panic!("expected accepted outcome, got {other:?}"),
    }
    assert_eq!(report.next_delay, Duration::from_secs(5));

    // Tick 3: same result still on the page
    let report = h.poll.tick().await;
    assert!(matches!(report.outcome, TickOutcome::Duplicate));

    // Tick 4: a real new spin resolves the open forecast
    let report = h.poll.tick().await;
    assert!(matches!(
        report.outcome,
        TickOutcome::Accepted {
            resolved: Some(_),
            ..
        }
    ));

    assert_eq!(
        h.tracker.recent_outcomes(),
        vec![
            Outcome::new(Category::Black, "10"),
            Outcome::new(Category::Red, "3"),
        ]
    );

    let predictions = h.tracker.predictions();
    let resolved: Vec<_> = predictions.iter().filter(|p| p.is_resolved()).collect();
    assert_eq!(resolved.len(), 1);
    // Issued after RED/3: a single outcome falls through to the weighted
    // rule, and a zero draw picks RED
    assert_eq!(resolved[0].predicted(), Category::Red);
    assert_eq!(resolved[0].actual(), Some(Category::Black));
    assert_eq!(resolved[0].correct(), Some(false));
    assert_eq!(predictions.iter().filter(|p| !p.is_resolved()).count(), 1);

    let accuracy = h.tracker.accuracy();
    assert_eq!(accuracy.resolved, 1);
    assert_eq!(accuracy.correct, 0);

    assert_eq!(h.metrics.ticks(), 4);
    assert_eq!(h.metrics.accepted(), 2);
}

#[tokio::test]
async fn test_failed_and_pending_ticks_do_not_mutate() {
    let config = AppConfig::default();
    let mut h = harness(
        &config,
        vec![
            Err(Error::GenericRequest("connection reset".to_string())),
            Ok(page(Some("Blaze Girou 3!"), vec![])),
            Ok(page(Some("Blaze Girou 5!"), vec![entry("red", Some("3"))])),
            Ok(page(None, vec![entry("black", Some("4"))])),
        ],
    );

    let report = h.poll.tick().await;
    assert!(matches!(report.outcome, TickOutcome::Failed(_)));
    // Failed ticks do not update the status cell
    assert_eq!(h.tracker.status().phase, PhaseState::Waiting);

    let report = h.poll.tick().await;
    assert!(matches!(
        report.outcome,
        TickOutcome::Pending(PendingReason::NoEntries)
    ));
    assert_eq!(h.tracker.status().phase, PhaseState::Settled);

    let report = h.poll.tick().await;
    assert!(matches!(
        report.outcome,
        TickOutcome::Pending(PendingReason::FeedLagging { .. })
    ));

    let report = h.poll.tick().await;
    assert!(matches!(
        report.outcome,
        TickOutcome::Pending(PendingReason::NotSettled)
    ));
    assert_eq!(h.tracker.status().phase, PhaseState::Waiting);

    assert!(h.tracker.recent_outcomes().is_empty());
    assert!(h.tracker.predictions().is_empty());
    assert_eq!(h.metrics.failures(), 1);
    assert_eq!(h.metrics.accepted(), 0);
}

#[tokio::test]
async fn test_white_outcome_uses_sentinel_label() {
    let config = AppConfig::default();
    let mut h = harness(&config, vec![Ok(settled("white", "0"))]);

    h.poll.tick().await;
    assert_eq!(
        h.tracker.recent_outcomes(),
        vec![Outcome::new(Category::White, "15x")]
    );
}

#[tokio::test]
async fn test_batch_mode_issues_and_resolves_in_order() {
    let mut config = AppConfig::default();
    config.prediction.mode = PredictionMode::Batch;
    config.prediction.batch_size = 3;
    let mut h = harness(
        &config,
        vec![
            Ok(settled("red", "1")),
            Ok(settled("black", "8")),
            Ok(settled("red", "4")),
            Ok(settled("red", "2")),
            Ok(settled("black", "11")),
        ],
    );

    for _ in 0..2 {
        let report = h.poll.tick().await;
        assert_eq!(report.next_delay, Duration::from_secs(1));
        match report.outcome {
            TickOutcome::Accepted { issued, .. } => assert!(issued.is_empty()),
            other => panic!("expected accepted outcome, got {other:?}"),
        }
    }
    assert!(h.tracker.predictions().is_empty());

    // Quota reached: three forecasts sampled from {red: 2/3, black: 1/3}
    match h.poll.tick().await.outcome {
        TickOutcome::Accepted { issued, .. } => {
            assert_eq!(issued, vec![Category::Red; 3]);
        }
        other => panic!("expected accepted outcome, got {other:?}"),
    }
    assert_eq!(h.tracker.accuracy().open, 3);

    // Oldest forecast resolves first
    h.poll.tick().await;
    h.poll.tick().await;
    let summary = h.tracker.accuracy();
    assert_eq!(summary.resolved, 2);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.open, 1);
    assert_eq!(h.tracker.recent_outcomes().len(), 5);
}

#[tokio::test]
async fn test_outcome_history_is_bounded() {
    let mut config = AppConfig::default();
    config.history.outcome_capacity = Some(4);
    let script = (1..=6)
        .map(|i| Ok(settled(if i % 2 == 0 { "red" } else { "black" }, &i.to_string())))
        .collect();
    let mut h = harness(&config, script);

    for _ in 0..6 {
        h.poll.tick().await;
    }
    let labels: Vec<String> = h
        .tracker
        .recent_outcomes()
        .iter()
        .map(|o| o.label().to_string())
        .collect();
    assert_eq!(labels, vec!["6", "5", "4", "3"]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_loop_and_releases_source() {
    let config = AppConfig::default();
    let h = harness(&config, vec![Ok(settled("red", "3"))]);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(h.poll.run(rx));
    // Let the first tick run and the loop park on its sleep
    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(h.source.released.load(Ordering::SeqCst));
    assert_eq!(h.tracker.recent_outcomes().len(), 1);
    assert_eq!(h.metrics.ticks(), 1);
}
