//! Round phase detection.
//!
//! The phase is recomputed from every snapshot: the status banner either
//! shows a countdown (`Girando em 12:34`), a settle announcement
//! (`Blaze Girou 7!`), or something else. Nothing is carried between ticks.

use serde::Serialize;
use std::time::Duration;

use crate::tracker::config::CountdownFormat;
use crate::{PageSnapshot, Selector};

const SPINNING_MARKER: &str = "girando em";
const SETTLED_MARKER: &str = "girou";

/// Coarse round phase.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    #[default]
    Waiting,
    Spinning,
    Settled,
}

/// Phase derived from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReading {
    pub state: PhaseState,
    /// Time left on the countdown, only when spinning.
    pub remaining: Option<Duration>,
    /// Number announced by the settle banner, only when settled.
    pub announced: Option<String>,
}

impl PhaseReading {
    pub fn waiting() -> Self {
        Self::default()
    }

    pub fn spinning(remaining: Duration) -> Self {
        Self {
            state: PhaseState::Spinning,
            remaining: Some(remaining),
            announced: None,
        }
    }

    pub fn settled(announced: impl Into<String>) -> Self {
        Self {
            state: PhaseState::Settled,
            remaining: None,
            announced: Some(announced.into()),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state == PhaseState::Settled
    }

    pub fn is_spinning(&self) -> bool {
        self.state == PhaseState::Spinning
    }
}

/// Reads the status banner and classifies it.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    status: Selector,
    format: CountdownFormat,
}

impl PhaseTracker {
    pub fn new(status: Selector, format: CountdownFormat) -> Self {
        Self { status, format }
    }

    /// Classify the snapshot. A missing banner reads as waiting.
    pub fn read(&self, snapshot: &PageSnapshot) -> PhaseReading {
        match snapshot.query_first(&self.status) {
            Some(node) => self.classify(&node.text_content()),
            None => PhaseReading::waiting(),
        }
    }

    /// Classify banner text.
    pub fn classify(&self, text: &str) -> PhaseReading {
        // ASCII lowering keeps byte offsets aligned with `text`.
        let lowered = text.trim().to_ascii_lowercase();

        if let Some(idx) = lowered.find(SPINNING_MARKER) {
            let rest = &lowered[idx + SPINNING_MARKER.len()..];
            return match parse_countdown(rest, self.format) {
                Some(remaining) => PhaseReading::spinning(remaining),
                None => PhaseReading::waiting(),
            };
        }

        if let Some(idx) = lowered.find(SETTLED_MARKER) {
            let rest = &lowered[idx + SETTLED_MARKER.len()..];
            if let Some(number) = parse_announced(rest) {
                return PhaseReading::settled(number);
            }
        }

        PhaseReading::waiting()
    }
}

/// Parse the first `A:B` token after the marker.
fn parse_countdown(rest: &str, format: CountdownFormat) -> Option<Duration> {
    let token = rest.split_whitespace().next()?;
    let (major, minor) = token.split_once(':')?;
    if !is_digits(major) || !is_digits(minor) || minor.len() > 2 {
        return None;
    }
    let major: u64 = major.parse().ok()?;
    let minor: u64 = minor.parse().ok()?;

    let secs = match format {
        CountdownFormat::SecondsCentis => major + u64::from(minor > 0),
        CountdownFormat::MinutesSeconds => {
            if minor >= 60 {
                return None;
            }
            major * 60 + minor
        }
    };
    Some(Duration::from_secs(secs))
}

/// Digits directly followed by `!`.
fn parse_announced(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let (digits, tail) = rest.split_at(end);
    if digits.is_empty() || !tail.starts_with('!') {
        return None;
    }
    Some(digits.to_string())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
