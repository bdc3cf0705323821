//! Configuration types for the tracker.
//!
//! Mirrors the TOML file layout; every field has a serde default so a partial
//! (or missing) file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::prelude::Result;
use crate::tracker::logging::LogConfig;
use crate::{Error, Selector};

// ============================================================================
// Top-level
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// Effective outcome history capacity for the configured mode.
    pub fn outcome_capacity(&self) -> usize {
        self.history
            .outcome_capacity
            .unwrap_or_else(|| self.prediction.mode.default_outcome_capacity())
    }

    /// Effective prediction history capacity for the configured mode.
    pub fn prediction_capacity(&self) -> usize {
        self.history
            .prediction_capacity
            .unwrap_or_else(|| self.prediction.mode.default_prediction_capacity())
    }

    /// Reject values the tracker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.outcome_capacity() == 0 {
            return Err(Error::config("history.outcome_capacity must be > 0"));
        }
        if self.prediction_capacity() == 0 {
            return Err(Error::config("history.prediction_capacity must be > 0"));
        }
        if self.prediction.window == 0 {
            return Err(Error::config("prediction.window must be > 0"));
        }
        if self.prediction.mode == PredictionMode::Batch {
            if self.prediction.batch_size == 0 {
                return Err(Error::config("prediction.batch_size must be > 0"));
            }
            if self.prediction.batch_size > self.prediction_capacity() {
                return Err(Error::config(format!(
                    "prediction.batch_size ({}) exceeds history.prediction_capacity ({})",
                    self.prediction.batch_size,
                    self.prediction_capacity()
                )));
            }
        }
        if self.poll.interval_ms == 0 || self.poll.batch_delay_ms == 0 {
            return Err(Error::config("poll intervals must be > 0"));
        }
        if self.source.snapshot_timeout_ms == 0 {
            return Err(Error::config("source.snapshot_timeout_ms must be > 0"));
        }
        if self.source.white_label.trim().is_empty() {
            return Err(Error::config("source.white_label must not be empty"));
        }
        self.source.selectors.compile()?;
        Ok(())
    }
}

// ============================================================================
// Snapshot source
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Rendering sidecar endpoint returning the page as a JSON element tree.
    #[serde(default = "default_render_url")]
    pub render_url: String,
    /// Upper bound for one snapshot acquisition, retries included.
    #[serde(default = "default_snapshot_timeout_ms")]
    pub snapshot_timeout_ms: u64,
    /// Label stored for WHITE outcomes (the tile shows no number).
    #[serde(default = "default_white_label")]
    pub white_label: String,
    #[serde(default)]
    pub countdown_format: CountdownFormat,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

fn default_render_url() -> String {
    "http://127.0.0.1:9230/snapshot".to_string()
}

fn default_snapshot_timeout_ms() -> u64 {
    15_000
}

fn default_white_label() -> String {
    "15x".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            render_url: default_render_url(),
            snapshot_timeout_ms: default_snapshot_timeout_ms(),
            white_label: default_white_label(),
            countdown_format: CountdownFormat::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl SourceConfig {
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}

/// Layout of the countdown shown while a round is spinning.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountdownFormat {
    /// `SS:CC`, centiseconds round up to the next whole second.
    #[default]
    SecondsCentis,
    /// `M:SS`
    MinutesSeconds,
}

/// Selectors into the rendered page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectorConfig {
    /// Recent-results feed entries, most recent first.
    #[serde(default = "default_entries_selector")]
    pub entries: String,
    #[serde(default = "default_tile_selector")]
    pub tile: String,
    /// Box inside the tile carrying the color class.
    #[serde(default = "default_box_selector")]
    pub tile_box: String,
    #[serde(default = "default_number_selector")]
    pub number: String,
    /// Countdown / settle banner text.
    #[serde(default = "default_status_selector")]
    pub status: String,
}

fn default_entries_selector() -> String {
    ".entries.main .entry".to_string()
}
fn default_tile_selector() -> String {
    ".roulette-tile".to_string()
}
fn default_box_selector() -> String {
    ".sm-box".to_string()
}
fn default_number_selector() -> String {
    ".number".to_string()
}
fn default_status_selector() -> String {
    ".game-inner .time-left".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            entries: default_entries_selector(),
            tile: default_tile_selector(),
            tile_box: default_box_selector(),
            number: default_number_selector(),
            status: default_status_selector(),
        }
    }
}

/// Parsed form of [`SelectorConfig`].
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub entries: Selector,
    pub tile: Selector,
    pub tile_box: Selector,
    pub number: Selector,
    pub status: Selector,
}

impl SelectorConfig {
    pub fn compile(&self) -> Result<CompiledSelectors> {
        Ok(CompiledSelectors {
            entries: self.entries.parse()?,
            tile: self.tile.parse()?,
            tile_box: self.tile_box.parse()?,
            number: self.number.parse()?,
            status: self.status.parse()?,
        })
    }
}

// ============================================================================
// Poll cadence
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    /// Reactive mode tick interval.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Batch mode delay between ticks.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Wait out a reported countdown before the next tick.
    #[serde(default = "default_extend_for_countdown")]
    pub extend_for_countdown: bool,
}

fn default_interval_ms() -> u64 {
    5_000
}
fn default_batch_delay_ms() -> u64 {
    1_000
}
fn default_extend_for_countdown() -> bool {
    true
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            extend_for_countdown: default_extend_for_countdown(),
        }
    }
}

impl PollConfig {
    /// Base delay between ticks for a mode.
    pub fn base_delay(&self, mode: PredictionMode) -> Duration {
        match mode {
            PredictionMode::Reactive => Duration::from_millis(self.interval_ms),
            PredictionMode::Batch => Duration::from_millis(self.batch_delay_ms),
        }
    }
}

// ============================================================================
// Prediction
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// One open forecast at a time, re-issued after every accepted outcome.
    #[default]
    Reactive,
    /// A batch of forecasts sampled from the frequencies of the last batch.
    Batch,
}

impl PredictionMode {
    pub fn default_outcome_capacity(&self) -> usize {
        match self {
            PredictionMode::Reactive => 40,
            PredictionMode::Batch => 60,
        }
    }

    pub fn default_prediction_capacity(&self) -> usize {
        match self {
            PredictionMode::Reactive => 10,
            PredictionMode::Batch => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMode::Reactive => "reactive",
            PredictionMode::Batch => "batch",
        }
    }
}

impl std::str::FromStr for PredictionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reactive" => Ok(PredictionMode::Reactive),
            "batch" => Ok(PredictionMode::Batch),
            other => Err(Error::config(format!(
                "unknown prediction mode '{other}' (use: reactive, batch)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictionConfig {
    #[serde(default)]
    pub mode: PredictionMode,
    /// Reactive mode: number of most recent outcomes the heuristics look at.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Batch mode: outcomes collected per batch, and forecasts issued per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_window() -> usize {
    10
}
fn default_batch_size() -> usize {
    20
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            mode: PredictionMode::default(),
            window: default_window(),
            batch_size: default_batch_size(),
        }
    }
}

// ============================================================================
// History / server
// ============================================================================

/// Capacities; `None` picks the mode default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Query API port (0 disables the server)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    4001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}
