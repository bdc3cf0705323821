//! Structured logging setup.
//!
//! Stdout logging in pretty, compact or JSON form, plus an optional daily
//! rolling JSON log file.
//!
//! # Component Targets
//!
//! | Target | Description |
//! |--------|-------------|
//! | `spin_tracker::poll` | Poll loop ticks and acceptance |
//! | `spin_tracker::source` | Snapshot acquisition |
//! | `spin_tracker::predict` | Predictor decisions |
//! | `spin_tracker::server` | Query API |
//!
//! ```bash
//! RUST_LOG=info,spin_tracker::predict=debug spin_tracker
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{other}' (use: pretty, json, compact)")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Level directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for the rolling log file; no file logging when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            log_dir: None,
        }
    }
}

fn base_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(level);
        for directive in ["hyper=warn", "reqwest=warn", "h2=warn"] {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    })
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let stdout_layer = match config.format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
        LogFormat::Pretty => fmt::layer().with_target(false).boxed(),
    };

    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, "spin-tracker.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .boxed();

        tracing_subscriber::registry()
            .with(base_filter(&config.level))
            .with(stdout_layer)
            .with(file_layer)
            .try_init()?;

        eprintln!("Logging to {} (daily rotation)", dir.display());
        return Ok(Some(guard));
    }

    tracing_subscriber::registry()
        .with(base_filter(&config.level))
        .with(stdout_layer)
        .try_init()?;
    Ok(None)
}

/// Log target constants for component-specific logging.
pub mod targets {
    pub const POLL: &str = "spin_tracker::poll";
    pub const SOURCE: &str = "spin_tracker::source";
    pub const PREDICT: &str = "spin_tracker::predict";
    pub const SERVER: &str = "spin_tracker::server";
}
