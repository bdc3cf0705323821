//! Roulette feed tracker
//!
//! Polls the rendered game page through a rendering sidecar with:
//! - CLI arguments and TOML config file support
//! - Reactive (streak heuristics) or batch (frequency sampling) prediction
//! - Structured logging with tracing
//! - Read-only HTTP query API and periodic metrics

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use spin_tracker::{
    init_logging, serve, AppConfig, AppState, HttpSnapshotSource, LogFormat, PollLoop,
    PredictionMode, SharedTracker, TrackerMetrics, TrackerState,
};

/// Interval between metrics summaries in the log.
const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "spin_tracker")]
#[command(version, about = "Roulette feed tracker and next-color predictor", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "spin_tracker.toml")]
    config: String,

    /// Override rendering sidecar endpoint
    #[arg(long, env = "SPIN_TRACKER_RENDER_URL")]
    render_url: Option<String>,

    /// Override prediction mode (reactive, batch)
    #[arg(long)]
    mode: Option<PredictionMode>,

    /// Override reactive poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Query API port (0 to disable)
    #[arg(long, env = "SPIN_TRACKER_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Directory for the daily rolling log file
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "spin_tracker.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
    /// Run the tracker (default)
    Run,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (before parsing CLI args)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            generate_sample_config(output)?;
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            config.validate()?;
            println!("Configuration is valid:\n{:#?}", config);
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let config = load_config(&cli)?;
    config.validate()?;

    // Guard must outlive the process for the file writer to flush
    let _log_guard = init_logging(&config.logging)?;

    print_startup_banner(&config);

    // The only fatal condition: the rendering sidecar is unreachable
    let source = HttpSnapshotSource::connect(&config.source).await.map_err(|e| {
        error!(error = %e, "Rendering sidecar unavailable, aborting startup");
        e
    })?;

    let tracker = SharedTracker::new(TrackerState::new(
        config.outcome_capacity(),
        config.prediction_capacity(),
    ));
    let metrics = Arc::new(TrackerMetrics::new());
    let poll_loop = PollLoop::from_config(&config, source, tracker.clone(), metrics.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Query API
    let server = if config.server.port > 0 {
        let state = AppState::new(tracker.clone(), metrics.clone(), poll_loop.forecaster().clone());
        let addr = format!("{}:{}", config.server.bind, config.server.port);
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = serve(state, &addr, rx).await {
                warn!(error = %e, "Query API terminated");
            }
        }))
    } else {
        info!("Query API disabled (port 0)");
        None
    };

    // Periodic metrics summary
    {
        let metrics = metrics.clone();
        let tracker = tracker.clone();
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(METRICS_LOG_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        metrics.log_summary();
                        let accuracy = tracker.accuracy();
                        info!(
                            resolved = accuracy.resolved,
                            correct = accuracy.correct,
                            hit_rate = accuracy.hit_rate,
                            "Prediction accuracy"
                        );
                    }
                    _ = rx.changed() => break,
                }
            }
        });
    }

    // Shutdown signals
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    poll_loop.run(shutdown_rx).await;

    if let Some(handle) = server {
        if let Err(e) = handle.await {
            warn!(error = %e, "Query API task failed");
        }
    }

    metrics.log_summary();
    info!("Shutdown complete");
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received (SIGINT/Ctrl+C)");
                    }
                    _ = sigterm.recv() => {
                        info!("Shutdown signal received (SIGTERM)");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received (SIGINT/Ctrl+C)");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received (SIGINT/Ctrl+C)");
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config_path = &cli.config;
    let mut config = if Path::new(config_path).exists() {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str::<AppConfig>(&content)?
    } else {
        // Return default config if file doesn't exist
        AppConfig::default()
    };

    // CLI args override file values
    if let Some(url) = &cli.render_url {
        config.source.render_url = url.clone();
    }
    if let Some(mode) = cli.mode {
        config.prediction.mode = mode;
    }
    if let Some(ms) = cli.interval_ms {
        config.poll.interval_ms = ms;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.log_dir = Some(dir.clone());
    }
    Ok(config)
}

fn generate_sample_config(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sample = AppConfig::default();
    let content = toml::to_string_pretty(&sample)?;

    let with_comments = format!(
        r#"# Spin Tracker Configuration
# See: spin_tracker --help

{}
# History capacities default per prediction mode
# (reactive: 40 outcomes / 10 predictions, batch: 60 / 30):
# [history]
# outcome_capacity = 40
# prediction_capacity = 10
"#,
        content
    );

    std::fs::write(path, with_comments)?;
    println!("Sample config written to: {}", path);
    Ok(())
}

/// Print startup banner with version and configuration summary.
fn print_startup_banner(config: &AppConfig) {
    let version = env!("CARGO_PKG_VERSION");
    let server = if config.server.port > 0 {
        format!("{}:{}", config.server.bind, config.server.port)
    } else {
        "disabled".to_string()
    };

    eprintln!();
    eprintln!("╔═══════════════════════════════════════════════════════════╗");
    eprintln!("║     Spin Tracker v{:<10}                              ║", version);
    eprintln!("║                                                           ║");
    eprintln!("║  Mode:    {:<15}  API: {:<21}║", config.prediction.mode.as_str(), server);
    eprintln!("╚═══════════════════════════════════════════════════════════╝");
    eprintln!();
}
