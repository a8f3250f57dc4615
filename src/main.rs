//! Flash Guard - photosensitive seizure protection
//!
//! Analyzes a stream of screen frames for flashing content and raises a
//! warning through the presentation layer (here: a console presenter).
//!
//! # Usage
//!
//! ```bash
//! # Synthetic 5 Hz strobe for 10 seconds
//! cargo run --release
//!
//! # Scrolling content with a 3 Hz strobe on top, pause protection on warning
//! cargo run --release -- --pattern mixed --strobe-hz 3 --on-warning pause
//!
//! # Raw frames from a capture tool
//! capture-tool | ./flash-guard --stdin
//! ```
//!
//! # Environment Variables
//!
//! - `FLASH_GUARD_CONFIG`: Path to a TOML config (default: ./flash_guard.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flash_guard::alerting::{
    AlertCoordinator, ChannelSink, PresentationCommand, WarningResponse,
};
use flash_guard::config::{defaults, GuardConfig};
use flash_guard::detection::FlashDetectionEngine;
use flash_guard::pipeline::{
    FrameSource, Pattern, ProcessingLoop, RawFrameSource, SyntheticConfig, SyntheticSource,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "flash-guard")]
#[command(about = "Photosensitive seizure protection: flashing content detector")]
#[command(version)]
struct CliArgs {
    /// Read raw frames from stdin (JSON header line + pixel bytes per frame)
    #[arg(long, conflicts_with = "file")]
    stdin: bool,

    /// Read raw frames from a file (same format as --stdin)
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Synthetic pattern when no input is given: static, strobe, scroll, mixed
    #[arg(long, default_value = "strobe")]
    pattern: Pattern,

    /// Synthetic frame rate
    #[arg(long, default_value_t = defaults::SYNTHETIC_FPS)]
    fps: u32,

    /// Synthetic run length in seconds
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Strobe frequency in full cycles per second
    #[arg(long, default_value_t = 5.0)]
    strobe_hz: f64,

    /// Synthetic frame width
    #[arg(long, default_value_t = defaults::SYNTHETIC_WIDTH)]
    width: usize,

    /// Synthetic frame height
    #[arg(long, default_value_t = defaults::SYNTHETIC_HEIGHT)]
    height: usize,

    /// Uniform per-channel noise amplitude for synthetic frames
    #[arg(long, default_value_t = 0)]
    noise: u8,

    /// Generate synthetic frames as fast as possible on a virtual clock
    #[arg(long)]
    unpaced: bool,

    /// Path to a TOML config file (overrides $FLASH_GUARD_CONFIG and ./flash_guard.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// What the console presenter answers when a warning is raised
    #[arg(long, value_enum, default_value_t = OnWarning::Dismiss)]
    on_warning: OnWarning,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OnWarning {
    /// Acknowledge and keep protecting
    Dismiss,
    /// Pause protection for the configured duration
    Pause,
}

impl OnWarning {
    const fn response(self) -> WarningResponse {
        match self {
            OnWarning::Dismiss => WarningResponse::Dismiss,
            OnWarning::Pause => WarningResponse::PauseProtection,
        }
    }
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    FrameProcessor,
    Presenter,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::FrameProcessor => write!(f, "FrameProcessor"),
            TaskName::Presenter => write!(f, "Presenter"),
        }
    }
}

// ============================================================================
// Console Presenter
// ============================================================================

/// Stand-in for the UI: logs every command and answers warnings.
fn spawn_presenter(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut rx: UnboundedReceiver<PresentationCommand>,
    coordinator: Arc<AlertCoordinator>,
    on_warning: OnWarning,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[Presenter] Task starting");
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    // show whatever the worker dispatched on its way out
                    while let Ok(command) = rx.try_recv() {
                        present(&command, &coordinator, on_warning);
                    }
                    break;
                }
                command = rx.recv() => match command {
                    Some(command) => present(&command, &coordinator, on_warning),
                    None => break,
                }
            }
        }
        Ok(TaskName::Presenter)
    });
}

fn present(command: &PresentationCommand, coordinator: &AlertCoordinator, on_warning: OnWarning) {
    match command {
        PresentationCommand::RaiseWarning(warning) => {
            warn!(
                cell_row = warning.trigger.cell_row,
                cell_col = warning.trigger.cell_col,
                reversals = warning.trigger.reversal_count,
                "⚠️  WARNING: flashing content on screen"
            );
            coordinator.respond(on_warning.response());
        }
        PresentationCommand::DismissWarning => info!("Warning dismissed"),
        PresentationCommand::ShowPausedIndicator { until } => {
            let remaining = until.saturating_duration_since(Instant::now());
            info!(remaining_secs = remaining.as_secs(), "⏸️  Protection paused");
        }
        PresentationCommand::HidePausedIndicator => info!("▶️  Protection resumed"),
        PresentationCommand::CloseForegroundApp => info!("Closing foreground app"),
        PresentationCommand::DialEmergencyContact { number } => {
            info!(number = %number, "📞 Dialing emergency contact");
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {:#}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        return Ok(());
                    }
                }
            }
        }
    }

    // let remaining tasks observe cancellation and finish
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => info!("🔒 Supervisor: Task {} stopped", task_name),
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(anyhow::anyhow!("Task panicked: {}", e)),
        }
    }
    Ok(())
}

// ============================================================================
// Pipeline Runner
// ============================================================================

/// Run detection over any frame source until it ends or Ctrl+C.
async fn run_pipeline<S: FrameSource>(
    mut source: S,
    config: &GuardConfig,
    on_warning: OnWarning,
    cancel_token: CancellationToken,
) -> Result<()> {
    let (sink, rx) = ChannelSink::channel();
    let coordinator = Arc::new(AlertCoordinator::new(&config.alerting, Arc::new(sink)));
    let engine = FlashDetectionEngine::new(config.detection);

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    spawn_presenter(
        &mut task_set,
        rx,
        Arc::clone(&coordinator),
        on_warning,
        cancel_token.clone(),
    );

    let proc_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[FrameProcessor] Task starting");
        let stats = ProcessingLoop::new(engine, coordinator, proc_cancel.clone())
            .run(&mut source)
            .await;
        // the run is over either way; stop the presenter too
        proc_cancel.cancel();
        if stats.source_error {
            anyhow::bail!(
                "Frame source {} failed after {} frames",
                source.source_name(),
                stats.frames_received
            );
        }
        Ok(TaskName::FrameProcessor)
    });

    run_supervisor(&mut task_set, cancel_token).await
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let config = match &args.config {
        Some(path) => GuardConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GuardConfig::load(),
    };

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Flash Guard - photosensitive seizure protection");
    info!(
        "  Grid: {0}x{0} | Window: {1}ms | Reversals: {2} | Cooldown: {3}ms",
        config.detection.grid_size,
        config.detection.window_ms,
        config.detection.reversals_required,
        config.alerting.cooldown_ms
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if let Some(path) = &args.file {
        info!("📥 Input: raw frames from {}", path.display());
        let source = RawFrameSource::open(path).await?;
        run_pipeline(source, &config, args.on_warning, cancel_token).await?;
    } else if args.stdin {
        info!("📥 Input: raw frames from stdin");
        run_pipeline(RawFrameSource::stdin(), &config, args.on_warning, cancel_token).await?;
    } else {
        info!(
            "📥 Input: synthetic {} at {} fps for {}s",
            args.pattern, args.fps, args.duration_secs
        );
        let source = SyntheticSource::new(SyntheticConfig {
            width: args.width,
            height: args.height,
            fps: args.fps,
            duration: Duration::from_secs(args.duration_secs),
            pattern: args.pattern,
            strobe_hz: args.strobe_hz,
            noise: args.noise,
            paced: !args.unpaced,
            seed: None,
        });
        run_pipeline(source, &config, args.on_warning, cancel_token).await?;
    }

    info!("✓ Flash Guard shutdown complete");
    Ok(())
}
