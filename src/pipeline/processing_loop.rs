//! Frame processing loop shared across all input modes.
//!
//! One worker owns the [`FlashDetectionEngine`]; each frame is analyzed to
//! completion, detections are handed to the shared [`AlertCoordinator`], and
//! cancellation is only observed between frames.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::source::{FrameEvent, FrameSource};
use super::PipelineStats;
use crate::alerting::AlertCoordinator;
use crate::config::defaults::STATUS_LOG_INTERVAL_FRAMES;
use crate::detection::FlashDetectionEngine;

/// Owns everything the worker needs to drive frames through detection.
///
/// Built with [`new()`](ProcessingLoop::new), then consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    engine: FlashDetectionEngine,
    coordinator: Arc<AlertCoordinator>,
    cancel_token: CancellationToken,
    status_interval: u64,
}

impl ProcessingLoop {
    pub fn new(
        engine: FlashDetectionEngine,
        coordinator: Arc<AlertCoordinator>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            engine,
            coordinator,
            cancel_token,
            status_interval: STATUS_LOG_INTERVAL_FRAMES,
        }
    }

    /// Log a status line every `frames` frames (0 disables it).
    pub const fn with_status_interval(mut self, frames: u64) -> Self {
        self.status_interval = frames;
        self
    }

    /// Run until the source is exhausted, fails, or cancellation.
    ///
    /// Protection is active for the duration of the run; on exit the engine
    /// session is torn down and protection returns to inactive.
    pub async fn run<S: FrameSource + ?Sized>(mut self, source: &mut S) -> PipelineStats {
        let mut stats = PipelineStats::default();

        if !self.engine.is_running() {
            self.engine.restart();
        }
        self.coordinator.activate();
        info!(source = source.source_name(), "Processing frames");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("[FrameProcessor] Shutdown signal received");
                    break;
                }
                result = source.next_frame() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!(error = %format!("{e:#}"), "[FrameProcessor] Source error");
                            stats.source_error = true;
                            break;
                        }
                    }
                }
            };

            let captured = match event {
                FrameEvent::Frame(captured) => captured,
                FrameEvent::Eof => {
                    info!(
                        frames = stats.frames_received,
                        "[FrameProcessor] Source reached end"
                    );
                    break;
                }
            };
            stats.frames_received += 1;
            let now = captured.captured_at;

            self.coordinator.expire_pause_at(now);

            let detections = self.engine.analyze_at(&captured.frame.view(), now);
            stats.flash_events += detections.len() as u64;
            for detection in &detections {
                if self.coordinator.on_flash_detected_at(detection, now).is_some() {
                    stats.warnings_raised += 1;
                }
            }

            if self.status_interval > 0 && stats.frames_received % self.status_interval == 0 {
                let engine = self.engine.stats();
                info!(
                    frames = stats.frames_received,
                    rejected = engine.frames_rejected,
                    flash_events = stats.flash_events,
                    warnings = stats.warnings_raised,
                    protection = %self.coordinator.protection_state_at(now),
                    "Status"
                );
            }
        }

        self.engine.shutdown();
        self.coordinator.deactivate();

        stats.engine = self.engine.stats();
        stats.alerts = self.coordinator.stats();
        log_final_stats(&stats);
        stats
    }
}

fn log_final_stats(stats: &PipelineStats) {
    info!(
        frames_received = stats.frames_received,
        frames_analyzed = stats.engine.frames_analyzed,
        frames_rejected = stats.engine.frames_rejected,
        cells_skipped = stats.engine.cells_skipped,
        session_resets = stats.engine.session_resets,
        flash_events = stats.flash_events,
        warnings_raised = stats.warnings_raised,
        suppressed_cooldown = stats.alerts.suppressed_cooldown,
        suppressed_paused = stats.alerts.suppressed_paused,
        "Final statistics"
    );
}
