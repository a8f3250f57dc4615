//! Flash Detection Engine - grid partitioning and per-cell oscillation tracking
//!
//! ```text
//! frame ──► validate ──► geometry check (reset session on change)
//!                              │
//!                 for each of G×G cells (row-major)
//!                              │
//!                  sampler ──► tracker ──► FlashDetected?
//! ```
//!
//! The engine is driven from a single worker context and takes `&mut self`,
//! so the session arena needs no locking. A torn-down engine answers every
//! frame with no events until it is restarted.

use std::time::Instant;
use tracing::{debug, info, warn};

use super::sampler::{CellRect, LuminanceSampler};
use super::tracker::{OscillationThresholds, RegionTracker, Verdict};
use crate::config::{defaults, DetectionConfig};
use crate::frame::{FrameError, FrameView};

/// A grid cell crossed the reversal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashDetected {
    pub cell_row: usize,
    pub cell_col: usize,
    /// Reversals inside the window at the moment of the trigger
    pub reversal_count: usize,
    pub timestamp: Instant,
}

/// Frame dimensions a session's grid was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    width: usize,
    height: usize,
}

/// Per-cell state for one analysis session, indexed `row * G + col`.
#[derive(Debug)]
struct Session {
    geometry: Option<Geometry>,
    regions: Vec<RegionTracker>,
}

impl Session {
    fn new(cells: usize) -> Self {
        Self {
            geometry: None,
            regions: vec![RegionTracker::new(); cells],
        }
    }

    fn reset(&mut self) {
        self.regions.iter_mut().for_each(RegionTracker::reset);
    }
}

/// Running counters, readable at any time via [`FlashDetectionEngine::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub frames_analyzed: u64,
    pub frames_rejected: u64,
    pub frames_ignored: u64,
    pub cells_skipped: u64,
    pub events_emitted: u64,
    pub session_resets: u64,
}

/// Region-based temporal luminance analysis over a stream of frames.
pub struct FlashDetectionEngine {
    config: DetectionConfig,
    thresholds: OscillationThresholds,
    sampler: LuminanceSampler,
    session: Option<Session>,
    last_rejection: Option<FrameError>,
    stats: EngineStats,
}

impl FlashDetectionEngine {
    /// Build an engine. Grid size and sample density outside
    /// `1..=MAX_*` are clamped so every frame can be partitioned.
    pub fn new(mut config: DetectionConfig) -> Self {
        let grid_size = config.grid_size.clamp(1, defaults::MAX_GRID_SIZE);
        let samples = config
            .samples_per_cell
            .clamp(1, defaults::MAX_SAMPLES_PER_CELL);
        if grid_size != config.grid_size || samples != config.samples_per_cell {
            warn!(
                requested_grid = config.grid_size,
                requested_samples = config.samples_per_cell,
                grid = grid_size,
                samples,
                "Detection geometry out of range, clamped"
            );
            config.grid_size = grid_size;
            config.samples_per_cell = samples;
        }
        info!(
            grid = config.grid_size,
            samples = config.samples_per_cell,
            threshold = config.luminance_threshold,
            reversals = config.reversals_required,
            window_ms = config.window_ms,
            "Initializing flash detection engine"
        );
        Self {
            thresholds: OscillationThresholds::from(&config),
            sampler: LuminanceSampler::new(config.samples_per_cell),
            session: Some(Session::new(config.cell_count())),
            last_rejection: None,
            stats: EngineStats::default(),
            config,
        }
    }

    pub const fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Why the most recent rejected frame could not be analyzed.
    pub const fn last_rejection(&self) -> Option<&FrameError> {
        self.last_rejection.as_ref()
    }

    pub const fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Tracker for one cell, if the session is live and the cell exists.
    pub fn region(&self, row: usize, col: usize) -> Option<&RegionTracker> {
        let g = self.config.grid_size;
        if row >= g || col >= g {
            return None;
        }
        self.session.as_ref()?.regions.get(row * g + col)
    }

    /// Analyze a frame observed now.
    pub fn analyze(&mut self, frame: &FrameView<'_>) -> Vec<FlashDetected> {
        self.analyze_at(frame, Instant::now())
    }

    /// Analyze a frame observed at `now`.
    ///
    /// Never fails: malformed frames and unaddressable cells simply produce
    /// fewer (or no) events.
    pub fn analyze_at(&mut self, frame: &FrameView<'_>, now: Instant) -> Vec<FlashDetected> {
        let Some(session) = self.session.as_mut() else {
            self.stats.frames_ignored += 1;
            return Vec::new();
        };

        if let Err(e) = frame.validate() {
            debug!(error = %e, "Frame rejected");
            self.stats.frames_rejected += 1;
            self.last_rejection = Some(e);
            return Vec::new();
        }

        let geometry = Geometry {
            width: frame.width(),
            height: frame.height(),
        };
        match session.geometry {
            Some(previous) if previous != geometry => {
                info!(
                    from = %format!("{}x{}", previous.width, previous.height),
                    to = %format!("{}x{}", geometry.width, geometry.height),
                    "Frame geometry changed, resetting region state"
                );
                session.reset();
                self.stats.session_resets += 1;
            }
            _ => {}
        }
        session.geometry = Some(geometry);

        let g = self.config.grid_size;
        let cell_width = geometry.width / g;
        let cell_height = geometry.height / g;

        let mut events = Vec::new();
        for row in 0..g {
            for col in 0..g {
                let cell = CellRect {
                    x: col * cell_width,
                    y: row * cell_height,
                    width: cell_width,
                    height: cell_height,
                };
                let Some(luminance) = self.sampler.sample(frame, cell) else {
                    self.stats.cells_skipped += 1;
                    continue;
                };
                let Some(region) = session.regions.get_mut(row * g + col) else {
                    self.stats.cells_skipped += 1;
                    continue;
                };
                if let Verdict::Flashing { reversals } =
                    region.update(luminance, now, &self.thresholds)
                {
                    debug!(
                        cell_row = row,
                        cell_col = col,
                        reversals,
                        luminance,
                        "Region flashing"
                    );
                    events.push(FlashDetected {
                        cell_row: row,
                        cell_col: col,
                        reversal_count: reversals,
                        timestamp: now,
                    });
                }
            }
        }

        self.stats.frames_analyzed += 1;
        self.stats.events_emitted += events.len() as u64;
        events
    }

    /// Clear all region state, keeping the session live.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reset();
            session.geometry = None;
            self.stats.session_resets += 1;
            debug!("Region state reset");
        }
    }

    /// Tear the session down. Idempotent.
    pub fn shutdown(&mut self) {
        if self.session.take().is_some() {
            info!(
                frames = self.stats.frames_analyzed,
                events = self.stats.events_emitted,
                "Flash detection session closed"
            );
        }
    }

    /// Start a fresh session (after `shutdown`, or to discard the current one).
    pub fn restart(&mut self) {
        self.session = Some(Session::new(self.config.cell_count()));
        self.stats.session_resets += 1;
        info!("Flash detection session started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameLayout, OwnedFrame};
    use std::time::Duration;

    fn test_config(grid_size: usize) -> DetectionConfig {
        DetectionConfig {
            grid_size,
            ..DetectionConfig::default()
        }
    }

    /// Frame whose cell (row, col) of a `grid` grid is `level`, the rest `background`.
    fn frame_with_cell(
        size: usize,
        grid: usize,
        row: usize,
        col: usize,
        level: u8,
        background: u8,
    ) -> OwnedFrame {
        let mut frame = OwnedFrame::solid(size, size, background);
        let cell = size / grid;
        for y in row * cell..(row + 1) * cell {
            for x in col * cell..(col + 1) * cell {
                let o = (y * size + x) * 3;
                frame.data[o..o + 3].copy_from_slice(&[level, level, level]);
            }
        }
        frame
    }

    #[test]
    fn test_static_frames_produce_no_events() {
        let mut engine = FlashDetectionEngine::new(test_config(4));
        let frame = OwnedFrame::solid(64, 64, 90);
        let t0 = Instant::now();
        for i in 0..30 {
            let events = engine.analyze_at(&frame.view(), t0 + Duration::from_millis(i * 33));
            assert!(events.is_empty());
        }
        assert_eq!(engine.stats().frames_analyzed, 30);
    }

    #[test]
    fn test_flashing_cell_reports_its_position() {
        let mut engine = FlashDetectionEngine::new(test_config(4));
        let bright = frame_with_cell(64, 4, 2, 1, 230, 40);
        let dark = OwnedFrame::solid(64, 64, 40);
        let t0 = Instant::now();
        let mut events = Vec::new();
        for i in 0..8u64 {
            let frame = if i % 2 == 0 { &bright } else { &dark };
            events.extend(engine.analyze_at(&frame.view(), t0 + Duration::from_millis(i * 100)));
        }
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].cell_row, events[0].cell_col), (2, 1));
        assert_eq!(events[0].reversal_count, 6);
    }

    #[test]
    fn test_tiny_frame_skips_every_cell() {
        let mut engine = FlashDetectionEngine::new(test_config(8));
        let frame = OwnedFrame::solid(5, 5, 255);
        let events = engine.analyze_at(&frame.view(), Instant::now());
        assert!(events.is_empty());
        assert_eq!(engine.stats().cells_skipped, 64);
    }

    #[test]
    fn test_malformed_frame_leaves_state_untouched() {
        let mut engine = FlashDetectionEngine::new(test_config(2));
        let good = OwnedFrame::solid(8, 8, 100);
        engine.analyze_at(&good.view(), Instant::now());
        let before = engine.region(0, 0).and_then(RegionTracker::previous_luminance);

        let layout = FrameLayout::packed(8, 8, 3);
        let truncated = vec![0u8; 10];
        let events = engine.analyze_at(&FrameView::new(layout, &truncated), Instant::now());
        assert!(events.is_empty());
        assert_eq!(engine.stats().frames_rejected, 1);
        assert!(matches!(
            engine.last_rejection(),
            Some(FrameError::BufferTooSmall { .. })
        ));
        assert_eq!(
            engine.region(0, 0).and_then(RegionTracker::previous_luminance),
            before
        );
    }

    #[test]
    fn test_geometry_change_resets_regions() {
        let mut engine = FlashDetectionEngine::new(test_config(2));
        engine.analyze_at(&OwnedFrame::solid(8, 8, 100).view(), Instant::now());
        assert!(engine.region(1, 1).and_then(RegionTracker::previous_luminance).is_some());

        engine.analyze_at(&OwnedFrame::solid(16, 8, 250).view(), Instant::now());
        assert_eq!(engine.stats().session_resets, 1);
        // re-primed from the new frame, not compared against the old one
        assert_eq!(
            engine.region(1, 1).and_then(RegionTracker::previous_luminance),
            Some(250.0)
        );
        assert_eq!(engine.region(1, 1).and_then(RegionTracker::last_direction), None);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_ignores_frames() {
        let mut engine = FlashDetectionEngine::new(test_config(2));
        engine.shutdown();
        engine.shutdown();
        assert!(!engine.is_running());
        let events = engine.analyze_at(&OwnedFrame::solid(8, 8, 0).view(), Instant::now());
        assert!(events.is_empty());
        assert_eq!(engine.stats().frames_ignored, 1);
        assert!(engine.region(0, 0).is_none());

        engine.restart();
        assert!(engine.is_running());
        assert!(engine.region(0, 0).is_some());
    }

    #[test]
    fn test_region_out_of_grid_is_none() {
        let engine = FlashDetectionEngine::new(test_config(2));
        assert!(engine.region(2, 0).is_none());
        assert!(engine.region(0, 2).is_none());
    }

    #[test]
    fn test_zero_grid_is_clamped_to_one_cell() {
        let mut engine = FlashDetectionEngine::new(DetectionConfig {
            grid_size: 0,
            samples_per_cell: 0,
            ..DetectionConfig::default()
        });
        assert_eq!(engine.config().grid_size, 1);
        assert_eq!(engine.config().samples_per_cell, 1);

        let frame = OwnedFrame::solid(64, 64, 100);
        assert!(engine.analyze_at(&frame.view(), Instant::now()).is_empty());
        assert_eq!(engine.stats().frames_analyzed, 1);
        assert!(engine.region(0, 0).is_some());

        engine.restart();
        assert!(engine.region(0, 0).is_some());
    }

    #[test]
    fn test_oversized_grid_is_clamped() {
        let engine = FlashDetectionEngine::new(DetectionConfig {
            grid_size: usize::MAX,
            samples_per_cell: usize::MAX,
            ..DetectionConfig::default()
        });
        assert_eq!(engine.config().grid_size, defaults::MAX_GRID_SIZE);
        assert_eq!(engine.config().samples_per_cell, defaults::MAX_SAMPLES_PER_CELL);
        let last = defaults::MAX_GRID_SIZE - 1;
        assert!(engine.region(last, last).is_some());
    }
}
