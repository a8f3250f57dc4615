//! Region Oscillation Tracker - per-cell reversal counting over a sliding window
//!
//! A cell is "flashing" once its luminance has reversed direction (bright to
//! dark or dark to bright) at least `reversals_required` times within the
//! trailing window. Two reversals make one flash, so the default of six
//! reversals per 1000 ms is WCAG 2.1's "more than three flashes per second".
//!
//! Changes at or below the luminance threshold never move the direction, and
//! a change that keeps going the same way is never a reversal. Scrolling and
//! panning produce large but monotonic drift and are therefore ignored.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::DetectionConfig;

/// Sign of the last above-threshold luminance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rising,
    Falling,
}

/// Thresholds one tracker needs, copied out of [`DetectionConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillationThresholds {
    pub luminance_threshold: f64,
    pub reversals_required: usize,
    pub window: Duration,
}

impl From<&DetectionConfig> for OscillationThresholds {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            luminance_threshold: config.luminance_threshold,
            reversals_required: config.reversals_required,
            window: config.window(),
        }
    }
}

impl Default for OscillationThresholds {
    fn default() -> Self {
        Self::from(&DetectionConfig::default())
    }
}

/// Outcome of feeding one luminance observation to a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// First observation; nothing to compare against yet.
    Primed,
    /// Not flashing.
    Steady,
    /// Reversal threshold reached; carries the count that triggered it.
    Flashing { reversals: usize },
}

impl Verdict {
    pub const fn is_flashing(&self) -> bool {
        matches!(self, Verdict::Flashing { .. })
    }
}

/// Oscillation state of one grid cell.
#[derive(Debug, Clone, Default)]
pub struct RegionTracker {
    previous_luminance: Option<f64>,
    last_direction: Option<Direction>,
    reversal_timestamps: VecDeque<Instant>,
}

impl RegionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to the unobserved state.
    pub fn reset(&mut self) {
        self.previous_luminance = None;
        self.last_direction = None;
        self.reversal_timestamps.clear();
    }

    pub const fn previous_luminance(&self) -> Option<f64> {
        self.previous_luminance
    }

    pub const fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    /// Reversals currently inside the window (as of the last update).
    pub fn reversal_count(&self) -> usize {
        self.reversal_timestamps.len()
    }

    pub fn reversal_timestamps(&self) -> impl Iterator<Item = &Instant> {
        self.reversal_timestamps.iter()
    }

    /// Feed one observation taken at `now`.
    ///
    /// `now` must not go backwards between calls on the same tracker.
    pub fn update(
        &mut self,
        luminance: f64,
        now: Instant,
        thresholds: &OscillationThresholds,
    ) -> Verdict {
        let Some(previous) = self.previous_luminance else {
            self.previous_luminance = Some(luminance);
            return Verdict::Primed;
        };

        let delta = luminance - previous;
        if delta.abs() <= thresholds.luminance_threshold {
            self.previous_luminance = Some(luminance);
            return Verdict::Steady;
        }

        let direction = if delta > 0.0 {
            Direction::Rising
        } else {
            Direction::Falling
        };

        let mut verdict = Verdict::Steady;
        if self.last_direction.is_some_and(|last| last != direction) {
            self.reversal_timestamps.push_back(now);
            self.prune(now, thresholds.window);

            let reversals = self.reversal_timestamps.len();
            if reversals >= thresholds.reversals_required {
                // cleared so a sustained strobe re-arms instead of firing every frame
                self.reversal_timestamps.clear();
                verdict = Verdict::Flashing { reversals };
            }
        }

        self.last_direction = Some(direction);
        self.previous_luminance = Some(luminance);
        verdict
    }

    /// Drop reversals older than `now - window`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.reversal_timestamps.front() {
            if now.saturating_duration_since(oldest) > window {
                self.reversal_timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
