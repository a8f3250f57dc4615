//! Flash detection: luminance sampling, per-region oscillation tracking,
//! and the grid engine that drives both once per frame.

pub mod sampler;
pub mod tracker;
mod engine;

pub use engine::{EngineStats, FlashDetectionEngine, FlashDetected};
pub use sampler::{luminance, CellRect, LuminanceSampler};
pub use tracker::{Direction, OscillationThresholds, RegionTracker, Verdict};
