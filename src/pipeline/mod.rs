//! Frame Pipeline
//!
//! ```text
//! FrameSource ──► ProcessingLoop ──► FlashDetectionEngine ──► AlertCoordinator ──► PresentationSink
//!   (synthetic,       (worker,           (per-frame,             (cooldown,           (channel to
//!    raw stream)       cancellable)       per-cell)               pause)               the UI)
//! ```

pub mod processing_loop;
pub mod source;

use crate::alerting::AlertStats;
use crate::detection::EngineStats;

pub use processing_loop::ProcessingLoop;
pub use source::{
    CapturedFrame, FrameEvent, FrameSource, Pattern, RawFrameSource, SyntheticConfig,
    SyntheticSource,
};

/// Totals for one processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_received: u64,
    pub flash_events: u64,
    pub warnings_raised: u64,
    /// The run ended because the source failed rather than reaching its end
    pub source_error: bool,
    pub engine: EngineStats,
    pub alerts: AlertStats,
}
