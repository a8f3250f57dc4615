//! Flash Guard: photosensitive seizure protection
//!
//! Watches a stream of screen frames for content that flashes more than
//! three times per second and raises a full-screen warning before the user
//! is exposed for long.
//!
//! ## Architecture
//!
//! - **Frame Model**: borrowed/owned pixel buffers with explicit strides
//! - **Detection**: per-cell luminance sampling and reversal counting on a G×G grid
//! - **Alerting**: cooldown, pause/resume and the command boundary to the UI
//! - **Pipeline**: frame sources and the cancellable worker loop
//! - **Config**: TOML configuration with validation and typo suggestions

pub mod alerting;
pub mod config;
pub mod detection;
pub mod frame;
pub mod pipeline;

// Re-export configuration
pub use config::{AlertingConfig, ConfigError, DetectionConfig, GuardConfig};

// Re-export frame model
pub use frame::{ChannelOrder, FrameError, FrameLayout, FrameView, OwnedFrame};

// Re-export detection
pub use detection::{EngineStats, FlashDetected, FlashDetectionEngine};

// Re-export alerting
pub use alerting::{
    AlertCoordinator, AlertStats, ChannelSink, PresentationCommand, PresentationSink,
    ProtectionState, RaiseWarning, WarningResponse,
};

// Re-export pipeline
pub use pipeline::{FrameSource, PipelineStats, ProcessingLoop};
