//! System-wide default constants.
//!
//! Every tunable here has a matching config field; these are only the values
//! used when the field is absent from the TOML file.

// ============================================================================
// Detection
// ============================================================================

/// Grid cells per axis (8 = 64 independently tracked regions).
pub const GRID_SIZE: usize = 8;

/// Sample points per cell axis (5 = 25 luminance samples per cell).
pub const SAMPLES_PER_CELL: usize = 5;

/// Minimum luminance change (0-255 scale) that counts as a transition.
///
/// Large enough that scroll and pan contrast drift stays below it.
pub const LUMINANCE_THRESHOLD: f64 = 50.0;

/// Direction reversals inside one window that constitute flashing.
///
/// Two reversals make one flash; WCAG 2.1 draws the line at three flashes
/// per second.
pub const REVERSALS_REQUIRED: usize = 6;

/// Sliding window for reversal counting (milliseconds).
pub const WINDOW_MS: u64 = 1_000;

/// Largest grid accepted by validation (per axis).
pub const MAX_GRID_SIZE: usize = 64;

/// Largest sample density accepted by validation (per axis).
pub const MAX_SAMPLES_PER_CELL: usize = 32;

// ============================================================================
// Alerting
// ============================================================================

/// Minimum gap between two warnings (milliseconds).
pub const COOLDOWN_MS: u64 = 1_500;

/// Default user-initiated pause length (seconds). 300 = 5 minutes.
pub const PAUSE_DURATION_SECS: u64 = 300;

/// Number handed to the dialer when the user asks for help from the warning.
pub const EMERGENCY_CONTACT: &str = "911";

// ============================================================================
// Runtime
// ============================================================================

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "FLASH_GUARD_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "flash_guard.toml";

/// Synthetic capture rate (frames per second).
pub const SYNTHETIC_FPS: u32 = 30;

/// Synthetic frame size. Half of a 1280x720 display, like a scaled capture.
pub const SYNTHETIC_WIDTH: usize = 640;
pub const SYNTHETIC_HEIGHT: usize = 360;

/// Frames between periodic status lines from the processing loop.
pub const STATUS_LOG_INTERVAL_FRAMES: u64 = 300;
