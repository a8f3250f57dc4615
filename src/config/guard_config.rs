//! Guard Configuration - detection and alerting thresholds as TOML values
//!
//! Every threshold the engine uses is a field here. Each struct implements
//! `Default` with the values from [`super::defaults`], so a missing config
//! file behaves exactly like the built-in constants.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one FlashGuard deployment.
///
/// Load with `GuardConfig::load()` which searches:
/// 1. `$FLASH_GUARD_CONFIG` env var
/// 2. `./flash_guard.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Flash detection engine tuning
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Alert coordinator timing
    #[serde(default)]
    pub alerting: AlertingConfig,
}

impl GuardConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FLASH_GUARD_CONFIG` environment variable
    /// 2. `./flash_guard.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded guard config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded guard config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings (with a suggestion when one is
    /// close enough) and never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Guard config saved");
        Ok(())
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Grid size and sample density must be in 1..=max
    /// - Luminance threshold must be finite and inside the 0-255 scale
    /// - At least two reversals (one full flash) are required
    /// - Window, cooldown and pause must be non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let d = &self.detection;
        if d.grid_size == 0 || d.grid_size > defaults::MAX_GRID_SIZE {
            errors.push(format!(
                "detection.grid_size = {} must be in 1..={}",
                d.grid_size,
                defaults::MAX_GRID_SIZE
            ));
        }
        if d.samples_per_cell == 0 || d.samples_per_cell > defaults::MAX_SAMPLES_PER_CELL {
            errors.push(format!(
                "detection.samples_per_cell = {} must be in 1..={}",
                d.samples_per_cell,
                defaults::MAX_SAMPLES_PER_CELL
            ));
        }
        if !d.luminance_threshold.is_finite() {
            errors.push(format!(
                "detection.luminance_threshold must be finite (got {})",
                d.luminance_threshold
            ));
        } else if !(0.0..255.0).contains(&d.luminance_threshold) {
            errors.push(format!(
                "detection.luminance_threshold = {:.1} is outside the luminance scale (0-255)",
                d.luminance_threshold
            ));
        }
        if d.reversals_required < 2 {
            errors.push(format!(
                "detection.reversals_required = {} must be >= 2 (one full flash)",
                d.reversals_required
            ));
        }
        if d.window_ms == 0 {
            errors.push("detection.window_ms must be > 0".to_string());
        }

        let a = &self.alerting;
        if a.cooldown_ms == 0 {
            errors.push("alerting.cooldown_ms must be > 0".to_string());
        }
        if a.pause_duration_secs == 0 {
            errors.push("alerting.pause_duration_secs must be > 0".to_string());
        }
        if a.emergency_contact.trim().is_empty() {
            errors.push("alerting.emergency_contact must not be empty".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Detection
// ============================================================================

/// Flash detection engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Cells per grid axis
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,

    /// Sample points per cell axis
    #[serde(default = "default_samples_per_cell")]
    pub samples_per_cell: usize,

    /// Luminance change that counts as a transition (0-255 scale)
    #[serde(default = "default_luminance_threshold")]
    pub luminance_threshold: f64,

    /// Reversals inside one window that mean "flashing"
    #[serde(default = "default_reversals_required")]
    pub reversals_required: usize,

    /// Sliding window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_grid_size() -> usize { defaults::GRID_SIZE }
fn default_samples_per_cell() -> usize { defaults::SAMPLES_PER_CELL }
fn default_luminance_threshold() -> f64 { defaults::LUMINANCE_THRESHOLD }
fn default_reversals_required() -> usize { defaults::REVERSALS_REQUIRED }
fn default_window_ms() -> u64 { defaults::WINDOW_MS }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            samples_per_cell: default_samples_per_cell(),
            luminance_threshold: default_luminance_threshold(),
            reversals_required: default_reversals_required(),
            window_ms: default_window_ms(),
        }
    }
}

impl DetectionConfig {
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub const fn cell_count(&self) -> usize {
        self.grid_size * self.grid_size
    }
}

// ============================================================================
// Alerting
// ============================================================================

/// Alert coordinator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Minimum gap between warnings in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Length of a user-initiated pause in seconds
    #[serde(default = "default_pause_duration_secs")]
    pub pause_duration_secs: u64,

    /// Number dialled from the warning's "call for help" action
    #[serde(default = "default_emergency_contact")]
    pub emergency_contact: String,
}

fn default_cooldown_ms() -> u64 { defaults::COOLDOWN_MS }
fn default_pause_duration_secs() -> u64 { defaults::PAUSE_DURATION_SECS }
fn default_emergency_contact() -> String { defaults::EMERGENCY_CONTACT.to_string() }

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            pause_duration_secs: default_pause_duration_secs(),
            emergency_contact: default_emergency_contact(),
        }
    }
}

impl AlertingConfig {
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub const fn pause_duration(&self) -> Duration {
        Duration::from_secs(self.pause_duration_secs)
    }
}
