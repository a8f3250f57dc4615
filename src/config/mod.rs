//! Guard Configuration Module
//!
//! Provides detection and alerting configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. Explicit path (the binary's `--config` flag)
//! 2. `FLASH_GUARD_CONFIG` environment variable (path to TOML file)
//! 3. `flash_guard.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Configuration is passed explicitly into the engine and coordinator rather
//! than read from a global, so tests can run with accelerated values.

mod guard_config;
pub mod defaults;
pub mod validation;

pub use guard_config::*;
