//! Alert Coordinator - debounced, pausable warnings from detection events
//!
//! Consumes `FlashDetected` events from the frame worker and decides whether
//! the user should see a warning:
//!
//! 1. Paused and the pause has not expired → drop
//! 2. No capture session (Inactive) → drop
//! 3. Warned within the cooldown → drop
//! 4. Otherwise record the warning time and dispatch `RaiseWarning`
//!
//! Shared via `Arc` between the frame worker and whatever context handles
//! user input; every method takes `&self`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::presentation::{PresentationCommand, PresentationSink, RaiseWarning, WarningResponse};
use super::protection::{ProtectionCell, ProtectionState};
use crate::config::AlertingConfig;
use crate::detection::FlashDetected;

/// Snapshot of coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertStats {
    pub warnings_raised: u64,
    pub suppressed_paused: u64,
    pub suppressed_cooldown: u64,
    pub suppressed_inactive: u64,
}

#[derive(Debug, Default)]
struct Counters {
    warnings_raised: AtomicU64,
    suppressed_paused: AtomicU64,
    suppressed_cooldown: AtomicU64,
    suppressed_inactive: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AlertStats {
        AlertStats {
            warnings_raised: self.warnings_raised.load(Ordering::Relaxed),
            suppressed_paused: self.suppressed_paused.load(Ordering::Relaxed),
            suppressed_cooldown: self.suppressed_cooldown.load(Ordering::Relaxed),
            suppressed_inactive: self.suppressed_inactive.load(Ordering::Relaxed),
        }
    }
}

/// Turns detection events into at most one warning per cooldown window.
pub struct AlertCoordinator {
    cooldown: Duration,
    pause_duration: Duration,
    emergency_contact: String,
    protection: ProtectionCell,
    /// `None` means the next qualifying event is never held back by cooldown
    last_warning_at: Mutex<Option<Instant>>,
    sink: Arc<dyn PresentationSink>,
    counters: Counters,
}

impl AlertCoordinator {
    /// Create a coordinator in the `Inactive` state.
    pub fn new(config: &AlertingConfig, sink: Arc<dyn PresentationSink>) -> Self {
        Self {
            cooldown: config.cooldown(),
            pause_duration: config.pause_duration(),
            emergency_contact: config.emergency_contact.clone(),
            protection: ProtectionCell::default(),
            last_warning_at: Mutex::new(None),
            sink,
            counters: Counters::default(),
        }
    }

    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub const fn pause_duration(&self) -> Duration {
        self.pause_duration
    }

    pub fn stats(&self) -> AlertStats {
        self.counters.snapshot()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Capture started: `Inactive` becomes `Active`. A pause already in
    /// force is left alone.
    pub fn activate(&self) {
        let previous = self.protection.update(|s| match s {
            ProtectionState::Inactive => ProtectionState::Active,
            other => other,
        });
        if previous == ProtectionState::Inactive {
            info!("Protection active");
        }
    }

    /// Capture stopped: back to `Inactive`, cooldown cleared, indicator hidden.
    /// Idempotent.
    pub fn deactivate(&self) {
        let previous = self.protection.replace(ProtectionState::Inactive);
        *self.lock_cooldown() = None;
        if matches!(previous, ProtectionState::Paused { .. }) {
            self.sink.dispatch(PresentationCommand::HidePausedIndicator);
        }
        if previous != ProtectionState::Inactive {
            info!("Protection inactive");
        }
    }

    // ========================================================================
    // Detection events
    // ========================================================================

    pub fn on_flash_detected(&self, event: &FlashDetected) -> Option<RaiseWarning> {
        self.on_flash_detected_at(event, Instant::now())
    }

    /// Decide whether `event`, observed at `now`, becomes a warning.
    pub fn on_flash_detected_at(
        &self,
        event: &FlashDetected,
        now: Instant,
    ) -> Option<RaiseWarning> {
        self.expire_pause_at(now);

        match self.protection.load() {
            ProtectionState::Paused { until } if now < until => {
                Counters::bump(&self.counters.suppressed_paused);
                debug!(
                    cell_row = event.cell_row,
                    cell_col = event.cell_col,
                    "Flash suppressed: protection paused"
                );
                return None;
            }
            ProtectionState::Inactive => {
                Counters::bump(&self.counters.suppressed_inactive);
                debug!("Flash suppressed: protection inactive");
                return None;
            }
            _ => {}
        }

        {
            let mut last = self.lock_cooldown();
            if let Some(previous) = *last {
                let elapsed = now.saturating_duration_since(previous);
                if elapsed <= self.cooldown {
                    Counters::bump(&self.counters.suppressed_cooldown);
                    debug!(
                        cooldown_remaining_ms = (self.cooldown - elapsed).as_millis() as u64,
                        "Flash suppressed by cooldown"
                    );
                    return None;
                }
            }
            *last = Some(now);
        }

        let warning = RaiseWarning {
            trigger: *event,
            raised_at: now,
        };
        Counters::bump(&self.counters.warnings_raised);
        warn!(
            cell_row = event.cell_row,
            cell_col = event.cell_col,
            reversals = event.reversal_count,
            "Flashing content detected, raising warning"
        );
        self.sink.dispatch(PresentationCommand::RaiseWarning(warning));
        Some(warning)
    }

    // ========================================================================
    // Pause / resume
    // ========================================================================

    /// Pause for the configured duration. Returns the expiry.
    pub fn pause(&self) -> Instant {
        self.pause_at(Instant::now(), self.pause_duration)
    }

    pub fn pause_for(&self, duration: Duration) -> Instant {
        self.pause_at(Instant::now(), duration)
    }

    /// Pause until `now + duration`. An inactive coordinator stays inactive
    /// and shows no indicator; the expiry is still returned.
    pub fn pause_at(&self, now: Instant, duration: Duration) -> Instant {
        let until = now + duration;
        let previous = self.protection.update(|s| match s {
            ProtectionState::Inactive => ProtectionState::Inactive,
            _ => ProtectionState::Paused { until },
        });
        if previous == ProtectionState::Inactive {
            debug!("Pause requested while inactive, ignoring");
            return until;
        }
        info!(duration_secs = duration.as_secs(), "Protection paused");
        self.sink
            .dispatch(PresentationCommand::ShowPausedIndicator { until });
        until
    }

    /// Leave a pause early. Returns `false` (and does nothing) if not paused.
    pub fn resume(&self) -> bool {
        self.resume_at(Instant::now())
    }

    pub fn resume_at(&self, now: Instant) -> bool {
        self.expire_pause_at(now);

        let previous = self.protection.update(|s| {
            if s.is_paused_at(now) {
                ProtectionState::Active
            } else {
                s
            }
        });
        if !previous.is_paused_at(now) {
            debug!("Resume requested while not paused, ignoring");
            return false;
        }

        *self.lock_cooldown() = None;
        info!("Protection resumed");
        self.sink.dispatch(PresentationCommand::HidePausedIndicator);
        true
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused_at(Instant::now())
    }

    /// Pure query: stored expiry against `now`.
    pub fn is_paused_at(&self, now: Instant) -> bool {
        self.protection.load().is_paused_at(now)
    }

    pub fn protection_state(&self) -> ProtectionState {
        self.protection_state_at(Instant::now())
    }

    /// Current state with an expired pause reported as `Active`.
    pub fn protection_state_at(&self, now: Instant) -> ProtectionState {
        self.protection.load().effective_at(now)
    }

    /// Retire an expired pause and hide its indicator. Cheap when nothing
    /// has expired; the frame worker calls it once per frame.
    pub fn expire_pause_at(&self, now: Instant) -> bool {
        if self.protection.expire_pause(now) {
            info!("Pause expired, protection active");
            self.sink.dispatch(PresentationCommand::HidePausedIndicator);
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Warning screen actions
    // ========================================================================

    /// Handle the user's choice on the warning screen.
    pub fn respond(&self, response: WarningResponse) {
        debug!(?response, "Warning response");
        match response {
            WarningResponse::Dismiss => {}
            WarningResponse::PauseProtection => {
                self.pause();
            }
            WarningResponse::CloseForegroundApp => {
                self.sink.dispatch(PresentationCommand::CloseForegroundApp);
            }
            WarningResponse::CallEmergencyContact => {
                self.sink.dispatch(PresentationCommand::DialEmergencyContact {
                    number: self.emergency_contact.clone(),
                });
            }
        }
        self.sink.dispatch(PresentationCommand::DismissWarning);
    }

    fn lock_cooldown(&self) -> MutexGuard<'_, Option<Instant>> {
        // an Option<Instant> cannot be left half-written, so poisoning is harmless
        self.last_warning_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
