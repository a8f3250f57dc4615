//! Protection State - process-wide Active / Paused / Inactive lifecycle
//!
//! Stored in an [`ArcSwap`] so readers on the analysis path never take a
//! lock; writers (pause/resume from the UI context) swap a whole new value.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;

/// Whether warnings are currently being forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionState {
    /// Monitoring and warning
    Active,
    /// User suppressed warnings until the given instant
    Paused { until: Instant },
    /// No capture session running
    Inactive,
}

impl ProtectionState {
    /// Paused with an expiry still in the future relative to `now`.
    pub fn is_paused_at(&self, now: Instant) -> bool {
        matches!(self, ProtectionState::Paused { until } if now < *until)
    }

    /// The state as a reader at `now` should see it: an expired pause reads
    /// as `Active`.
    pub fn effective_at(self, now: Instant) -> Self {
        match self {
            ProtectionState::Paused { until } if now >= until => ProtectionState::Active,
            other => other,
        }
    }
}

impl std::fmt::Display for ProtectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectionState::Active => write!(f, "Active"),
            ProtectionState::Paused { until } => {
                let remaining = until.saturating_duration_since(Instant::now());
                write!(f, "Paused ({}s remaining)", remaining.as_secs())
            }
            ProtectionState::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Shared, lock-free holder of the current [`ProtectionState`].
#[derive(Debug)]
pub struct ProtectionCell {
    state: ArcSwap<ProtectionState>,
}

impl ProtectionCell {
    pub fn new(initial: ProtectionState) -> Self {
        Self {
            state: ArcSwap::from_pointee(initial),
        }
    }

    /// The stored state, without expiry applied.
    pub fn load(&self) -> ProtectionState {
        **self.state.load()
    }

    /// Unconditionally replace the state, returning the previous one.
    pub fn replace(&self, next: ProtectionState) -> ProtectionState {
        *self.state.swap(Arc::new(next))
    }

    /// Apply `f` atomically, returning the state it replaced.
    ///
    /// `f` may run more than once if another context swaps concurrently.
    pub fn update<F>(&self, mut f: F) -> ProtectionState
    where
        F: FnMut(ProtectionState) -> ProtectionState,
    {
        let previous = self.state.rcu(|current| Arc::new(f(**current)));
        *previous
    }

    /// Turn an expired pause into `Active`.
    ///
    /// Returns `true` for exactly one caller per expired pause, even when
    /// several contexts race to observe the expiry.
    pub fn expire_pause(&self, now: Instant) -> bool {
        let expired =
            |s: ProtectionState| matches!(s, ProtectionState::Paused { until } if now >= until);
        if !expired(self.load()) {
            return false;
        }
        expired(self.update(|s| s.effective_at(now)))
    }
}

impl Default for ProtectionCell {
    fn default() -> Self {
        Self::new(ProtectionState::Inactive)
    }
}
