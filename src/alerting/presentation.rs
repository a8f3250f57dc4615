//! Presentation boundary - commands for the UI layer and how they are delivered
//!
//! The coordinator only ever *dispatches*; it never waits on the UI. The
//! provided [`ChannelSink`] hands commands to an unbounded tokio channel that
//! the presentation context drains on its own schedule.

use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

use crate::detection::FlashDetected;

/// Full-screen warning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaiseWarning {
    /// The detection that triggered this warning
    pub trigger: FlashDetected,
    pub raised_at: Instant,
}

/// Everything the core asks the presentation layer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationCommand {
    /// Show the full-screen flashing warning
    RaiseWarning(RaiseWarning),
    /// Take the warning down (user dismissed it)
    DismissWarning,
    /// Show the small persistent "protection paused" affordance
    ShowPausedIndicator { until: Instant },
    /// Remove the paused affordance
    HidePausedIndicator,
    /// Send the offending foreground app away
    CloseForegroundApp,
    /// Open the dialer with the configured emergency contact
    DialEmergencyContact { number: String },
}

impl PresentationCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            PresentationCommand::RaiseWarning(_) => "raise_warning",
            PresentationCommand::DismissWarning => "dismiss_warning",
            PresentationCommand::ShowPausedIndicator { .. } => "show_paused_indicator",
            PresentationCommand::HidePausedIndicator => "hide_paused_indicator",
            PresentationCommand::CloseForegroundApp => "close_foreground_app",
            PresentationCommand::DialEmergencyContact { .. } => "dial_emergency_contact",
        }
    }
}

/// Actions offered on the warning screen, reported back by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningResponse {
    Dismiss,
    PauseProtection,
    CloseForegroundApp,
    CallEmergencyContact,
}

/// Fire-and-forget delivery of presentation commands.
///
/// Implementations must return promptly; they are called from the frame
/// worker and must never block on UI work.
pub trait PresentationSink: Send + Sync {
    fn dispatch(&self, command: PresentationCommand);
}

/// Sink backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PresentationCommand>,
}

impl ChannelSink {
    pub const fn new(tx: mpsc::UnboundedSender<PresentationCommand>) -> Self {
        Self { tx }
    }

    /// A sink plus the receiver the presentation context should drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PresentationCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl PresentationSink for ChannelSink {
    fn dispatch(&self, command: PresentationCommand) {
        let name = command.name();
        if self.tx.send(command).is_err() {
            // presentation side already gone (shutdown); nothing left to show
            debug!(command = name, "Presentation channel closed, command dropped");
        }
    }
}

/// Sink that discards everything (headless use, benchmarks).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn dispatch(&self, _command: PresentationCommand) {}
}
