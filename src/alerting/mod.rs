//! Alerting: protection lifecycle, the cooldown/pause coordinator, and the
//! command boundary towards the presentation layer.

mod coordinator;
pub mod presentation;
pub mod protection;

pub use coordinator::{AlertCoordinator, AlertStats};
pub use presentation::{
    ChannelSink, NullSink, PresentationCommand, PresentationSink, RaiseWarning, WarningResponse,
};
pub use protection::{ProtectionCell, ProtectionState};
