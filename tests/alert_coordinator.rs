//! Alert Coordinator Tests
//!
//! Cooldown, pause/resume and warning-screen actions, observed through the
//! commands that reach the presentation channel.

use flash_guard::alerting::{
    AlertCoordinator, ChannelSink, PresentationCommand, ProtectionState, WarningResponse,
};
use flash_guard::config::AlertingConfig;
use flash_guard::detection::FlashDetected;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

fn setup(
    config: AlertingConfig,
) -> (Arc<AlertCoordinator>, UnboundedReceiver<PresentationCommand>) {
    let (sink, rx) = ChannelSink::channel();
    let coordinator = Arc::new(AlertCoordinator::new(&config, Arc::new(sink)));
    coordinator.activate();
    (coordinator, rx)
}

fn event(row: usize, col: usize, at: Instant) -> FlashDetected {
    FlashDetected {
        cell_row: row,
        cell_col: col,
        reversal_count: 6,
        timestamp: at,
    }
}

fn drain(rx: &mut UnboundedReceiver<PresentationCommand>) -> Vec<PresentationCommand> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn warnings(commands: &[PresentationCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, PresentationCommand::RaiseWarning(_)))
        .count()
}

#[test]
fn at_most_one_warning_per_cooldown_interval() {
    let (coordinator, mut rx) = setup(AlertingConfig::default());
    let t0 = Instant::now();

    // a burst of events from many cells over 3 seconds, every 100 ms
    for i in 0..30u32 {
        let at = t0 + Duration::from_millis(100) * i;
        coordinator.on_flash_detected_at(&event((i % 8) as usize, 0, at), at);
    }

    let commands = drain(&mut rx);
    // raised at 0 ms and 1600 ms; 3000 ms is never reached
    assert_eq!(warnings(&commands), 2);
    let stats = coordinator.stats();
    assert_eq!(stats.warnings_raised, 2);
    assert_eq!(stats.suppressed_cooldown, 28);
}

#[test]
fn warning_carries_triggering_cell() {
    let (coordinator, mut rx) = setup(AlertingConfig::default());
    let t0 = Instant::now();
    let raised = coordinator
        .on_flash_detected_at(&event(3, 5, t0), t0)
        .expect("first event raises");
    assert_eq!(raised.trigger.cell_row, 3);
    assert_eq!(raised.trigger.cell_col, 5);
    assert_eq!(raised.raised_at, t0);
    assert_eq!(drain(&mut rx), vec![PresentationCommand::RaiseWarning(raised)]);
}

#[test]
fn no_warnings_while_paused_and_exactly_at_expiry_succeeds() {
    let (coordinator, mut rx) = setup(AlertingConfig::default());
    let t0 = Instant::now();
    let until = coordinator.pause_at(t0, Duration::from_secs(300));
    assert_eq!(until, t0 + Duration::from_secs(300));

    for secs in [0, 1, 60, 299] {
        let at = t0 + Duration::from_secs(secs);
        assert!(coordinator.on_flash_detected_at(&event(0, 0, at), at).is_none());
    }
    assert!(coordinator.is_paused_at(until - Duration::from_millis(1)));
    assert!(!coordinator.is_paused_at(until));

    assert!(coordinator.on_flash_detected_at(&event(0, 0, until), until).is_some());
    assert_eq!(coordinator.protection_state_at(until), ProtectionState::Active);

    let names: Vec<&str> = drain(&mut rx).iter().map(PresentationCommand::name).collect();
    assert_eq!(
        names,
        vec!["show_paused_indicator", "hide_paused_indicator", "raise_warning"]
    );
    assert_eq!(coordinator.stats().suppressed_paused, 4);
}

#[test]
fn resume_resets_cooldown() {
    let (coordinator, mut rx) = setup(AlertingConfig::default());
    let t0 = Instant::now();
    assert!(coordinator.on_flash_detected_at(&event(0, 0, t0), t0).is_some());

    let pause_at = t0 + Duration::from_millis(100);
    coordinator.pause_at(pause_at, Duration::from_secs(300));
    let resume_at = t0 + Duration::from_millis(200);
    assert!(coordinator.resume_at(resume_at));

    // well inside the original cooldown, but resume cleared it
    let again = t0 + Duration::from_millis(300);
    assert!(coordinator.on_flash_detected_at(&event(0, 0, again), again).is_some());

    let commands = drain(&mut rx);
    assert_eq!(warnings(&commands), 2);
    assert!(commands.contains(&PresentationCommand::HidePausedIndicator));
}

#[test]
fn pause_without_resume_keeps_cooldown() {
    let config = AlertingConfig {
        cooldown_ms: 10_000,
        ..AlertingConfig::default()
    };
    let (coordinator, _rx) = setup(config);
    let t0 = Instant::now();
    assert!(coordinator.on_flash_detected_at(&event(0, 0, t0), t0).is_some());

    coordinator.pause_at(t0, Duration::from_secs(2));
    let after_pause = t0 + Duration::from_secs(3);
    assert!(coordinator.on_flash_detected_at(&event(0, 0, after_pause), after_pause).is_none());
    assert_eq!(coordinator.stats().suppressed_cooldown, 1);
}

#[test]
fn resume_when_not_paused_changes_nothing() {
    let (coordinator, mut rx) = setup(AlertingConfig::default());
    let t0 = Instant::now();
    coordinator.on_flash_detected_at(&event(0, 0, t0), t0);
    drain(&mut rx);

    assert!(!coordinator.resume_at(t0 + Duration::from_millis(10)));
    assert!(drain(&mut rx).is_empty());

    // cooldown still in force
    let soon = t0 + Duration::from_millis(500);
    assert!(coordinator.on_flash_detected_at(&event(0, 0, soon), soon).is_none());
}

#[test]
fn inactive_coordinator_drops_everything() {
    let (sink, mut rx) = ChannelSink::channel();
    let coordinator = AlertCoordinator::new(&AlertingConfig::default(), Arc::new(sink));
    assert_eq!(coordinator.protection_state(), ProtectionState::Inactive);

    let t0 = Instant::now();
    assert!(coordinator.on_flash_detected_at(&event(0, 0, t0), t0).is_none());
    assert!(drain(&mut rx).is_empty());
    assert_eq!(coordinator.stats().suppressed_inactive, 1);
}

#[test]
fn pause_after_shutdown_never_reactivates() {
    let (coordinator, mut rx) = setup(AlertingConfig::default());
    coordinator.deactivate();
    drain(&mut rx);

    let t0 = Instant::now();
    coordinator.pause_at(t0, Duration::from_secs(1));
    let later = t0 + Duration::from_secs(2);
    assert!(coordinator.on_flash_detected_at(&event(0, 0, later), later).is_none());
    assert_eq!(coordinator.protection_state_at(later), ProtectionState::Inactive);

    // the warning-screen pause after shutdown still dismisses, but shows nothing
    coordinator.respond(WarningResponse::PauseProtection);
    assert_eq!(drain(&mut rx), vec![PresentationCommand::DismissWarning]);
    assert_eq!(coordinator.protection_state(), ProtectionState::Inactive);
}

#[test]
fn warning_screen_actions_dispatch_expected_commands() {
    let config = AlertingConfig {
        emergency_contact: "+44 20 7946 0000".to_string(),
        ..AlertingConfig::default()
    };
    let (coordinator, mut rx) = setup(config);

    coordinator.respond(WarningResponse::Dismiss);
    assert_eq!(drain(&mut rx), vec![PresentationCommand::DismissWarning]);

    coordinator.respond(WarningResponse::CloseForegroundApp);
    assert_eq!(
        drain(&mut rx),
        vec![
            PresentationCommand::CloseForegroundApp,
            PresentationCommand::DismissWarning
        ]
    );

    coordinator.respond(WarningResponse::CallEmergencyContact);
    assert_eq!(
        drain(&mut rx),
        vec![
            PresentationCommand::DialEmergencyContact {
                number: "+44 20 7946 0000".to_string()
            },
            PresentationCommand::DismissWarning
        ]
    );

    coordinator.respond(WarningResponse::PauseProtection);
    assert!(coordinator.is_paused());
    let names: Vec<&str> = drain(&mut rx).iter().map(PresentationCommand::name).collect();
    assert_eq!(names, vec!["show_paused_indicator", "dismiss_warning"]);
}

#[test]
fn shared_across_threads() {
    let (coordinator, mut rx) = setup(AlertingConfig::default());
    let t0 = Instant::now();

    let handles: Vec<_> = (0..4)
        .map(|row| {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                coordinator.on_flash_detected_at(&event(row, 0, t0), t0).is_some()
            })
        })
        .collect();
    let raised = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .filter(|raised| *raised)
        .count();

    assert_eq!(raised, 1);
    assert_eq!(warnings(&drain(&mut rx)), 1);
}
