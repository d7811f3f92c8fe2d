//! Hazard → latch → supervisor → panel flows, driven through the service.

use super::mock_hw::{PanelCall, Rig};

use ventcore::alarm::AlarmStatus;
use ventcore::alarm::table::AlarmId;
use ventcore::app::commands::VentCommand;
use ventcore::app::events::VentEvent;
use ventcore::error::Hazard;
use ventcore::events::TriggerId;
use ventcore::fsm::BreathState;

/// Finish a breath that already left INHALE, ending at the next INHALE.
fn finish_breath(rig: &mut Rig) {
    rig.svc.motor_move_complete();
    rig.run_until(BreathState::Exhale, 1_000);
    rig.svc.motor_move_complete();
    rig.run_until(BreathState::Inhale, 4_000);
}

/// Over-pressure late in a full-volume inhale, so the shortened breath
/// stays within the rate tolerance.
fn late_over_pressure(rig: &mut Rig) {
    rig.hw.volume_ml = 400;
    rig.advance(1_000);
    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();
    assert_eq!(rig.svc.state(), BreathState::Plateau);
}

fn cleared(rig: &Rig, hazard: Hazard) -> bool {
    rig.sink
        .events
        .iter()
        .any(|e| *e == VentEvent::HazardCleared(hazard))
}

#[test]
fn over_pressure_cuts_inhale_and_raises_high_alarm() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(300);

    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();

    assert_eq!(rig.svc.state(), BreathState::Plateau);
    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::HighPressure));
    assert_eq!(rig.sink.raised(), [AlarmId::HighPressure]);

    assert_eq!(rig.panel.screen, Some((AlarmId::HighPressure, 45.0)));
    assert!(rig.panel.light, "high priority light starts in the on phase");
    assert!(rig.panel.buzzer, "high priority sound is continuous");
}

#[test]
fn under_pressure_is_reported_without_transition() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);

    rig.hw.raise(TriggerId::UnderPressure, 1.0);
    rig.tick();

    assert_eq!(rig.svc.state(), BreathState::Inhale);
    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::LowPeep));
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        VentEvent::HazardReported(r) if r.hazard == Hazard::PeepNotMaintained
    )));
}

#[test]
fn alerts_in_idle_are_dropped() {
    let mut rig = Rig::new();
    rig.hw.raise(TriggerId::OverPressure, 60.0);
    rig.tick();

    assert!(rig.hw.alerts.is_empty(), "alert must still be drained");
    assert!(rig.svc.alarms().is_idle());
    assert_eq!(rig.svc.state(), BreathState::Idle);
}

#[test]
fn higher_priority_preempts_and_queues_incumbent() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);

    rig.hw.raise(TriggerId::UnderPressure, 1.0);
    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();

    let alarms = rig.svc.alarms();
    assert_eq!(alarms.latched(), Some(AlarmId::HighPressure));
    assert_eq!(alarms.status(AlarmId::LowPeep), AlarmStatus::Queued);
    assert_eq!(alarms.queued_count(), 1);
    assert_eq!(rig.panel.screen, Some((AlarmId::HighPressure, 45.0)));
}

#[test]
fn silence_promotes_queued_alarm_and_counts_silenced() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);
    rig.hw.raise(TriggerId::UnderPressure, 1.0);
    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();

    rig.command(VentCommand::Silence);
    rig.tick();

    let alarms = rig.svc.alarms();
    assert_eq!(alarms.status(AlarmId::HighPressure), AlarmStatus::Silenced);
    assert_eq!(alarms.latched(), Some(AlarmId::LowPeep));
    assert_eq!(rig.panel.screen, Some((AlarmId::LowPeep, 1.0)));
    assert_eq!(rig.panel.silenced_count, 1);
}

#[test]
fn hazard_resolves_after_clean_cycles() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    late_over_pressure(&mut rig);
    assert!(rig.svc.latch().is_alarmed(Hazard::PipExceeded));

    // Breath 1 is evaluated at breath 2's entry with PIP 45: reported
    // again, so the alarm survives two boundaries.
    finish_breath(&mut rig);
    rig.breathe(400);
    assert!(!cleared(&rig, Hazard::PipExceeded));
    assert!(rig.svc.latch().is_alarmed(Hazard::PipExceeded));

    rig.breathe(400);
    assert!(cleared(&rig, Hazard::PipExceeded));
    assert!(!rig.svc.latch().is_alarmed(Hazard::PipExceeded));

    // Still latched until acknowledged; acknowledging a cleared
    // condition turns it off.
    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::HighPressure));
    rig.command(VentCommand::Silence);
    rig.tick();
    assert!(rig.svc.alarms().is_idle());
    assert_eq!(rig.panel.screen, None);
    assert!(!rig.panel.light);
    assert!(!rig.panel.buzzer);
}

#[test]
fn silenced_alarm_clears_when_condition_resolves() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    late_over_pressure(&mut rig);
    rig.command(VentCommand::Silence);
    rig.tick();
    assert_eq!(rig.panel.silenced_count, 1);

    finish_breath(&mut rig);
    rig.breathe(400);
    rig.breathe(400);

    assert_eq!(rig.svc.alarms().status(AlarmId::HighPressure), AlarmStatus::Off);
    assert!(rig.svc.alarms().is_idle());
    assert_eq!(rig.panel.silenced_count, 0);
}

#[test]
fn low_volume_breath_raises_middle_alarm() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.breathe(50);

    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::LowTidalVolume));
    assert_eq!(rig.panel.screen, Some((AlarmId::LowTidalVolume, 50.0)));
}

#[test]
fn high_volume_breath_raises_middle_alarm() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.breathe(1200);

    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::HighTidalVolume));
    assert_eq!(rig.panel.screen, Some((AlarmId::HighTidalVolume, 1200.0)));
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        VentEvent::HazardReported(r) if r.hazard == Hazard::TidalVolumeExceeded
    )));
}

#[test]
fn flat_pressure_raises_disconnect() {
    let mut rig = Rig::new();
    rig.hw.stats.min = 10.0;
    rig.hw.stats.max = 12.0;
    rig.command(VentCommand::Start);
    rig.breathe(400);

    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::Disconnect));
    assert_eq!(rig.panel.screen, Some((AlarmId::Disconnect, 2.0)));
}

#[test]
fn silence_timeout_re_raises_alarm() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);
    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();
    rig.command(VentCommand::Abort);
    rig.command(VentCommand::Silence);
    rig.tick();
    assert_eq!(rig.svc.alarms().status(AlarmId::HighPressure), AlarmStatus::Silenced);

    rig.advance(120_000);
    assert_eq!(rig.svc.alarms().status(AlarmId::HighPressure), AlarmStatus::Silenced);

    rig.advance(20);
    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::HighPressure));
    assert_eq!(rig.panel.silenced_count, 0);
}

#[test]
fn pause_audio_mutes_buzzer_only() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);
    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();
    assert!(rig.panel.buzzer);

    rig.command(VentCommand::PauseAudio);
    rig.tick();
    assert!(!rig.panel.buzzer);
    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::HighPressure));
    assert!(rig.panel.screen.is_some());
}

#[test]
fn panel_is_only_written_on_change() {
    let mut rig = Rig::new();
    rig.tick();
    let first = rig.panel.calls.len();
    assert!(first > 0, "first tick pushes the whole presentation");

    rig.advance(500);
    assert_eq!(rig.panel.calls.len(), first);
    assert!(rig.panel.calls.contains(&PanelCall::ClearAlarm));
}

#[test]
fn failed_indicator_write_is_retried() {
    let mut rig = Rig::new();
    rig.panel.indicators_stuck = true;
    rig.command(VentCommand::Start);
    rig.advance(100);
    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();
    assert!(!rig.panel.buzzer);

    rig.advance(30);
    let attempts = rig
        .panel
        .calls
        .iter()
        .filter(|c| **c == PanelCall::Buzzer(true))
        .count();
    assert!(attempts >= 2, "continuous buzzer rewritten while it reads off");

    rig.panel.indicators_stuck = false;
    rig.advance(10);
    assert!(rig.panel.buzzer);

    // Once applied, a steady output is not rewritten.
    let writes = rig.panel.calls.len();
    rig.tick();
    assert_eq!(
        rig.panel
            .calls
            .iter()
            .skip(writes)
            .filter(|c| matches!(c, PanelCall::Buzzer(_)))
            .count(),
        0
    );
}
