//! Integration tests for the VentService → controller → ports pipeline.

use super::mock_hw::{HwCall, Rig};

use ventcore::alarm::table::AlarmId;
use ventcore::app::commands::VentCommand;
use ventcore::app::events::VentEvent;
use ventcore::config::VentConfig;
use ventcore::error::Hazard;
use ventcore::events::{Comparison, TriggerId};
use ventcore::fsm::BreathState;
use ventcore::fsm::context::Direction;
use ventcore::params::VentMode;

// ── Start-up ─────────────────────────────────────────────────

#[test]
fn start_homes_motor_and_arms_triggers() {
    let rig = Rig::new();

    assert_eq!(rig.svc.state(), BreathState::Idle);
    assert!(rig.hw.homed(), "entering IDLE must home the mechanism");
    assert_eq!(rig.sink.events.last(), Some(&VentEvent::Started(BreathState::Idle)));

    let over = rig.hw.armed(TriggerId::OverPressure).expect("over-pressure armed");
    assert_eq!(over.comparison, Comparison::Above);
    assert_eq!(over.threshold_cmh2o, 40.0);
    let under = rig.hw.armed(TriggerId::UnderPressure).expect("under-pressure armed");
    assert_eq!(under.comparison, Comparison::Below);
    assert_eq!(under.threshold_cmh2o, 2.0);
}

#[test]
fn idle_ignores_time_passing() {
    let mut rig = Rig::new();
    rig.advance(10_000);
    assert_eq!(rig.svc.state(), BreathState::Idle);
    assert_eq!(rig.svc.run_cycles(), 0);
}

// ── START ────────────────────────────────────────────────────

#[test]
fn start_enters_inhale_and_compresses() {
    let mut rig = Rig::new();
    rig.hw.clear_calls();

    rig.command(VentCommand::Start);

    assert_eq!(rig.svc.state(), BreathState::Inhale);
    assert_eq!(rig.svc.run_cycles(), 1);
    assert!(matches!(
        rig.hw.last_motion(),
        Some(HwCall::MoveBy {
            direction: Direction::Compress,
            ..
        })
    ));
    assert!(rig.hw.calls.contains(&HwCall::StartWindow));
    assert!(rig.hw.calls.contains(&HwCall::ResetVolume));
    assert!(
        rig.sink
            .transitions()
            .contains(&(BreathState::Idle, BreathState::Inhale))
    );
}

#[test]
fn healthy_breaths_cycle_without_alarms() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);

    for _ in 0..3 {
        rig.breathe(400);
        assert_eq!(rig.svc.state(), BreathState::Inhale);
    }

    assert_eq!(rig.svc.run_cycles(), 4);
    assert!(rig.sink.raised().is_empty(), "raised {:?}", rig.sink.raised());
    assert!(rig.svc.alarms().is_idle());

    let metrics = rig.svc.last_metrics().expect("breath metrics published");
    assert_eq!(metrics.cycle, 3);
    assert_eq!(metrics.pip_cmh2o, 20.0);
    assert_eq!(metrics.peep_cmh2o, 5.0);
    assert_eq!(metrics.volume_ml, 400);
    assert!(metrics.period_ms.abs_diff(4000) <= 20, "period {}", metrics.period_ms);
}

#[test]
fn states_follow_the_cycle_order() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.breathe(400);

    let seen: Vec<_> = rig.sink.transitions().into_iter().map(|(_, to)| to).collect();
    assert_eq!(
        seen,
        [
            BreathState::Inhale,
            BreathState::Plateau,
            BreathState::Pause,
            BreathState::Exhale,
            BreathState::Inhale,
        ]
    );
}

#[test]
fn second_start_while_cycling_is_ignored() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);
    let events = rig.sink.events.len();

    rig.command(VentCommand::Start);

    assert_eq!(rig.svc.state(), BreathState::Inhale);
    assert_eq!(rig.svc.run_cycles(), 1);
    assert_eq!(rig.sink.events.len(), events);
}

// ── STOP / ABORT ─────────────────────────────────────────────

#[test]
fn stop_is_deferred_to_end_of_exhale() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(200);

    rig.command(VentCommand::Stop);
    assert!(rig.svc.stop_pending());
    assert_eq!(rig.svc.state(), BreathState::Inhale, "STOP must not cut a breath");

    rig.breathe(400);

    assert_eq!(rig.svc.state(), BreathState::Idle);
    assert!(!rig.svc.stop_pending());
    assert!(matches!(rig.hw.last_motion(), Some(HwCall::Home)));
}

#[test]
fn start_cancels_pending_stop() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.command(VentCommand::Stop);
    assert!(rig.svc.stop_pending());

    rig.command(VentCommand::Start);
    assert!(!rig.svc.stop_pending());

    rig.breathe(400);
    assert_eq!(rig.svc.state(), BreathState::Inhale);
}

#[test]
fn abort_mid_inhale_parks_immediately() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(300);
    rig.hw.clear_calls();

    rig.command(VentCommand::Abort);

    assert_eq!(rig.svc.state(), BreathState::Idle);
    assert_eq!(rig.hw.calls.first(), Some(&HwCall::Stop));
    assert!(rig.hw.homed());
    assert!(
        rig.sink
            .transitions()
            .contains(&(BreathState::Inhale, BreathState::Idle))
    );
}

#[test]
fn abort_in_idle_rehomes() {
    let mut rig = Rig::new();
    rig.hw.clear_calls();

    rig.command(VentCommand::Abort);

    assert_eq!(rig.svc.state(), BreathState::Idle);
    assert_eq!(rig.hw.calls, [HwCall::Stop, HwCall::Home]);
}

#[test]
fn restart_after_abort_counts_a_new_run() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.breathe(400);
    rig.command(VentCommand::Abort);
    assert_eq!(rig.svc.run_cycles(), 2);

    rig.command(VentCommand::Start);

    assert_eq!(rig.svc.run_cycles(), 1);
    assert_eq!(rig.svc.lifetime_cycles(), 3);
}

#[test]
fn exhale_returns_home_after_cut_short_inhale() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);
    rig.hw.raise(TriggerId::OverPressure, 45.0);
    rig.tick();
    assert_eq!(rig.svc.state(), BreathState::Plateau);
    rig.hw.clear_calls();

    rig.run_until(BreathState::Exhale, 1_000);

    assert_eq!(rig.hw.last_motion(), Some(&HwCall::Home));
    assert!(
        !rig.hw
            .calls
            .iter()
            .any(|c| matches!(c, HwCall::MoveBy { direction: Direction::Release, .. }))
    );
}

#[test]
fn restored_cycle_count_reaches_service_interval() {
    let config = VentConfig {
        maintenance_interval_cycles: 10,
        ..VentConfig::default()
    };
    let mut rig = Rig::with_config(config);
    rig.svc.restore_cycle_count(9);
    assert_eq!(rig.svc.lifetime_cycles(), 9);

    rig.command(VentCommand::Start);
    rig.tick();

    assert_eq!(rig.svc.lifetime_cycles(), 10);
    assert_eq!(rig.svc.alarms().latched(), Some(AlarmId::ServiceDue));
    assert_eq!(rig.panel.screen, Some((AlarmId::ServiceDue, 10.0)));
    assert!(rig.panel.light, "low priority light is solid");
    assert!(!rig.panel.buzzer, "service due is silent");
}

#[test]
fn below_service_interval_raises_nothing() {
    let config = VentConfig {
        maintenance_interval_cycles: 10,
        ..VentConfig::default()
    };
    let mut rig = Rig::with_config(config);
    rig.svc.restore_cycle_count(8);

    rig.command(VentCommand::Start);
    rig.tick();

    assert_eq!(rig.svc.lifetime_cycles(), 9);
    assert!(rig.svc.alarms().is_idle());
}

// ── Settings ─────────────────────────────────────────────────

#[test]
fn parameter_change_applies_from_next_breath() {
    let mut rig = Rig::new();
    rig.command(VentCommand::Start);
    rig.advance(100);

    rig.svc.set_rate(20).unwrap();
    assert_eq!(rig.svc.derived_timing().period_ms, 3000);

    // The breath in progress keeps its 4 s period: no rate hazard.
    rig.breathe(400);
    assert!(!rig.sink.events.iter().any(|e| matches!(
        e,
        VentEvent::HazardReported(r) if r.hazard == Hazard::RateNotMet
    )));

    // The next one runs at 3 s.
    rig.breathe(400);
    let metrics = rig.svc.last_metrics().unwrap();
    assert!(metrics.period_ms.abs_diff(3000) <= 20, "period {}", metrics.period_ms);
}

#[test]
fn threshold_change_rearms_triggers_on_next_tick() {
    let mut rig = Rig::new();
    rig.svc.set_max_pip(35.0).unwrap();
    assert_eq!(rig.hw.armed(TriggerId::OverPressure).unwrap().threshold_cmh2o, 40.0);

    rig.tick();

    assert_eq!(rig.hw.armed(TriggerId::OverPressure).unwrap().threshold_cmh2o, 35.0);
    assert!(rig.hw.calls.contains(&HwCall::ResetTrigger(TriggerId::OverPressure)));
}

#[test]
fn unrelated_threshold_change_leaves_triggers_alone() {
    let mut rig = Rig::new();
    rig.hw.clear_calls();

    rig.svc.set_max_tidal_volume(900).unwrap();
    rig.tick();

    assert!(
        !rig.hw
            .calls
            .iter()
            .any(|c| matches!(c, HwCall::RegisterTrigger(_)))
    );
}

#[test]
fn pressure_control_drives_open_loop() {
    let mut config = VentConfig::default();
    config.breath.mode = VentMode::PressureControl;
    let mut rig = Rig::with_config(config);
    rig.hw.stats.current = 0.0;

    rig.command(VentCommand::Start);
    assert!(matches!(
        rig.hw.last_motion(),
        Some(HwCall::MoveByAtDrive {
            direction: Direction::Compress,
            ..
        })
    ));

    rig.advance(200);
    assert!(
        rig.hw
            .calls
            .iter()
            .any(|c| matches!(c, HwCall::UpdateDrive(d) if *d > 0))
    );

    rig.run_until(BreathState::Plateau, 2_000);
    assert!(rig.hw.calls.contains(&HwCall::Brake));
}
