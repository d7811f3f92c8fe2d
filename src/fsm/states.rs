//! Concrete breath-state handlers and table builder.
//!
//! ```text
//!  IDLE ──[START]──▶ INHALE ──[insp done]──▶ PLATEAU ──[sampled]──▶ PAUSE
//!    ▲                 ▲   └──[over-pressure]──▲                      │
//!    │                 │                                        [hold done]
//!    │                 └────────────[exp done]──── EXHALE ◀───────────┘
//!    └──────────────[exp done, STOP pending]──────────┘
//!
//!  Any state ──[ABORT]──▶ IDLE
//! ```
//!
//! Previous-cycle hazards are evaluated at INHALE entry, once the measured
//! breath period is known.

use log::{debug, info, warn};

use super::context::{BreathContext, BreathMetrics, CycleMeasurements, Direction, MotorCommand, Report};
use super::{BreathState, StateDescriptor};
use crate::error::{Hazard, HazardReport};
use crate::events::{PressureAlert, TriggerId, triggers_for};
use crate::params::VentMode;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; BreathState::COUNT] {
    [
        StateDescriptor {
            id: BreathState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: Some(idle_exit),
            on_update: idle_update,
            on_alert: None,
        },
        StateDescriptor {
            id: BreathState::Inhale,
            name: "Inhale",
            on_enter: Some(inhale_enter),
            on_exit: Some(inhale_exit),
            on_update: inhale_update,
            on_alert: Some(inhale_alert),
        },
        StateDescriptor {
            id: BreathState::Plateau,
            name: "Plateau",
            on_enter: Some(plateau_enter),
            on_exit: None,
            on_update: plateau_update,
            on_alert: Some(report_alert),
        },
        StateDescriptor {
            id: BreathState::Pause,
            name: "Pause",
            on_enter: Some(pause_enter),
            on_exit: None,
            on_update: pause_update,
            on_alert: None,
        },
        StateDescriptor {
            id: BreathState::Exhale,
            name: "Exhale",
            on_enter: Some(exhale_enter),
            on_exit: None,
            on_update: exhale_update,
            on_alert: Some(report_alert),
        },
    ]
}

/// Stop the motor and send it home.
pub fn park(ctx: &mut BreathContext) {
    ctx.command(MotorCommand::Stop);
    ctx.start_move(MotorCommand::Home {
        speed_dps: ctx.homing_speed_dps,
    });
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut BreathContext) {
    park(ctx);
    ctx.stop_requested = false;
    info!("IDLE: motor homing, {} breaths this run", ctx.run_cycles);
}

fn idle_exit(ctx: &mut BreathContext) {
    ctx.run_cycles = 0;
    ctx.run_started_ms = ctx.now_ms;
    ctx.stop_requested = false;
    info!("IDLE: run started, lifetime breaths {}", ctx.lifetime_cycles);
}

fn idle_update(_ctx: &mut BreathContext) -> Option<BreathState> {
    // Leaving IDLE takes an explicit START.
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  INHALE
// ═══════════════════════════════════════════════════════════════════════════

fn inhale_enter(ctx: &mut BreathContext) {
    ctx.report(Report::CycleBoundary);
    if ctx.run_cycles > 0 {
        evaluate_previous_cycle(ctx);
    }

    ctx.run_cycles += 1;
    ctx.lifetime_cycles = ctx.lifetime_cycles.saturating_add(1);
    if ctx.maintenance_interval_cycles > 0 && ctx.lifetime_cycles >= ctx.maintenance_interval_cycles {
        ctx.hazard(HazardReport::new(Hazard::MaintenanceDue, ctx.lifetime_cycles as f32));
    }

    ctx.take_snapshot();
    ctx.measured = CycleMeasurements::default();
    ctx.last_inhale_ms = ctx.now_ms;
    ctx.restart_window = true;
    ctx.reset_volume = true;

    let timing = ctx.snapshot.timing;
    match ctx.snapshot.mode {
        VentMode::VolumeControl => {
            ctx.start_move(MotorCommand::MoveBy {
                direction: Direction::Compress,
                distance_deg: timing.angle_deg,
                speed_dps: timing.inhale_speed_dps,
            });
        }
        VentMode::PressureControl => {
            let (now, entry) = (ctx.now_ms, ctx.pressure.current);
            ctx.pressure_loop.begin(now, entry, ctx.snapshot.setpoint_cmh2o);
            let drive = ctx.pressure_loop.step(now, entry);
            ctx.start_move(MotorCommand::MoveByAtDrive {
                direction: Direction::Compress,
                distance_deg: timing.angle_deg,
                drive,
            });
        }
    }

    info!(
        "INHALE: breath {} ({:?}) insp={}ms angle={:.1}",
        ctx.run_cycles, ctx.snapshot.mode, timing.inspiratory_ms, timing.angle_deg
    );
}

fn inhale_exit(ctx: &mut BreathContext) {
    ctx.measured.volume_ml = ctx.volume_ml;
}

fn inhale_update(ctx: &mut BreathContext) -> Option<BreathState> {
    let elapsed = ctx.ms_in_state();
    let insp = u64::from(ctx.snapshot.timing.inspiratory_ms);

    match ctx.snapshot.mode {
        VentMode::VolumeControl => {
            if ctx.move_complete && elapsed >= insp {
                sample_pip(ctx);
                return Some(BreathState::Plateau);
            }
            let tolerance = u64::from(ctx.snapshot.thresholds.max_inspiratory_error_pct);
            if !ctx.move_complete && elapsed * 100 > insp * (100 + tolerance) {
                warn!("INHALE: move not complete after {elapsed}ms (set {insp}ms)");
                ctx.hazard(HazardReport::new(Hazard::InspiratoryTimeExceeded, elapsed as f32));
                sample_pip(ctx);
                return Some(BreathState::Plateau);
            }
        }
        VentMode::PressureControl => {
            let drive = ctx.pressure_loop.step(ctx.now_ms, ctx.pressure.current);
            ctx.command(MotorCommand::UpdateDrive { drive });
            if elapsed >= insp {
                ctx.command(MotorCommand::Brake);
                sample_pip(ctx);
                return Some(BreathState::Plateau);
            }
        }
    }
    None
}

fn inhale_alert(ctx: &mut BreathContext, alert: PressureAlert) -> Option<BreathState> {
    report_alert(ctx, alert);
    if alert.trigger == TriggerId::OverPressure {
        sample_pip(ctx);
        ctx.measured.pip_cmh2o = ctx.measured.pip_cmh2o.max(alert.pressure_cmh2o);
        warn!(
            "INHALE: over-pressure {:.1} cmH2O, cutting inspiration short",
            alert.pressure_cmh2o
        );
        return Some(BreathState::Plateau);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PLATEAU
// ═══════════════════════════════════════════════════════════════════════════

fn plateau_enter(ctx: &mut BreathContext) {
    ctx.restart_window = true;
    ctx.command(MotorCommand::Brake);
    debug!("PLATEAU: sampling for {}ms", ctx.plateau_sample_ms);
}

fn plateau_update(ctx: &mut BreathContext) -> Option<BreathState> {
    if ctx.ms_in_state() >= u64::from(ctx.plateau_sample_ms) {
        ctx.measured.plateau_cmh2o = ctx.pressure.min;
        return Some(BreathState::Pause);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAUSE
// ═══════════════════════════════════════════════════════════════════════════

fn pause_enter(ctx: &mut BreathContext) {
    ctx.command(MotorCommand::Brake);
}

fn pause_update(ctx: &mut BreathContext) -> Option<BreathState> {
    let remaining = ctx.snapshot.timing.hold_ms.saturating_sub(ctx.plateau_sample_ms);
    if ctx.ms_in_state() >= u64::from(remaining) {
        return Some(BreathState::Exhale);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  EXHALE
// ═══════════════════════════════════════════════════════════════════════════

fn exhale_enter(ctx: &mut BreathContext) {
    ctx.restart_window = true;
    // Home, not a relative release: INHALE may have stopped short.
    ctx.start_move(MotorCommand::Home {
        speed_dps: ctx.snapshot.timing.exhale_speed_dps,
    });
}

fn exhale_update(ctx: &mut BreathContext) -> Option<BreathState> {
    let elapsed = ctx.ms_in_state();
    let exp = u64::from(ctx.snapshot.timing.expiratory_ms);

    if ctx.move_complete && elapsed >= exp {
        ctx.measured.peep_cmh2o = ctx.pressure.min;
        return Some(next_breath(ctx));
    }
    let tolerance = u64::from(ctx.snapshot.thresholds.max_inspiratory_error_pct);
    if !ctx.move_complete && elapsed * 100 > exp * (100 + tolerance) {
        warn!("EXHALE: release not complete after {elapsed}ms (set {exp}ms)");
        ctx.hazard(HazardReport::new(Hazard::ExpiratoryTimeExceeded, elapsed as f32));
        ctx.measured.peep_cmh2o = ctx.pressure.min;
        return Some(next_breath(ctx));
    }
    None
}

fn next_breath(ctx: &BreathContext) -> BreathState {
    if ctx.stop_requested {
        info!("EXHALE: deferred STOP honoured");
        BreathState::Idle
    } else {
        BreathState::Inhale
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════

fn sample_pip(ctx: &mut BreathContext) {
    ctx.measured.pip_cmh2o = ctx.measured.pip_cmh2o.max(ctx.pressure.max);
}

/// Report the hazard behind a trigger crossing; never transitions.
fn report_alert(ctx: &mut BreathContext, alert: PressureAlert) -> Option<BreathState> {
    let trigger = triggers_for(&ctx.thresholds)[alert.trigger as usize];
    ctx.hazard(HazardReport::new(trigger.hazard, alert.pressure_cmh2o));
    None
}

/// Evaluate the breath that just finished against its snapshot.
fn evaluate_previous_cycle(ctx: &mut BreathContext) {
    let limits = ctx.snapshot.thresholds;
    let m = ctx.measured;

    let measured_period = ctx.now_ms.saturating_sub(ctx.last_inhale_ms);
    let set_period = u64::from(ctx.snapshot.timing.period_ms);
    if measured_period.abs_diff(set_period) * 100 > set_period * u64::from(limits.max_rate_error_pct) {
        let bpm = 60_000.0 / measured_period.max(1) as f32;
        ctx.hazard(HazardReport::new(Hazard::RateNotMet, bpm));
    }

    if m.pip_cmh2o > limits.max_pip_cmh2o {
        ctx.hazard(HazardReport::new(Hazard::PipExceeded, m.pip_cmh2o));
    } else if m.pip_cmh2o < limits.min_pip_cmh2o {
        ctx.hazard(HazardReport::new(Hazard::PipNotReached, m.pip_cmh2o));
    }
    if m.peep_cmh2o < limits.min_peep_cmh2o {
        ctx.hazard(HazardReport::new(Hazard::PeepNotMaintained, m.peep_cmh2o));
    }
    let driving = m.pip_cmh2o - m.peep_cmh2o;
    if driving < limits.min_pip_peep_diff_cmh2o {
        ctx.hazard(HazardReport::new(Hazard::AirflowDisconnect, driving));
    }

    if m.volume_ml > limits.max_tidal_volume_ml {
        ctx.hazard(HazardReport::new(Hazard::TidalVolumeExceeded, f32::from(m.volume_ml)));
    } else if m.volume_ml < limits.min_tidal_volume_ml {
        ctx.hazard(HazardReport::new(Hazard::TidalVolumeNotReached, f32::from(m.volume_ml)));
    }

    let metrics = BreathMetrics {
        cycle: ctx.run_cycles,
        pip_cmh2o: m.pip_cmh2o,
        peep_cmh2o: m.peep_cmh2o,
        plateau_cmh2o: m.plateau_cmh2o,
        volume_ml: m.volume_ml,
        period_ms: u32::try_from(measured_period).unwrap_or(u32::MAX),
    };
    debug!(
        "breath {}: PIP {:.1} PEEP {:.1} plateau {:.1} Vt {}mL period {}ms",
        metrics.cycle,
        metrics.pip_cmh2o,
        metrics.peep_cmh2o,
        metrics.plateau_cmh2o,
        metrics.volume_ml,
        metrics.period_ms
    );
    ctx.report(Report::BreathDone(metrics));
}
