//! Shared mutable context threaded through every breath-state handler.
//!
//! `BreathContext` is the blackboard the handlers read from and write to.
//! Inputs (clock, pressure window statistics, accumulated volume, motion
//! completion) are written by the service before each call into the
//! engine.  Handlers never touch hardware: they queue [`MotorCommand`]s,
//! raise window/volume reset flags and push [`Report`]s, which the service
//! applies and routes after the call returns.

use heapless::Vec;
use log::warn;

use crate::config::VentConfig;
use crate::control::pressure::PressureLoop;
use crate::error::{HazardReport, ParamError};
use crate::params::{BreathParameters, DerivedTiming, SafetyThresholds, VentMode};

use super::BreathState;

/// Reports buffered per engine call.
pub const REPORT_CAP: usize = 16;
/// Motor commands buffered per engine call.
pub const MOTOR_CAP: usize = 8;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Statistics of the current pressure sampling window (cmH2O).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PressureStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    /// Most recent sample.
    pub current: f32,
    /// Time since the window was (re)started.
    pub ms_since_start: u32,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Direction of compression-mechanism travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards full compression (inhale).
    Compress,
    /// Back towards home (exhale).
    Release,
}

/// Motion request for the motor collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorCommand {
    Stop,
    Brake,
    Home {
        speed_dps: f32,
    },
    MoveBy {
        direction: Direction,
        distance_deg: f32,
        speed_dps: f32,
    },
    MoveByAtDrive {
        direction: Direction,
        distance_deg: f32,
        drive: u8,
    },
    UpdateDrive {
        drive: u8,
    },
}

/// Per-breath measurements published after each completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BreathMetrics {
    /// Breath number within the current run (1-based).
    pub cycle: u32,
    pub pip_cmh2o: f32,
    pub peep_cmh2o: f32,
    pub plateau_cmh2o: f32,
    pub volume_ml: u16,
    /// Measured time between the two INHALE entries.
    pub period_ms: u32,
}

/// Something the service must route after an engine call, in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Report {
    Entered { from: BreathState, to: BreathState },
    /// INHALE entry; the error latch sweeps here.
    CycleBoundary,
    Hazard(HazardReport),
    BreathDone(BreathMetrics),
}

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

/// Settings frozen at INHALE entry for the duration of one breath.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSnapshot {
    pub timing: DerivedTiming,
    pub thresholds: SafetyThresholds,
    pub mode: VentMode,
    pub setpoint_cmh2o: f32,
}

/// Values sampled during the breath in progress.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleMeasurements {
    pub pip_cmh2o: f32,
    pub peep_cmh2o: f32,
    pub plateau_cmh2o: f32,
    pub volume_ml: u16,
}

// ---------------------------------------------------------------------------
// BreathContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler.
pub struct BreathContext {
    // -- Timing --
    /// Clock reading for the current engine call.
    pub now_ms: u64,
    /// Clock reading when the current state was entered.
    pub phase_start_ms: u64,

    // -- Inputs --
    pub pressure: PressureStats,
    /// Volume accumulated since the last reset.
    pub volume_ml: u16,
    /// The last issued motion has finished.
    pub move_complete: bool,

    // -- Settings --
    pub params: BreathParameters,
    pub thresholds: SafetyThresholds,
    pub plateau_sample_ms: u32,
    pub homing_speed_dps: f32,
    pub maintenance_interval_cycles: u32,
    pub pressure_loop: PressureLoop,

    // -- Cycle --
    pub snapshot: CycleSnapshot,
    pub measured: CycleMeasurements,
    /// INHALE entry time of the breath in progress.
    pub last_inhale_ms: u64,
    /// Breaths started since the last START.
    pub run_cycles: u32,
    pub run_started_ms: u64,
    /// Breaths started over the lifetime of the mechanism.
    pub lifetime_cycles: u32,
    /// STOP received; honoured at the end of EXHALE.
    pub stop_requested: bool,

    // -- Outputs --
    pub reports: Vec<Report, REPORT_CAP>,
    pub motor: Vec<MotorCommand, MOTOR_CAP>,
    pub restart_window: bool,
    pub reset_volume: bool,
}

impl BreathContext {
    /// Create a context from configuration; rejects invalid settings.
    pub fn new(config: &VentConfig) -> Result<Self, ParamError> {
        let params = BreathParameters::new(config.breath, &config.volume_table)?;
        config.thresholds.validate()?;
        let snapshot = CycleSnapshot {
            timing: *params.derived(),
            thresholds: config.thresholds,
            mode: params.settings().mode,
            setpoint_cmh2o: params.settings().pressure_setpoint_cmh2o,
        };

        Ok(Self {
            now_ms: 0,
            phase_start_ms: 0,
            pressure: PressureStats::default(),
            volume_ml: 0,
            move_complete: false,
            params,
            thresholds: config.thresholds,
            plateau_sample_ms: config.plateau_sample_ms,
            homing_speed_dps: config.homing_speed_dps,
            maintenance_interval_cycles: config.maintenance_interval_cycles,
            pressure_loop: PressureLoop::new(
                config.pid_kp,
                config.pid_ki,
                config.pid_kd,
                config.pressure_ramp_ms,
            ),
            snapshot,
            measured: CycleMeasurements::default(),
            last_inhale_ms: 0,
            run_cycles: 0,
            run_started_ms: 0,
            lifetime_cycles: 0,
            stop_requested: false,
            reports: Vec::new(),
            motor: Vec::new(),
            restart_window: false,
            reset_volume: false,
        })
    }

    /// Milliseconds since the current state was entered.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.phase_start_ms)
    }

    /// Freeze the live settings for the breath starting now.
    pub fn take_snapshot(&mut self) {
        let settings = self.params.settings();
        self.snapshot = CycleSnapshot {
            timing: *self.params.derived(),
            thresholds: self.thresholds,
            mode: settings.mode,
            setpoint_cmh2o: settings.pressure_setpoint_cmh2o,
        };
    }

    pub fn report(&mut self, report: Report) {
        if self.reports.push(report).is_err() {
            warn!("BCC: report buffer full, dropped {report:?}");
        }
    }

    pub fn hazard(&mut self, report: HazardReport) {
        self.report(Report::Hazard(report));
    }

    pub fn command(&mut self, cmd: MotorCommand) {
        if self.motor.push(cmd).is_err() {
            warn!("BCC: motor queue full, dropped {cmd:?}");
        }
    }

    /// Issue a timed move and wait for its completion.
    pub fn start_move(&mut self, cmd: MotorCommand) {
        self.move_complete = false;
        self.command(cmd);
    }
}
