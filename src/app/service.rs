//! Application service: the hexagonal core.
//!
//! [`VentService`] owns the breath-cycle controller, the error latch and
//! the alarm supervisor, and is the only way to mutate any of them.  All
//! I/O flows through port traits injected at call sites, making the whole
//! service testable with mock adapters.
//!
//! ```text
//!  ClockPort    ──▶ ┌─────────────────────────────┐ ──▶ DisplayPort
//!  PressurePort ◀─▶ │         VentService         │ ──▶ IndicatorPort
//!  VolumePort   ◀─▶ │  BCC ─▶ ErrorLatch ─▶ APS   │ ──▶ EventSink
//!  MotorPort    ◀── └─────────────────────────────┘
//! ```
//!
//! ## Tick order
//!
//! 1. Read the clock; re-arm pressure triggers if a threshold changed.
//! 2. Sample the pressure window and the volume accumulator.
//! 3. Drain queued pressure alerts into the controller, one at a time.
//! 4. Tick the controller.
//! 5. After every controller call, route its reports (latch → supervisor →
//!    events) in order and apply its motor, window and volume requests.
//! 6. Advance the supervisor's timers and push changed presentation to
//!    the panel.

use core::mem;

use log::{debug, info, warn};

use crate::alarm::{AlarmSupervisor, Presentation};
use crate::config::VentConfig;
use crate::error::{ParamError, Result};
use crate::events::triggers_for;
use crate::fsm::context::{BreathContext, BreathMetrics, MotorCommand, Report};
use crate::fsm::states::{build_state_table, park};
use crate::fsm::{BreathState, Fsm};
use crate::latch::ErrorLatch;
use crate::params::{BreathParameters, DerivedTiming, SafetyThresholds, VentMode};

use super::commands::VentCommand;
use super::events::VentEvent;
use super::ports::{AlarmPanel, EventSink, VentilatorHw, VolumePort};

// ───────────────────────────────────────────────────────────────
// VentService
// ───────────────────────────────────────────────────────────────

/// The ventilator control core.
pub struct VentService {
    fsm: Fsm,
    ctx: BreathContext,
    latch: ErrorLatch,
    alarms: AlarmSupervisor,
    /// Presentation last pushed to the panel.
    shown: Option<Presentation>,
    last_tick_ms: u64,
    tick_count: u64,
    triggers_dirty: bool,
    last_metrics: Option<BreathMetrics>,
}

impl VentService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the controller: call [`start`](Self::start) next.
    pub fn new(config: VentConfig) -> Result<Self> {
        let ctx = BreathContext::new(&config)?;
        let alarms = AlarmSupervisor::new(&config);

        Ok(Self {
            fsm: Fsm::new(build_state_table(), BreathState::Idle),
            ctx,
            latch: ErrorLatch::new(),
            alarms,
            shown: None,
            last_tick_ms: 0,
            tick_count: 0,
            triggers_dirty: true,
            last_metrics: None,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter IDLE (homing the motor) and arm the pressure triggers.
    pub fn start(&mut self, hw: &mut impl VentilatorHw, sink: &mut impl EventSink) {
        let now = hw.now_ms();
        self.ctx.now_ms = now;
        self.last_tick_ms = now;
        self.register_triggers(hw);
        self.fsm.start(&mut self.ctx);
        self.flush(hw, sink);
        sink.emit(&VentEvent::Started(self.fsm.current_state()));
        info!("VentService started in {}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.  See the module docs for the order.
    pub fn tick(
        &mut self,
        hw: &mut impl VentilatorHw,
        panel: &mut impl AlarmPanel,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let now = hw.now_ms();
        let delta_ms = u32::try_from(now.saturating_sub(self.last_tick_ms)).unwrap_or(u32::MAX);
        self.last_tick_ms = now;
        self.ctx.now_ms = now;

        if self.triggers_dirty {
            self.register_triggers(hw);
        }

        self.sample_inputs(hw);

        while let Some(alert) = hw.poll_alert() {
            debug!(
                "alert {:?} at {:.1} cmH2O in {}",
                alert.trigger,
                alert.pressure_cmh2o,
                self.fsm.current_state()
            );
            self.fsm.alert(alert, &mut self.ctx);
            self.flush(hw, sink);
        }

        self.fsm.tick(&mut self.ctx);
        self.flush(hw, sink);

        self.alarms.tick(delta_ms);
        debug_assert!(self.alarms.invariants_hold());
        self.present(panel);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a caregiver command.
    pub fn handle_command(
        &mut self,
        cmd: VentCommand,
        hw: &mut impl VentilatorHw,
        sink: &mut impl EventSink,
    ) {
        let cycling = self.fsm.current_state().is_cycling();
        match cmd {
            VentCommand::Start => {
                if !cycling {
                    self.ctx.now_ms = hw.now_ms();
                    self.sample_inputs(hw);
                    self.fsm.force_transition(BreathState::Inhale, &mut self.ctx);
                    self.flush(hw, sink);
                } else if self.ctx.stop_requested {
                    self.ctx.stop_requested = false;
                    info!("START: pending STOP cancelled");
                }
            }
            VentCommand::Stop => {
                if cycling {
                    self.ctx.stop_requested = true;
                    info!("STOP: deferred to end of EXHALE");
                } else {
                    debug!("STOP ignored in IDLE");
                }
            }
            VentCommand::Abort => {
                warn!("ABORT in {}", self.fsm.current_state());
                self.ctx.now_ms = hw.now_ms();
                if cycling {
                    self.fsm.force_transition(BreathState::Idle, &mut self.ctx);
                } else {
                    park(&mut self.ctx);
                }
                self.flush(hw, sink);
            }
            VentCommand::Silence => self.alarms.silence(),
            VentCommand::PauseAudio => self.alarms.pause_audio(),
        }
    }

    /// The last issued timed move has finished.
    pub fn motor_move_complete(&mut self) {
        self.ctx.move_complete = true;
    }

    /// Seed the lifetime breath counter (kept by the collaborator across
    /// power cycles).
    pub fn restore_cycle_count(&mut self, cycles: u32) {
        self.ctx.lifetime_cycles = cycles;
        info!("lifetime breath count restored: {cycles}");
    }

    // ── Breath parameters ─────────────────────────────────────

    pub fn set_mode(&mut self, mode: VentMode) -> core::result::Result<(), ParamError> {
        self.edit_params("mode", |p| p.set_mode(mode))
    }

    pub fn set_rate(&mut self, bpm: u16) -> core::result::Result<(), ParamError> {
        self.edit_params("rate", |p| p.set_rate(bpm))
    }

    pub fn set_tidal_volume(&mut self, ml: u16) -> core::result::Result<(), ParamError> {
        self.edit_params("tidal volume", |p| p.set_tidal_volume(ml))
    }

    pub fn set_ie_ratio(&mut self, ratio: u16) -> core::result::Result<(), ParamError> {
        self.edit_params("I:E ratio", |p| p.set_ie_ratio(ratio))
    }

    pub fn set_inspiratory_time(&mut self, ms: u32) -> core::result::Result<(), ParamError> {
        self.edit_params("inspiratory time", |p| p.set_inspiratory_time(ms))
    }

    pub fn set_hold_time(&mut self, ms: u32) -> core::result::Result<(), ParamError> {
        self.edit_params("hold time", |p| p.set_hold_time(ms))
    }

    pub fn set_pressure_setpoint(&mut self, cmh2o: f32) -> core::result::Result<(), ParamError> {
        self.edit_params("pressure setpoint", |p| p.set_pressure_setpoint(cmh2o))
    }

    pub fn mode(&self) -> VentMode {
        self.ctx.params.settings().mode
    }

    pub fn rate(&self) -> u16 {
        self.ctx.params.settings().rate_bpm
    }

    pub fn tidal_volume(&self) -> u16 {
        self.ctx.params.settings().tidal_volume_ml
    }

    /// Effective I:E ratio (E×100).
    pub fn ie_ratio(&self) -> u16 {
        self.ctx.params.ie_ratio()
    }

    /// Effective inspiratory time.
    pub fn inspiratory_time(&self) -> u32 {
        self.ctx.params.inspiratory_time()
    }

    pub fn hold_time(&self) -> u32 {
        self.ctx.params.settings().hold_time_ms
    }

    pub fn pressure_setpoint(&self) -> f32 {
        self.ctx.params.settings().pressure_setpoint_cmh2o
    }

    pub fn parameters(&self) -> &BreathParameters {
        &self.ctx.params
    }

    pub fn derived_timing(&self) -> &DerivedTiming {
        self.ctx.params.derived()
    }

    // ── Safety thresholds ─────────────────────────────────────

    pub fn set_max_pip(&mut self, cmh2o: f32) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("max PIP", |t| t.set_max_pip(cmh2o))
    }

    pub fn set_min_pip(&mut self, cmh2o: f32) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("min PIP", |t| t.set_min_pip(cmh2o))
    }

    pub fn set_min_peep(&mut self, cmh2o: f32) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("min PEEP", |t| t.set_min_peep(cmh2o))
    }

    pub fn set_max_tidal_volume(&mut self, ml: u16) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("max tidal volume", |t| t.set_max_tidal_volume(ml))
    }

    pub fn set_min_tidal_volume(&mut self, ml: u16) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("min tidal volume", |t| t.set_min_tidal_volume(ml))
    }

    pub fn set_max_inspiratory_error(&mut self, pct: u8) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("max inspiratory error", |t| t.set_max_inspiratory_error(pct))
    }

    pub fn set_max_rate_error(&mut self, pct: u8) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("max rate error", |t| t.set_max_rate_error(pct))
    }

    pub fn set_min_pip_peep_diff(&mut self, cmh2o: f32) -> core::result::Result<(), ParamError> {
        self.edit_thresholds("min PIP-PEEP", |t| t.set_min_pip_peep_diff(cmh2o))
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.ctx.thresholds
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> BreathState {
        self.fsm.current_state()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn alarms(&self) -> &AlarmSupervisor {
        &self.alarms
    }

    pub fn latch(&self) -> &ErrorLatch {
        &self.latch
    }

    pub fn lifetime_cycles(&self) -> u32 {
        self.ctx.lifetime_cycles
    }

    /// Breaths started since the last START.
    pub fn run_cycles(&self) -> u32 {
        self.ctx.run_cycles
    }

    pub fn stop_pending(&self) -> bool {
        self.ctx.stop_requested
    }

    pub fn last_metrics(&self) -> Option<BreathMetrics> {
        self.last_metrics
    }

    // ── Internal ──────────────────────────────────────────────

    fn edit_params(
        &mut self,
        what: &str,
        edit: impl FnOnce(&mut BreathParameters) -> core::result::Result<(), ParamError>,
    ) -> core::result::Result<(), ParamError> {
        match edit(&mut self.ctx.params) {
            Ok(()) => {
                let d = self.ctx.params.derived();
                info!(
                    "{what} updated: period={}ms insp={}ms exp={}ms",
                    d.period_ms, d.inspiratory_ms, d.expiratory_ms
                );
                Ok(())
            }
            Err(e) => {
                warn!("{what} rejected: {e}");
                Err(e)
            }
        }
    }

    fn edit_thresholds(
        &mut self,
        what: &str,
        edit: impl FnOnce(&mut SafetyThresholds) -> core::result::Result<(), ParamError>,
    ) -> core::result::Result<(), ParamError> {
        let before = self.ctx.thresholds;
        match edit(&mut self.ctx.thresholds) {
            Ok(()) => {
                if triggers_for(&before) != triggers_for(&self.ctx.thresholds) {
                    self.triggers_dirty = true;
                }
                info!("{what} threshold updated");
                Ok(())
            }
            Err(e) => {
                warn!("{what} threshold rejected: {e}");
                Err(e)
            }
        }
    }

    fn register_triggers(&mut self, hw: &mut impl VentilatorHw) {
        for trigger in triggers_for(&self.ctx.thresholds) {
            hw.reset_trigger(trigger.id);
            hw.register_trigger(trigger);
        }
        self.triggers_dirty = false;
        debug!("pressure triggers armed");
    }

    fn sample_inputs(&mut self, hw: &mut impl VentilatorHw) {
        self.ctx.pressure = hw.window_stats();
        self.ctx.volume_ml = hw.accumulated_ml();
    }

    /// Route the controller's reports, then apply its hardware requests.
    fn flush(&mut self, hw: &mut impl VentilatorHw, sink: &mut impl EventSink) {
        let reports = mem::take(&mut self.ctx.reports);
        for report in reports {
            self.route(report, sink);
        }

        let motor = mem::take(&mut self.ctx.motor);
        for cmd in motor {
            apply_motor(hw, cmd);
        }

        if mem::take(&mut self.ctx.restart_window) {
            hw.start_window();
            self.ctx.pressure = hw.window_stats();
        }
        if mem::take(&mut self.ctx.reset_volume) {
            VolumePort::reset(hw);
            self.ctx.volume_ml = 0;
        }
    }

    fn route(&mut self, report: Report, sink: &mut impl EventSink) {
        match report {
            Report::Entered { from, to } => {
                sink.emit(&VentEvent::StateChanged { from, to });
            }
            Report::CycleBoundary => {
                for hazard in self.latch.cycle_boundary(&mut self.alarms) {
                    sink.emit(&VentEvent::HazardCleared(hazard));
                }
            }
            Report::Hazard(hazard) => {
                sink.emit(&VentEvent::HazardReported(hazard));
                if let Some(alarm) = self.latch.report(hazard, &mut self.alarms) {
                    let value = self.alarms.record(alarm).value;
                    sink.emit(&VentEvent::AlarmRaised { alarm, value });
                }
            }
            Report::BreathDone(metrics) => {
                self.last_metrics = Some(metrics);
                sink.emit(&VentEvent::BreathCompleted(metrics));
            }
        }
    }

    /// Push whatever changed since the last tick to the panel.  Light and
    /// buzzer are written whenever the outputs disagree with the
    /// presentation.
    fn present(&mut self, panel: &mut impl AlarmPanel) {
        let next = self.alarms.presentation();
        let prev = self.shown;

        if prev.map(|p| p.screen) != Some(next.screen) {
            match next.screen {
                Some((alarm, value)) => panel.show_alarm(alarm, value),
                None => panel.clear_alarm(),
            }
        }
        if prev.map(|p| p.silenced_count) != Some(next.silenced_count) {
            panel.show_silenced_count(next.silenced_count);
        }
        // Compared against the outputs themselves so a failed write is retried.
        if panel.alarm_light_on() != next.light_on {
            panel.set_alarm_light(next.light_on);
        }
        if panel.buzzer_on() != next.buzzer_on {
            panel.set_buzzer(next.buzzer_on);
        }

        self.shown = Some(next);
    }
}

fn apply_motor(hw: &mut impl VentilatorHw, cmd: MotorCommand) {
    match cmd {
        MotorCommand::Stop => hw.stop(),
        MotorCommand::Brake => hw.brake(),
        MotorCommand::Home { speed_dps } => hw.home(speed_dps),
        MotorCommand::MoveBy {
            direction,
            distance_deg,
            speed_dps,
        } => hw.move_by(direction, distance_deg, speed_dps),
        MotorCommand::MoveByAtDrive {
            direction,
            distance_deg,
            drive,
        } => hw.move_by_at_drive(direction, distance_deg, drive),
        MotorCommand::UpdateDrive { drive } => hw.update_drive(drive),
    }
}
