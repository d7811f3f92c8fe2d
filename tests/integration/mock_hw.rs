//! Mock ports for integration tests.
//!
//! Records every motor, pressure and panel call so tests can assert on
//! the full command history.  Pressure alerts go through a real
//! [`AlertQueue`], the same way a sampling interrupt would raise them.

use ventcore::alarm::table::AlarmId;
use ventcore::app::events::VentEvent;
use ventcore::app::ports::{
    ClockPort, DisplayPort, EventSink, IndicatorPort, MotorPort, PressurePort, VolumePort,
};
use ventcore::app::service::VentService;
use ventcore::config::VentConfig;
use ventcore::events::{AlertQueue, PressureAlert, PressureTrigger, TriggerId};
use ventcore::fsm::BreathState;
use ventcore::fsm::context::{Direction, PressureStats};

/// Control loop period used by [`Rig::advance`].
pub const TICK_MS: u64 = 10;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HwCall {
    Stop,
    Brake,
    Home,
    MoveBy { direction: Direction, speed_dps: f32 },
    MoveByAtDrive { direction: Direction, drive: u8 },
    UpdateDrive(u8),
    StartWindow,
    ResetVolume,
    RegisterTrigger(PressureTrigger),
    ResetTrigger(TriggerId),
}

// ── MockHw ────────────────────────────────────────────────────

pub struct MockHw {
    pub now: u64,
    pub stats: PressureStats,
    pub volume_ml: u16,
    pub alerts: AlertQueue,
    pub armed: Vec<PressureTrigger>,
    pub calls: Vec<HwCall>,
}

#[allow(dead_code)]
impl MockHw {
    pub fn new() -> Self {
        Self {
            now: 0,
            stats: healthy_stats(),
            volume_ml: 0,
            alerts: AlertQueue::new(),
            armed: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn raise(&self, trigger: TriggerId, pressure_cmh2o: f32) {
        assert!(self.alerts.raise(PressureAlert {
            trigger,
            pressure_cmh2o,
        }));
    }

    pub fn homed(&self) -> bool {
        self.calls.iter().any(|c| *c == HwCall::Home)
    }

    pub fn last_motion(&self) -> Option<&HwCall> {
        self.calls.iter().rev().find(|c| {
            matches!(
                c,
                HwCall::Home | HwCall::MoveBy { .. } | HwCall::MoveByAtDrive { .. }
            )
        })
    }

    pub fn armed(&self, id: TriggerId) -> Option<&PressureTrigger> {
        self.armed.iter().find(|t| t.id == id)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockHw {
    fn default() -> Self {
        Self::new()
    }
}

/// Pressure statistics that pass every default limit:
/// PIP 20, PEEP 5, driving pressure 15 cmH2O.
pub fn healthy_stats() -> PressureStats {
    PressureStats {
        min: 5.0,
        max: 20.0,
        avg: 12.0,
        current: 12.0,
        ms_since_start: 0,
    }
}

impl ClockPort for MockHw {
    fn now_ms(&self) -> u64 {
        self.now
    }
}

impl MotorPort for MockHw {
    fn stop(&mut self) {
        self.calls.push(HwCall::Stop);
    }

    fn brake(&mut self) {
        self.calls.push(HwCall::Brake);
    }

    fn home(&mut self, _speed_dps: f32) {
        self.calls.push(HwCall::Home);
    }

    fn move_by(&mut self, direction: Direction, _distance_deg: f32, speed_dps: f32) {
        self.calls.push(HwCall::MoveBy {
            direction,
            speed_dps,
        });
    }

    fn move_by_at_drive(&mut self, direction: Direction, _distance_deg: f32, drive: u8) {
        self.calls.push(HwCall::MoveByAtDrive { direction, drive });
    }

    fn update_drive(&mut self, drive: u8) {
        self.calls.push(HwCall::UpdateDrive(drive));
    }
}

impl PressurePort for MockHw {
    fn start_window(&mut self) {
        self.calls.push(HwCall::StartWindow);
    }

    fn window_stats(&self) -> PressureStats {
        self.stats
    }

    fn register_trigger(&mut self, trigger: PressureTrigger) {
        self.armed.retain(|t| t.id != trigger.id);
        self.armed.push(trigger);
        self.calls.push(HwCall::RegisterTrigger(trigger));
    }

    fn reset_trigger(&mut self, id: TriggerId) {
        self.armed.retain(|t| t.id != id);
        self.calls.push(HwCall::ResetTrigger(id));
    }

    fn poll_alert(&mut self) -> Option<PressureAlert> {
        self.alerts.take()
    }
}

impl VolumePort for MockHw {
    fn accumulated_ml(&self) -> u16 {
        self.volume_ml
    }

    fn reset(&mut self) {
        self.volume_ml = 0;
        self.calls.push(HwCall::ResetVolume);
    }
}

// ── MockPanel ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelCall {
    ShowAlarm(AlarmId, f32),
    ClearAlarm,
    SilencedCount(u8),
    Light(bool),
    Buzzer(bool),
}

#[derive(Default)]
pub struct MockPanel {
    pub screen: Option<(AlarmId, f32)>,
    pub silenced_count: u8,
    pub light: bool,
    pub buzzer: bool,
    /// Indicator writes are recorded but do not take effect.
    pub indicators_stuck: bool,
    pub calls: Vec<PanelCall>,
}

impl DisplayPort for MockPanel {
    fn show_alarm(&mut self, alarm: AlarmId, value: f32) {
        self.screen = Some((alarm, value));
        self.calls.push(PanelCall::ShowAlarm(alarm, value));
    }

    fn clear_alarm(&mut self) {
        self.screen = None;
        self.calls.push(PanelCall::ClearAlarm);
    }

    fn show_silenced_count(&mut self, count: u8) {
        self.silenced_count = count;
        self.calls.push(PanelCall::SilencedCount(count));
    }
}

impl IndicatorPort for MockPanel {
    fn set_alarm_light(&mut self, on: bool) {
        if !self.indicators_stuck {
            self.light = on;
        }
        self.calls.push(PanelCall::Light(on));
    }

    fn set_buzzer(&mut self, on: bool) {
        if !self.indicators_stuck {
            self.buzzer = on;
        }
        self.calls.push(PanelCall::Buzzer(on));
    }

    fn alarm_light_on(&self) -> bool {
        self.light
    }

    fn buzzer_on(&self) -> bool {
        self.buzzer
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<VentEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn transitions(&self) -> Vec<(BreathState, BreathState)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                VentEvent::StateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn raised(&self) -> Vec<AlarmId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                VentEvent::AlarmRaised { alarm, .. } => Some(*alarm),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &VentEvent) {
        self.events.push(*event);
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A started service with its mock ports.
pub struct Rig {
    pub svc: VentService,
    pub hw: MockHw,
    pub panel: MockPanel,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_config(VentConfig::default())
    }

    pub fn with_config(config: VentConfig) -> Self {
        let mut svc = VentService::new(config).expect("valid config");
        let mut hw = MockHw::new();
        let mut sink = RecordingSink::default();
        svc.start(&mut hw, &mut sink);
        Self {
            svc,
            hw,
            panel: MockPanel::default(),
            sink,
        }
    }

    pub fn tick(&mut self) {
        self.svc.tick(&mut self.hw, &mut self.panel, &mut self.sink);
    }

    /// Tick every [`TICK_MS`] for `ms` milliseconds.
    pub fn advance(&mut self, ms: u64) {
        let end = self.hw.now + ms;
        while self.hw.now < end {
            self.hw.now += TICK_MS;
            self.tick();
        }
    }

    /// Tick until the controller reaches `state`; panics after `limit_ms`.
    pub fn run_until(&mut self, state: BreathState, limit_ms: u64) {
        let end = self.hw.now + limit_ms;
        while self.svc.state() != state {
            assert!(
                self.hw.now < end,
                "no {state} within {limit_ms}ms, stuck in {}",
                self.svc.state()
            );
            self.hw.now += TICK_MS;
            self.tick();
        }
    }

    pub fn command(&mut self, cmd: ventcore::app::commands::VentCommand) {
        self.svc.handle_command(cmd, &mut self.hw, &mut self.sink);
    }

    /// From INHALE entry, run one breath with prompt motor completions
    /// and `volume_ml` delivered, ending at the next INHALE (or IDLE).
    pub fn breathe(&mut self, volume_ml: u16) {
        assert_eq!(self.svc.state(), BreathState::Inhale);
        self.hw.volume_ml = volume_ml;
        self.svc.motor_move_complete();
        self.run_until(BreathState::Plateau, 2_000);
        self.run_until(BreathState::Exhale, 1_000);
        self.svc.motor_move_complete();
        let end = self.hw.now + 4_000;
        while self.svc.state() == BreathState::Exhale {
            assert!(self.hw.now < end, "EXHALE never finished");
            self.hw.now += TICK_MS;
            self.tick();
        }
    }
}
