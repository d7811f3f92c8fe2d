//! Port traits: the hexagonal boundary between the control core and the
//! ventilator hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ VentService (domain)
//! ```
//!
//! Driven adapters (motor driver, pressure sampler, flow integrator, panel)
//! implement these traits.  The [`VentService`](super::service::VentService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! ## Interrupt notes
//!
//! - **PressurePort** implementations evaluate registered triggers in their
//!   sampling interrupt and only *enqueue* crossings (see
//!   [`AlertQueue`](crate::events::AlertQueue)).  `poll_alert` hands them
//!   to the service one at a time, on the control thread.
//! - No port method may block.

use crate::alarm::table::AlarmId;
use crate::events::{PressureAlert, PressureTrigger, TriggerId};
use crate::fsm::context::{Direction, PressureStats};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.
pub trait ClockPort {
    /// Milliseconds since an arbitrary epoch; never decreases.
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Motor port (domain → compression mechanism)
// ───────────────────────────────────────────────────────────────

/// Motion commands for the compression mechanism.
///
/// Timed moves report completion asynchronously through
/// [`VentService::motor_move_complete`](super::service::VentService::motor_move_complete).
pub trait MotorPort {
    /// Remove drive immediately.
    fn stop(&mut self);

    /// Hold position.
    fn brake(&mut self);

    /// Return to the home position.
    fn home(&mut self, speed_dps: f32);

    /// Travel `distance_deg` at a fixed speed.
    fn move_by(&mut self, direction: Direction, distance_deg: f32, speed_dps: f32);

    /// Travel up to `distance_deg` at an open-loop drive level (0–40).
    fn move_by_at_drive(&mut self, direction: Direction, distance_deg: f32, drive: u8);

    /// Change the drive level of the move in progress.
    fn update_drive(&mut self, drive: u8);
}

// ───────────────────────────────────────────────────────────────
// Pressure port (hardware → domain, with interrupt triggers)
// ───────────────────────────────────────────────────────────────

/// Airway pressure sampling.
pub trait PressurePort {
    /// Discard the current statistics window and start a new one.
    fn start_window(&mut self);

    /// Statistics of the current window.
    fn window_stats(&self) -> PressureStats;

    /// Arm a level-crossing trigger, replacing any with the same id.
    fn register_trigger(&mut self, trigger: PressureTrigger);

    /// Disarm a trigger.
    fn reset_trigger(&mut self, id: TriggerId);

    /// Take the oldest queued trigger crossing, if any.
    fn poll_alert(&mut self) -> Option<PressureAlert>;
}

// ───────────────────────────────────────────────────────────────
// Volume port
// ───────────────────────────────────────────────────────────────

/// Delivered-volume accumulator.
pub trait VolumePort {
    /// Volume accumulated since the last reset (mL).
    fn accumulated_ml(&self) -> u16;

    fn reset(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Presentation ports (domain → caregiver)
// ───────────────────────────────────────────────────────────────

/// Alarm screen.  Rendering is the adapter's business.
pub trait DisplayPort {
    fn show_alarm(&mut self, alarm: AlarmId, value: f32);

    fn clear_alarm(&mut self);

    fn show_silenced_count(&mut self, count: u8);
}

/// Alarm light and buzzer.
///
/// The queries report the level last *applied* to the output, so a failed
/// write reads back as unchanged and the service writes it again.
pub trait IndicatorPort {
    fn set_alarm_light(&mut self, on: bool);

    fn set_buzzer(&mut self, on: bool);

    fn alarm_light_on(&self) -> bool;

    fn buzzer_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`VentEvent`](super::events::VentEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::VentEvent);
}

// ───────────────────────────────────────────────────────────────
// Port bundles
// ───────────────────────────────────────────────────────────────

/// Everything the breath cycle drives or samples.  Implemented for any
/// type providing the four ports, so one adapter can own the shared bus.
pub trait VentilatorHw: ClockPort + MotorPort + PressurePort + VolumePort {}

impl<T: ClockPort + MotorPort + PressurePort + VolumePort> VentilatorHw for T {}

/// The caregiver-facing outputs.
pub trait AlarmPanel: DisplayPort + IndicatorPort {}

impl<T: DisplayPort + IndicatorPort> AlarmPanel for T {}
