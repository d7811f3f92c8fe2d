//! Outbound application events.
//!
//! The [`VentService`](super::service::VentService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, record in a trend
//! buffer, forward to a monitor.

use crate::alarm::table::AlarmId;
use crate::error::{Hazard, HazardReport};
use crate::fsm::BreathState;
use crate::fsm::context::BreathMetrics;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VentEvent {
    /// The service has started (carries initial state).
    Started(BreathState),

    /// The breath cycle moved between states.
    StateChanged { from: BreathState, to: BreathState },

    /// The controller reported a hazard (every report, not only edges).
    HazardReported(HazardReport),

    /// A hazard's rising edge raised an alarm.
    AlarmRaised { alarm: AlarmId, value: f32 },

    /// A hazard stopped recurring and was resolved by the cycle sweep.
    HazardCleared(Hazard),

    /// One breath finished; measurements attached.
    BreathCompleted(BreathMetrics),
}
