//! Interrupt-driven pressure alerts.
//!
//! The pressure-sampling collaborator evaluates registered level-crossing
//! triggers in its sampling interrupt.  A crossing must not touch the
//! controller or alarm state directly; it only pushes a [`PressureAlert`]
//! into an [`AlertQueue`].  The main loop drains the queue once per tick
//! before advancing the state machines.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Sampling ISR │────▶│  AlertQueue  │────▶│  VentService │
//! │ (producer)   │     │  (bounded)   │     │  tick()      │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::error::Hazard;
use crate::params::SafetyThresholds;

/// Maximum number of alerts buffered between two ticks.
pub const ALERT_QUEUE_CAP: usize = 8;

/// Identity of a registered pressure trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TriggerId {
    /// Airway pressure rose above the maximum PIP.
    OverPressure = 0,
    /// Airway pressure fell below the minimum PEEP.
    UnderPressure = 1,
}

impl TriggerId {
    pub const COUNT: usize = 2;

    pub const ALL: [Self; Self::COUNT] = [Self::OverPressure, Self::UnderPressure];
}

/// Direction of a level crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Below,
    Above,
}

/// A level-crossing trigger registered with the pressure collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureTrigger {
    pub id: TriggerId,
    pub comparison: Comparison,
    pub threshold_cmh2o: f32,
    /// Hazard reported when the trigger fires.
    pub hazard: Hazard,
}

impl PressureTrigger {
    /// Whether `pressure` crosses this trigger's threshold.
    pub fn is_crossed(&self, pressure_cmh2o: f32) -> bool {
        match self.comparison {
            Comparison::Below => pressure_cmh2o < self.threshold_cmh2o,
            Comparison::Above => pressure_cmh2o > self.threshold_cmh2o,
        }
    }
}

/// The triggers that follow from the current safety thresholds.
pub fn triggers_for(thresholds: &SafetyThresholds) -> [PressureTrigger; TriggerId::COUNT] {
    [
        PressureTrigger {
            id: TriggerId::OverPressure,
            comparison: Comparison::Above,
            threshold_cmh2o: thresholds.max_pip_cmh2o,
            hazard: Hazard::PipExceeded,
        },
        PressureTrigger {
            id: TriggerId::UnderPressure,
            comparison: Comparison::Below,
            threshold_cmh2o: thresholds.min_peep_cmh2o,
            hazard: Hazard::PeepNotMaintained,
        },
    ]
}

/// One trigger firing, as delivered from interrupt context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureAlert {
    pub trigger: TriggerId,
    pub pressure_cmh2o: f32,
}

/// Bounded single-consumer alert queue.
///
/// Producers may run in interrupt context; the critical-section mutex
/// makes `raise` safe there.  When the queue is full the newest alert is
/// dropped: the same crossing will fire again on the next sample.
pub struct AlertQueue {
    channel: Channel<CriticalSectionRawMutex, PressureAlert, ALERT_QUEUE_CAP>,
}

impl AlertQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Push an alert.  Returns `false` if the queue is full.
    pub fn raise(&self, alert: PressureAlert) -> bool {
        self.channel.try_send(alert).is_ok()
    }

    /// Pop the oldest alert, if any.
    pub fn take(&self) -> Option<PressureAlert> {
        self.channel.try_receive().ok()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Number of pending alerts.
    pub fn len(&self) -> usize {
        self.channel.len()
    }
}

impl Default for AlertQueue {
    fn default() -> Self {
        Self::new()
    }
}
