//! Error latch.
//!
//! Turns per-tick hazard reports into edge-triggered alarm set/clear calls
//! on the [`AlarmSupervisor`].
//!
//! ## Hazard lifecycle
//!
//! 1. The controller reports hazard *k* (possibly many times per cycle).
//! 2. On the first report while *k* is not alarmed, the mapped alarm is
//!    set active with the report value.  Both bits are set for *k*.
//! 3. At every INHALE entry the latch sweeps: kinds alarmed but not
//!    reported during the closing cycle are resolved and their alarmed bit
//!    cleared.  The reported bits then start over for the new cycle.
//!
//! A hazard must recur every cycle to stay alarmed.  One reported only in
//! cycle N is alarmed during N and N+1 and resolved at cycle N+2's INHALE
//! entry.

use heapless::Vec;
use log::{error, info};

use crate::alarm::AlarmSupervisor;
use crate::alarm::table::{AlarmId, alarm_for};
use crate::error::{Hazard, HazardReport};

/// Per-hazard-kind debounce state.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    /// Kinds reported since the last cycle boundary.
    reported: u16,
    /// Kinds whose alarm has been raised and not yet resolved.
    alarmed: u16,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one hazard report.  Returns the alarm raised by this report,
    /// if it was a rising edge for a mapped hazard.
    pub fn report(&mut self, report: HazardReport, alarms: &mut AlarmSupervisor) -> Option<AlarmId> {
        let mask = report.hazard.mask();
        let mut raised = None;

        if self.alarmed & mask == 0 {
            error!("HAZARD: {} value={:?}", report.hazard, report.value);
            if let Some(id) = alarm_for(report.hazard) {
                let value = report.value.unwrap_or(0.0).max(0.0);
                alarms.set_active(id, value);
                raised = Some(id);
            }
        }

        self.reported |= mask;
        self.alarmed |= mask;
        raised
    }

    /// Cycle boundary sweep, run at every INHALE entry before that entry's
    /// own reports.  Returns the hazards resolved by this sweep.
    pub fn cycle_boundary(&mut self, alarms: &mut AlarmSupervisor) -> Vec<Hazard, { Hazard::COUNT }> {
        let mut resolved = Vec::new();
        let stale = self.alarmed & !self.reported;

        for hazard in Hazard::ALL {
            if stale & hazard.mask() == 0 {
                continue;
            }
            info!("HAZARD CLEARED: {hazard}");
            if let Some(id) = alarm_for(hazard) {
                alarms.set_inactive(id);
            }
            self.alarmed &= !hazard.mask();
            // Capacity equals the hazard count.
            let _ = resolved.push(hazard);
        }

        self.reported = 0;
        resolved
    }

    /// Drop all latch state without touching the supervisor.
    pub fn reset(&mut self) {
        self.reported = 0;
        self.alarmed = 0;
    }

    pub fn is_alarmed(&self, hazard: Hazard) -> bool {
        self.alarmed & hazard.mask() != 0
    }

    pub fn is_reported(&self, hazard: Hazard) -> bool {
        self.reported & hazard.mask() != 0
    }

    /// Alarmed-kind bitmask.
    pub fn alarmed(&self) -> u16 {
        self.alarmed
    }
}
