//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`VentEvent`] as one
//! structured line through the `log` facade.  The board crate decides
//! where the logger goes (UART, RTT, a host terminal).

use log::{error, info, warn};

use crate::app::events::VentEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`VentEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &VentEvent) {
        match event {
            VentEvent::Started(state) => {
                info!("START | initial_state={state}");
            }
            VentEvent::StateChanged { from, to } => {
                info!("STATE | {from} -> {to}");
            }
            VentEvent::HazardReported(report) => match report.value {
                Some(v) => warn!("HAZARD | {} value={v:.1}", report.hazard),
                None => warn!("HAZARD | {}", report.hazard),
            },
            VentEvent::AlarmRaised { alarm, value } => {
                error!("ALARM | {alarm} ({:?}) value={value:.1}", alarm.priority());
            }
            VentEvent::HazardCleared(hazard) => {
                info!("CLEAR | {hazard}");
            }
            VentEvent::BreathCompleted(m) => {
                info!(
                    "BREATH | #{} | PIP={:.1} PEEP={:.1} Pplat={:.1} cmH2O | Vt={}mL | T={}ms",
                    m.cycle, m.pip_cmh2o, m.peep_cmh2o, m.plateau_cmh2o, m.volume_ml, m.period_ms,
                );
            }
        }
    }
}
