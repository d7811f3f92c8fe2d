//! Alarm priority supervisor.
//!
//! Owns the alarm table and decides which single alarm holds the
//! caregiver's attention.
//!
//! ## Record lifecycle
//!
//! ```text
//!            set_active                 silence (condition present)
//!   OFF ──────────────▶ LATCHED ───────────────────────────▶ SILENCED
//!    ▲                  ▲    │                                 │    │
//!    │      promote     │    │ preempted by a                  │    │
//!    │   (on silence)   │    │ more urgent alarm               │    │
//!    │                  │    ▼                                 │    │
//!    │                  QUEUED                                 │    │
//!    │                                                         │    │
//!    ├──────── silence (condition cleared) ◀── LATCHED         │    │
//!    ├──────── set_inactive ◀──────────────────────────────────┘    │
//!    └──────── timeout: re-submitted as set_active ◀────────────────┘
//! ```
//!
//! Urgency is always the explicit [`Priority`] field: it decides latch
//! arbitration, queue promotion and the highest silenced alarm.  Ties keep
//! the incumbent latched and promote queued alarms first-in first-out.
//!
//! A latched alarm stays latched after its condition clears; only the
//! caregiver's silence releases it.

pub mod cadence;
pub mod table;

use heapless::Vec;
use log::{info, warn};

use crate::config::VentConfig;
use cadence::{Blinker, CadenceTimings, LightPattern};
use table::{AlarmId, Priority};

/// Presentation status of one alarm record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmStatus {
    Off,
    Latched,
    Queued,
    Silenced,
}

/// Mutable state of one alarm.
#[derive(Debug, Clone, Copy)]
pub struct AlarmRecord {
    pub id: AlarmId,
    pub priority: Priority,
    /// The underlying hazard is still being reported.
    pub condition_present: bool,
    pub status: AlarmStatus,
    /// Last measurement shown alongside the alarm.
    pub value: f32,
    pub silence_elapsed_ms: u32,
    led: Blinker,
    sound: Blinker,
}

impl AlarmRecord {
    fn new(id: AlarmId) -> Self {
        Self {
            id,
            priority: id.priority(),
            condition_present: false,
            status: AlarmStatus::Off,
            value: 0.0,
            silence_elapsed_ms: 0,
            led: Blinker::default(),
            sound: Blinker::default(),
        }
    }
}

/// Summary of the supervisor's arbitration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorState {
    pub latched: Option<AlarmId>,
    pub queued_count: usize,
    pub highest_queued: Option<AlarmId>,
    pub silenced_count: usize,
    pub highest_silenced: Option<AlarmId>,
}

/// What the display and indicators should show right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presentation {
    /// Latched alarm and its value, or `None` to clear the alarm screen.
    pub screen: Option<(AlarmId, f32)>,
    pub silenced_count: u8,
    pub light_on: bool,
    pub buzzer_on: bool,
}

/// The alarm priority supervisor.
pub struct AlarmSupervisor {
    records: [AlarmRecord; AlarmId::COUNT],
    latched: Option<AlarmId>,
    /// Queued alarms in arrival order.
    queue: Vec<AlarmId, { AlarmId::COUNT }>,
    /// Silenced alarms in silence order.
    silenced: Vec<AlarmId, { AlarmId::COUNT }>,
    silence_timeout_ms: u32,
    pause_audio_ms: u32,
    audio_pause_left_ms: u32,
    timings: CadenceTimings,
    light_on: bool,
    buzzer_on: bool,
}

impl AlarmSupervisor {
    pub fn new(config: &VentConfig) -> Self {
        Self {
            records: AlarmId::ALL.map(AlarmRecord::new),
            latched: None,
            queue: Vec::new(),
            silenced: Vec::new(),
            silence_timeout_ms: config.silence_timeout_ms,
            pause_audio_ms: config.pause_audio_ms,
            audio_pause_left_ms: 0,
            timings: CadenceTimings::from_config(config),
            light_on: false,
            buzzer_on: false,
        }
    }

    // ── Alarm events ──────────────────────────────────────────

    /// An alarm condition is present, with its current value.
    pub fn set_active(&mut self, id: AlarmId, value: f32) {
        let rec = &mut self.records[id.index()];
        rec.condition_present = true;
        rec.value = value;
        if rec.status != AlarmStatus::Off {
            return;
        }

        match self.latched {
            None => self.latch(id),
            Some(current) if id.priority() > current.priority() => {
                info!("ALARM: {id} preempts {current}");
                self.enqueue(current);
                self.latch(id);
            }
            Some(_) => self.enqueue(id),
        }
    }

    /// An alarm condition has resolved.
    pub fn set_inactive(&mut self, id: AlarmId) {
        let rec = &mut self.records[id.index()];
        rec.condition_present = false;
        if rec.status == AlarmStatus::Silenced {
            rec.status = AlarmStatus::Off;
            self.silenced.retain(|s| *s != id);
            info!("ALARM CLEARED: {id} (was silenced)");
        }
        if self.is_idle() {
            info!("ALARM: supervisor idle");
        }
    }

    /// Caregiver acknowledgement of the latched alarm.
    pub fn silence(&mut self) {
        let Some(id) = self.latched.take() else {
            return;
        };

        let rec = &mut self.records[id.index()];
        if rec.condition_present {
            rec.status = AlarmStatus::Silenced;
            rec.silence_elapsed_ms = 0;
            // Capacity equals the table size; an id is never held twice.
            let _ = self.silenced.push(id);
            info!("ALARM SILENCED: {id}");
        } else {
            rec.status = AlarmStatus::Off;
            info!("ALARM ACKNOWLEDGED: {id} (condition cleared)");
        }

        if let Some(next) = self.highest_queued() {
            self.queue.retain(|q| *q != next);
            self.latch(next);
        }
    }

    /// Mute the buzzer for the configured window.
    pub fn pause_audio(&mut self) {
        self.audio_pause_left_ms = self.pause_audio_ms;
        info!("ALARM: audio paused for {}ms", self.pause_audio_ms);
    }

    /// Advance silence timeouts and presentation cadence by `delta_ms`.
    pub fn tick(&mut self, delta_ms: u32) {
        let mut expired: Vec<AlarmId, { AlarmId::COUNT }> = Vec::new();
        for id in &self.silenced {
            let rec = &mut self.records[id.index()];
            rec.silence_elapsed_ms = rec.silence_elapsed_ms.saturating_add(delta_ms);
            if rec.silence_elapsed_ms > self.silence_timeout_ms {
                let _ = expired.push(*id);
            }
        }
        for id in expired {
            warn!("ALARM: silence on {id} timed out, re-raising");
            self.silenced.retain(|s| *s != id);
            let rec = &mut self.records[id.index()];
            rec.status = AlarmStatus::Off;
            let value = rec.value;
            self.set_active(id, value);
        }

        if self.audio_pause_left_ms > 0 {
            self.audio_pause_left_ms = self.audio_pause_left_ms.saturating_sub(delta_ms);
            if self.audio_pause_left_ms == 0 {
                info!("ALARM: audio resumed");
            }
        }

        self.update_cadence(delta_ms);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn latched(&self) -> Option<AlarmId> {
        self.latched
    }

    pub fn record(&self, id: AlarmId) -> &AlarmRecord {
        &self.records[id.index()]
    }

    pub fn status(&self, id: AlarmId) -> AlarmStatus {
        self.records[id.index()].status
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn silenced_count(&self) -> usize {
        self.silenced.len()
    }

    /// Most urgent queued alarm; earliest arrival wins a tie.
    pub fn highest_queued(&self) -> Option<AlarmId> {
        most_urgent(&self.queue)
    }

    /// Most urgent silenced alarm; earliest silenced wins a tie.
    pub fn highest_silenced(&self) -> Option<AlarmId> {
        most_urgent(&self.silenced)
    }

    /// No alarm is latched, queued, or silenced.
    pub fn is_idle(&self) -> bool {
        self.latched.is_none() && self.queue.is_empty() && self.silenced.is_empty()
    }

    pub fn audio_paused(&self) -> bool {
        self.audio_pause_left_ms > 0
    }

    pub fn state(&self) -> SupervisorState {
        SupervisorState {
            latched: self.latched,
            queued_count: self.queue.len(),
            highest_queued: self.highest_queued(),
            silenced_count: self.silenced.len(),
            highest_silenced: self.highest_silenced(),
        }
    }

    pub fn presentation(&self) -> Presentation {
        Presentation {
            screen: self
                .latched
                .map(|id| (id, self.records[id.index()].value)),
            silenced_count: self.silenced.len() as u8,
            light_on: self.light_on,
            buzzer_on: self.buzzer_on,
        }
    }

    /// Cross-check the record statuses against the bookkeeping.
    pub fn invariants_hold(&self) -> bool {
        let count = |status| self.records.iter().filter(|r| r.status == status).count();
        let latched = count(AlarmStatus::Latched);
        let queued = count(AlarmStatus::Queued);
        let silenced = count(AlarmStatus::Silenced);
        let off = count(AlarmStatus::Off);

        latched <= 1
            && latched == usize::from(self.latched.is_some())
            && self
                .latched
                .is_none_or(|id| self.status(id) == AlarmStatus::Latched)
            && queued == self.queue.len()
            && self.queue.iter().all(|id| self.status(*id) == AlarmStatus::Queued)
            && silenced == self.silenced.len()
            && self
                .silenced
                .iter()
                .all(|id| self.status(*id) == AlarmStatus::Silenced)
            && latched + queued + silenced + off == AlarmId::COUNT
    }

    // ── Internal ──────────────────────────────────────────────

    fn latch(&mut self, id: AlarmId) {
        let rec = &mut self.records[id.index()];
        rec.status = AlarmStatus::Latched;
        rec.led.restart();
        rec.sound.restart();
        self.latched = Some(id);
        warn!("ALARM LATCHED: {id} ({:?}) value={:.1}", rec.priority, rec.value);
    }

    fn enqueue(&mut self, id: AlarmId) {
        self.records[id.index()].status = AlarmStatus::Queued;
        // Capacity equals the table size; an id is never held twice.
        let _ = self.queue.push(id);
        info!("ALARM QUEUED: {id} ({} waiting)", self.queue.len());
    }

    fn update_cadence(&mut self, delta_ms: u32) {
        let timings = self.timings;

        self.light_on = match self.latched.or_else(|| self.highest_silenced()) {
            Some(id) => {
                let pattern = LightPattern::for_priority(id.priority());
                self.records[id.index()]
                    .led
                    .advance(delta_ms, timings.light_toggle_ms(pattern))
            }
            None => false,
        };

        self.buzzer_on = match self.latched {
            Some(id) => {
                let sound = id.spec().sound;
                let rec = &mut self.records[id.index()];
                let on = cadence::sound_output(sound, &mut rec.sound, delta_ms, &timings);
                on && self.audio_pause_left_ms == 0
            }
            None => false,
        };
    }
}

fn most_urgent(ids: &[AlarmId]) -> Option<AlarmId> {
    ids.iter().copied().fold(None, |best, id| match best {
        Some(b) if b.priority() >= id.priority() => Some(b),
        _ => Some(id),
    })
}
