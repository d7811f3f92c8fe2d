//! Static alarm configuration and the hazard → alarm mapping.
//!
//! | Alarm                  | Priority | Sound        | Raised by                   |
//! |------------------------|----------|--------------|-----------------------------|
//! | HighPressure           | HIGH     | continuous   | PipExceeded                 |
//! | Disconnect             | HIGH     | continuous   | AirflowDisconnect           |
//! | LowPressure            | MIDDLE   | intermittent | PipNotReached               |
//! | LowPeep                | MIDDLE   | intermittent | PeepNotMaintained           |
//! | HighTidalVolume        | MIDDLE   | intermittent | TidalVolumeExceeded         |
//! | LowTidalVolume         | MIDDLE   | intermittent | TidalVolumeNotReached       |
//! | InspiratoryTimeNotMet  | LOW      | intermittent | InspiratoryTimeExceeded     |
//! | RateNotMet             | LOW      | off          | RateNotMet                  |
//! | ServiceDue             | LOW      | off          | MaintenanceDue              |
//!
//! `ExpiratoryTimeExceeded` raises no alarm; it is still reported and
//! logged.

use core::fmt;

use crate::error::Hazard;

/// Alarm priority.  Ordering is urgency: `High > Middle > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Middle,
    High,
}

/// Buzzer pattern while an alarm is latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundPattern {
    Continuous,
    Intermittent,
    Off,
}

/// Identity of an alarm record.  Doubles as the index into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlarmId {
    HighPressure = 0,
    Disconnect = 1,
    LowPressure = 2,
    LowPeep = 3,
    HighTidalVolume = 4,
    LowTidalVolume = 5,
    InspiratoryTimeNotMet = 6,
    RateNotMet = 7,
    ServiceDue = 8,
}

impl AlarmId {
    /// Size of the alarm table.
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::HighPressure,
        Self::Disconnect,
        Self::LowPressure,
        Self::LowPeep,
        Self::HighTidalVolume,
        Self::LowTidalVolume,
        Self::InspiratoryTimeNotMet,
        Self::RateNotMet,
        Self::ServiceDue,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn spec(self) -> &'static AlarmSpec {
        &ALARM_TABLE[self.index()]
    }

    pub fn priority(self) -> Priority {
        self.spec().priority
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().label)
    }
}

/// Static description of one alarm.
#[derive(Debug)]
pub struct AlarmSpec {
    pub id: AlarmId,
    pub label: &'static str,
    pub priority: Priority,
    pub sound: SoundPattern,
}

/// The alarm table, indexed by [`AlarmId`].
pub static ALARM_TABLE: [AlarmSpec; AlarmId::COUNT] = [
    AlarmSpec {
        id: AlarmId::HighPressure,
        label: "HIGH PRESSURE",
        priority: Priority::High,
        sound: SoundPattern::Continuous,
    },
    AlarmSpec {
        id: AlarmId::Disconnect,
        label: "CIRCUIT DISCONNECT",
        priority: Priority::High,
        sound: SoundPattern::Continuous,
    },
    AlarmSpec {
        id: AlarmId::LowPressure,
        label: "LOW PRESSURE",
        priority: Priority::Middle,
        sound: SoundPattern::Intermittent,
    },
    AlarmSpec {
        id: AlarmId::LowPeep,
        label: "LOW PEEP",
        priority: Priority::Middle,
        sound: SoundPattern::Intermittent,
    },
    AlarmSpec {
        id: AlarmId::HighTidalVolume,
        label: "HIGH TIDAL VOLUME",
        priority: Priority::Middle,
        sound: SoundPattern::Intermittent,
    },
    AlarmSpec {
        id: AlarmId::LowTidalVolume,
        label: "LOW TIDAL VOLUME",
        priority: Priority::Middle,
        sound: SoundPattern::Intermittent,
    },
    AlarmSpec {
        id: AlarmId::InspiratoryTimeNotMet,
        label: "INSP TIME NOT MET",
        priority: Priority::Low,
        sound: SoundPattern::Intermittent,
    },
    AlarmSpec {
        id: AlarmId::RateNotMet,
        label: "RATE NOT MET",
        priority: Priority::Low,
        sound: SoundPattern::Off,
    },
    AlarmSpec {
        id: AlarmId::ServiceDue,
        label: "SERVICE DUE",
        priority: Priority::Low,
        sound: SoundPattern::Off,
    },
];

/// Alarm raised for a hazard kind, if any.
pub fn alarm_for(hazard: Hazard) -> Option<AlarmId> {
    match hazard {
        Hazard::PipExceeded => Some(AlarmId::HighPressure),
        Hazard::PipNotReached => Some(AlarmId::LowPressure),
        Hazard::PeepNotMaintained => Some(AlarmId::LowPeep),
        Hazard::AirflowDisconnect => Some(AlarmId::Disconnect),
        Hazard::TidalVolumeExceeded => Some(AlarmId::HighTidalVolume),
        Hazard::TidalVolumeNotReached => Some(AlarmId::LowTidalVolume),
        Hazard::InspiratoryTimeExceeded => Some(AlarmId::InspiratoryTimeNotMet),
        Hazard::ExpiratoryTimeExceeded => None,
        Hazard::RateNotMet => Some(AlarmId::RateNotMet),
        Hazard::MaintenanceDue => Some(AlarmId::ServiceDue),
    }
}
