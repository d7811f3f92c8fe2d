//! Unified error types for the ventilator core.
//!
//! Two classes exist.  [`ParamError`] rejects an out-of-range clinician
//! setting before anything is mutated.  [`Hazard`] is the runtime taxonomy
//! the breathing-cycle controller reports while it keeps cycling.  All
//! variants are `Copy` so they can be passed through the latch and alarm
//! supervisor without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A setter received a value it cannot accept.
    Param(ParamError),
    /// A runtime hazard surfaced through a fallible path.
    Hazard(Hazard),
    /// A configuration blob could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(e) => write!(f, "param: {e}"),
            Self::Hazard(h) => write!(f, "hazard: {h}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter errors
// ---------------------------------------------------------------------------

/// Rejection returned by every breath-parameter and threshold setter.
/// State is never modified when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamError {
    /// Value outside the fixed validation range for `field`.
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// The derived inspiratory time would be shorter than the hold time.
    InspiratoryTimeTooShort { inspiratory_ms: i64, hold_ms: u32 },
    /// The breath period cannot accommodate the requested inspiratory time.
    PeriodTooShort { period_ms: u32, required_ms: u32 },
    /// A lower limit would meet or exceed its paired upper limit.
    LimitsCrossed { lower: &'static str, upper: &'static str },
    /// Volume-to-angle table has fewer than two points or is not ascending.
    InvalidVolumeTable,
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field}={value} outside [{min}, {max}]"),
            Self::InspiratoryTimeTooShort {
                inspiratory_ms,
                hold_ms,
            } => write!(
                f,
                "inspiratory time {inspiratory_ms}ms shorter than hold {hold_ms}ms"
            ),
            Self::PeriodTooShort {
                period_ms,
                required_ms,
            } => write!(f, "period {period_ms}ms cannot fit {required_ms}ms"),
            Self::LimitsCrossed { lower, upper } => {
                write!(f, "{lower} must stay below {upper}")
            }
            Self::InvalidVolumeTable => write!(f, "volume table must ascend"),
        }
    }
}

impl From<ParamError> for Error {
    fn from(e: ParamError) -> Self {
        Self::Param(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Failure to load a serialized [`VentConfig`](crate::config::VentConfig).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The blob did not decode.
    Malformed,
    /// The blob decoded but holds settings the core would reject.
    Invalid(ParamError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed config"),
            Self::Invalid(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl From<ParamError> for ConfigError {
    fn from(e: ParamError) -> Self {
        Self::Invalid(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Runtime hazards
// ---------------------------------------------------------------------------

/// Hazards detected during normal cycling.
///
/// Each kind owns one bit so the error latch can track "reported this
/// cycle" and "currently alarmed" as two bitmasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Hazard {
    /// Airway pressure above the maximum PIP.
    PipExceeded = 1 << 0,
    /// Peak pressure never reached the minimum PIP.
    PipNotReached = 1 << 1,
    /// Pressure fell below the minimum PEEP.
    PeepNotMaintained = 1 << 2,
    /// PIP − PEEP differential below minimum: circuit likely disconnected.
    AirflowDisconnect = 1 << 3,
    /// Delivered volume above the maximum tidal volume.
    TidalVolumeExceeded = 1 << 4,
    /// Delivered volume below the minimum tidal volume.
    TidalVolumeNotReached = 1 << 5,
    /// Inhale move did not finish within the allowed time error.
    InspiratoryTimeExceeded = 1 << 6,
    /// Exhale move did not finish within the allowed time error.
    ExpiratoryTimeExceeded = 1 << 7,
    /// Measured breath period differs from the set period.
    RateNotMet = 1 << 8,
    /// Lifetime breath count reached the service interval.
    MaintenanceDue = 1 << 9,
}

impl Hazard {
    /// Number of hazard kinds.
    pub const COUNT: usize = 10;

    /// Every hazard kind in bit order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::PipExceeded,
        Self::PipNotReached,
        Self::PeepNotMaintained,
        Self::AirflowDisconnect,
        Self::TidalVolumeExceeded,
        Self::TidalVolumeNotReached,
        Self::InspiratoryTimeExceeded,
        Self::ExpiratoryTimeExceeded,
        Self::RateNotMet,
        Self::MaintenanceDue,
    ];

    /// Return the bitmask for this hazard.
    pub const fn mask(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PipExceeded => write!(f, "PIP exceeded"),
            Self::PipNotReached => write!(f, "PIP not reached"),
            Self::PeepNotMaintained => write!(f, "PEEP not maintained"),
            Self::AirflowDisconnect => write!(f, "airflow disconnect"),
            Self::TidalVolumeExceeded => write!(f, "tidal volume exceeded"),
            Self::TidalVolumeNotReached => write!(f, "tidal volume not reached"),
            Self::InspiratoryTimeExceeded => write!(f, "inspiratory time exceeded"),
            Self::ExpiratoryTimeExceeded => write!(f, "expiratory time exceeded"),
            Self::RateNotMet => write!(f, "rate not met"),
            Self::MaintenanceDue => write!(f, "maintenance due"),
        }
    }
}

impl From<Hazard> for Error {
    fn from(h: Hazard) -> Self {
        Self::Hazard(h)
    }
}

/// A hazard together with the measurement that triggered it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardReport {
    pub hazard: Hazard,
    pub value: Option<f32>,
}

impl HazardReport {
    pub fn new(hazard: Hazard, value: f32) -> Self {
        Self {
            hazard,
            value: Some(value),
        }
    }

    pub fn bare(hazard: Hazard) -> Self {
        Self {
            hazard,
            value: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
