//! Clinician-facing breath parameters and safety thresholds.
//!
//! Every setter validates against a fixed range, recomputes the derived
//! timing on a candidate copy, and only commits when both steps succeed.
//! A rejected call therefore leaves the previous settings untouched.
//!
//! ```text
//!  BreathSettings ──derive()──▶ DerivedTiming ──(INHALE entry)──▶ CycleSnapshot
//!  SafetyThresholds ───────────────────────────────────────────────────┘
//! ```

use core::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::config::VolumePoint;
use crate::control::volume;
use crate::error::ParamError;

// ── Validation ranges ─────────────────────────────────────────

pub const RATE_BPM: RangeInclusive<u16> = 8..=40;
pub const TIDAL_VOLUME_ML: RangeInclusive<u16> = 150..=900;
pub const IE_RATIO: RangeInclusive<u16> = 100..=400;
pub const INSPIRATORY_TIME_MS: RangeInclusive<u32> = 300..=4000;
pub const HOLD_TIME_MS: RangeInclusive<u32> = 100..=1000;
pub const PRESSURE_SETPOINT_CMH2O: RangeInclusive<f32> = 5.0..=45.0;

pub const MAX_PIP_CMH2O: RangeInclusive<f32> = 10.0..=70.0;
pub const MIN_PIP_CMH2O: RangeInclusive<f32> = 0.0..=60.0;
pub const MIN_PEEP_CMH2O: RangeInclusive<f32> = 0.0..=30.0;
pub const TIDAL_LIMIT_ML: RangeInclusive<u16> = 0..=1500;
pub const ERROR_PCT: RangeInclusive<u8> = 1..=100;
pub const PIP_PEEP_DIFF_CMH2O: RangeInclusive<f32> = 0.0..=40.0;

fn check<T>(field: &'static str, value: T, range: &RangeInclusive<T>) -> Result<(), ParamError>
where
    T: PartialOrd + Copy + Into<f64>,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfRange {
            field,
            value: Into::<f64>::into(value) as f32,
            min: Into::<f64>::into(*range.start()) as f32,
            max: Into::<f64>::into(*range.end()) as f32,
        })
    }
}

// ── Modes ─────────────────────────────────────────────────────

/// Ventilation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VentMode {
    /// Deliver a set tidal volume with a timed compression move.
    VolumeControl,
    /// Track a pressure setpoint with the closed-loop drive.
    PressureControl,
}

/// Which timing field the clinician set last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingSource {
    /// Inspiratory time follows from the I:E ratio.
    Ratio,
    /// I:E ratio follows from the inspiratory time.
    InspiratoryTime,
}

// ── Raw settings ──────────────────────────────────────────────

/// The values a clinician dials in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathSettings {
    pub mode: VentMode,
    pub timing: TimingSource,
    /// Respiratory rate (breaths/min).
    pub rate_bpm: u16,
    /// Tidal volume (mL).
    pub tidal_volume_ml: u16,
    /// Expiratory share for I = 1, times 100 (200 = 1:2).
    pub ie_ratio: u16,
    /// Inspiratory time when `timing` is `InspiratoryTime` (ms).
    pub inspiratory_time_ms: u32,
    /// Post-inhale hold, covering plateau sampling and pause (ms).
    pub hold_time_ms: u32,
    /// Inspiratory pressure target, pressure control only (cmH2O).
    pub pressure_setpoint_cmh2o: f32,
}

impl Default for BreathSettings {
    fn default() -> Self {
        Self {
            mode: VentMode::VolumeControl,
            timing: TimingSource::Ratio,
            rate_bpm: 15,
            tidal_volume_ml: 400,
            ie_ratio: 200,
            inspiratory_time_ms: 1000,
            hold_time_ms: 200,
            pressure_setpoint_cmh2o: 20.0,
        }
    }
}

/// Timing and kinematics computed from [`BreathSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedTiming {
    pub period_ms: u32,
    pub inspiratory_ms: u32,
    pub expiratory_ms: u32,
    /// Hold included in the period (zero in pressure control).
    pub hold_ms: u32,
    /// Effective I:E ratio, whichever field was set.
    pub ie_ratio: u16,
    pub angle_deg: f32,
    pub inhale_speed_dps: f32,
    pub exhale_speed_dps: f32,
}

impl BreathSettings {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ParamError> {
        check("rate_bpm", self.rate_bpm, &RATE_BPM)?;
        check("tidal_volume_ml", self.tidal_volume_ml, &TIDAL_VOLUME_ML)?;
        check("ie_ratio", self.ie_ratio, &IE_RATIO)?;
        check(
            "inspiratory_time_ms",
            self.inspiratory_time_ms,
            &INSPIRATORY_TIME_MS,
        )?;
        check("hold_time_ms", self.hold_time_ms, &HOLD_TIME_MS)?;
        check(
            "pressure_setpoint_cmh2o",
            self.pressure_setpoint_cmh2o,
            &PRESSURE_SETPOINT_CMH2O,
        )
    }

    /// Compute the derived timing, or reject the combination.
    ///
    /// In ratio mode the inspiratory phase must be at least the hold time,
    /// in pressure control too, even though no hold is run there.
    pub fn derive(&self, table: &[VolumePoint]) -> Result<DerivedTiming, ParamError> {
        self.validate()?;

        let period = 60_000 / u32::from(self.rate_bpm);
        let hold = match self.mode {
            VentMode::VolumeControl => self.hold_time_ms,
            VentMode::PressureControl => 0,
        };

        let (inspiratory, expiratory, ratio) = match self.timing {
            TimingSource::Ratio => {
                let active = period * 100 / (100 + u32::from(self.ie_ratio));
                let inspiratory = i64::from(active) - i64::from(hold);
                if inspiratory < i64::from(self.hold_time_ms) {
                    return Err(ParamError::InspiratoryTimeTooShort {
                        inspiratory_ms: inspiratory,
                        hold_ms: self.hold_time_ms,
                    });
                }
                (active - hold, period - active, self.ie_ratio)
            }
            TimingSource::InspiratoryTime => {
                let required = self.inspiratory_time_ms + hold;
                if required >= period {
                    return Err(ParamError::PeriodTooShort {
                        period_ms: period,
                        required_ms: required,
                    });
                }
                let ratio = (period * 100 / required).saturating_sub(100);
                (
                    self.inspiratory_time_ms,
                    period - required,
                    ratio.min(u32::from(u16::MAX)) as u16,
                )
            }
        };

        let angle = volume::interpolate_angle(table, self.tidal_volume_ml)?;

        Ok(DerivedTiming {
            period_ms: period,
            inspiratory_ms: inspiratory,
            expiratory_ms: expiratory,
            hold_ms: hold,
            ie_ratio: ratio,
            angle_deg: angle,
            inhale_speed_dps: angle * 1000.0 / inspiratory as f32,
            exhale_speed_dps: angle * 1000.0 / expiratory as f32,
        })
    }
}

// ── Parameter set with derived timing ─────────────────────────

/// Live breath parameters: raw settings, derived timing, and the
/// calibration table the angle is interpolated from.
#[derive(Debug, Clone)]
pub struct BreathParameters {
    settings: BreathSettings,
    derived: DerivedTiming,
    table: heapless::Vec<VolumePoint, { crate::config::VOLUME_TABLE_CAP }>,
}

impl BreathParameters {
    pub fn new(
        settings: BreathSettings,
        table: &heapless::Vec<VolumePoint, { crate::config::VOLUME_TABLE_CAP }>,
    ) -> Result<Self, ParamError> {
        volume::validate_table(table)?;
        let derived = settings.derive(table)?;
        Ok(Self {
            settings,
            derived,
            table: table.clone(),
        })
    }

    pub fn settings(&self) -> &BreathSettings {
        &self.settings
    }

    pub fn derived(&self) -> &DerivedTiming {
        &self.derived
    }

    pub fn set_mode(&mut self, mode: VentMode) -> Result<(), ParamError> {
        self.apply(|s| s.mode = mode)
    }

    pub fn set_rate(&mut self, bpm: u16) -> Result<(), ParamError> {
        self.apply(|s| s.rate_bpm = bpm)
    }

    pub fn set_tidal_volume(&mut self, ml: u16) -> Result<(), ParamError> {
        self.apply(|s| s.tidal_volume_ml = ml)
    }

    /// Set the I:E ratio and make it the timing source.
    pub fn set_ie_ratio(&mut self, ratio: u16) -> Result<(), ParamError> {
        self.apply(|s| {
            s.ie_ratio = ratio;
            s.timing = TimingSource::Ratio;
        })
    }

    /// Set the inspiratory time and make it the timing source.
    pub fn set_inspiratory_time(&mut self, ms: u32) -> Result<(), ParamError> {
        self.apply(|s| {
            s.inspiratory_time_ms = ms;
            s.timing = TimingSource::InspiratoryTime;
        })
    }

    pub fn set_hold_time(&mut self, ms: u32) -> Result<(), ParamError> {
        self.apply(|s| s.hold_time_ms = ms)
    }

    pub fn set_pressure_setpoint(&mut self, cmh2o: f32) -> Result<(), ParamError> {
        self.apply(|s| s.pressure_setpoint_cmh2o = cmh2o)
    }

    /// Effective I:E ratio, derived when the inspiratory time is the source.
    pub fn ie_ratio(&self) -> u16 {
        self.derived.ie_ratio
    }

    /// Effective inspiratory time, derived when the ratio is the source.
    pub fn inspiratory_time(&self) -> u32 {
        self.derived.inspiratory_ms
    }

    fn apply(&mut self, edit: impl FnOnce(&mut BreathSettings)) -> Result<(), ParamError> {
        let mut candidate = self.settings;
        edit(&mut candidate);
        let derived = candidate.derive(&self.table)?;
        self.settings = candidate;
        self.derived = derived;
        Ok(())
    }
}

// ── Safety thresholds ─────────────────────────────────────────

/// Alarm limits evaluated by the breathing-cycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyThresholds {
    pub max_pip_cmh2o: f32,
    pub min_pip_cmh2o: f32,
    pub min_peep_cmh2o: f32,
    pub max_tidal_volume_ml: u16,
    pub min_tidal_volume_ml: u16,
    /// Allowed overrun of inspiratory/expiratory time (percent).
    pub max_inspiratory_error_pct: u8,
    /// Allowed deviation of the measured breath period (percent).
    pub max_rate_error_pct: u8,
    pub min_pip_peep_diff_cmh2o: f32,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            max_pip_cmh2o: 40.0,
            min_pip_cmh2o: 8.0,
            min_peep_cmh2o: 2.0,
            max_tidal_volume_ml: 1000,
            min_tidal_volume_ml: 100,
            max_inspiratory_error_pct: 20,
            max_rate_error_pct: 20,
            min_pip_peep_diff_cmh2o: 5.0,
        }
    }
}

impl SafetyThresholds {
    /// Range-check every field and the lower/upper pairings.
    pub fn validate(&self) -> Result<(), ParamError> {
        check("max_pip_cmh2o", self.max_pip_cmh2o, &MAX_PIP_CMH2O)?;
        check("min_pip_cmh2o", self.min_pip_cmh2o, &MIN_PIP_CMH2O)?;
        check("min_peep_cmh2o", self.min_peep_cmh2o, &MIN_PEEP_CMH2O)?;
        check(
            "max_tidal_volume_ml",
            self.max_tidal_volume_ml,
            &TIDAL_LIMIT_ML,
        )?;
        check(
            "min_tidal_volume_ml",
            self.min_tidal_volume_ml,
            &TIDAL_LIMIT_ML,
        )?;
        check(
            "max_inspiratory_error_pct",
            self.max_inspiratory_error_pct,
            &ERROR_PCT,
        )?;
        check("max_rate_error_pct", self.max_rate_error_pct, &ERROR_PCT)?;
        check(
            "min_pip_peep_diff_cmh2o",
            self.min_pip_peep_diff_cmh2o,
            &PIP_PEEP_DIFF_CMH2O,
        )?;

        if self.min_pip_cmh2o >= self.max_pip_cmh2o {
            return Err(ParamError::LimitsCrossed {
                lower: "min_pip_cmh2o",
                upper: "max_pip_cmh2o",
            });
        }
        if self.min_peep_cmh2o >= self.max_pip_cmh2o {
            return Err(ParamError::LimitsCrossed {
                lower: "min_peep_cmh2o",
                upper: "max_pip_cmh2o",
            });
        }
        if self.min_tidal_volume_ml >= self.max_tidal_volume_ml {
            return Err(ParamError::LimitsCrossed {
                lower: "min_tidal_volume_ml",
                upper: "max_tidal_volume_ml",
            });
        }
        Ok(())
    }

    pub fn set_max_pip(&mut self, cmh2o: f32) -> Result<(), ParamError> {
        self.apply(|t| t.max_pip_cmh2o = cmh2o)
    }

    pub fn set_min_pip(&mut self, cmh2o: f32) -> Result<(), ParamError> {
        self.apply(|t| t.min_pip_cmh2o = cmh2o)
    }

    pub fn set_min_peep(&mut self, cmh2o: f32) -> Result<(), ParamError> {
        self.apply(|t| t.min_peep_cmh2o = cmh2o)
    }

    pub fn set_max_tidal_volume(&mut self, ml: u16) -> Result<(), ParamError> {
        self.apply(|t| t.max_tidal_volume_ml = ml)
    }

    pub fn set_min_tidal_volume(&mut self, ml: u16) -> Result<(), ParamError> {
        self.apply(|t| t.min_tidal_volume_ml = ml)
    }

    pub fn set_max_inspiratory_error(&mut self, pct: u8) -> Result<(), ParamError> {
        self.apply(|t| t.max_inspiratory_error_pct = pct)
    }

    pub fn set_max_rate_error(&mut self, pct: u8) -> Result<(), ParamError> {
        self.apply(|t| t.max_rate_error_pct = pct)
    }

    pub fn set_min_pip_peep_diff(&mut self, cmh2o: f32) -> Result<(), ParamError> {
        self.apply(|t| t.min_pip_peep_diff_cmh2o = cmh2o)
    }

    fn apply(&mut self, edit: impl FnOnce(&mut Self)) -> Result<(), ParamError> {
        let mut candidate = *self;
        edit(&mut candidate);
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}
