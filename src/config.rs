//! System configuration parameters
//!
//! All tunable parameters for the ventilator core.  Clinician settings
//! live in [`BreathSettings`] and [`SafetyThresholds`] and are changed at
//! runtime through validated setters; everything else here is fixed at
//! start-up by the board integration.

use serde::{Deserialize, Serialize};

use crate::control::volume;
use crate::error::{ConfigError, ParamError};
use crate::params::{BreathSettings, SafetyThresholds};

/// Capacity of the volume→angle lookup table.
pub const VOLUME_TABLE_CAP: usize = 16;

/// One calibration point of the volume→travel-angle table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    /// Tidal volume in mL.
    pub volume_ml: u16,
    /// Compression travel in degrees that delivers `volume_ml`.
    pub angle_deg: f32,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VentConfig {
    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Plateau pressure sampling window (milliseconds)
    pub plateau_sample_ms: u32,
    /// Setpoint ramp from entry pressure to target in pressure control (ms)
    pub pressure_ramp_ms: u32,

    // --- Clinician settings at power-on ---
    pub breath: BreathSettings,
    pub thresholds: SafetyThresholds,

    // --- Mechanics ---
    /// Ordered volume→angle calibration points
    pub volume_table: heapless::Vec<VolumePoint, VOLUME_TABLE_CAP>,
    /// Speed used when homing from IDLE (degrees/second)
    pub homing_speed_dps: f32,

    // --- Pressure-control PID ---
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,

    // --- Alarms ---
    /// Time a silenced alarm stays quiet before it is re-raised (ms)
    pub silence_timeout_ms: u32,
    /// Caregiver "pause audio" window (ms)
    pub pause_audio_ms: u32,
    /// Light toggle interval for HIGH priority alarms (ms)
    pub fast_blink_ms: u32,
    /// Light toggle interval for MIDDLE priority alarms (ms)
    pub slow_blink_ms: u32,
    /// Buzzer toggle interval for intermittent sound (ms)
    pub intermittent_sound_ms: u32,

    // --- Maintenance ---
    /// Lifetime breath count after which service is due
    pub maintenance_interval_cycles: u32,
}

impl Default for VentConfig {
    fn default() -> Self {
        let mut volume_table = heapless::Vec::new();
        for (volume_ml, angle_deg) in [
            (200, 38.0),
            (300, 50.0),
            (400, 61.0),
            (500, 71.0),
            (600, 80.0),
            (700, 88.0),
            (800, 95.0),
        ] {
            let _ = volume_table.push(VolumePoint {
                volume_ml,
                angle_deg,
            });
        }

        Self {
            // Timing
            control_loop_interval_ms: 10, // 100 Hz
            plateau_sample_ms: 100,
            pressure_ramp_ms: 350,

            breath: BreathSettings::default(),
            thresholds: SafetyThresholds::default(),

            // Mechanics
            volume_table,
            homing_speed_dps: 60.0,

            // PID (error is in q8 cmH2O, output in i16 range)
            pid_kp: 1.2,
            pid_ki: 0.04,
            pid_kd: 0.6,

            // Alarms
            silence_timeout_ms: 120_000,
            pause_audio_ms: 120_000,
            fast_blink_ms: 250,
            slow_blink_ms: 1000,
            intermittent_sound_ms: 500,

            // Maintenance
            maintenance_interval_cycles: 5_000_000,
        }
    }
}

impl VentConfig {
    /// Check everything the core would reject at start-up.
    pub fn validate(&self) -> Result<(), ParamError> {
        volume::validate_table(&self.volume_table)?;
        self.breath.derive(&self.volume_table)?;
        self.thresholds.validate()
    }

    /// Decode a JSON config (board-supplied file, host tooling).
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode a compact postcard config.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Encode as postcard.
    pub fn to_postcard(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Malformed)
    }
}
