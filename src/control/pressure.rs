//! Pressure-control inhale loop.
//!
//! The setpoint ramps linearly from the airway pressure measured at
//! INHALE entry to the target over the configured ramp time.  Each tick:
//!
//! ```text
//!  error  = 4 × (ramped setpoint − measured)      cmH2O
//!  scaled = saturate(error × 256)                 Q8, i16 range
//!  out    = pid(scaled)                           i16 range
//!  drive  = clamp(out × 40 / i16::MAX, 0, 40)     motor drive level
//! ```

use super::pid::{self, PidController};

/// Highest motor drive level the loop will command.
pub const MAX_DRIVE_LEVEL: u8 = 40;

const ERROR_GAIN: f32 = 4.0;
const Q8_SCALE: f32 = 256.0;

/// Ramped-setpoint closed loop around [`PidController`].
pub struct PressureLoop {
    pid: PidController,
    ramp_ms: u32,
    start_ms: u64,
    from_cmh2o: f32,
    target_cmh2o: f32,
}

impl PressureLoop {
    pub fn new(kp: f32, ki: f32, kd: f32, ramp_ms: u32) -> Self {
        Self {
            pid: PidController::new(kp, ki, kd),
            ramp_ms,
            start_ms: 0,
            from_cmh2o: 0.0,
            target_cmh2o: 0.0,
        }
    }

    /// Reset the PID and begin a new ramp at `now_ms`.
    pub fn begin(&mut self, now_ms: u64, from_cmh2o: f32, target_cmh2o: f32) {
        self.pid.reset();
        self.start_ms = now_ms;
        self.from_cmh2o = from_cmh2o;
        self.target_cmh2o = target_cmh2o;
    }

    /// Setpoint at `now_ms`.
    pub fn setpoint(&self, now_ms: u64) -> f32 {
        let elapsed = now_ms.saturating_sub(self.start_ms);
        if self.ramp_ms == 0 || elapsed >= u64::from(self.ramp_ms) {
            return self.target_cmh2o;
        }
        let fraction = elapsed as f32 / self.ramp_ms as f32;
        self.from_cmh2o + (self.target_cmh2o - self.from_cmh2o) * fraction
    }

    /// One loop step; returns the drive level to apply.
    pub fn step(&mut self, now_ms: u64, measured_cmh2o: f32) -> u8 {
        let error = ERROR_GAIN * (self.setpoint(now_ms) - measured_cmh2o);
        let out = self.pid.compute(pid::saturate(error * Q8_SCALE));
        Self::drive_level(out)
    }

    /// Rescale a fixed-point controller output to the motor drive range.
    pub fn drive_level(out: f32) -> u8 {
        let level = (out.max(0.0) * f32::from(MAX_DRIVE_LEVEL) / pid::FIXED_MAX).round();
        (level as u8).min(MAX_DRIVE_LEVEL)
    }
}
