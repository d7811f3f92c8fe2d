//! PID controller for the pressure-control drive
//!
//! Proportional-integral-derivative controller working in a signed
//! 16-bit fixed-point domain.  Computation is native `f32`, but the
//! error input, the integrator, and the output all saturate at the
//! `i16` bounds so behaviour matches an integer Q-format loop.

/// Lower saturation bound of the fixed-point domain.
pub const FIXED_MIN: f32 = i16::MIN as f32;
/// Upper saturation bound of the fixed-point domain.
pub const FIXED_MAX: f32 = i16::MAX as f32;

/// Saturate a value into the fixed-point domain.
pub fn saturate(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(FIXED_MIN, FIXED_MAX)
}

/// PID controller
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    prev_error: f32,
    first_update: bool,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            prev_error: 0.0,
            first_update: true,
        }
    }

    /// Compute one controller step for an already-scaled error.
    /// Runs once per control tick; gains absorb the tick period.
    pub fn compute(&mut self, error: f32) -> f32 {
        let error = saturate(error);

        // Proportional
        let p = self.kp * error;

        // Integral (saturated)
        self.integral = saturate(self.integral + self.ki * error);

        // Derivative, skipped on the first step after a reset
        let d = if self.first_update {
            self.first_update = false;
            0.0
        } else {
            self.kd * (error - self.prev_error)
        };

        self.prev_error = error;

        saturate(p + self.integral + d)
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.first_update = true;
    }
}
