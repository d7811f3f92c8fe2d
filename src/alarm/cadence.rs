//! Alarm light and buzzer cadence.
//!
//! The supervisor calls [`Blinker::advance`] each tick for the alarm it is
//! presenting.  Light cadence follows priority; sound cadence follows the
//! latched alarm's [`SoundPattern`].
//!
//! | Priority | Light       | Default toggle |
//! |----------|-------------|----------------|
//! | HIGH     | FastBlink   | 250 ms         |
//! | MIDDLE   | SlowBlink   | 1000 ms        |
//! | LOW      | Solid       | —              |

use super::table::{Priority, SoundPattern};
use crate::config::VentConfig;

/// Light pattern identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightPattern {
    FastBlink,
    SlowBlink,
    Solid,
    Off,
}

impl LightPattern {
    pub fn for_priority(priority: Priority) -> Self {
        match priority {
            Priority::High => Self::FastBlink,
            Priority::Middle => Self::SlowBlink,
            Priority::Low => Self::Solid,
        }
    }
}

/// Toggle intervals, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceTimings {
    pub fast_blink_ms: u32,
    pub slow_blink_ms: u32,
    pub intermittent_ms: u32,
}

impl CadenceTimings {
    pub fn from_config(config: &VentConfig) -> Self {
        Self {
            fast_blink_ms: config.fast_blink_ms,
            slow_blink_ms: config.slow_blink_ms,
            intermittent_ms: config.intermittent_sound_ms,
        }
    }

    /// Toggle interval for a light pattern; `None` for steady patterns.
    pub fn light_toggle_ms(&self, pattern: LightPattern) -> Option<u32> {
        match pattern {
            LightPattern::FastBlink => Some(self.fast_blink_ms),
            LightPattern::SlowBlink => Some(self.slow_blink_ms),
            LightPattern::Solid | LightPattern::Off => None,
        }
    }
}

/// Toggle counter.  Stack-allocated, one per output per alarm record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Blinker {
    elapsed_ms: u32,
    on: bool,
}

impl Blinker {
    /// Restart the cadence in the "on" phase.
    pub fn restart(&mut self) {
        self.elapsed_ms = 0;
        self.on = true;
    }

    /// Advance by `delta_ms`; `toggle_ms` of `None` holds the output on.
    pub fn advance(&mut self, delta_ms: u32, toggle_ms: Option<u32>) -> bool {
        match toggle_ms {
            None | Some(0) => {
                self.on = true;
                self.elapsed_ms = 0;
            }
            Some(toggle) => {
                self.elapsed_ms = self.elapsed_ms.saturating_add(delta_ms);
                while self.elapsed_ms >= toggle {
                    self.elapsed_ms -= toggle;
                    self.on = !self.on;
                }
            }
        }
        self.on
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

/// Buzzer output for a sound pattern.
pub fn sound_output(
    pattern: SoundPattern,
    blinker: &mut Blinker,
    delta_ms: u32,
    timings: &CadenceTimings,
) -> bool {
    match pattern {
        SoundPattern::Continuous => blinker.advance(delta_ms, None),
        SoundPattern::Intermittent => blinker.advance(delta_ms, Some(timings.intermittent_ms)),
        SoundPattern::Off => false,
    }
}
