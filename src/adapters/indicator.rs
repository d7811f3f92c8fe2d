//! Alarm light and buzzer on plain GPIO.
//!
//! Implements [`IndicatorPort`] over two `embedded-hal` output pins, so
//! any HAL that provides [`OutputPin`] can drive the panel.  A failed pin
//! write is logged and leaves the recorded level unchanged, so the
//! service sees the mismatch and writes again on its next tick.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::IndicatorPort;

/// Whether an output is driven active-high or active-low on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveLevel {
    High,
    Low,
}

/// One logical on/off output.
pub struct Output<P: OutputPin> {
    pin: P,
    active: ActiveLevel,
    is_on: bool,
}

impl<P: OutputPin> Output<P> {
    /// Wrap a pin and drive it OFF.  If that write fails the output reads
    /// as on until a later write succeeds.
    pub fn new(pin: P, active: ActiveLevel) -> Self {
        let mut out = Self {
            pin,
            active,
            is_on: true,
        };
        out.set(false);
        out
    }

    /// Drive the output.  Returns whether the pin accepted the write.
    pub fn set(&mut self, on: bool) -> bool {
        let result = match (self.active, on) {
            (ActiveLevel::High, true) | (ActiveLevel::Low, false) => self.pin.set_high(),
            (ActiveLevel::High, false) | (ActiveLevel::Low, true) => self.pin.set_low(),
        };
        if result.is_err() {
            warn!("indicator pin write failed (on={on})");
            return false;
        }
        self.is_on = on;
        true
    }

    /// Level last written successfully.
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn free(self) -> P {
        self.pin
    }
}

/// Alarm light and buzzer.
pub struct GpioIndicators<L: OutputPin, B: OutputPin> {
    light: Output<L>,
    buzzer: Output<B>,
}

impl<L: OutputPin, B: OutputPin> GpioIndicators<L, B> {
    pub fn new(light: Output<L>, buzzer: Output<B>) -> Self {
        Self { light, buzzer }
    }

    pub fn free(self) -> (L, B) {
        (self.light.free(), self.buzzer.free())
    }
}

impl<L: OutputPin, B: OutputPin> IndicatorPort for GpioIndicators<L, B> {
    fn set_alarm_light(&mut self, on: bool) {
        let _ = self.light.set(on);
    }

    fn set_buzzer(&mut self, on: bool) {
        let _ = self.buzzer.set(on);
    }

    fn alarm_light_on(&self) -> bool {
        self.light.is_on()
    }

    fn buzzer_on(&self) -> bool {
        self.buzzer.is_on()
    }
}
