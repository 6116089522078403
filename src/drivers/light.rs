//! Discrete light output driver.
//!
//! Wraps any embedded-hal [`OutputPin`] (an `esp-idf-hal` `PinDriver` on
//! the device, a mock in tests) behind [`LightPort`].
//!
//! ## Dual-target design
//!
//! The same driver runs on both targets; only the pin type changes.
//! Pin errors are logged and the last requested level is kept, since the
//! light has no error channel back to the network.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::LightPort;

pub struct PinLight<P: OutputPin> {
    pin: P,
    active_high: bool,
    level: bool,
    write_errors: u32,
}

impl<P: OutputPin> PinLight<P> {
    pub fn new(pin: P, active_high: bool) -> Self {
        Self {
            pin,
            active_high,
            level: false,
            write_errors: 0,
        }
    }

    /// Last level requested (`true` = lit).
    pub fn is_on(&self) -> bool {
        self.level
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors
    }
}

impl<P: OutputPin> LightPort for PinLight<P> {
    fn write_level(&mut self, on: bool) {
        self.level = on;
        let high = on == self.active_high;
        let res = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if res.is_err() {
            self.write_errors = self.write_errors.wrapping_add(1);
            warn!("PinLight: write failed");
        }
    }
}
