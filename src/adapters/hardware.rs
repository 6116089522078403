//! Hardware adapter: bridges the button GPIOs to domain port traits.
//!
//! Exposes the monitored lines through [`InputPort`] and the system
//! clock through [`ClockPort`], so the switch monitor can take both as a
//! single `hw` argument.  This is the only module that reads the button
//! pins.  On non-espidf targets the underlying GPIO calls are cfg-gated
//! simulation stubs.

use crate::app::ports::{ClockPort, InputPort};
use crate::drivers::hw_init;

use super::time::Esp32TimeAdapter;

/// Concrete adapter for active-low buttons with pull-ups.
pub struct HardwareAdapter {
    clock: Esp32TimeAdapter,
}

impl HardwareAdapter {
    pub fn new(clock: Esp32TimeAdapter) -> Self {
        Self { clock }
    }
}

// ── InputPort implementation ──────────────────────────────────

impl InputPort for HardwareAdapter {
    fn is_asserted(&mut self, pin: u8) -> bool {
        // Pressed pulls the line LOW.
        !hw_init::gpio_read(i32::from(pin))
    }

    fn set_edge_interrupt(&mut self, pin: u8, enabled: bool) {
        hw_init::gpio_set_intr(i32::from(pin), enabled);
    }
}

// ── ClockPort implementation ──────────────────────────────────

impl ClockPort for HardwareAdapter {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}
