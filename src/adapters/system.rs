//! System control adapter.
//!
//! - **`target_os = "espidf"`**: `esp_restart()`; never returns.
//! - **`not(target_os = "espidf")`**: counts restart requests so the
//!   host simulation can observe them.

use log::warn;

use crate::app::ports::SystemPort;

#[derive(Debug, Default)]
pub struct EspSystem {
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl EspSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart requests seen by the simulation backend.
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

impl SystemPort for EspSystem {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        warn!("System: restarting");
        // SAFETY: esp_restart is always safe to call; it does not return.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        warn!("System(sim): restart requested");
        self.restarts += 1;
    }
}
