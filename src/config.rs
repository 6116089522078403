//! Device configuration parameters
//!
//! All tunable parameters for both device roles.
//! Values can be overridden via NVS (non-volatile storage); the Zigbee
//! network credentials are owned by the stack and never live here.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Exact capacity of the ISR → task edge queue.
pub const EDGE_QUEUE_CAP: usize = 10;

/// Every Zigbee 2.4 GHz channel (11–26).
pub const ALL_CHANNELS_MASK: u32 = 0x07FF_F800;

/// Network role played by this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Coordinator that forms the network and relays toggles to bound lights.
    Switch,
    /// End device that joins an existing network and drives its light.
    Light,
}

impl Role {
    /// Whether this role forms the network (as opposed to joining one).
    pub fn is_coordinator(self) -> bool {
        matches!(self, Self::Switch)
    }

    /// A switch has no useful work until at least one light is bound.
    pub fn waits_for_binding(self) -> bool {
        matches!(self, Self::Switch)
    }
}

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Identity ---
    pub role: Role,
    /// Zigbee endpoint number the device registers.
    pub endpoint: u8,
    /// Basic cluster manufacturer name.
    pub manufacturer: heapless::String<32>,
    /// Basic cluster model identifier.
    pub model: heapless::String<32>,

    // --- Network ---
    /// Allow more than one light to bind to the switch.
    pub allow_multiple_binding: bool,
    /// Seconds the coordinator keeps the network open after a reboot.
    pub open_network_secs: u16,
    /// Primary channel mask handed to the stack.
    pub channel_mask: u32,

    // --- Input ---
    /// Debounce sampling interval while a press is being tracked (milliseconds)
    pub debounce_sample_ms: u32,
    /// Continuous hold that triggers a factory reset (milliseconds)
    pub factory_reset_hold_ms: u32,
    /// Delay between announcing the reset and erasing credentials (milliseconds)
    pub factory_reset_grace_ms: u32,

    // --- Timing ---
    /// Poll interval while waiting for network membership (milliseconds)
    pub join_poll_ms: u32,
    /// Poll interval while waiting for a bound peer (milliseconds)
    pub bind_poll_ms: u32,
    /// Log a progress marker every N join/bind polls
    pub progress_log_every: u32,
    /// Bound-device diagnostic dump interval (milliseconds)
    pub bound_dump_interval_ms: u32,
    /// Signal-quality sampling period (milliseconds)
    pub signal_sample_ms: u32,
    /// Consumer poll interval while the edge queue is empty (milliseconds)
    pub edge_wait_poll_ms: u32,
}

impl DeviceConfig {
    /// Defaults for the coordinator switch.
    pub fn switch() -> Self {
        Self {
            role: Role::Switch,
            endpoint: 5,
            manufacturer: label("Espressif"),
            model: label("ZigbeeSwitch"),
            allow_multiple_binding: true,
            ..Self::common(Role::Switch)
        }
    }

    /// Defaults for the end-device light bulb.
    pub fn light() -> Self {
        Self {
            role: Role::Light,
            endpoint: 10,
            manufacturer: label("Espressif"),
            model: label("ZBLightBulb"),
            allow_multiple_binding: false,
            ..Self::common(Role::Light)
        }
    }

    /// Defaults for the given role.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Switch => Self::switch(),
            Role::Light => Self::light(),
        }
    }

    fn common(role: Role) -> Self {
        Self {
            role,
            endpoint: 1,
            manufacturer: heapless::String::new(),
            model: heapless::String::new(),
            allow_multiple_binding: false,
            open_network_secs: 180,
            channel_mask: ALL_CHANNELS_MASK,

            debounce_sample_ms: 10,
            factory_reset_hold_ms: 3000,
            factory_reset_grace_ms: 1000,

            join_poll_ms: 100,
            bind_poll_ms: 500,
            progress_log_every: 10,
            bound_dump_interval_ms: 10_000,
            signal_sample_ms: 500,
            edge_wait_poll_ms: 5,
        }
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=240).contains(&self.endpoint) {
            return Err(ConfigError::ValidationFailed("endpoint must be 1–240"));
        }
        if self.channel_mask == 0 || self.channel_mask & !ALL_CHANNELS_MASK != 0 {
            return Err(ConfigError::ValidationFailed(
                "channel_mask must select channels 11–26 only",
            ));
        }
        if !(1..=100).contains(&self.debounce_sample_ms) {
            return Err(ConfigError::ValidationFailed(
                "debounce_sample_ms must be 1–100",
            ));
        }
        if !(1000..=30_000).contains(&self.factory_reset_hold_ms) {
            return Err(ConfigError::ValidationFailed(
                "factory_reset_hold_ms must be 1000–30000",
            ));
        }
        if self.factory_reset_grace_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "factory_reset_grace_ms must be 0–10000",
            ));
        }
        if !(10..=5000).contains(&self.join_poll_ms) || !(10..=5000).contains(&self.bind_poll_ms) {
            return Err(ConfigError::ValidationFailed(
                "join_poll_ms and bind_poll_ms must be 10–5000",
            ));
        }
        if self.progress_log_every == 0 {
            return Err(ConfigError::ValidationFailed(
                "progress_log_every must be at least 1",
            ));
        }
        if !(1000..=600_000).contains(&self.bound_dump_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "bound_dump_interval_ms must be 1000–600000",
            ));
        }
        if !(100..=60_000).contains(&self.signal_sample_ms) {
            return Err(ConfigError::ValidationFailed(
                "signal_sample_ms must be 100–60000",
            ));
        }
        if !(1..=100).contains(&self.edge_wait_poll_ms) {
            return Err(ConfigError::ValidationFailed(
                "edge_wait_poll_ms must be 1–100",
            ));
        }
        Ok(())
    }
}

/// Truncating conversion for the fixed-size Basic cluster strings.
pub fn label(s: &str) -> heapless::String<32> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
