//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DeviceService (domain)
//! ```
//!
//! Driven adapters (GPIO, Zigbee stack, radio, clocks, storage) implement
//! these traits.  The domain consumes them via generics, so the core
//! never touches hardware directly and runs unchanged against the mocks
//! in `tests/integration/mock_hw.rs`.

use crate::config::DeviceConfig;
use crate::error::{Error, NetworkError};

use super::commands::OnOffCommand;
use super::events::AppEvent;
use super::network::BoundList;

// ───────────────────────────────────────────────────────────────
// Input port (driven adapter: GPIO → domain)
// ───────────────────────────────────────────────────────────────

/// Level reads and edge-interrupt gating for the monitored button lines.
pub trait InputPort {
    /// `true` while the line is in its active (pressed) level.
    /// Implementations hide the electrical polarity.
    fn is_asserted(&mut self, pin: u8) -> bool;

    /// Enable or disable the edge interrupt of a single line.
    fn set_edge_interrupt(&mut self, pin: u8, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time plus a cooperative delay.
pub trait ClockPort {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Block the calling task for `ms`, yielding to other tasks.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Light port (driven adapter: domain → actuator)
// ───────────────────────────────────────────────────────────────

/// The physical light output.
pub trait LightPort {
    fn write_level(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: domain ↔ Zigbee stack)
// ───────────────────────────────────────────────────────────────

/// Lifecycle surface of the wireless stack.
pub trait NetworkPort {
    /// Register the endpoint described by `config` and start the stack in
    /// `config.role`.  An error here is fatal for the device.
    fn start(&mut self, config: &DeviceConfig) -> Result<(), NetworkError>;

    /// Whether the device is a member of a network.
    fn is_joined(&mut self) -> bool;

    /// Whether at least one peer is bound to the local endpoint.
    fn is_bound(&mut self) -> bool;

    /// Snapshot of the peers currently bound to the local endpoint.
    fn bound_devices(&mut self) -> BoundList;

    /// Erase persisted network credentials.  The stack may restart the
    /// chip itself, in which case this never returns.
    fn factory_reset(&mut self);
}

/// Something that can carry out an on/off command: the bound peers of a
/// switch, or the local light of a bulb.
pub trait OnOffTarget {
    fn apply(&mut self, cmd: OnOffCommand) -> Result<(), Error>;
}

/// Receives on/off commands delivered by the network.
pub trait LightCommandHandler: Send {
    fn on_light_change(&mut self, on: bool);
}

/// The stack's copy of the local light state (the On/Off attribute of
/// the light endpoint).  Written after every local change so the next
/// network Toggle starts from what the output shows.
pub trait LightStatePort {
    fn report_light_state(&mut self, on: bool) -> Result<(), NetworkError>;
}

impl<T: LightStatePort + ?Sized> LightStatePort for &mut T {
    fn report_light_state(&mut self, on: bool) -> Result<(), NetworkError> {
        (**self).report_light_state(on)
    }
}

// ───────────────────────────────────────────────────────────────
// Radio / system ports
// ───────────────────────────────────────────────────────────────

/// Signal-quality source.
pub trait RadioPort {
    /// RSSI of the most recently received frame, in dBm.
    fn recent_rssi(&self) -> i8;
}

/// Device-level controls.
pub trait SystemPort {
    /// Reset the chip.  On hardware this never returns.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (serial log, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate before persisting; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load the stored configuration.
    /// Returns [`ConfigError::NotFound`] on first boot.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
