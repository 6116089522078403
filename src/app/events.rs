//! Outbound application events.
//!
//! The domain emits these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them: log
//! to serial, or record them in a test.

use crate::config::Role;
use crate::error::{Error, NetworkError};
use crate::events::SwitchFunction;

use super::commands::OnOffCommand;
use super::network::BoundList;

/// Where a light state change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightSource {
    /// On/Off cluster command received over the network.
    Network,
    /// Debounced press of the local button.
    Local,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The stack started in the given role.
    Started(Role),

    /// The stack failed to start; the device restarts next.
    StartFailed(NetworkError),

    /// The device is a member of a network.
    Joined,

    /// At least one peer is bound (carries the bound count).
    Bound(usize),

    /// Fresh snapshot of the bound peers.
    BoundDevices(BoundList),

    /// An activation was turned into a command and handed to its target.
    CommandSent {
        function: SwitchFunction,
        command: OnOffCommand,
    },

    /// The target rejected a command.  Not retried.
    CommandFailed { command: OnOffCommand, error: Error },

    /// The activation's function is reserved and was ignored.
    CommandUnsupported(SwitchFunction),

    /// The light output changed state.
    LightChanged { on: bool, source: LightSource },

    /// Periodic signal-quality sample.
    SignalQuality { rssi_dbm: i8 },

    /// A sustained hold triggered a factory reset.
    FactoryReset,

    /// The device is about to restart.
    Restarting(&'static str),
}
