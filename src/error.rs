//! Unified error types for the on/off firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the boot path and the event loop's error handling uniform.  All
//! variants are `Copy` so they travel through the lifecycle manager and
//! the dispatcher without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The Zigbee stack rejected a request or failed to start.
    Network(NetworkError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// Stack initialisation or `esp_zb_start` returned an error code.
    StartFailed(i32),
    /// Endpoint or cluster registration was rejected.
    EndpointRejected,
    /// A command was issued while no peer is bound.
    NotBound,
    /// The stack refused to queue an outbound ZCL command.
    SendFailed(i32),
    /// The stack rejected a local attribute update (ZCL status).
    AttributeRejected(i32),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed(rc) => write!(f, "stack start failed (rc={rc})"),
            Self::EndpointRejected => write!(f, "endpoint registration rejected"),
            Self::NotBound => write!(f, "no bound peer"),
            Self::SendFailed(rc) => write!(f, "command send failed (rc={rc})"),
            Self::AttributeRejected(status) => {
                write!(f, "attribute update rejected (status={status})")
            }
        }
    }
}

impl std::error::Error for Error {}
impl std::error::Error for NetworkError {}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}
