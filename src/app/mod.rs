//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the rules of both device roles: edge debounce,
//! command dispatch, the network lifecycle, the light controller and the
//! signal sampler.  All interaction with hardware and the Zigbee stack
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod light;
pub mod monitor;
pub mod network;
pub mod ports;
pub mod sampler;
pub mod service;
