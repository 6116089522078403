//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(role) => {
                info!("START | role={:?}", role);
            }
            AppEvent::StartFailed(e) => {
                error!("START | failed: {}", e);
            }
            AppEvent::Joined => {
                info!("NET   | joined");
            }
            AppEvent::Bound(count) => {
                info!("NET   | bound, peers={}", count);
            }
            AppEvent::BoundDevices(list) => {
                info!("BIND  | {} bound device(s)", list.len());
            }
            AppEvent::CommandSent { function, command } => {
                info!("CMD   | {:?} -> {:?}", function, command);
            }
            AppEvent::CommandFailed { command, error } => {
                warn!("CMD   | {:?} failed: {}", command, error);
            }
            AppEvent::CommandUnsupported(function) => {
                info!("CMD   | {:?} not supported", function);
            }
            AppEvent::LightChanged { on, source } => {
                info!(
                    "LIGHT | {} ({:?})",
                    if *on { "ON" } else { "OFF" },
                    source
                );
            }
            AppEvent::SignalQuality { rssi_dbm } => {
                info!("RSSI  | {} dBm", rssi_dbm);
            }
            AppEvent::FactoryReset => {
                warn!("RESET | factory reset");
            }
            AppEvent::Restarting(reason) => {
                warn!("RESET | restarting: {}", reason);
            }
        }
    }
}
