//! Zigbee On/Off Switch: main entry point.
//!
//! Forms the network as coordinator, binds every On/Off light that
//! announces itself, and sends a Toggle to the bound lights on each
//! debounced press of the BOOT button.  Holding the button for 3 s
//! erases the network and restarts.
//!
//! ```text
//!  GPIO ISR ──▶ EDGE_QUEUE ──▶ DeviceService ──▶ ZigbeeAdapter ──▶ bound lights
//!                                   │
//!                                   └─ Scheduler: bound-device dump every 10 s
//! ```

use anyhow::Result;
use log::{info, warn};

use zb_onoff::adapters::hardware::HardwareAdapter;
use zb_onoff::adapters::log_sink::LogEventSink;
use zb_onoff::adapters::nvs::NvsAdapter;
use zb_onoff::adapters::system::EspSystem;
use zb_onoff::adapters::time::Esp32TimeAdapter;
use zb_onoff::adapters::zigbee::ZigbeeAdapter;
use zb_onoff::app::network::Lifecycle;
use zb_onoff::app::service::{DeviceService, Step, load_config, or_restart};
use zb_onoff::config::{DeviceConfig, Role};
use zb_onoff::drivers::button::ButtonLine;
use zb_onoff::drivers::hw_init;
use zb_onoff::events::{EDGE_QUEUE, SwitchFunction};
use zb_onoff::pins;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Zigbee On/Off Switch v{}", env!("CARGO_PKG_VERSION"));

    let mut system = EspSystem::new();
    let mut sink = LogEventSink::new();

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => load_config(&nvs, Role::Switch),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            DeviceConfig::switch()
        }
    };

    // ── 3. Button input + ISR (restart on failure) ────────────
    let lines = [ButtonLine::new(pins::BOOT_BUTTON_GPIO as u8, SwitchFunction::Toggle)];
    let inputs = hw_init::init_button_inputs(&lines);
    if or_restart("button input setup", inputs, &mut system, &mut sink).is_none() {
        return Ok(());
    }
    let isr = hw_init::init_isr_service(&lines);
    if or_restart("button ISR setup", isr, &mut system, &mut sink).is_none() {
        return Ok(());
    }

    // ── 4. Adapters ───────────────────────────────────────────
    let mut hw = HardwareAdapter::new(Esp32TimeAdapter::new());
    let mut zigbee = ZigbeeAdapter::new();

    // ── 5. Network lifecycle ──────────────────────────────────
    let mut service = DeviceService::new(config, &lines);
    if service.boot(&mut zigbee, &mut hw, &mut system, &mut sink) == Lifecycle::Restarting {
        return Ok(());
    }

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    loop {
        match service.run_once(&EDGE_QUEUE, &mut hw, &mut zigbee, &mut system, &mut sink) {
            Step::Activation(activation) => {
                service.dispatch(activation, &mut zigbee, &mut sink);
            }
            Step::Terminated => break,
            Step::Idle | Step::FactoryReset => {}
        }
    }

    Ok(())
}
