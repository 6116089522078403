//! Zigbee On/Off Light: main entry point.
//!
//! Joins an existing network as an end device and drives the LED from
//! inbound On/Off commands.  The BOOT button toggles the LED locally and
//! writes the new state back to the On/Off attribute; holding it for 3 s
//! leaves the network and restarts.  A background thread samples the
//! radio RSSI.
//!
//! ```text
//!  zb_main thread ──▶ InboundLight ──┐
//!                                    ├──▶ SharedLight ──▶ PinLight (GPIO 10)
//!  GPIO ISR ──▶ EDGE_QUEUE ──▶ DeviceService ──▶ LocalLight ──▶ On/Off attribute
//!
//!  rssi thread ──▶ SignalSampler ──▶ SignalMonitor
//! ```

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{info, warn};

use zb_onoff::adapters::hardware::HardwareAdapter;
use zb_onoff::adapters::log_sink::LogEventSink;
use zb_onoff::adapters::nvs::NvsAdapter;
use zb_onoff::adapters::system::EspSystem;
use zb_onoff::adapters::time::Esp32TimeAdapter;
use zb_onoff::adapters::zigbee::ZigbeeAdapter;
use zb_onoff::app::dispatcher::Dispatch;
use zb_onoff::app::events::{AppEvent, LightSource};
use zb_onoff::app::light::{InboundLight, LightController, LocalLight, SharedLight};
use zb_onoff::app::network::Lifecycle;
use zb_onoff::app::ports::EventSink;
use zb_onoff::app::sampler::{SignalMonitor, SignalSampler};
use zb_onoff::app::service::{DeviceService, Step, load_config, or_restart};
use zb_onoff::config::{DeviceConfig, Role};
use zb_onoff::drivers::button::ButtonLine;
use zb_onoff::drivers::hw_init;
use zb_onoff::drivers::light::PinLight;
use zb_onoff::events::{EDGE_QUEUE, SwitchFunction};
use zb_onoff::pins;

/// RSSI sampler thread stack, in bytes.
const SAMPLER_STACK_SIZE: usize = 4096;

/// Never raised on the device; the sampler runs for the whole session.
static SAMPLER_STOP: AtomicBool = AtomicBool::new(false);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Zigbee On/Off Light v{}", env!("CARGO_PKG_VERSION"));

    let mut system = EspSystem::new();
    let mut sink = LogEventSink::new();

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => load_config(&nvs, Role::Light),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            DeviceConfig::light()
        }
    };

    // ── 3. Light output, initially off ────────────────────────
    let Some(peripherals) = or_restart("peripherals", Peripherals::take(), &mut system, &mut sink)
    else {
        return Ok(());
    };
    let led = PinDriver::output(peripherals.pins.gpio10);
    let Some(led) = or_restart("light output setup", led, &mut system, &mut sink) else {
        return Ok(());
    };
    let light = SharedLight::new(LightController::new(PinLight::new(led, true), false));
    info!("Light: output on GPIO {}", pins::LIGHT_LED_GPIO);

    // ── 4. Button input + ISR (restart on failure) ────────────
    let lines = [ButtonLine::new(pins::BOOT_BUTTON_GPIO as u8, SwitchFunction::Toggle)];
    let inputs = hw_init::init_button_inputs(&lines);
    if or_restart("button input setup", inputs, &mut system, &mut sink).is_none() {
        return Ok(());
    }
    let isr = hw_init::init_isr_service(&lines);
    if or_restart("button ISR setup", isr, &mut system, &mut sink).is_none() {
        return Ok(());
    }

    // ── 5. Adapters ───────────────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut hw = HardwareAdapter::new(clock);
    let mut zigbee = ZigbeeAdapter::new();

    let signal = Arc::new(SignalMonitor::new());
    zigbee.set_light_handler(Box::new(InboundLight::new(
        light.clone(),
        zigbee.radio(),
        Arc::clone(&signal),
        LogEventSink::new(),
    )));

    // ── 6. RSSI sampler thread ────────────────────────────────
    let sampler = SignalSampler::new(Arc::clone(&signal), config.signal_sample_ms);
    let radio = zigbee.radio();
    let spawned = std::thread::Builder::new()
        .name("rssi".into())
        .stack_size(SAMPLER_STACK_SIZE)
        .spawn(move || {
            let mut clock = clock;
            let mut sink = LogEventSink::new();
            sampler.run(&radio, &mut clock, &mut sink, &SAMPLER_STOP);
        });
    if or_restart("rssi thread", spawned, &mut system, &mut sink).is_none() {
        return Ok(());
    }

    // ── 7. Network lifecycle ──────────────────────────────────
    let mut service = DeviceService::new(config, &lines);
    if service.boot(&mut zigbee, &mut hw, &mut system, &mut sink) == Lifecycle::Restarting {
        return Ok(());
    }

    info!("System ready. Entering event loop.");

    // ── 8. Event loop ─────────────────────────────────────────
    loop {
        match service.run_once(&EDGE_QUEUE, &mut hw, &mut zigbee, &mut system, &mut sink) {
            Step::Activation(activation) => {
                let mut local = LocalLight::new(light.clone(), &mut zigbee);
                if let Dispatch::Sent(_) = service.dispatch(activation, &mut local, &mut sink) {
                    sink.emit(&AppEvent::LightChanged {
                        on: light.get_state(),
                        source: LightSource::Local,
                    });
                }
            }
            Step::Terminated => break,
            Step::Idle | Step::FactoryReset => {}
        }
    }

    Ok(())
}
