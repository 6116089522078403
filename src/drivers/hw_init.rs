//! One-shot hardware peripheral initialization.
//!
//! Configures the button inputs and installs their edge ISRs using raw
//! ESP-IDF sys calls.  Called once from `main()` before the event loop
//! starts.  The light output is owned by an `esp-idf-hal` `PinDriver`
//! and is not configured here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::drivers::button::ButtonLine;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrHandlerFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrHandlerFailed(rc) => write!(f, "GPIO ISR handler add failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::GpioConfigFailed(_) => Self::Init("gpio config"),
            HwInitError::IsrInstallFailed(_) => Self::Init("isr service"),
            HwInitError::IsrHandlerFailed(_) => Self::Init("isr handler"),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

// ── GPIO Inputs ───────────────────────────────────────────────

/// Configure every button line as a pulled-up input that interrupts on
/// the falling (press) edge.
#[cfg(target_os = "espidf")]
pub fn init_button_inputs(lines: &[ButtonLine]) -> Result<(), HwInitError> {
    for line in lines {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << line.pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
        };
        // SAFETY: called once from main() before the ISR service exists.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }
    info!("hw_init: {} button input(s) configured", lines.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_button_inputs(lines: &[ButtonLine]) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): {} button input(s) skipped", lines.len());
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Idle level of a pulled-up input.
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

/// Enable or disable the edge interrupt of one pin.
#[cfg(target_os = "espidf")]
pub fn gpio_set_intr(pin: i32, enabled: bool) {
    // SAFETY: enable/disable only touch the pin's interrupt-enable bit;
    // the handler stays registered.
    unsafe {
        if enabled {
            gpio_intr_enable(pin);
        } else {
            gpio_intr_disable(pin);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_set_intr(_pin: i32, _enabled: bool) {}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use crate::drivers::button::capture_edge;
#[cfg(target_os = "espidf")]
use crate::events::{EDGE_QUEUE, RawEdgeEvent};

/// The handler argument carries the packed line, so one function serves
/// every pin without a lookup table.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(arg: *mut core::ffi::c_void) {
    if let Some(ev) = RawEdgeEvent::unpack(arg as usize as u32) {
        capture_edge(&EDGE_QUEUE, ButtonLine::new(ev.pin, ev.function));
    }
}

/// Install the per-pin GPIO ISR service and register a handler for each
/// button line.  Call after [`init_button_inputs`] and before the event
/// loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(lines: &[ButtonLine]) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed (acceptable).  The handler only
    // pushes to the lock-free edge queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        for line in lines {
            let pin = i32::from(line.pin);
            let arg = RawEdgeEvent::new(line.pin, line.function).pack() as usize;
            gpio_set_intr_type(pin, gpio_int_type_t_GPIO_INTR_NEGEDGE);
            let ret = gpio_isr_handler_add(pin, Some(button_gpio_isr), arg as *mut core::ffi::c_void);
            if ret != ESP_OK as i32 {
                return Err(HwInitError::IsrHandlerFailed(ret));
            }
            gpio_intr_enable(pin);
        }
    }
    info!("hw_init: ISR service installed ({} line(s))", lines.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(lines: &[ButtonLine]) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped ({} line(s))", lines.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SwitchFunction;

    #[test]
    fn sim_init_succeeds() {
        let lines = [ButtonLine::new(9, SwitchFunction::Toggle)];
        assert!(init_button_inputs(&lines).is_ok());
        assert!(init_isr_service(&lines).is_ok());
    }

    #[test]
    fn init_error_maps_to_firmware_error() {
        let e: crate::error::Error = HwInitError::IsrInstallFailed(-1).into();
        assert_eq!(e, crate::error::Error::Init("isr service"));
    }
}
