//! GPIO pin assignments for the ESP32-H2 on/off boards.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// User button (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// BOOT button, reused as the toggle / factory-reset input on both roles.
pub const BOOT_BUTTON_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// Light actuator
// ---------------------------------------------------------------------------

/// Discrete LED driven by the light role (active HIGH).
pub const LIGHT_LED_GPIO: i32 = 10;
