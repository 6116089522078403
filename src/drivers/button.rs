//! ISR edge capture and the per-line debounce state machine.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up.  The GPIO fires on the
//! falling edge; the ISR only packs the line into a [`RawEdgeEvent`] and
//! pushes it onto the [`EdgeQueue`].  Everything else happens in task
//! context, sampled every `debounce_sample_ms`.
//!
//! ## Debounce policy
//!
//! | State           | Sample      | Next            | Side effect       |
//! |-----------------|-------------|-----------------|-------------------|
//! | Idle            | asserted    | PressDetected   |                   |
//! | Idle            | released    | Idle            |                   |
//! | PressDetected   | asserted    | PressDetected   |                   |
//! | PressDetected   | released    | ReleaseDetected |                   |
//! | ReleaseDetected | (any)       | Idle            | one activation    |
//!
//! Activation fires on release, so a held button produces one action no
//! matter how long it is held.  Long holds are measured separately by
//! [`HoldTimer`].

use crate::events::{EdgeQueue, RawEdgeEvent, SwitchFunction};

/// A monitored input line and the function it triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonLine {
    pub pin: u8,
    pub function: SwitchFunction,
}

impl ButtonLine {
    pub const fn new(pin: u8, function: SwitchFunction) -> Self {
        Self { pin, function }
    }
}

/// ISR handler, called from the GPIO edge interrupt of `line`.
///
/// Lock-free and allocation-free.  A full queue drops the edge;
/// the next edge is captured normally.
pub fn capture_edge<const N: usize>(queue: &EdgeQueue<N>, line: ButtonLine) {
    let _ = queue.push(RawEdgeEvent::new(line.pin, line.function));
}

/// Debounce state of one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Idle,
    PressDetected,
    ReleaseDetected,
}

/// Press/release state machine for a single line.
#[derive(Debug, Clone)]
pub struct Debouncer {
    state: SwitchState,
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            state: SwitchState::Idle,
        }
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Advance by one level sample.
    /// Returns `true` exactly when ReleaseDetected collapses back to Idle.
    pub fn step(&mut self, asserted: bool) -> bool {
        match self.state {
            SwitchState::Idle => {
                if asserted {
                    self.state = SwitchState::PressDetected;
                }
                false
            }
            SwitchState::PressDetected => {
                if !asserted {
                    self.state = SwitchState::ReleaseDetected;
                }
                false
            }
            SwitchState::ReleaseDetected => {
                self.state = SwitchState::Idle;
                true
            }
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Measures how long a line has been continuously asserted.
///
/// Fed with the same samples as the [`Debouncer`] but independent of its
/// transitions.  Fires once per press when the hold reaches the threshold.
#[derive(Debug, Clone)]
pub struct HoldTimer {
    threshold_ms: u64,
    pressed_since: Option<u64>,
    fired: bool,
}

impl HoldTimer {
    pub fn new(threshold_ms: u32) -> Self {
        Self {
            threshold_ms: u64::from(threshold_ms),
            pressed_since: None,
            fired: false,
        }
    }

    /// Record one sample taken at `now_ms`.
    /// Returns `true` on the sample where the hold first reaches the threshold.
    pub fn observe(&mut self, asserted: bool, now_ms: u64) -> bool {
        if !asserted {
            self.pressed_since = None;
            self.fired = false;
            return false;
        }

        let since = *self.pressed_since.get_or_insert(now_ms);
        if !self.fired && now_ms.saturating_sub(since) >= self.threshold_ms {
            self.fired = true;
            return true;
        }
        false
    }

    /// Milliseconds the current press has been held (0 when released).
    pub fn held_ms(&self, now_ms: u64) -> u64 {
        self.pressed_since
            .map_or(0, |since| now_ms.saturating_sub(since))
    }

    pub fn reset(&mut self) {
        self.pressed_since = None;
        self.fired = false;
    }
}
