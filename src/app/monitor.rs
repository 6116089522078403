//! Edge consumer: turns raw ISR edges into logical activations.
//!
//! For each [`RawEdgeEvent`] popped from the queue the monitor gates the
//! line's interrupt off, samples the line at the debounce interval
//! through the [`Debouncer`], and re-enables the interrupt once the
//! machine is back in Idle.  A [`HoldTimer`] watches the same samples and
//! reports a sustained hold so the caller can run the factory reset.
//!
//! ```text
//!  pop edge ─▶ disable IRQ ─▶ sample ─▶ Debouncer ──Idle──▶ enable IRQ
//!                               ▲   │        │
//!                               └───┘        └─▶ LogicalActivation
//!                            every sample_ms
//!                               │
//!                               └─▶ HoldTimer ─▶ HoldExpired
//! ```

use log::{debug, warn};

use crate::config::DeviceConfig;
use crate::drivers::button::{ButtonLine, Debouncer, HoldTimer, SwitchState};
use crate::events::RawEdgeEvent;

use super::commands::LogicalActivation;
use super::ports::{ClockPort, InputPort};

/// Maximum number of monitored input lines.
pub const MAX_LINES: usize = 4;

/// Result of servicing one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The line went back to Idle without a full press/release cycle.
    Idle,
    /// A clean press/release cycle completed.
    Activated(LogicalActivation),
    /// The line was held past the factory-reset threshold.  No activation
    /// is emitted and the line's interrupt stays disabled.
    HoldExpired,
    /// The edge came from a pin that is not monitored.
    UnknownLine(u8),
}

struct LineState {
    line: ButtonLine,
    debouncer: Debouncer,
    hold: HoldTimer,
}

/// Owns the debounce state of every monitored line.
///
/// Lives in the consumer task only; never shared with the ISR.
pub struct SwitchMonitor {
    lines: heapless::Vec<LineState, MAX_LINES>,
    sample_ms: u32,
}

impl SwitchMonitor {
    /// Lines beyond [`MAX_LINES`] are ignored with a warning.
    pub fn new(lines: &[ButtonLine], config: &DeviceConfig) -> Self {
        let mut states = heapless::Vec::new();
        for &line in lines {
            let state = LineState {
                line,
                debouncer: Debouncer::new(),
                hold: HoldTimer::new(config.factory_reset_hold_ms),
            };
            if states.push(state).is_err() {
                warn!("SwitchMonitor: line on GPIO{} ignored (max {})", line.pin, MAX_LINES);
            }
        }
        Self {
            lines: states,
            sample_ms: config.debounce_sample_ms,
        }
    }

    /// Monitored lines, in registration order.
    pub fn lines(&self) -> impl Iterator<Item = ButtonLine> + '_ {
        self.lines.iter().map(|l| l.line)
    }

    /// Debounce state of the line on `pin`.
    pub fn state_of(&self, pin: u8) -> Option<SwitchState> {
        self.lines
            .iter()
            .find(|l| l.line.pin == pin)
            .map(|l| l.debouncer.state())
    }

    /// Service one edge to completion.
    ///
    /// Blocks (through `hw.delay_ms`) while the line is held.  If the
    /// line is never released the call only returns once the hold
    /// threshold is reached.
    pub fn process(
        &mut self,
        event: RawEdgeEvent,
        hw: &mut (impl InputPort + ClockPort),
    ) -> MonitorOutcome {
        let sample_ms = self.sample_ms;
        let Some(ls) = self.lines.iter_mut().find(|l| l.line.pin == event.pin) else {
            warn!("SwitchMonitor: edge on unmonitored GPIO{}", event.pin);
            return MonitorOutcome::UnknownLine(event.pin);
        };

        hw.set_edge_interrupt(event.pin, false);

        loop {
            let asserted = hw.is_asserted(event.pin);
            let now = hw.now_ms();

            let activated = ls.debouncer.step(asserted);

            if ls.hold.observe(asserted, now) {
                warn!(
                    "SwitchMonitor: GPIO{} held {}ms",
                    event.pin,
                    ls.hold.held_ms(now)
                );
                return MonitorOutcome::HoldExpired;
            }

            if ls.debouncer.state() == SwitchState::Idle {
                ls.hold.reset();
                hw.set_edge_interrupt(event.pin, true);
                if activated {
                    debug!("SwitchMonitor: GPIO{} activated {:?}", event.pin, ls.line.function);
                    return MonitorOutcome::Activated(LogicalActivation {
                        function: ls.line.function,
                    });
                }
                return MonitorOutcome::Idle;
            }

            hw.delay_ms(sample_ms);
        }
    }
}
