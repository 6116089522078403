//! Mock board for integration tests.
//!
//! A simulated clock drives a scripted button: the line level follows
//! a list of asserted intervals, and falling edges are delivered to the
//! edge queue only while the line's interrupt is enabled, the way the
//! GPIO peripheral gates them.  Every emitted [`AppEvent`] is recorded.

use zb_onoff::app::events::AppEvent;
use zb_onoff::app::ports::{ClockPort, EventSink, InputPort, LightPort};
use zb_onoff::drivers::button::{ButtonLine, capture_edge};
use zb_onoff::events::EdgeQueue;

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard<'q, const N: usize> {
    queue: &'q EdgeQueue<N>,
    line: ButtonLine,
    now: u64,
    /// `[from, to)` windows during which the line reads asserted.
    pressed: Vec<(u64, u64)>,
    /// ISR edge times, kept sorted.
    edges: Vec<u64>,
    irq_enabled: bool,
    pub irq_toggles: u32,
    pub edges_delivered: u32,
    pub edges_masked: u32,
}

#[allow(dead_code)]
impl<'q, const N: usize> MockBoard<'q, N> {
    pub fn new(queue: &'q EdgeQueue<N>, line: ButtonLine) -> Self {
        Self {
            queue,
            line,
            now: 0,
            pressed: Vec::new(),
            edges: Vec::new(),
            irq_enabled: true,
            irq_toggles: 0,
            edges_delivered: 0,
            edges_masked: 0,
        }
    }

    /// Hold the button over `[from, to)` with one clean edge at `from`.
    pub fn press(&mut self, from: u64, to: u64) -> &mut Self {
        self.bouncy_press(from, to, &[])
    }

    /// Like [`press`](Self::press) plus extra contact-bounce edges at
    /// the given offsets after `from`.
    pub fn bouncy_press(&mut self, from: u64, to: u64, bounces: &[u64]) -> &mut Self {
        self.pressed.push((from, to));
        self.edges.push(from);
        self.edges.extend(bounces.iter().map(|b| from + b));
        self.edges.sort_unstable();
        self
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    /// Move the clock to `until`, delivering every edge on the way.
    pub fn advance_to(&mut self, until: u64) {
        while let Some(&t) = self.edges.first() {
            if t > until {
                break;
            }
            self.edges.remove(0);
            if self.irq_enabled {
                capture_edge(self.queue, self.line);
                self.edges_delivered += 1;
            } else {
                self.edges_masked += 1;
            }
        }
        self.now = self.now.max(until);
    }
}

impl<const N: usize> InputPort for MockBoard<'_, N> {
    fn is_asserted(&mut self, pin: u8) -> bool {
        pin == self.line.pin
            && self
                .pressed
                .iter()
                .any(|&(from, to)| (from..to).contains(&self.now))
    }

    fn set_edge_interrupt(&mut self, pin: u8, enabled: bool) {
        if pin == self.line.pin && self.irq_enabled != enabled {
            self.irq_enabled = enabled;
            self.irq_toggles += 1;
        }
    }
}

impl<const N: usize> ClockPort for MockBoard<'_, N> {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        let until = self.now + u64::from(ms);
        self.advance_to(until);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockLed ───────────────────────────────────────────────────

/// Records every level written to the light output.
#[derive(Default)]
pub struct MockLed {
    pub writes: Vec<bool>,
}

impl LightPort for MockLed {
    fn write_level(&mut self, on: bool) {
        self.writes.push(on);
    }
}
