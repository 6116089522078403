//! Interrupt-to-task edge queue.
//!
//! Button edges are produced by the GPIO ISR and consumed by the switch
//! monitor running in task context:
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ GPIO ISR    │────▶│  EdgeQueue   │────▶│  SwitchMonitor   │
//! │ (producer)  │     │  (lock-free) │     │  (consumer task) │
//! └─────────────┘     └──────────────┘     └──────────────────┘
//! ```
//!
//! The queue is a bounded single-producer / single-consumer ring.  Each
//! [`RawEdgeEvent`] is packed into one atomic word so neither side ever
//! takes a lock or touches the heap.  When the ring is full the newest
//! event is dropped; the producer never blocks.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::app::ports::ClockPort;
use crate::config::EDGE_QUEUE_CAP;

/// Domain function bound to an input line.
///
/// Only the on/off family is acted upon; the level and colour functions
/// are carried through the pipeline but reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SwitchFunction {
    On = 0,
    Off = 1,
    Toggle = 2,
    LevelUp = 3,
    LevelDown = 4,
    LevelCycle = 5,
    Color = 6,
}

impl SwitchFunction {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::On),
            1 => Some(Self::Off),
            2 => Some(Self::Toggle),
            3 => Some(Self::LevelUp),
            4 => Some(Self::LevelDown),
            5 => Some(Self::LevelCycle),
            6 => Some(Self::Color),
            _ => None,
        }
    }
}

/// One hardware edge, as captured in interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEdgeEvent {
    pub pin: u8,
    pub function: SwitchFunction,
}

impl RawEdgeEvent {
    pub const fn new(pin: u8, function: SwitchFunction) -> Self {
        Self { pin, function }
    }

    /// Pack into one word (`pin << 8 | function`).
    pub const fn pack(self) -> u32 {
        ((self.pin as u32) << 8) | self.function as u32
    }

    pub fn unpack(raw: u32) -> Option<Self> {
        let function = SwitchFunction::from_u8((raw & 0xFF) as u8)?;
        Some(Self {
            pin: ((raw >> 8) & 0xFF) as u8,
            function,
        })
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// `head` and `tail` count modulo `2 * N`, so full (`head - tail == N`)
// and empty (`head == tail`) stay distinct and the slot index stays
// continuous for any `N`.  The producer publishes a slot with a Release
// store of `head`; the consumer frees it with a Release store of `tail`.

/// Bounded FIFO between the GPIO ISR and the consumer task.
pub struct EdgeQueue<const N: usize> {
    slots: [AtomicU32; N],
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicU32,
    cancel: AtomicBool,
}

impl<const N: usize> EdgeQueue<N> {
    const WRAP: usize = 2 * N;

    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU32::new(0) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
            cancel: AtomicBool::new(false),
        }
    }

    /// Push an event.
    /// Safe to call from ISR context (lock-free, no allocation).
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: RawEdgeEvent) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if Self::distance(head, tail) >= N {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.slots[head % N].store(event.pack(), Ordering::Relaxed);
        self.head.store(Self::next(head), Ordering::Release);
        true
    }

    /// Pop the oldest event without waiting.
    /// Called from the consumer task only.
    pub fn try_pop(&self) -> Option<RawEdgeEvent> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            let raw = self.slots[tail % N].load(Ordering::Relaxed);
            self.tail.store(Self::next(tail), Ordering::Release);

            // Only packed events are ever stored; skip anything else.
            if let Some(event) = RawEdgeEvent::unpack(raw) {
                return Some(event);
            }
        }
    }

    /// Wait for the next event, yielding through `clock` between checks.
    ///
    /// Returns `None` when `timeout_ms` elapses or [`cancel`](Self::cancel)
    /// is requested.  With `timeout_ms = None` the wait is unbounded.
    pub fn wait_pop(
        &self,
        clock: &mut impl ClockPort,
        poll_ms: u32,
        timeout_ms: Option<u32>,
    ) -> Option<RawEdgeEvent> {
        let started = clock.now_ms();
        loop {
            if self.cancel.swap(false, Ordering::AcqRel) {
                return None;
            }
            if let Some(event) = self.try_pop() {
                return Some(event);
            }
            if let Some(limit) = timeout_ms {
                if clock.now_ms().saturating_sub(started) >= u64::from(limit) {
                    return None;
                }
            }
            clock.delay_ms(poll_ms.max(1));
        }
    }

    /// Ask the current (or next) [`wait_pop`](Self::wait_pop) to return `None`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        Self::distance(head, tail).min(N)
    }

    fn next(index: usize) -> usize {
        if index + 1 == Self::WRAP { 0 } else { index + 1 }
    }

    /// Entries between `tail` and `head`, both in `0..2N`.
    fn distance(head: usize, tail: usize) -> usize {
        (head + Self::WRAP - tail) % Self::WRAP
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for EdgeQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide queue fed by the button ISR.
pub static EDGE_QUEUE: EdgeQueue<EDGE_QUEUE_CAP> = EdgeQueue::new();
