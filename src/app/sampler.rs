//! Periodic signal-quality sampler (light role).
//!
//! Runs in its own thread so a slow log write never stalls the button
//! consumer.  The only shared state is [`SignalMonitor`]: one writer at a
//! time, word-sized atomics, no lock.

use core::sync::atomic::{AtomicBool, AtomicI8, AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;

use super::events::AppEvent;
use super::ports::{ClockPort, EventSink, RadioPort};

/// Reported before the first frame has been received.
pub const RSSI_UNKNOWN: i8 = -127;

/// Last-known RSSI.
#[derive(Debug)]
pub struct SignalMonitor {
    last_rssi: AtomicI8,
    samples: AtomicU32,
}

impl SignalMonitor {
    pub const fn new() -> Self {
        Self {
            last_rssi: AtomicI8::new(RSSI_UNKNOWN),
            samples: AtomicU32::new(0),
        }
    }

    pub fn record(&self, rssi_dbm: i8) {
        self.last_rssi.store(rssi_dbm, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_rssi(&self) -> i8 {
        self.last_rssi.load(Ordering::Relaxed)
    }

    /// Readings recorded since boot.
    pub fn samples(&self) -> u32 {
        self.samples.load(Ordering::Relaxed)
    }
}

impl Default for SignalMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples the radio every `period_ms` and reports the reading.
pub struct SignalSampler {
    monitor: Arc<SignalMonitor>,
    period_ms: u32,
}

impl SignalSampler {
    pub fn new(monitor: Arc<SignalMonitor>, period_ms: u32) -> Self {
        Self { monitor, period_ms }
    }

    pub fn monitor(&self) -> &Arc<SignalMonitor> {
        &self.monitor
    }

    /// Take one reading.
    pub fn tick(&self, radio: &impl RadioPort, sink: &mut impl EventSink) -> i8 {
        let rssi_dbm = radio.recent_rssi();
        self.monitor.record(rssi_dbm);
        sink.emit(&AppEvent::SignalQuality { rssi_dbm });
        rssi_dbm
    }

    /// Sample until `stop` is raised.  Thread body on the device.
    pub fn run(
        &self,
        radio: &impl RadioPort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
        stop: &AtomicBool,
    ) {
        debug!("SignalSampler: every {}ms", self.period_ms);
        while !stop.load(Ordering::Relaxed) {
            self.tick(radio, sink);
            clock.delay_ms(self.period_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Radio(Cell<i8>);

    impl RadioPort for Radio {
        fn recent_rssi(&self) -> i8 {
            let v = self.0.get();
            self.0.set(v - 1);
            v
        }
    }

    /// Raises `stop` once `limit` milliseconds have elapsed.
    struct StopClock<'a> {
        now: u64,
        limit: u64,
        stop: &'a AtomicBool,
    }

    impl ClockPort for StopClock<'_> {
        fn now_ms(&self) -> u64 {
            self.now
        }
        fn delay_ms(&mut self, ms: u32) {
            self.now += u64::from(ms);
            if self.now >= self.limit {
                self.stop.store(true, Ordering::Relaxed);
            }
        }
    }

    #[derive(Default)]
    struct Sink(Vec<AppEvent>);

    impl EventSink for Sink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn starts_unknown() {
        let m = SignalMonitor::new();
        assert_eq!(m.last_rssi(), RSSI_UNKNOWN);
        assert_eq!(m.samples(), 0);
    }

    #[test]
    fn tick_records_and_reports() {
        let sampler = SignalSampler::new(Arc::new(SignalMonitor::new()), 500);
        let mut sink = Sink::default();
        assert_eq!(sampler.tick(&Radio(Cell::new(-60)), &mut sink), -60);
        assert_eq!(sampler.monitor().last_rssi(), -60);
        assert_eq!(sink.0, vec![AppEvent::SignalQuality { rssi_dbm: -60 }]);
    }

    #[test]
    fn run_samples_once_per_period() {
        let stop = AtomicBool::new(false);
        let sampler = SignalSampler::new(Arc::new(SignalMonitor::new()), 500);
        let mut clock = StopClock { now: 0, limit: 5000, stop: &stop };
        let mut sink = Sink::default();

        sampler.run(&Radio(Cell::new(-40)), &mut clock, &mut sink, &stop);
        assert_eq!(sink.0.len(), 10);
        assert_eq!(sampler.monitor().samples(), 10);
        assert_eq!(sampler.monitor().last_rssi(), -49);
    }
}
