//! Light state controller.
//!
//! The on/off state is written from two contexts: the Zigbee stack's
//! attribute callback (inbound command) and the button consumer (local
//! toggle).  [`SharedLight`] puts the controller behind an embassy
//! blocking mutex so a read-modify-write such as toggle is atomic with
//! respect to the other writer.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

use crate::error::Error;

use super::commands::OnOffCommand;
use super::events::{AppEvent, LightSource};
use super::ports::{
    EventSink, LightCommandHandler, LightPort, LightStatePort, OnOffTarget, RadioPort,
};
use super::sampler::SignalMonitor;

/// Owns the light output and its logical state.
pub struct LightController<L: LightPort> {
    output: L,
    on: bool,
}

impl<L: LightPort> LightController<L> {
    /// Drives the output to `initial` immediately.
    pub fn new(mut output: L, initial: bool) -> Self {
        output.write_level(initial);
        Self { output, on: initial }
    }

    /// Drive the output.  Repeating the current state rewrites the same
    /// level and changes nothing else.  Returns whether the state changed.
    pub fn set_state(&mut self, on: bool) -> bool {
        let changed = self.on != on;
        self.on = on;
        self.output.write_level(on);
        changed
    }

    pub fn get_state(&self) -> bool {
        self.on
    }

    /// Apply an on/off command against the current state.
    pub fn apply(&mut self, cmd: OnOffCommand) -> bool {
        let next = cmd.resolve(self.on);
        self.set_state(next);
        next
    }

    pub fn output(&self) -> &L {
        &self.output
    }
}

/// Cloneable handle to a [`LightController`] shared between tasks.
pub struct SharedLight<L: LightPort> {
    inner: Arc<Mutex<CriticalSectionRawMutex, RefCell<LightController<L>>>>,
}

impl<L: LightPort> Clone for SharedLight<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: LightPort> SharedLight<L> {
    pub fn new(controller: LightController<L>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RefCell::new(controller))),
        }
    }

    pub fn set_state(&self, on: bool) -> bool {
        self.inner.lock(|c| c.borrow_mut().set_state(on))
    }

    pub fn get_state(&self) -> bool {
        self.inner.lock(|c| c.borrow().get_state())
    }

    /// Run `f` with the controller locked.
    pub fn with<T>(&self, f: impl FnOnce(&mut LightController<L>) -> T) -> T {
        self.inner.lock(|c| f(&mut c.borrow_mut()))
    }
}

/// Target for local activations on the light role.  Drives the output,
/// then writes the new state back to the stack.
pub struct LocalLight<L: LightPort, R> {
    light: SharedLight<L>,
    stack: R,
}

impl<L: LightPort, R: LightStatePort> LocalLight<L, R> {
    pub fn new(light: SharedLight<L>, stack: R) -> Self {
        Self { light, stack }
    }
}

impl<L: LightPort, R: LightStatePort> OnOffTarget for LocalLight<L, R> {
    fn apply(&mut self, cmd: OnOffCommand) -> Result<(), Error> {
        // The controller lock is released before the stack is touched.
        let on = self.light.with(|c| c.apply(cmd));
        info!("Light: {} (local {cmd:?})", if on { "ON" } else { "OFF" });
        if let Err(e) = self.stack.report_light_state(on) {
            warn!("Light: stack state not updated: {e}");
        }
        Ok(())
    }
}

/// Handler the Zigbee stack invokes when an On/Off attribute write
/// arrives.  Refreshes the signal reading first so the log line that
/// follows reflects the frame that carried the command.
pub struct InboundLight<L: LightPort, R, S> {
    light: SharedLight<L>,
    radio: R,
    signal: Arc<SignalMonitor>,
    sink: S,
}

impl<L, R, S> InboundLight<L, R, S>
where
    L: LightPort,
    R: RadioPort,
    S: EventSink,
{
    pub fn new(light: SharedLight<L>, radio: R, signal: Arc<SignalMonitor>, sink: S) -> Self {
        Self {
            light,
            radio,
            signal,
            sink,
        }
    }
}

impl<L, R, S> LightCommandHandler for InboundLight<L, R, S>
where
    L: LightPort + Send,
    R: RadioPort + Send,
    S: EventSink + Send,
{
    fn on_light_change(&mut self, on: bool) {
        let rssi = self.radio.recent_rssi();
        self.signal.record(rssi);
        self.light.set_state(on);
        info!(
            "Light: {} (network, rssi {rssi} dBm)",
            if on { "ON" } else { "OFF" }
        );
        self.sink.emit(&AppEvent::LightChanged {
            on,
            source: LightSource::Network,
        });
    }
}
