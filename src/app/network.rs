//! Network lifecycle manager.
//!
//! Drives the session through
//!
//! ```text
//!  Uninitialized ─start─▶ Started ─join─▶ Joined ─bind─▶ Bound
//!        │                                   │             │
//!        └─start failed─▶ Restarting         └──── hold ───┴─▶ FactoryReset ─▶ Restarting
//! ```
//!
//! Join and bind waits poll the stack at a fixed interval with no
//! timeout.  The only ways out of a wait are success or a restart.
//! All stack access goes through [`NetworkPort`]; the manager itself owns
//! only the session state and the bound-peer snapshot.

use core::fmt;

use log::{error, info, warn};

use crate::config::{DeviceConfig, Role};

use super::events::AppEvent;
use super::ports::{ClockPort, EventSink, NetworkPort, SystemPort};

/// Upper bound on bound peers tracked in one snapshot.
pub const MAX_BOUND: usize = 8;

/// One peer bound to the local endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundDevice {
    pub endpoint: u8,
    pub short_addr: u16,
    /// IEEE address as the stack stores it (least-significant byte first).
    pub ieee: [u8; 8],
    pub manufacturer: Option<heapless::String<32>>,
    pub model: Option<heapless::String<32>>,
}

impl BoundDevice {
    /// Display adapter printing the IEEE address most-significant byte first.
    pub fn ieee_display(&self) -> IeeeAddr<'_> {
        IeeeAddr(&self.ieee)
    }
}

/// `AA:BB:CC:DD:EE:FF:00:11` rendering of a little-endian IEEE address.
pub struct IeeeAddr<'a>(&'a [u8; 8]);

impl fmt::Display for IeeeAddr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Snapshot of the bound peers.
pub type BoundList = heapless::Vec<BoundDevice, MAX_BOUND>;

/// Where the device is in its network lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Started,
    Joined,
    Bound,
    FactoryReset,
    /// A restart has been requested.  Terminal for this session.
    Restarting,
}

/// Process-wide network state.  One per boot; only a restart discards it.
#[derive(Debug, Clone)]
pub struct NetworkSession {
    role: Role,
    lifecycle: Lifecycle,
    bound: BoundList,
}

impl NetworkSession {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Joined | Lifecycle::Bound)
    }

    /// Last bound-peer snapshot.  Empty until the first refresh.
    pub fn bound_devices(&self) -> &[BoundDevice] {
        &self.bound
    }
}

/// Owns the [`NetworkSession`] and runs every lifecycle transition.
pub struct NetworkManager {
    session: NetworkSession,
    config: DeviceConfig,
}

impl NetworkManager {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            session: NetworkSession {
                role: config.role,
                lifecycle: Lifecycle::Uninitialized,
                bound: BoundList::new(),
            },
            config: config.clone(),
        }
    }

    pub fn session(&self) -> &NetworkSession {
        &self.session
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.session.lifecycle
    }

    /// Whether the session has ended in a reset or restart.
    pub fn is_terminated(&self) -> bool {
        matches!(
            self.session.lifecycle,
            Lifecycle::FactoryReset | Lifecycle::Restarting
        )
    }

    // ── Start ─────────────────────────────────────────────────

    /// Start the stack in the configured role.
    ///
    /// A start failure is fatal: it is reported, the device is restarted,
    /// and the session ends in [`Lifecycle::Restarting`].  No retry.
    pub fn start(
        &mut self,
        net: &mut impl NetworkPort,
        system: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> Lifecycle {
        if self.session.lifecycle != Lifecycle::Uninitialized {
            warn!("Network: start ignored in {:?}", self.session.lifecycle);
            return self.session.lifecycle;
        }

        match net.start(&self.config) {
            Ok(()) => {
                info!(
                    "Network: started as {:?} on endpoint {}",
                    self.session.role, self.config.endpoint
                );
                self.session.lifecycle = Lifecycle::Started;
                sink.emit(&AppEvent::Started(self.session.role));
            }
            Err(e) => {
                error!("Network: start failed: {e}");
                sink.emit(&AppEvent::StartFailed(e));
                self.restart(system, sink, "network start failed");
            }
        }
        self.session.lifecycle
    }

    // ── Waits ─────────────────────────────────────────────────

    /// Block until the stack reports network membership.  No timeout.
    pub fn wait_joined(
        &mut self,
        net: &mut impl NetworkPort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        if self.session.lifecycle != Lifecycle::Started {
            return;
        }

        let polls = poll_until(
            clock,
            "join",
            self.config.join_poll_ms,
            self.config.progress_log_every,
            || net.is_joined(),
        );
        info!("Network: joined after {polls} polls");
        self.session.lifecycle = Lifecycle::Joined;
        sink.emit(&AppEvent::Joined);
    }

    /// Block until at least one peer is bound, then take the first
    /// bound-peer snapshot.  Roles that do not wait for binding return
    /// immediately.  No timeout.
    pub fn wait_bound(
        &mut self,
        net: &mut impl NetworkPort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        if self.session.lifecycle != Lifecycle::Joined || !self.session.role.waits_for_binding() {
            return;
        }

        let polls = poll_until(
            clock,
            "bind",
            self.config.bind_poll_ms,
            self.config.progress_log_every,
            || net.is_bound(),
        );
        self.session.lifecycle = Lifecycle::Bound;
        let count = self.refresh_bound(net).len();
        info!("Network: bound to {count} peer(s) after {polls} polls");
        sink.emit(&AppEvent::Bound(count));
    }

    // ── Bound peers ───────────────────────────────────────────

    /// Query the stack for the current bound peers and keep the snapshot.
    pub fn refresh_bound(&mut self, net: &mut impl NetworkPort) -> &[BoundDevice] {
        self.session.bound = net.bound_devices();
        &self.session.bound
    }

    /// Refresh, log every bound peer and publish the snapshot.
    pub fn dump_bound(&mut self, net: &mut impl NetworkPort, sink: &mut impl EventSink) {
        if self.is_terminated() {
            return;
        }
        self.refresh_bound(net);

        info!("Bound devices: {}", self.session.bound.len());
        for d in &self.session.bound {
            info!(
                "  ep={} short=0x{:04x} ieee={} manufacturer={} model={}",
                d.endpoint,
                d.short_addr,
                d.ieee_display(),
                d.manufacturer.as_deref().unwrap_or("?"),
                d.model.as_deref().unwrap_or("?"),
            );
        }
        sink.emit(&AppEvent::BoundDevices(self.session.bound.clone()));
    }

    // ── Factory reset ─────────────────────────────────────────

    /// Erase the network credentials and restart.
    ///
    /// Runs at most once per session; later calls return `false` and do
    /// nothing.  The grace delay lets the log line reach the console
    /// before the stack wipes its storage.
    pub fn factory_reset(
        &mut self,
        net: &mut impl NetworkPort,
        clock: &mut impl ClockPort,
        system: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.is_terminated() {
            return false;
        }

        warn!(
            "Network: factory reset in {}ms",
            self.config.factory_reset_grace_ms
        );
        self.session.lifecycle = Lifecycle::FactoryReset;
        sink.emit(&AppEvent::FactoryReset);
        clock.delay_ms(self.config.factory_reset_grace_ms);

        self.session.bound.clear();
        net.factory_reset();
        self.restart(system, sink, "factory reset");
        true
    }

    fn restart(
        &mut self,
        system: &mut impl SystemPort,
        sink: &mut impl EventSink,
        reason: &'static str,
    ) {
        self.session.lifecycle = Lifecycle::Restarting;
        sink.emit(&AppEvent::Restarting(reason));
        system.restart();
    }
}

/// Poll `ready` every `interval_ms` until it holds, logging progress
/// every `log_every` polls.  Returns the number of failed polls.
fn poll_until(
    clock: &mut impl ClockPort,
    what: &str,
    interval_ms: u32,
    log_every: u32,
    mut ready: impl FnMut() -> bool,
) -> u32 {
    let log_every = log_every.max(1);
    let mut polls: u32 = 0;
    while !ready() {
        polls = polls.wrapping_add(1);
        if polls % log_every == 0 {
            info!("Network: waiting for {what}... ({polls} polls)");
        }
        clock.delay_ms(interval_ms);
    }
    polls
}
