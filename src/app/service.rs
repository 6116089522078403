//! Device service: the hexagonal core.
//!
//! [`DeviceService`] owns the switch monitor, the network lifecycle
//! manager, the command dispatcher and the interval scheduler.  All I/O
//! flows through port traits injected at call sites, so both device
//! roles run unchanged against mock adapters on the host.
//!
//! ```text
//!  EdgeQueue ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  InputPort ──▶ │         DeviceService        │
//!  ClockPort ──▶ │ Monitor · Network · Dispatch │ ──▶ OnOffTarget
//! NetworkPort ◀─▶│          · Scheduler         │ ──▶ SystemPort
//!                └──────────────────────────────┘
//! ```

use log::{error, info, warn};

use crate::config::{DeviceConfig, Role};
use crate::drivers::button::ButtonLine;
use crate::events::EdgeQueue;
use crate::scheduler::{Job, Scheduler, SchedulerDelegate};

use super::commands::LogicalActivation;
use super::dispatcher::{CommandDispatcher, Dispatch};
use super::events::AppEvent;
use super::monitor::{MonitorOutcome, SwitchMonitor};
use super::network::{Lifecycle, NetworkManager};
use super::ports::{
    ClockPort, ConfigError, ConfigPort, EventSink, InputPort, NetworkPort, OnOffTarget, SystemPort,
};

/// What one pass of the event loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No edge arrived, or the edge settled without an activation.
    Idle,
    /// A clean press/release; hand it to [`DeviceService::dispatch`].
    Activation(LogicalActivation),
    /// A sustained hold erased the network credentials.
    FactoryReset,
    /// The session has ended; the device is restarting.
    Terminated,
}

/// The application service orchestrates all domain logic.
pub struct DeviceService {
    config: DeviceConfig,
    monitor: SwitchMonitor,
    network: NetworkManager,
    dispatcher: CommandDispatcher,
    scheduler: Scheduler,
}

impl DeviceService {
    /// Construct the service.  Does **not** touch the network; call
    /// [`boot`](Self::boot) next.
    pub fn new(config: DeviceConfig, lines: &[ButtonLine]) -> Self {
        let monitor = SwitchMonitor::new(lines, &config);
        let network = NetworkManager::new(&config);
        Self {
            config,
            monitor,
            network,
            dispatcher: CommandDispatcher::new(),
            scheduler: Scheduler::new(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the stack and block until the device is usable: joined,
    /// and for a switch also bound to at least one light.
    ///
    /// Returns [`Lifecycle::Restarting`] if the start failed.
    pub fn boot(
        &mut self,
        net: &mut impl NetworkPort,
        clock: &mut impl ClockPort,
        system: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> Lifecycle {
        if self.network.start(net, system, sink) == Lifecycle::Restarting {
            return Lifecycle::Restarting;
        }
        self.network.wait_joined(net, clock, sink);
        self.network.wait_bound(net, clock, sink);

        if self.config.role == Role::Switch {
            self.network.dump_bound(net, sink);
            self.scheduler.add(
                "bound-dump",
                Job::BoundDump,
                self.config.bound_dump_interval_ms,
                clock.now_ms(),
            );
        }

        info!("DeviceService: ready ({:?})", self.network.lifecycle());
        self.network.lifecycle()
    }

    // ── Event loop ────────────────────────────────────────────

    /// One pass of the consumer loop.
    ///
    /// Waits for an edge until the next scheduled job is due, runs any
    /// due jobs, then services the edge to completion.  The `hw`
    /// parameter satisfies **both** [`InputPort`] and [`ClockPort`];
    /// this avoids a double mutable borrow while keeping the port
    /// boundary explicit.
    pub fn run_once<const N: usize>(
        &mut self,
        queue: &EdgeQueue<N>,
        hw: &mut (impl InputPort + ClockPort),
        net: &mut impl NetworkPort,
        system: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> Step {
        if self.network.is_terminated() {
            return Step::Terminated;
        }

        let timeout = self
            .scheduler
            .time_to_next(hw.now_ms())
            .map(|ms| u32::try_from(ms).unwrap_or(u32::MAX));
        let event = queue.wait_pop(hw, self.config.edge_wait_poll_ms, timeout);

        let mut jobs = Jobs {
            network: &mut self.network,
            net: &mut *net,
            sink: &mut *sink,
        };
        self.scheduler.poll(hw.now_ms(), &mut jobs);

        let Some(event) = event else {
            return Step::Idle;
        };

        match self.monitor.process(event, hw) {
            MonitorOutcome::Activated(a) => Step::Activation(a),
            MonitorOutcome::HoldExpired => {
                if self.network.factory_reset(net, hw, system, sink) {
                    Step::FactoryReset
                } else {
                    Step::Terminated
                }
            }
            MonitorOutcome::Idle | MonitorOutcome::UnknownLine(_) => Step::Idle,
        }
    }

    /// Hand an activation to its target.  Fire-and-forget.
    pub fn dispatch(
        &mut self,
        activation: LogicalActivation,
        target: &mut impl OnOffTarget,
        sink: &mut impl EventSink,
    ) -> Dispatch {
        self.dispatcher.dispatch(activation, target, sink)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn network(&self) -> &NetworkManager {
        &self.network
    }

    pub fn monitor(&self) -> &SwitchMonitor {
        &self.monitor
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }
}

/// Runs scheduled jobs against the live network.
struct Jobs<'a, N, S> {
    network: &'a mut NetworkManager,
    net: &'a mut N,
    sink: &'a mut S,
}

impl<N: NetworkPort, S: EventSink> SchedulerDelegate for Jobs<'_, N, S> {
    fn on_job_due(&mut self, job: Job) {
        match job {
            Job::BoundDump => self.network.dump_bound(&mut *self.net, &mut *self.sink),
        }
    }
}

// ── Boot-time setup ───────────────────────────────────────────

/// Unwrap the result of a setup step the device cannot run without
/// (input capture, light output, worker threads).
///
/// On failure the error is logged, a restart is requested and `None` is
/// returned; the caller must stop.  On hardware the restart never returns.
pub fn or_restart<T, E: core::fmt::Display>(
    what: &'static str,
    result: Result<T, E>,
    system: &mut impl SystemPort,
    sink: &mut impl EventSink,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!("{what} failed: {e}");
            sink.emit(&AppEvent::Restarting(what));
            system.restart();
            None
        }
    }
}

// ── Configuration ─────────────────────────────────────────────

/// Load the stored configuration for `role`, falling back to the role
/// defaults when nothing usable is stored.
pub fn load_config(store: &impl ConfigPort, role: Role) -> DeviceConfig {
    match store.load() {
        Ok(cfg) if cfg.role == role => {
            info!("Config loaded from storage");
            cfg
        }
        Ok(cfg) => {
            warn!("Stored config is for {:?}, using {:?} defaults", cfg.role, role);
            DeviceConfig::for_role(role)
        }
        Err(ConfigError::NotFound) => {
            info!("No stored config, using {role:?} defaults");
            DeviceConfig::for_role(role)
        }
        Err(e) => {
            warn!("Config load failed ({e}), using {role:?} defaults");
            DeviceConfig::for_role(role)
        }
    }
}
