//! Zigbee stack adapter.
//!
//! Implements [`NetworkPort`], [`OnOffTarget`], [`LightStatePort`] and
//! [`RadioPort`] on top of the Espressif Zigbee SDK (`esp-zigbee-lib`,
//! linked as an ESP-IDF remote component with bindings in
//! `esp_idf_svc::sys::zb`).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `start` spawns the stack main loop in
//!   a dedicated thread.  Stack signals and ZCL attribute callbacks are C
//!   function pointers, so the state they produce (joined, bound peers,
//!   inbound light handler) lives in statics inside `esp_impl`.
//! - **all other targets**: an in-memory simulation.  [`SimControl`]
//!   lets host code drive joins, binds, reboots, inbound commands and RSSI.
//!
//! ## Bound peers
//!
//! The stack persists its binding table.  After a reboot the table is
//! read back page by page, so a bound switch is usable again without
//! the light re-announcing.  For every bound light the switch reads the
//! Basic cluster's manufacturer and model once; the answers fill in the
//! matching [`BoundDevice`] entry.
//!
//! ## Roles
//!
//! | Role   | Zigbee role  | Endpoint device      | Waits for |
//! |--------|--------------|----------------------|-----------|
//! | Switch | Coordinator  | On/Off switch (EP 5) | join+bind |
//! | Light  | End device   | On/Off light (EP 10) | join      |

use log::info;

use crate::app::commands::OnOffCommand;
use crate::app::network::{BoundDevice, BoundList};
use crate::app::ports::{
    LightCommandHandler, LightStatePort, NetworkPort, OnOffTarget, RadioPort,
};
use crate::config::DeviceConfig;
use crate::error::{Error, NetworkError};

#[cfg(target_os = "espidf")]
mod esp_impl;

#[cfg(not(target_os = "espidf"))]
use std::sync::{Arc, Mutex};

// ───────────────────────────────────────────────────────────────
// Basic-cluster strings
// ───────────────────────────────────────────────────────────────

/// Basic-cluster string attributes read back from bound peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BasicAttr {
    Manufacturer,
    Model,
}

/// ZCL character string: one length byte, then the text.
fn zcl_string(s: &str) -> [u8; 33] {
    let mut out = [0u8; 33];
    let bytes = s.as_bytes();
    let len = bytes.len().min(32);
    out[0] = len as u8;
    out[1..=len].copy_from_slice(&bytes[..len]);
    out
}

/// Inverse of [`zcl_string`].  `None` for the ZCL "invalid" length
/// (0xFF), a short buffer or non-UTF-8 text.
fn decode_zcl_string(raw: &[u8]) -> Option<heapless::String<32>> {
    let (&len, rest) = raw.split_first()?;
    if len == 0xFF {
        return None;
    }
    let text = core::str::from_utf8(rest.get(..usize::from(len))?).ok()?;
    Some(crate::config::label(text))
}

/// Store a Basic-cluster string reported by the peer at `short_addr`.
/// Returns `false` if no bound peer has that address or the value is
/// not a valid ZCL string.
fn record_basic_attr(bound: &mut BoundList, short_addr: u16, attr: BasicAttr, raw: &[u8]) -> bool {
    let Some(text) = decode_zcl_string(raw) else {
        return false;
    };
    let Some(peer) = bound.iter_mut().find(|p| p.short_addr == short_addr) else {
        return false;
    };
    match attr {
        BasicAttr::Manufacturer => peer.manufacturer = Some(text),
        BasicAttr::Model => peer.model = Some(text),
    }
    true
}

/// Insert or refresh a bound peer, keyed by IEEE address.
/// Returns `false` when the list is full.
fn upsert_bound(bound: &mut BoundList, peer: BoundDevice) -> bool {
    if let Some(known) = bound.iter_mut().find(|b| b.ieee == peer.ieee) {
        known.endpoint = peer.endpoint;
        known.short_addr = peer.short_addr;
        return true;
    }
    bound.push(peer).is_ok()
}

// ───────────────────────────────────────────────────────────────
// Simulation state
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimState {
    start_error: Option<i32>,
    started: bool,
    join_after_polls: u32,
    join_polls: u32,
    bound: BoundList,
    /// Binding table as the stack persists it; survives [`SimControl::reboot`].
    persisted: BoundList,
    basic_reads: Vec<u16>,
    on_off_attr: bool,
    light_reports: Vec<bool>,
    sent: Vec<OnOffCommand>,
    factory_resets: u32,
    rssi: i8,
    handler: Option<Box<dyn LightCommandHandler>>,
}

/// Host-side handle for driving the simulated stack.
#[cfg(not(target_os = "espidf"))]
#[derive(Clone)]
pub struct SimControl {
    state: Arc<Mutex<SimState>>,
}

#[cfg(not(target_os = "espidf"))]
impl SimControl {
    fn with<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        match self.state.lock() {
            Ok(mut s) => f(&mut s),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Make the next `start` fail with `rc`.
    pub fn fail_start(&self, rc: i32) {
        self.with(|s| s.start_error = Some(rc));
    }

    /// Report joined only after `polls` negative answers.
    pub fn join_after(&self, polls: u32) {
        self.with(|s| s.join_after_polls = polls);
    }

    /// Add a bound peer, as if a bind request had completed.  The peer
    /// is written to the persisted binding table and its Basic-cluster
    /// strings are requested.
    pub fn bind(&self, peer: BoundDevice) {
        self.with(|s| {
            s.basic_reads.push(peer.short_addr);
            upsert_bound(&mut s.persisted, peer.clone());
            upsert_bound(&mut s.bound, peer);
        });
    }

    /// Power-cycle the simulated chip: volatile state is lost, the
    /// persisted binding table is kept and read back on the next start.
    pub fn reboot(&self) {
        self.with(|s| {
            s.started = false;
            s.join_polls = 0;
            s.bound.clear();
            s.on_off_attr = false;
        });
    }

    /// Answer a pending Basic-cluster read from the peer at `short_addr`.
    /// Returns `false` if no bound peer has that address.
    pub fn answer_basic_read(&self, short_addr: u16, manufacturer: &str, model: &str) -> bool {
        self.with(|s| {
            record_basic_attr(
                &mut s.bound,
                short_addr,
                BasicAttr::Manufacturer,
                &zcl_string(manufacturer),
            ) && record_basic_attr(&mut s.bound, short_addr, BasicAttr::Model, &zcl_string(model))
        })
    }

    /// Short addresses Basic-cluster reads were sent to, oldest first.
    pub fn basic_reads(&self) -> Vec<u16> {
        self.with(|s| s.basic_reads.clone())
    }

    pub fn set_rssi(&self, rssi: i8) {
        self.with(|s| s.rssi = rssi);
    }

    /// Deliver an On/Off write to the registered handler.
    /// Returns `false` if no handler is registered.
    pub fn inbound(&self, on: bool) -> bool {
        self.inbound_command(if on { OnOffCommand::On } else { OnOffCommand::Off })
    }

    /// Apply an On/Off cluster command to the light endpoint's attribute,
    /// as the stack does, and deliver the resulting write to the handler.
    /// Returns `false` if no handler is registered.
    pub fn inbound_command(&self, cmd: OnOffCommand) -> bool {
        // Take the handler out so it can run without the state lock held.
        let Some((mut handler, on)) = self.with(|s| {
            let handler = s.handler.take()?;
            s.on_off_attr = cmd.resolve(s.on_off_attr);
            Some((handler, s.on_off_attr))
        }) else {
            return false;
        };
        handler.on_light_change(on);
        self.with(|s| s.handler = Some(handler));
        true
    }

    /// Current value of the light endpoint's On/Off attribute.
    pub fn light_attribute(&self) -> bool {
        self.with(|s| s.on_off_attr)
    }

    /// Local state reports written to the On/Off attribute, oldest first.
    pub fn light_reports(&self) -> Vec<bool> {
        self.with(|s| s.light_reports.clone())
    }

    /// Commands sent to bound peers, oldest first.
    pub fn sent(&self) -> Vec<OnOffCommand> {
        self.with(|s| s.sent.clone())
    }

    pub fn factory_resets(&self) -> u32 {
        self.with(|s| s.factory_resets)
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// The Zigbee stack behind the network-facing ports.
pub struct ZigbeeAdapter {
    endpoint: u8,
    #[cfg(not(target_os = "espidf"))]
    sim: SimControl,
}

impl ZigbeeAdapter {
    pub fn new() -> Self {
        Self {
            endpoint: 0,
            #[cfg(not(target_os = "espidf"))]
            sim: SimControl {
                state: Arc::new(Mutex::new(SimState {
                    rssi: crate::app::sampler::RSSI_UNKNOWN,
                    ..SimState::default()
                })),
            },
        }
    }

    /// Control handle for the simulated stack.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> SimControl {
        self.sim.clone()
    }

    /// Register the receiver of inbound On/Off commands (light role).
    /// Replaces any previous handler.
    pub fn set_light_handler(&mut self, handler: Box<dyn LightCommandHandler>) {
        #[cfg(target_os = "espidf")]
        esp_impl::set_light_handler(handler);

        #[cfg(not(target_os = "espidf"))]
        self.sim.with(|s| s.handler = Some(handler));

        info!("Zigbee: light handler registered");
    }
}

impl Default for ZigbeeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ── NetworkPort implementation ────────────────────────────────

impl NetworkPort for ZigbeeAdapter {
    fn start(&mut self, config: &DeviceConfig) -> Result<(), NetworkError> {
        self.endpoint = config.endpoint;

        #[cfg(target_os = "espidf")]
        {
            esp_impl::start(config)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.with(|s| match s.start_error.take() {
                Some(rc) => Err(NetworkError::StartFailed(rc)),
                None => {
                    s.started = true;
                    // Reading the persisted binding table back.
                    for peer in s.persisted.clone() {
                        s.basic_reads.push(peer.short_addr);
                        upsert_bound(&mut s.bound, peer);
                    }
                    info!(
                        "Zigbee(sim): started {:?} on endpoint {}, {} binding(s) restored",
                        config.role,
                        config.endpoint,
                        s.bound.len()
                    );
                    Ok(())
                }
            })
        }
    }

    fn is_joined(&mut self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            esp_impl::is_joined()
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.with(|s| {
                if !s.started {
                    return false;
                }
                if s.join_polls < s.join_after_polls {
                    s.join_polls += 1;
                    return false;
                }
                true
            })
        }
    }

    fn is_bound(&mut self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            esp_impl::bound_count() > 0
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.with(|s| !s.bound.is_empty())
        }
    }

    fn bound_devices(&mut self) -> BoundList {
        #[cfg(target_os = "espidf")]
        {
            esp_impl::bound_devices()
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.with(|s| s.bound.clone())
        }
    }

    fn factory_reset(&mut self) {
        #[cfg(target_os = "espidf")]
        esp_impl::factory_reset();

        #[cfg(not(target_os = "espidf"))]
        self.sim.with(|s| {
            s.factory_resets += 1;
            s.bound.clear();
            s.persisted.clear();
            s.started = false;
            s.join_polls = 0;
        });
    }
}

// ── OnOffTarget implementation ────────────────────────────────

/// Sends the command to every peer in the binding table.
impl OnOffTarget for ZigbeeAdapter {
    fn apply(&mut self, cmd: OnOffCommand) -> Result<(), Error> {
        #[cfg(target_os = "espidf")]
        {
            if esp_impl::bound_count() == 0 {
                return Err(NetworkError::NotBound.into());
            }
            esp_impl::send_on_off(self.endpoint, cmd)?;
        }

        #[cfg(not(target_os = "espidf"))]
        self.sim.with(|s| {
            if s.bound.is_empty() {
                return Err(Error::from(NetworkError::NotBound));
            }
            s.sent.push(cmd);
            Ok(())
        })?;

        info!("Zigbee: {cmd:?} sent from endpoint {} to bound peers", self.endpoint);
        Ok(())
    }
}

// ── LightStatePort implementation ─────────────────────────────

impl LightStatePort for ZigbeeAdapter {
    fn report_light_state(&mut self, on: bool) -> Result<(), NetworkError> {
        #[cfg(target_os = "espidf")]
        {
            esp_impl::set_light_attribute(self.endpoint, on)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.with(|s| {
                s.on_off_attr = on;
                s.light_reports.push(on);
            });
            Ok(())
        }
    }
}

// ── RadioPort implementation ──────────────────────────────────

impl RadioPort for ZigbeeAdapter {
    fn recent_rssi(&self) -> i8 {
        #[cfg(target_os = "espidf")]
        {
            esp_impl::recent_rssi()
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.with(|s| s.rssi)
        }
    }
}

/// Read-only RSSI view that can move into another thread.
#[derive(Clone)]
pub struct RadioHandle {
    #[cfg(not(target_os = "espidf"))]
    sim: SimControl,
}

impl ZigbeeAdapter {
    pub fn radio(&self) -> RadioHandle {
        RadioHandle {
            #[cfg(not(target_os = "espidf"))]
            sim: self.sim.clone(),
        }
    }
}

impl RadioPort for RadioHandle {
    fn recent_rssi(&self) -> i8 {
        #[cfg(target_os = "espidf")]
        {
            esp_impl::recent_rssi()
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.with(|s| s.rssi)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> BoundDevice {
        BoundDevice {
            endpoint: 10,
            short_addr: 0x4f2e,
            ieee: [1, 2, 3, 4, 5, 6, 7, 8],
            manufacturer: None,
            model: None,
        }
    }

    #[test]
    fn start_failure_is_reported() {
        let mut zb = ZigbeeAdapter::new();
        zb.sim().fail_start(-3);
        assert_eq!(
            zb.start(&DeviceConfig::switch()),
            Err(NetworkError::StartFailed(-3))
        );
        assert!(!zb.is_joined());
    }

    #[test]
    fn join_after_polls() {
        let mut zb = ZigbeeAdapter::new();
        zb.sim().join_after(2);
        zb.start(&DeviceConfig::light()).unwrap();
        assert!(!zb.is_joined());
        assert!(!zb.is_joined());
        assert!(zb.is_joined());
    }

    #[test]
    fn toggle_needs_a_bound_peer() {
        let mut zb = ZigbeeAdapter::new();
        zb.start(&DeviceConfig::switch()).unwrap();
        assert_eq!(
            zb.apply(OnOffCommand::Toggle),
            Err(Error::Network(NetworkError::NotBound))
        );
        assert!(zb.bound_devices().is_empty());

        zb.sim().bind(peer());
        assert!(zb.is_bound());
        zb.apply(OnOffCommand::Toggle).unwrap();
        assert_eq!(zb.sim().sent(), vec![OnOffCommand::Toggle]);
        assert_eq!(zb.bound_devices().as_slice(), &[peer()]);
    }

    #[test]
    fn factory_reset_forgets_network() {
        let mut zb = ZigbeeAdapter::new();
        zb.start(&DeviceConfig::switch()).unwrap();
        zb.sim().bind(peer());
        zb.factory_reset();
        assert_eq!(zb.sim().factory_resets(), 1);
        assert!(!zb.is_bound());
        assert!(!zb.is_joined());
    }

    #[test]
    fn inbound_reaches_handler() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct Count(Arc<AtomicU32>);
        impl LightCommandHandler for Count {
            fn on_light_change(&mut self, on: bool) {
                if on {
                    self.0.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let mut zb = ZigbeeAdapter::new();
        assert!(!zb.sim().inbound(true));

        let hits = Arc::new(AtomicU32::new(0));
        zb.set_light_handler(Box::new(Count(hits.clone())));
        assert!(zb.sim().inbound(true));
        assert!(zb.sim().inbound(false));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn reboot_restores_persisted_bindings() {
        let mut zb = ZigbeeAdapter::new();
        zb.start(&DeviceConfig::switch()).unwrap();
        zb.sim().bind(peer());

        zb.sim().reboot();
        assert!(!zb.is_bound());
        zb.start(&DeviceConfig::switch()).unwrap();
        assert!(zb.is_bound());
        assert_eq!(zb.bound_devices().as_slice(), &[peer()]);
        assert_eq!(zb.sim().basic_reads(), vec![0x4f2e, 0x4f2e]);
    }

    #[test]
    fn factory_reset_erases_persisted_bindings() {
        let mut zb = ZigbeeAdapter::new();
        zb.start(&DeviceConfig::switch()).unwrap();
        zb.sim().bind(peer());
        zb.factory_reset();
        zb.sim().reboot();
        zb.start(&DeviceConfig::switch()).unwrap();
        assert!(!zb.is_bound());
    }

    #[test]
    fn basic_read_fills_bound_entry() {
        let mut zb = ZigbeeAdapter::new();
        zb.start(&DeviceConfig::switch()).unwrap();
        zb.sim().bind(peer());
        assert!(!zb.sim().answer_basic_read(0x1234, "Espressif", "ZBLightBulb"));
        assert!(zb.sim().answer_basic_read(0x4f2e, "Espressif", "ZBLightBulb"));

        let bound = zb.bound_devices();
        assert_eq!(bound[0].manufacturer.as_deref(), Some("Espressif"));
        assert_eq!(bound[0].model.as_deref(), Some("ZBLightBulb"));
    }

    #[test]
    fn zcl_strings_decode() {
        assert_eq!(decode_zcl_string(&zcl_string("ZBLightBulb")).as_deref(), Some("ZBLightBulb"));
        assert_eq!(decode_zcl_string(&[0]).as_deref(), Some(""));
        assert_eq!(decode_zcl_string(&[0xFF]), None);
        assert_eq!(decode_zcl_string(&[5, b'a', b'b']), None);
        assert_eq!(decode_zcl_string(&[]), None);
    }

    #[test]
    fn rebinding_a_known_peer_updates_it_in_place() {
        let mut bound = BoundList::new();
        assert!(upsert_bound(&mut bound, peer()));
        let moved = BoundDevice { short_addr: 0x0101, ..peer() };
        assert!(upsert_bound(&mut bound, moved.clone()));
        assert_eq!(bound.as_slice(), &[moved]);
    }

    #[test]
    fn local_report_keeps_attribute_in_step() {
        let mut zb = ZigbeeAdapter::new();
        zb.start(&DeviceConfig::light()).unwrap();
        zb.report_light_state(true).unwrap();
        assert!(zb.sim().light_attribute());
        assert_eq!(zb.sim().light_reports(), vec![true]);
    }

    #[test]
    fn radio_handle_shares_rssi() {
        let zb = ZigbeeAdapter::new();
        let radio = zb.radio();
        assert_eq!(radio.recent_rssi(), crate::app::sampler::RSSI_UNKNOWN);
        zb.sim().set_rssi(-71);
        assert_eq!(radio.recent_rssi(), -71);
        assert_eq!(zb.recent_rssi(), -71);
    }
}
