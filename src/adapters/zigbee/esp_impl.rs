//! ESP-IDF platform side of `ZigbeeAdapter`.
//!
//! Compiled only for `target_os = "espidf"`.  Talks to the Espressif
//! Zigbee SDK through the `zb` bindings module generated from
//! `bindings.h`.
//!
//! The stack owns its own thread (`zb_main`) and reports progress
//! through `esp_zb_app_signal_handler`, a C symbol it resolves at link
//! time.  Everything the callbacks learn is published through the
//! statics below; the adapter only reads them.
//!
//! `BOUND` is filled from three sources: binds completed after a light
//! announces itself, the persisted binding table read back on reboot,
//! and Basic-cluster read responses carrying manufacturer and model.

use core::ffi::c_void;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;

use log::{error, info, warn};

use esp_idf_svc::hal::delay::BLOCK;
use esp_idf_svc::sys::zb::*;
use esp_idf_svc::sys::{ESP_FAIL, ESP_OK};

use crate::app::commands::OnOffCommand;
use crate::app::network::{BoundDevice, BoundList};

use super::{BasicAttr, record_basic_attr, upsert_bound, zcl_string};
use crate::app::ports::LightCommandHandler;
use crate::config::DeviceConfig;
use crate::error::NetworkError;

/// Main-loop thread stack, in bytes.
const STACK_TASK_SIZE: usize = 8192;

/// Delay before retrying network steering, in milliseconds.
const STEERING_RETRY_MS: u32 = 1000;

/// ZCL 3.0 `ZCLVersion` attribute of the Basic cluster.
const ZCL_VERSION: u8 = 3;

/// Short address the stack reports for a peer it cannot resolve.
const UNKNOWN_SHORT_ADDR: u16 = 0xFFFF;

// ── Static state shared with stack callbacks ──────────────────

/// Set once the device has formed or joined a network.
static JOINED: AtomicBool = AtomicBool::new(false);
/// This device forms the network instead of joining one.
static COORDINATOR: AtomicBool = AtomicBool::new(false);
/// Keep binding new lights after the first one.
static ALLOW_MULTIPLE: AtomicBool = AtomicBool::new(true);
/// Local endpoint, needed when binding a newly announced light.
static LOCAL_ENDPOINT: AtomicU8 = AtomicU8::new(0);
/// Seconds the network stays open after a coordinator reboot.
static OPEN_SECS: AtomicU8 = AtomicU8::new(0);

// Stack callbacks run in the `zb_main` thread (not ISR), so std Mutex is safe.
static BOUND: Mutex<BoundList> = Mutex::new(heapless::Vec::new());
static LIGHT_HANDLER: Mutex<Option<Box<dyn LightCommandHandler>>> = Mutex::new(None);

/// Peer details carried from a match-descriptor request to its reply.
struct PendingBind {
    short_addr: u16,
    ieee: [u8; 8],
    endpoint: u8,
}

// ── Startup ───────────────────────────────────────────────────

pub(super) fn start(config: &DeviceConfig) -> Result<(), NetworkError> {
    COORDINATOR.store(config.role.is_coordinator(), Ordering::Relaxed);
    ALLOW_MULTIPLE.store(config.allow_multiple_binding, Ordering::Relaxed);
    LOCAL_ENDPOINT.store(config.endpoint, Ordering::Relaxed);
    OPEN_SECS.store(
        u8::try_from(config.open_network_secs).unwrap_or(u8::MAX),
        Ordering::Relaxed,
    );

    // SAFETY: called once from the main task before the stack thread
    // exists; every pointer handed to the SDK outlives the call.
    unsafe {
        let mut platform: esp_zb_platform_config_t = core::mem::zeroed();
        platform.radio_config.radio_mode = esp_zb_radio_mode_t_ZB_RADIO_MODE_NATIVE;
        platform.host_config.host_connection_mode =
            esp_zb_host_connection_mode_t_ZB_HOST_CONNECTION_MODE_NONE;
        check(esp_zb_platform_config(&mut platform))?;

        let mut cfg: esp_zb_cfg_t = core::mem::zeroed();
        cfg.install_code_policy = false;
        if config.role.is_coordinator() {
            cfg.esp_zb_role = esp_zb_nwk_device_type_t_ESP_ZB_DEVICE_TYPE_COORDINATOR;
            cfg.nwk_cfg.zczr_cfg.max_children = 10;
        } else {
            cfg.esp_zb_role = esp_zb_nwk_device_type_t_ESP_ZB_DEVICE_TYPE_ED;
            cfg.nwk_cfg.zed_cfg.ed_timeout = esp_zb_aging_timeout_t_ESP_ZB_ED_AGING_TIMEOUT_64MIN as u8;
            cfg.nwk_cfg.zed_cfg.keep_alive = 3000;
        }
        esp_zb_init(&mut cfg);

        register_endpoint(config)?;
        esp_zb_core_action_handler_register(Some(core_action_handler));
        check(esp_zb_set_primary_network_channel_set(config.channel_mask))?;
        check(esp_zb_start(false))?;
    }

    std::thread::Builder::new()
        .name("zb_main".into())
        .stack_size(STACK_TASK_SIZE)
        .spawn(|| {
            // SAFETY: the stack was initialised and started above.
            unsafe { esp_zb_stack_main_loop() };
        })
        .map_err(|_| NetworkError::StartFailed(ESP_FAIL))?;

    info!(
        "Zigbee: {:?} started on endpoint {}",
        config.role, config.endpoint
    );
    Ok(())
}

unsafe fn register_endpoint(config: &DeviceConfig) -> Result<(), NetworkError> {
    let ep_list = if config.role.is_coordinator() {
        let mut cfg: esp_zb_on_off_switch_cfg_t = core::mem::zeroed();
        cfg.basic_cfg.zcl_version = ZCL_VERSION;
        esp_zb_on_off_switch_ep_create(config.endpoint, &mut cfg)
    } else {
        let mut cfg: esp_zb_on_off_light_cfg_t = core::mem::zeroed();
        cfg.basic_cfg.zcl_version = ZCL_VERSION;
        cfg.on_off_cfg.on_off = false;
        esp_zb_on_off_light_ep_create(config.endpoint, &mut cfg)
    };
    if ep_list.is_null() {
        return Err(NetworkError::EndpointRejected);
    }

    let clusters = esp_zb_ep_list_get_ep(ep_list, config.endpoint);
    let basic = esp_zb_cluster_list_get_cluster(
        clusters,
        esp_zb_zcl_cluster_id_t_ESP_ZB_ZCL_CLUSTER_ID_BASIC as u16,
        esp_zb_zcl_cluster_role_t_ESP_ZB_ZCL_CLUSTER_SERVER_ROLE as u8,
    );
    if basic.is_null() {
        return Err(NetworkError::EndpointRejected);
    }

    // The SDK copies attribute values, so stack buffers are fine.
    let mut manufacturer = zcl_string(&config.manufacturer);
    let mut model = zcl_string(&config.model);
    esp_zb_basic_cluster_add_attr(
        basic,
        esp_zb_zcl_basic_attr_t_ESP_ZB_ZCL_ATTR_BASIC_MANUFACTURER_NAME_ID as u16,
        manufacturer.as_mut_ptr() as *mut c_void,
    );
    esp_zb_basic_cluster_add_attr(
        basic,
        esp_zb_zcl_basic_attr_t_ESP_ZB_ZCL_ATTR_BASIC_MODEL_IDENTIFIER_ID as u16,
        model.as_mut_ptr() as *mut c_void,
    );

    if esp_zb_device_register(ep_list) != ESP_OK as i32 {
        return Err(NetworkError::EndpointRejected);
    }
    Ok(())
}

fn check(rc: i32) -> Result<(), NetworkError> {
    if rc == ESP_OK as i32 {
        Ok(())
    } else {
        Err(NetworkError::StartFailed(rc))
    }
}

pub(super) fn set_light_handler(handler: Box<dyn LightCommandHandler>) {
    if let Ok(mut slot) = LIGHT_HANDLER.lock() {
        *slot = Some(handler);
    }
}

// ── Queries ───────────────────────────────────────────────────

pub(super) fn is_joined() -> bool {
    JOINED.load(Ordering::Acquire)
}

pub(super) fn bound_count() -> usize {
    BOUND.lock().map(|b| b.len()).unwrap_or(0)
}

pub(super) fn bound_devices() -> BoundList {
    BOUND.lock().map(|b| b.clone()).unwrap_or_default()
}

pub(super) fn recent_rssi() -> i8 {
    // SAFETY: read-only query of the radio driver's last frame RSSI.
    unsafe { esp_ieee802154_get_recent_rssi() }
}

// ── Actions ───────────────────────────────────────────────────

/// Send an On/Off cluster command through the binding table.
pub(super) fn send_on_off(endpoint: u8, cmd: OnOffCommand) -> Result<(), NetworkError> {
    let cmd_id = match cmd {
        OnOffCommand::On => esp_zb_zcl_on_off_cmd_id_t_ESP_ZB_ZCL_CMD_ON_OFF_ON_ID,
        OnOffCommand::Off => esp_zb_zcl_on_off_cmd_id_t_ESP_ZB_ZCL_CMD_ON_OFF_OFF_ID,
        OnOffCommand::Toggle => esp_zb_zcl_on_off_cmd_id_t_ESP_ZB_ZCL_CMD_ON_OFF_TOGGLE_ID,
    };

    // SAFETY: the request struct is fully initialised and the stack
    // lock serialises access with the `zb_main` thread.
    unsafe {
        let mut req: esp_zb_zcl_on_off_cmd_t = core::mem::zeroed();
        req.zcl_basic_cmd.src_endpoint = endpoint;
        req.address_mode = esp_zb_zcl_address_mode_t_ESP_ZB_APS_ADDR_MODE_DST_ADDR_ENDP_NOT_PRESENT;
        req.on_off_cmd_id = cmd_id as u8;

        if !esp_zb_lock_acquire(BLOCK) {
            return Err(NetworkError::SendFailed(ESP_FAIL));
        }
        esp_zb_zcl_on_off_cmd_req(&mut req);
        esp_zb_lock_release();
    }
    Ok(())
}

/// Write the local light state into the endpoint's On/Off attribute.
/// A local write does not raise the SET_ATTR_VALUE core action.
pub(super) fn set_light_attribute(endpoint: u8, on: bool) -> Result<(), NetworkError> {
    let mut value = u8::from(on);
    // SAFETY: `value` outlives the call (the SDK copies it) and the stack
    // lock serialises access with the `zb_main` thread.
    let status = unsafe {
        if !esp_zb_lock_acquire(BLOCK) {
            return Err(NetworkError::AttributeRejected(ESP_FAIL));
        }
        let status = esp_zb_zcl_set_attribute_val(
            endpoint,
            esp_zb_zcl_cluster_id_t_ESP_ZB_ZCL_CLUSTER_ID_ON_OFF as u16,
            esp_zb_zcl_cluster_role_t_ESP_ZB_ZCL_CLUSTER_SERVER_ROLE as u8,
            esp_zb_zcl_on_off_attr_t_ESP_ZB_ZCL_ATTR_ON_OFF_ON_OFF_ID as u16,
            &mut value as *mut u8 as *mut c_void,
            false,
        );
        esp_zb_lock_release();
        status
    };
    if status != esp_zb_zcl_status_t_ESP_ZB_ZCL_STATUS_SUCCESS {
        return Err(NetworkError::AttributeRejected(status as i32));
    }
    Ok(())
}

/// Erase the stack's persisted network data.  The SDK restarts the chip.
pub(super) fn factory_reset() {
    JOINED.store(false, Ordering::Release);
    if let Ok(mut bound) = BOUND.lock() {
        bound.clear();
    }
    // SAFETY: runs under the stack lock like any other API call from
    // outside the `zb_main` thread.
    unsafe {
        if esp_zb_lock_acquire(BLOCK) {
            esp_zb_factory_reset();
            esp_zb_lock_release();
        }
    }
}

// ── Stack callbacks ───────────────────────────────────────────

unsafe extern "C" fn start_commissioning(mode_mask: u8) {
    let rc = unsafe { esp_zb_bdb_start_top_level_commissioning(mode_mask) };
    if rc != ESP_OK as i32 {
        warn!("Zigbee: commissioning mode {:#x} rejected (rc={})", mode_mask, rc);
    }
}

fn schedule_commissioning(mode: u32, delay_ms: u32) {
    // SAFETY: called from the `zb_main` thread; the alarm fires there too.
    unsafe { esp_zb_scheduler_alarm(Some(start_commissioning), mode as u8, delay_ms) };
}

fn mark_joined() {
    if !JOINED.swap(true, Ordering::AcqRel) {
        // SAFETY: read-only stack queries from the `zb_main` thread.
        let (pan, channel, short) = unsafe {
            (
                esp_zb_get_pan_id(),
                esp_zb_get_current_channel(),
                esp_zb_get_short_address(),
            )
        };
        info!(
            "Zigbee: joined PAN 0x{:04x} channel {} short 0x{:04x}",
            pan, channel, short
        );
    }
}

/// Application signal hook resolved by the SDK at link time.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn esp_zb_app_signal_handler(signal: *mut esp_zb_app_signal_t) {
    if signal.is_null() {
        return;
    }
    // SAFETY: the SDK passes a valid signal for the duration of the call.
    let (kind, status, params) = unsafe {
        let s = &*signal;
        (*s.p_app_signal, s.esp_err_status, esp_zb_app_signal_get_params(s.p_app_signal))
    };
    let ok = status == ESP_OK as i32;
    let coordinator = COORDINATOR.load(Ordering::Relaxed);

    match kind {
        esp_zb_app_signal_type_t_ESP_ZB_ZDO_SIGNAL_SKIP_STARTUP => {
            info!("Zigbee: stack initialised");
            schedule_commissioning(esp_zb_bdb_commissioning_mode_ESP_ZB_BDB_MODE_INITIALIZATION, 0);
        }
        esp_zb_app_signal_type_t_ESP_ZB_BDB_SIGNAL_DEVICE_FIRST_START
        | esp_zb_app_signal_type_t_ESP_ZB_BDB_SIGNAL_DEVICE_REBOOT => {
            if !ok {
                warn!("Zigbee: device start failed (rc={}), retrying", status);
                schedule_commissioning(
                    esp_zb_bdb_commissioning_mode_ESP_ZB_BDB_MODE_INITIALIZATION,
                    STEERING_RETRY_MS,
                );
                return;
            }
            // SAFETY: read-only stack query from the `zb_main` thread.
            if unsafe { esp_zb_bdb_is_factory_new() } {
                let mode = if coordinator {
                    esp_zb_bdb_commissioning_mode_ESP_ZB_BDB_MODE_NETWORK_FORMATION
                } else {
                    esp_zb_bdb_commissioning_mode_ESP_ZB_BDB_MODE_NETWORK_STEERING
                };
                info!("Zigbee: factory-new device, commissioning");
                schedule_commissioning(mode, 0);
            } else {
                info!("Zigbee: rebooted into existing network");
                mark_joined();
                request_binding_table(0);
                if coordinator {
                    let secs = OPEN_SECS.load(Ordering::Relaxed);
                    // SAFETY: called from the `zb_main` thread.
                    if unsafe { esp_zb_bdb_open_network(secs) } == ESP_OK as i32 {
                        info!("Zigbee: network open for {}s", secs);
                    }
                }
            }
        }
        esp_zb_app_signal_type_t_ESP_ZB_BDB_SIGNAL_FORMATION => {
            if ok {
                mark_joined();
                schedule_commissioning(
                    esp_zb_bdb_commissioning_mode_ESP_ZB_BDB_MODE_NETWORK_STEERING,
                    0,
                );
            } else {
                warn!("Zigbee: formation failed (rc={}), retrying", status);
                schedule_commissioning(
                    esp_zb_bdb_commissioning_mode_ESP_ZB_BDB_MODE_NETWORK_FORMATION,
                    STEERING_RETRY_MS,
                );
            }
        }
        esp_zb_app_signal_type_t_ESP_ZB_BDB_SIGNAL_STEERING => {
            if ok {
                mark_joined();
            } else {
                warn!("Zigbee: steering failed (rc={}), retrying", status);
                schedule_commissioning(
                    esp_zb_bdb_commissioning_mode_ESP_ZB_BDB_MODE_NETWORK_STEERING,
                    STEERING_RETRY_MS,
                );
            }
        }
        esp_zb_app_signal_type_t_ESP_ZB_ZDO_SIGNAL_DEVICE_ANNCE if coordinator => {
            if params.is_null() {
                return;
            }
            // SAFETY: DEVICE_ANNCE params are a device_annce struct.
            let annce = unsafe { &*(params as *const esp_zb_zdo_signal_device_annce_params_t) };
            info!("Zigbee: device 0x{:04x} announced", annce.device_short_addr);
            if !ALLOW_MULTIPLE.load(Ordering::Relaxed) && bound_count() > 0 {
                return;
            }
            find_light(annce.device_short_addr, annce.ieee_addr);
        }
        esp_zb_app_signal_type_t_ESP_ZB_NWK_SIGNAL_PERMIT_JOIN_STATUS if ok && !params.is_null() => {
            // SAFETY: PERMIT_JOIN_STATUS params are a single duration byte.
            let secs = unsafe { *(params as *const u8) };
            if secs > 0 {
                info!("Zigbee: network open for {}s", secs);
            } else {
                info!("Zigbee: network closed");
            }
        }
        other => {
            info!("Zigbee: signal {} (rc={})", other, status);
        }
    }
}

fn find_light(short_addr: u16, ieee: [u8; 8]) {
    let ctx = Box::into_raw(Box::new(PendingBind {
        short_addr,
        ieee,
        endpoint: 0,
    }));
    // SAFETY: the request is copied by the SDK; `ctx` is reclaimed in
    // `on_light_found`, which the stack calls exactly once.
    unsafe {
        let mut req: esp_zb_zdo_match_desc_req_param_t = core::mem::zeroed();
        req.dst_nwk_addr = short_addr;
        req.addr_of_interest = short_addr;
        esp_zb_zdo_find_on_off_light(&mut req, Some(on_light_found), ctx as *mut c_void);
    }
}

unsafe extern "C" fn on_light_found(
    status: esp_zb_zdp_status_t,
    addr: u16,
    endpoint: u8,
    ctx: *mut c_void,
) {
    if ctx.is_null() {
        return;
    }
    // SAFETY: `ctx` came from `Box::into_raw` in `find_light`.
    let mut pending = unsafe { Box::from_raw(ctx as *mut PendingBind) };
    if status != esp_zb_zdp_status_t_ESP_ZB_ZDP_STATUS_SUCCESS {
        info!("Zigbee: 0x{:04x} has no On/Off light endpoint", pending.short_addr);
        return;
    }
    pending.short_addr = addr;
    pending.endpoint = endpoint;

    // SAFETY: runs in the `zb_main` thread; `pending` is handed to
    // `on_bound` and reclaimed there.
    unsafe {
        let mut req: esp_zb_zdo_bind_req_param_t = core::mem::zeroed();
        esp_zb_get_long_address(req.src_address.as_mut_ptr());
        req.src_endp = LOCAL_ENDPOINT.load(Ordering::Relaxed);
        req.cluster_id = esp_zb_zcl_cluster_id_t_ESP_ZB_ZCL_CLUSTER_ID_ON_OFF as u16;
        req.dst_addr_mode =
            esp_zb_zdo_bind_dst_addr_mode_t_ESP_ZB_ZDO_BIND_DST_ADDR_MODE_64_BIT_EXTENDED as u8;
        req.dst_address_u.addr_long = pending.ieee;
        req.dst_endp = endpoint;
        req.req_dst_addr = esp_zb_get_short_address();
        info!("Zigbee: binding light 0x{:04x} ep {}", addr, endpoint);
        esp_zb_zdo_device_bind_req(&mut req, Some(on_bound), Box::into_raw(pending) as *mut c_void);
    }
}

unsafe extern "C" fn on_bound(status: esp_zb_zdp_status_t, ctx: *mut c_void) {
    if ctx.is_null() {
        return;
    }
    // SAFETY: `ctx` came from `Box::into_raw` in `on_light_found`.
    let pending = unsafe { Box::from_raw(ctx as *mut PendingBind) };
    if status != esp_zb_zdp_status_t_ESP_ZB_ZDP_STATUS_SUCCESS {
        warn!("Zigbee: bind to 0x{:04x} failed (status={})", pending.short_addr, status);
        return;
    }

    let peer = BoundDevice {
        endpoint: pending.endpoint,
        short_addr: pending.short_addr,
        ieee: pending.ieee,
        manufacturer: None,
        model: None,
    };
    info!("Zigbee: bound to light 0x{:04x}", peer.short_addr);
    track_bound(peer);
}

/// Add a peer to `BOUND` and ask it for its manufacturer and model.
fn track_bound(peer: BoundDevice) {
    let tracked = match BOUND.lock() {
        Ok(mut bound) => upsert_bound(&mut bound, peer.clone()),
        Err(_) => {
            error!("Zigbee: bound list poisoned");
            return;
        }
    };
    if tracked {
        request_basic_info(&peer);
    } else {
        warn!("Zigbee: bound list full, 0x{:04x} not tracked", peer.short_addr);
    }
}

/// Read one page of the persisted binding table, starting at `start_index`.
fn request_binding_table(start_index: u8) {
    // SAFETY: runs in the `zb_main` thread; the request lives on the heap
    // until `on_binding_table` reclaims it.
    unsafe {
        let mut req: esp_zb_zdo_mgmt_bind_param_t = core::mem::zeroed();
        req.dst_addr = esp_zb_get_short_address();
        req.start_index = start_index;
        let req = Box::into_raw(Box::new(req));
        esp_zb_zdo_binding_table_req(req, Some(on_binding_table), req as *mut c_void);
    }
}

unsafe extern "C" fn on_binding_table(
    table: *const esp_zb_zdo_binding_table_info_t,
    ctx: *mut c_void,
) {
    if !ctx.is_null() {
        // SAFETY: `ctx` came from `Box::into_raw` in `request_binding_table`.
        drop(unsafe { Box::from_raw(ctx as *mut esp_zb_zdo_mgmt_bind_param_t) });
    }
    if table.is_null() {
        return;
    }
    // SAFETY: the SDK passes a valid table page for the duration of the call.
    let table = unsafe { &*table };
    if table.status as esp_zb_zdp_status_t != esp_zb_zdp_status_t_ESP_ZB_ZDP_STATUS_SUCCESS {
        warn!("Zigbee: binding table read failed (status={})", table.status);
        return;
    }

    let local_ep = LOCAL_ENDPOINT.load(Ordering::Relaxed);
    let mut record = table.record;
    for _ in 0..table.count {
        if record.is_null() {
            break;
        }
        // SAFETY: `record` walks the list the SDK built for this page.
        let r = unsafe { &*record };
        record = r.next;

        let is_light = r.src_endp == local_ep
            && r.cluster_id == esp_zb_zcl_cluster_id_t_ESP_ZB_ZCL_CLUSTER_ID_ON_OFF as u16
            && r.dst_addr_mode
                == esp_zb_zdo_bind_dst_addr_mode_t_ESP_ZB_ZDO_BIND_DST_ADDR_MODE_64_BIT_EXTENDED
                    as u8;
        if !is_light {
            continue;
        }
        // SAFETY: 64-bit destination mode stores the long address.
        let mut ieee = unsafe { r.dst_address.addr_long };
        // SAFETY: read-only address-table lookup from the `zb_main` thread.
        let short_addr = unsafe { esp_zb_address_short_by_ieee(ieee.as_mut_ptr()) };
        info!("Zigbee: restored binding to 0x{:04x} ep {}", short_addr, r.dst_endp);
        track_bound(BoundDevice {
            endpoint: r.dst_endp,
            short_addr,
            ieee,
            manufacturer: None,
            model: None,
        });
    }

    let next = u16::from(table.index) + u16::from(table.count);
    if next < u16::from(table.total) {
        request_binding_table(next as u8);
    }
}

/// Ask a bound light for its Basic-cluster manufacturer and model.  The
/// answer arrives as a READ_ATTR_RESP core action.
fn request_basic_info(peer: &BoundDevice) {
    let mut attrs = [
        esp_zb_zcl_basic_attr_t_ESP_ZB_ZCL_ATTR_BASIC_MANUFACTURER_NAME_ID as u16,
        esp_zb_zcl_basic_attr_t_ESP_ZB_ZCL_ATTR_BASIC_MODEL_IDENTIFIER_ID as u16,
    ];
    // SAFETY: runs in the `zb_main` thread; the SDK copies the request
    // and the attribute list before returning.
    unsafe {
        let mut req: esp_zb_zcl_read_attr_cmd_t = core::mem::zeroed();
        if peer.short_addr == UNKNOWN_SHORT_ADDR {
            req.address_mode = esp_zb_zcl_address_mode_t_ESP_ZB_APS_ADDR_MODE_64_ENDP_PRESENT;
            req.zcl_basic_cmd.dst_addr_u.addr_long = peer.ieee;
        } else {
            req.address_mode = esp_zb_zcl_address_mode_t_ESP_ZB_APS_ADDR_MODE_16_ENDP_PRESENT;
            req.zcl_basic_cmd.dst_addr_u.addr_short = peer.short_addr;
        }
        req.zcl_basic_cmd.src_endpoint = LOCAL_ENDPOINT.load(Ordering::Relaxed);
        req.zcl_basic_cmd.dst_endpoint = peer.endpoint;
        req.clusterID = esp_zb_zcl_cluster_id_t_ESP_ZB_ZCL_CLUSTER_ID_BASIC as u16;
        req.attr_number = attrs.len() as _;
        req.attr_field = attrs.as_mut_ptr();
        esp_zb_zcl_read_attr_cmd_req(&mut req);
    }
}

/// ZCL core action hook: inbound attribute writes and read responses
/// land here.
unsafe extern "C" fn core_action_handler(
    callback_id: esp_zb_core_action_callback_id_t,
    message: *const c_void,
) -> i32 {
    if message.is_null() {
        return ESP_OK as i32;
    }
    match callback_id {
        esp_zb_core_action_callback_id_s_ESP_ZB_CORE_SET_ATTR_VALUE_CB_ID => {
            // SAFETY: SET_ATTR_VALUE messages are set_attr_value structs.
            on_attribute_write(unsafe { &*(message as *const esp_zb_zcl_set_attr_value_message_t) });
        }
        esp_zb_core_action_callback_id_s_ESP_ZB_CORE_CMD_READ_ATTR_RESP_CB_ID => {
            // SAFETY: READ_ATTR_RESP messages are read_attr_resp structs.
            on_read_response(unsafe {
                &*(message as *const esp_zb_zcl_cmd_read_attr_resp_message_t)
            });
        }
        _ => {}
    }
    ESP_OK as i32
}

fn on_read_response(msg: &esp_zb_zcl_cmd_read_attr_resp_message_t) {
    if msg.info.status != esp_zb_zcl_status_t_ESP_ZB_ZCL_STATUS_SUCCESS
        || msg.info.cluster != esp_zb_zcl_cluster_id_t_ESP_ZB_ZCL_CLUSTER_ID_BASIC as u16
    {
        return;
    }
    // SAFETY: responses from bound lights carry a short source address.
    let short_addr = unsafe { msg.info.src_address.u.short_addr };
    let Ok(mut bound) = BOUND.lock() else {
        return;
    };

    let mut var = msg.variables;
    while !var.is_null() {
        // SAFETY: `var` walks the list the SDK built for this response.
        let v = unsafe { &*var };
        var = v.next;

        let id = v.attribute.id;
        let attr = if id == esp_zb_zcl_basic_attr_t_ESP_ZB_ZCL_ATTR_BASIC_MANUFACTURER_NAME_ID as u16 {
            BasicAttr::Manufacturer
        } else if id == esp_zb_zcl_basic_attr_t_ESP_ZB_ZCL_ATTR_BASIC_MODEL_IDENTIFIER_ID as u16 {
            BasicAttr::Model
        } else {
            continue;
        };
        let value = v.attribute.data.value as *const u8;
        if v.status != esp_zb_zcl_status_t_ESP_ZB_ZCL_STATUS_SUCCESS || value.is_null() {
            continue;
        }
        // SAFETY: string attributes hold a length byte followed by that
        // many bytes; 0xFF marks an invalid string with no payload.
        let raw = unsafe {
            let len = usize::from(*value);
            core::slice::from_raw_parts(value, if len == 0xFF { 1 } else { len + 1 })
        };
        if !record_basic_attr(&mut bound, short_addr, attr, raw) {
            warn!("Zigbee: {:?} from 0x{:04x} not recorded", attr, short_addr);
        }
    }
}

fn on_attribute_write(msg: &esp_zb_zcl_set_attr_value_message_t) {
    if msg.info.status != esp_zb_zcl_status_t_ESP_ZB_ZCL_STATUS_SUCCESS {
        return;
    }
    let is_on_off = msg.info.cluster == esp_zb_zcl_cluster_id_t_ESP_ZB_ZCL_CLUSTER_ID_ON_OFF as u16
        && msg.attribute.id == esp_zb_zcl_on_off_attr_t_ESP_ZB_ZCL_ATTR_ON_OFF_ON_OFF_ID as u16
        && msg.attribute.data.type_ == esp_zb_zcl_attr_type_t_ESP_ZB_ZCL_ATTR_TYPE_BOOL
        && !msg.attribute.data.value.is_null();
    if !is_on_off {
        return;
    }

    // SAFETY: BOOL attributes carry a single byte.
    let on = unsafe { *(msg.attribute.data.value as *const u8) } != 0;
    if let Ok(mut slot) = LIGHT_HANDLER.lock() {
        match slot.as_mut() {
            Some(handler) => handler.on_light_change(on),
            None => warn!("Zigbee: On/Off write with no light handler"),
        }
    }
}
