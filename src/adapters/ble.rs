//! Bluedroid radio adapter.
//!
//! Implements [`RadioPort`] and dispatches stack callbacks to a
//! [`StackCallbacks`] implementor (the peripheral context).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw Bluedroid GAP/GATTS calls via `esp_idf_svc::sys`.
//! - **all other targets**: simulation that tracks advertising, the stored
//!   value and a fake link so host tests can drive it.
//!
//! ## GATT layout
//!
//! | Attribute        | UUID                                   | Access                          |
//! |------------------|----------------------------------------|---------------------------------|
//! | Service          | `4fafc201-1fb5-459e-8fcc-c5c9c331914b` | primary                         |
//! | Counter          | `beb5483e-36e1-4688-b7f5-ea07361b26a8` | R/W/Notify/Indicate, encrypted  |
//! | CCCD             | `0x2902`                               | R/W, encrypted                  |

use log::info;

use crate::app::ports::{RadioPort, StackCallbacks};
use crate::error::BleError;
use crate::identity::{CCCD_INITIAL, CCCD_LEN, PAYLOAD_LEN, PeripheralIdentity, Uuid128};
use crate::pairing::PairingSecret;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
#[cfg(not(target_os = "espidf"))]
use log::debug;
#[cfg(not(target_os = "espidf"))]
use std::sync::Mutex;

// ───────────────────────────────────────────────────────────────
// Callback registration
// ───────────────────────────────────────────────────────────────

// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures, so the peripheral context is reached through this static.
static CALLBACKS: std::sync::OnceLock<&'static dyn StackCallbacks> = std::sync::OnceLock::new();

/// Route stack events to `callbacks` for the rest of the process.
///
/// Returns `false` if a target was already bound.
pub fn bind_callbacks(callbacks: &'static dyn StackCallbacks) -> bool {
    CALLBACKS.set(callbacks).is_ok()
}

#[cfg(target_os = "espidf")]
fn callbacks() -> Option<&'static dyn StackCallbacks> {
    CALLBACKS.get().copied()
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF static state
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod stack {
    use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};
    use std::sync::{Mutex, OnceLock};

    use esp_idf_svc::sys::*;

    use crate::pairing::AuthOutcome;

    /// Service description captured at registration, read back from the
    /// GATTS task once the app is registered.
    pub(super) struct Layout {
        pub service_uuid: u128,
        pub characteristic_uuid: u128,
        pub properties: u8,
        pub permissions: u16,
    }

    pub(super) static LAYOUT: OnceLock<Layout> = OnceLock::new();
    pub(super) static GATTS_IF: AtomicU8 = AtomicU8::new(ESP_GATT_IF_NONE as u8);
    pub(super) static SVC_HANDLE: AtomicU16 = AtomicU16::new(0);
    pub(super) static CHAR_HANDLE: AtomicU16 = AtomicU16::new(0);
    pub(super) static CONN_ID: AtomicU16 = AtomicU16::new(0);
    pub(super) static LINK_UP: AtomicBool = AtomicBool::new(false);
    pub(super) static CONGESTED: AtomicBool = AtomicBool::new(false);
    /// Address of the connected central, for link-level security requests.
    pub(super) static PEER: Mutex<Option<esp_bd_addr_t>> = Mutex::new(None);

    const SERVICE_HANDLES: u16 = 6;

    /// Log a rejected GATTS request.  Returns `true` if it was accepted.
    fn accepted(ret: esp_err_t, what: &str) -> bool {
        if ret == ESP_OK as esp_err_t {
            return true;
        }
        log::error!("BLE GATTS: {} failed (err={})", what, ret);
        false
    }

    /// Log a failed GATTS completion event.  Returns `true` on success.
    fn completed(status: esp_gatt_status_t, what: &str) -> bool {
        if status == esp_gatt_status_t_ESP_GATT_OK {
            return true;
        }
        log::error!("BLE GATTS: {} completed with status {}", what, status);
        false
    }

    pub(super) fn uuid128(uuid: u128) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = 16;
        t.uuid.uuid128 = uuid.to_le_bytes();
        t
    }

    fn uuid16(uuid: u16) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = 2;
        t.uuid.uuid16 = uuid;
        t
    }

    pub(super) fn adv_params() -> esp_ble_adv_params_t {
        esp_ble_adv_params_t {
            adv_int_min: 0x20,
            adv_int_max: 0x40,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            ..unsafe { core::mem::zeroed() }
        }
    }

    pub(super) unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        param: *mut esp_ble_gap_cb_param_t,
    ) {
        let Some(cb) = super::callbacks() else {
            log::warn!("BLE GAP: event {} before callbacks were bound", event);
            return;
        };
        unsafe {
            match event {
                esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                    let status = (*param).adv_start_cmpl.status;
                    if status == esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                        log::debug!("BLE GAP: advertising started");
                    } else {
                        log::warn!("BLE GAP: advertising start rejected (status={})", status);
                    }
                }
                esp_gap_ble_cb_event_t_ESP_GAP_BLE_SEC_REQ_EVT => {
                    let accept = cb.on_security_request();
                    esp_ble_gap_security_rsp(
                        (*param).ble_security.ble_req.bd_addr.as_mut_ptr(),
                        accept,
                    );
                }
                esp_gap_ble_cb_event_t_ESP_GAP_BLE_PASSKEY_REQ_EVT => {
                    let passkey = cb.on_passkey_request();
                    esp_ble_passkey_reply(
                        (*param).ble_security.ble_req.bd_addr.as_mut_ptr(),
                        true,
                        passkey,
                    );
                }
                esp_gap_ble_cb_event_t_ESP_GAP_BLE_PASSKEY_NOTIF_EVT => {
                    cb.on_passkey_notify((*param).ble_security.key_notif.passkey);
                }
                esp_gap_ble_cb_event_t_ESP_GAP_BLE_NC_REQ_EVT => {
                    let notif = &mut (*param).ble_security.key_notif;
                    let accept = cb.on_confirm_pin(notif.passkey);
                    esp_ble_confirm_reply(notif.bd_addr.as_mut_ptr(), accept);
                }
                esp_gap_ble_cb_event_t_ESP_GAP_BLE_AUTH_CMPL_EVT => {
                    let p = &(*param).ble_security.auth_cmpl;
                    cb.on_authentication_complete(&AuthOutcome {
                        success: p.success,
                        fail_reason: p.fail_reason,
                        peer: p.bd_addr,
                    });
                }
                _ => {}
            }
        }
    }

    pub(super) unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        unsafe {
            match event {
                esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                    GATTS_IF.store(gatts_if, Ordering::Release);
                    let Some(layout) = LAYOUT.get() else {
                        log::error!("BLE GATTS: app registered without a layout");
                        return;
                    };
                    let mut svc_id = esp_gatt_srvc_id_t {
                        id: esp_gatt_id_t {
                            uuid: uuid128(layout.service_uuid),
                            inst_id: 0,
                        },
                        is_primary: true,
                    };
                    accepted(
                        esp_ble_gatts_create_service(gatts_if, &mut svc_id, SERVICE_HANDLES),
                        "create service",
                    );
                }
                esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                    let Some(layout) = LAYOUT.get() else { return };
                    let p = &(*param).create;
                    if !completed(p.status, "create service") {
                        return;
                    }
                    let svc_handle = p.service_handle;
                    SVC_HANDLE.store(svc_handle, Ordering::Release);
                    if !accepted(esp_ble_gatts_start_service(svc_handle), "start service") {
                        return;
                    }

                    let mut initial = [0u8; super::PAYLOAD_LEN];
                    let mut value = esp_attr_value_t {
                        attr_max_len: super::PAYLOAD_LEN as u16,
                        attr_len: super::PAYLOAD_LEN as u16,
                        attr_value: initial.as_mut_ptr(),
                    };
                    let mut control = esp_attr_control_t {
                        auto_rsp: ESP_GATT_AUTO_RSP as u8,
                    };
                    let mut char_uuid = uuid128(layout.characteristic_uuid);
                    accepted(
                        esp_ble_gatts_add_char(
                            svc_handle,
                            &mut char_uuid,
                            layout.permissions as esp_gatt_perm_t,
                            layout.properties as esp_gatt_char_prop_t,
                            &mut value,
                            &mut control,
                        ),
                        "add characteristic",
                    );
                }
                esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                    let p = &(*param).add_char;
                    if !completed(p.status, "add characteristic") {
                        return;
                    }
                    CHAR_HANDLE.store(p.attr_handle, Ordering::Release);
                    log::info!("BLE GATTS: characteristic added (handle={})", p.attr_handle);

                    // Auto-response attributes must carry a value buffer.
                    let mut initial = super::CCCD_INITIAL;
                    let mut value = esp_attr_value_t {
                        attr_max_len: super::CCCD_LEN as u16,
                        attr_len: super::CCCD_LEN as u16,
                        attr_value: initial.as_mut_ptr(),
                    };
                    let mut cccd = uuid16(crate::identity::CCCD_UUID);
                    let mut control = esp_attr_control_t {
                        auto_rsp: ESP_GATT_AUTO_RSP as u8,
                    };
                    accepted(
                        esp_ble_gatts_add_char_descr(
                            SVC_HANDLE.load(Ordering::Acquire),
                            &mut cccd,
                            (ESP_GATT_PERM_READ_ENCRYPTED | ESP_GATT_PERM_WRITE_ENCRYPTED)
                                as esp_gatt_perm_t,
                            &mut value,
                            &mut control,
                        ),
                        "add CCCD",
                    );
                }
                esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
                    let p = &(*param).add_char_descr;
                    if completed(p.status, "add CCCD") {
                        log::info!("BLE GATTS: CCCD added (handle={})", p.attr_handle);
                    }
                }
                esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                    let p = &(*param).connect;
                    if let Ok(mut peer) = PEER.lock() {
                        *peer = Some(p.remote_bda);
                    }
                    CONN_ID.store(p.conn_id, Ordering::Release);
                    LINK_UP.store(true, Ordering::Release);
                    CONGESTED.store(false, Ordering::Release);
                    log::info!("BLE GATTS: central connected (conn_id={})", p.conn_id);
                    if let Some(cb) = super::callbacks() {
                        cb.on_connect();
                    }
                }
                esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                    LINK_UP.store(false, Ordering::Release);
                    if let Ok(mut peer) = PEER.lock() {
                        *peer = None;
                    }
                    log::info!(
                        "BLE GATTS: central disconnected (reason=0x{:x})",
                        (*param).disconnect.reason
                    );
                    if let Some(cb) = super::callbacks() {
                        cb.on_disconnect();
                    }
                }
                esp_gatts_cb_event_t_ESP_GATTS_CONGEST_EVT => {
                    CONGESTED.store((*param).congest.congested, Ordering::Release);
                }
                esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
                    let handle = (*param).read.handle;
                    if handle != CHAR_HANDLE.load(Ordering::Acquire) {
                        return;
                    }
                    let mut len: u16 = 0;
                    let mut ptr: *const u8 = core::ptr::null();
                    let status = esp_ble_gatts_get_attr_value(handle, &mut len, &mut ptr);
                    if status == esp_gatt_status_t_ESP_GATT_OK && !ptr.is_null() {
                        let value = core::slice::from_raw_parts(ptr, len as usize);
                        if let Some(cb) = super::callbacks() {
                            cb.on_read(value);
                        }
                    }
                }
                esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                    let p = &(*param).write;
                    if p.handle != CHAR_HANDLE.load(Ordering::Acquire) || p.value.is_null() {
                        return;
                    }
                    let value = core::slice::from_raw_parts(p.value, p.len as usize);
                    if let Some(cb) = super::callbacks() {
                        cb.on_write(value);
                    }
                }
                _ => {}
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Radio adapter
// ───────────────────────────────────────────────────────────────

pub struct BluedroidRadio {
    #[cfg(not(target_os = "espidf"))]
    sim: SimRadio,
}

/// Host-side stand-in for the controller.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimRadio {
    security_applied: AtomicBool,
    registered: AtomicBool,
    advertising: AtomicBool,
    adverts: AtomicU32,
    link_up: AtomicBool,
    encryptions: AtomicU32,
    notified: AtomicU32,
    value: Mutex<heapless::Vec<u8, PAYLOAD_LEN>>,
}

impl BluedroidRadio {
    /// Bring up the controller and Bluedroid in BLE-only mode and register
    /// the GAP/GATTS handlers.  Events reach the peripheral context once
    /// [`bind_callbacks`] has been called.
    pub fn init() -> Result<Self, BleError> {
        Self::platform_init()?;
        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            sim: SimRadio::default(),
        })
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_init() -> Result<(), BleError> {
        use esp_idf_svc::sys::*;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check(esp_bt_controller_init(&mut bt_cfg), BleError::StackInit)?;
            check(
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
                BleError::StackInit,
            )?;
            check(esp_bluedroid_init(), BleError::StackInit)?;
            check(esp_bluedroid_enable(), BleError::StackInit)?;

            check(
                esp_ble_gap_register_callback(Some(stack::gap_event_handler)),
                BleError::StackInit,
            )?;
            check(
                esp_ble_gatts_register_callback(Some(stack::gatts_event_handler)),
                BleError::StackInit,
            )?;
        }
        info!("BLE(espidf): Bluedroid stack initialised");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init() -> Result<(), BleError> {
        info!("BLE(sim): stack initialised");
        Ok(())
    }

    /// Simulation: raise or drop the fake link.  The stack would report
    /// this through the connect/disconnect callbacks.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_link(&self, up: bool) {
        self.sim.link_up.store(up, Ordering::SeqCst);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_is_advertising(&self) -> bool {
        self.sim.advertising.load(Ordering::SeqCst)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_adverts(&self) -> u32 {
        self.sim.adverts.load(Ordering::SeqCst)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_encryptions(&self) -> u32 {
        self.sim.encryptions.load(Ordering::SeqCst)
    }

    /// Simulation: CCCD value once the service is registered.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_cccd(&self) -> Option<[u8; CCCD_LEN]> {
        self.sim
            .registered
            .load(Ordering::SeqCst)
            .then_some(CCCD_INITIAL)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_notified(&self) -> u32 {
        self.sim.notified.load(Ordering::SeqCst)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_value(&self) -> heapless::Vec<u8, PAYLOAD_LEN> {
        self.sim
            .value
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_idf_svc::sys::esp_err_t, wrap: fn(i32) -> BleError) -> Result<(), BleError> {
    if ret == esp_idf_svc::sys::ESP_OK as i32 {
        Ok(())
    } else {
        Err(wrap(ret))
    }
}

// ───────────────────────────────────────────────────────────────
// RadioPort implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl RadioPort for BluedroidRadio {
    fn apply_security(&self, secret: &PairingSecret) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;

        let auth_req: esp_ble_auth_req_t = secret.auth_mode.bits();
        let iocap: esp_ble_io_cap_t = secret.io_capability as u8;
        let key_size: u8 = 16;
        let keys: u8 = secret.key_distribution.bits();
        let passkey: u32 = secret.passkey.value();
        let only_specified: u8 = ESP_BLE_ONLY_ACCEPT_SPECIFIED_AUTH_ENABLE as u8;

        // SAFETY: every pointer refers to a live local for the duration of the call;
        // Bluedroid copies the value before returning.
        unsafe {
            let set = |param: esp_ble_sm_param_t, ptr: *const core::ffi::c_void, len: usize| {
                check(
                    esp_ble_gap_set_security_param(param, ptr.cast_mut(), len as u8),
                    BleError::Security,
                )
            };
            set(
                esp_ble_sm_param_t_ESP_BLE_SM_AUTHEN_REQ_MODE,
                (&auth_req as *const u8).cast(),
                1,
            )?;
            set(
                esp_ble_sm_param_t_ESP_BLE_SM_IOCAP_MODE,
                (&iocap as *const u8).cast(),
                1,
            )?;
            set(
                esp_ble_sm_param_t_ESP_BLE_SM_MAX_KEY_SIZE,
                (&key_size as *const u8).cast(),
                1,
            )?;
            set(
                esp_ble_sm_param_t_ESP_BLE_SM_SET_INIT_KEY,
                (&keys as *const u8).cast(),
                1,
            )?;
            set(
                esp_ble_sm_param_t_ESP_BLE_SM_SET_RSP_KEY,
                (&keys as *const u8).cast(),
                1,
            )?;
            set(
                esp_ble_sm_param_t_ESP_BLE_SM_SET_STATIC_PASSKEY,
                (&passkey as *const u32).cast(),
                core::mem::size_of::<u32>(),
            )?;
            set(
                esp_ble_sm_param_t_ESP_BLE_SM_ONLY_ACCEPT_SPECIFIED_SEC_AUTH,
                (&only_specified as *const u8).cast(),
                1,
            )?;
        }
        Ok(())
    }

    fn register_service(&self, identity: &PeripheralIdentity) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;

        let layout = stack::Layout {
            service_uuid: identity.service_uuid(),
            characteristic_uuid: identity.characteristic_uuid(),
            properties: identity.properties().bits(),
            permissions: identity.permissions().bits(),
        };
        if stack::LAYOUT.set(layout).is_err() {
            return Err(BleError::Registration(ESP_ERR_INVALID_STATE as i32));
        }

        let name = std::ffi::CString::new(identity.name())
            .map_err(|_| BleError::Registration(ESP_ERR_INVALID_ARG as i32))?;
        let mut service_uuid = identity.service_uuid().to_le_bytes();

        unsafe {
            check(esp_ble_gap_set_device_name(name.as_ptr()), BleError::Registration)?;

            // Name in the advertisement, 128-bit service UUID in the scan
            // response; both do not fit the 31-byte advertising payload.
            let mut adv: esp_ble_adv_data_t = core::mem::zeroed();
            adv.include_name = true;
            adv.min_interval = 0x0006;
            adv.max_interval = 0x0010;
            adv.flag = (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8;
            check(esp_ble_gap_config_adv_data(&mut adv), BleError::Registration)?;

            let mut rsp: esp_ble_adv_data_t = core::mem::zeroed();
            rsp.set_scan_rsp = true;
            rsp.service_uuid_len = service_uuid.len() as u16;
            rsp.p_service_uuid = service_uuid.as_mut_ptr();
            check(esp_ble_gap_config_adv_data(&mut rsp), BleError::Registration)?;

            check(esp_ble_gatts_app_register(0), BleError::Registration)?;
        }
        info!(
            "BLE(espidf): registering service {} as '{}'",
            Uuid128(identity.service_uuid()),
            identity.name()
        );
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), BleError> {
        let mut params = stack::adv_params();
        unsafe {
            check(
                esp_idf_svc::sys::esp_ble_gap_start_advertising(&mut params),
                BleError::Advertising,
            )
        }
    }

    fn encrypt_link(&self) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;

        let mut peer = stack::PEER
            .lock()
            .ok()
            .and_then(|p| *p)
            .ok_or(BleError::NotConnected)?;
        // SAFETY: `peer` is a live local; the stack copies the address.
        unsafe {
            check(
                esp_ble_set_encryption(peer.as_mut_ptr(), esp_ble_sec_act_t_ESP_BLE_SEC_ENCRYPT),
                BleError::Security,
            )
        }
    }

    fn set_value(&self, payload: &[u8]) -> Result<(), BleError> {
        use core::sync::atomic::Ordering;
        if payload.len() > PAYLOAD_LEN {
            return Err(BleError::PayloadTooLong);
        }
        let handle = stack::CHAR_HANDLE.load(Ordering::Acquire);
        if handle == 0 {
            return Err(BleError::NotConnected);
        }
        unsafe {
            check(
                esp_idf_svc::sys::esp_ble_gatts_set_attr_value(
                    handle,
                    payload.len() as u16,
                    payload.as_ptr(),
                ),
                BleError::Registration,
            )
        }
    }

    fn notify(&self, payload: &[u8]) -> Result<(), BleError> {
        use core::sync::atomic::Ordering;
        if !stack::LINK_UP.load(Ordering::Acquire) {
            return Err(BleError::NotConnected);
        }
        if stack::CONGESTED.load(Ordering::Acquire) {
            return Err(BleError::Congested);
        }
        let mut buf = [0u8; PAYLOAD_LEN];
        let out = buf
            .get_mut(..payload.len())
            .ok_or(BleError::PayloadTooLong)?;
        out.copy_from_slice(payload);
        let ret = unsafe {
            esp_idf_svc::sys::esp_ble_gatts_send_indicate(
                stack::GATTS_IF.load(Ordering::Acquire),
                stack::CONN_ID.load(Ordering::Acquire),
                stack::CHAR_HANDLE.load(Ordering::Acquire),
                payload.len() as u16,
                buf.as_mut_ptr(),
                false,
            )
        };
        check(ret, |_| BleError::Congested)
    }

    fn whitelist_size(&self) -> Option<u16> {
        let mut len: u16 = 0;
        let ret = unsafe { esp_idf_svc::sys::esp_ble_gap_get_whitelist_size(&mut len) };
        (ret == esp_idf_svc::sys::ESP_OK as i32).then_some(len)
    }
}

#[cfg(not(target_os = "espidf"))]
impl RadioPort for BluedroidRadio {
    fn apply_security(&self, secret: &PairingSecret) -> Result<(), BleError> {
        self.sim.security_applied.store(true, Ordering::SeqCst);
        info!(
            "BLE(sim): security auth=0x{:02x} keys=0x{:02x}",
            secret.auth_mode.bits(),
            secret.key_distribution.bits()
        );
        Ok(())
    }

    fn register_service(&self, identity: &PeripheralIdentity) -> Result<(), BleError> {
        if self.sim.registered.swap(true, Ordering::SeqCst) {
            return Err(BleError::Registration(-1));
        }
        info!(
            "BLE(sim): service {} as '{}'",
            Uuid128(identity.service_uuid()),
            identity.name()
        );
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), BleError> {
        if !self.sim.registered.load(Ordering::SeqCst) {
            return Err(BleError::Advertising(-1));
        }
        self.sim.advertising.store(true, Ordering::SeqCst);
        self.sim.adverts.fetch_add(1, Ordering::SeqCst);
        debug!("BLE(sim): advertising");
        Ok(())
    }

    fn encrypt_link(&self) -> Result<(), BleError> {
        if !self.sim.link_up.load(Ordering::SeqCst) {
            return Err(BleError::NotConnected);
        }
        self.sim.encryptions.fetch_add(1, Ordering::SeqCst);
        debug!("BLE(sim): link encryption requested");
        Ok(())
    }

    fn set_value(&self, payload: &[u8]) -> Result<(), BleError> {
        let stored =
            heapless::Vec::from_slice(payload).map_err(|()| BleError::PayloadTooLong)?;
        if let Ok(mut v) = self.sim.value.lock() {
            *v = stored;
        }
        Ok(())
    }

    fn notify(&self, payload: &[u8]) -> Result<(), BleError> {
        if !self.sim.link_up.load(Ordering::SeqCst) {
            return Err(BleError::NotConnected);
        }
        if payload.len() > PAYLOAD_LEN {
            return Err(BleError::PayloadTooLong);
        }
        self.sim.notified.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn whitelist_size(&self) -> Option<u16> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
