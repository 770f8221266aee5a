//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`] for the boot notifier.  The adapter only
//! starts association; the caller polls [`ConnectivityPort::is_connected`]
//! with its own retry budget.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in STA mode.
//! - **all other targets**: simulated access point with configurable
//!   latency and reachability, for host-side tests.

use log::{info, warn};

use crate::app::ports::ConnectivityPort;
use crate::error::ConnectivityError;

use super::utils::is_printable_ascii;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

/// Empty means an open network; otherwise WPA2 bounds apply.
fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    started: bool,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    /// Simulation: association checks answered `false` before the link comes up.
    #[cfg(not(target_os = "espidf"))]
    sim_latency_polls: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_polls: AtomicU32,
    #[cfg(not(target_os = "espidf"))]
    sim_reachable: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: esp_idf_hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
    ) -> Result<Self, ConnectivityError> {
        let wifi = esp_idf_svc::wifi::EspWifi::new(modem, sysloop, nvs).map_err(|e| {
            warn!("WiFi(espidf): driver init failed ({})", e);
            ConnectivityError::ConnectionFailed
        })?;
        Ok(Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            started: false,
            wifi,
        })
    }

    /// Simulated AP that associates on the first check.
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            started: false,
            sim_latency_polls: 0,
            sim_polls: AtomicU32::new(0),
            sim_reachable: true,
        }
    }

    /// Simulation: the AP answers only after `polls` association checks.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_sim_latency(mut self, polls: u32) -> Self {
        self.sim_latency_polls = polls;
        self
    }

    /// Simulation: the AP never answers.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_unreachable(mut self) -> Self {
        self.sim_reachable = false;
        self
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
            auth_method,
            ..Default::default()
        });
        let failed = |e: esp_idf_svc::sys::EspError| {
            warn!("WiFi(espidf): {}", e);
            ConnectivityError::ConnectionFailed
        };
        self.wifi.set_configuration(&config).map_err(failed)?;
        self.wifi.start().map_err(failed)?;
        self.wifi.connect().map_err(failed)?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self) -> Result<(), ConnectivityError> {
        self.sim_polls.store(0, Ordering::SeqCst);
        info!("WiFi(sim): associating with '{}'", self.ssid);
        Ok(())
    }

    /// Associated and holding an IP lease.
    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        let polls = self.sim_polls.fetch_add(1, Ordering::SeqCst);
        self.sim_reachable && polls >= self.sim_latency_polls
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid
            .push_str(ssid)
            .map_err(|()| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|()| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    fn begin(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.started {
            warn!("WiFi: association already started");
            return Ok(());
        }
        self.platform_begin()?;
        self.started = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.started && self.platform_is_connected()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
