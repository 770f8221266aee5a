//! System configuration parameters
//!
//! All tunable parameters for the TAM-110 peripheral.
//! Values are loaded from NVS at boot; defaults apply on first boot.

use serde::{Deserialize, Serialize};

use crate::adapters::utils::has_line_break;
use crate::app::ports::ConfigError;
use crate::identity::{self, DEFAULT_DEVICE_NAME};
use crate::pairing::{DEFAULT_PASSKEY, MAX_PASSKEY};

/// Lowest notify spacing that survived a six-hour soak without the stack
/// reporting congestion.
pub const MIN_NOTIFY_INTERVAL_MS: u32 = 3;
/// Lowest settle delay accepted before restarting advertising.
pub const MIN_SETTLE_DELAY_MS: u32 = 100;

/// Core system configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub ble: BleConfig,
    pub wifi: WifiConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleConfig {
    /// Advertised local name
    pub device_name: heapless::String<32>,
    /// Fixed six-digit pairing passkey
    pub passkey: u32,
    /// Flow-control floor between notifications (milliseconds)
    pub notify_interval_ms: u32,
    /// Grace period after a disconnect before advertising restarts (milliseconds)
    pub settle_delay_ms: u32,
    /// Sleep when there is nothing to send (milliseconds)
    pub idle_poll_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    /// Association checks before giving up
    pub connect_attempts: u32,
    /// Delay between association checks (milliseconds)
    pub attempt_interval_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: heapless::String<64>,
    /// Implicit-TLS submission port
    pub smtp_port: u16,
    pub account: heapless::String<64>,
    pub password: heapless::String<64>,
    pub sender_name: heapless::String<32>,
    pub recipient: heapless::String<64>,
    pub subject: heapless::String<64>,
    pub body: heapless::String<128>,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            device_name: bounded(DEFAULT_DEVICE_NAME),
            passkey: DEFAULT_PASSKEY,
            notify_interval_ms: 10,
            settle_delay_ms: 500,
            idle_poll_ms: 20,
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: bounded(option_env!("TAM110_WIFI_SSID").unwrap_or("tam110")),
            password: bounded(option_env!("TAM110_WIFI_PASSWORD").unwrap_or("12345678")),
            connect_attempts: 10,
            attempt_interval_ms: 200,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: bounded("smtp.gmail.com"),
            smtp_port: 465,
            account: bounded(option_env!("TAM110_SMTP_ACCOUNT").unwrap_or("tam110@example.com")),
            password: bounded(option_env!("TAM110_SMTP_PASSWORD").unwrap_or("")),
            sender_name: bounded("ESP32"),
            recipient: bounded(option_env!("TAM110_MAIL_TO").unwrap_or("verify@example.com")),
            subject: bounded("TAM110-VERIFICATION_CODE"),
            body: bounded("Hello World! - Sent from ESP32 board"),
        }
    }
}

/// Truncating constructor for compile-time defaults.
fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl SystemConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if identity::validate_name(&self.ble.device_name).is_err() {
            return Err(ConfigError::ValidationFailed(
                "ble.device_name must be 1-26 printable ASCII bytes",
            ));
        }
        if self.ble.passkey > MAX_PASSKEY {
            return Err(ConfigError::ValidationFailed("ble.passkey must be 0-999999"));
        }
        if !(MIN_NOTIFY_INTERVAL_MS..=1000).contains(&self.ble.notify_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "ble.notify_interval_ms must be 3-1000",
            ));
        }
        if !(MIN_SETTLE_DELAY_MS..=5000).contains(&self.ble.settle_delay_ms) {
            return Err(ConfigError::ValidationFailed(
                "ble.settle_delay_ms must be 100-5000",
            ));
        }
        if !(1..=1000).contains(&self.ble.idle_poll_ms) {
            return Err(ConfigError::ValidationFailed("ble.idle_poll_ms must be 1-1000"));
        }
        if !(1..=100).contains(&self.wifi.connect_attempts) {
            return Err(ConfigError::ValidationFailed(
                "wifi.connect_attempts must be 1-100",
            ));
        }
        if !(10..=10_000).contains(&self.wifi.attempt_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "wifi.attempt_interval_ms must be 10-10000",
            ));
        }
        if self.mail.smtp_host.is_empty() || self.mail.smtp_port == 0 {
            return Err(ConfigError::ValidationFailed("mail.smtp_host/port must be set"));
        }
        let headers = [
            self.mail.account.as_str(),
            self.mail.sender_name.as_str(),
            self.mail.recipient.as_str(),
            self.mail.subject.as_str(),
        ];
        if headers.iter().any(|h| has_line_break(h)) {
            return Err(ConfigError::ValidationFailed(
                "mail header fields must not contain line breaks",
            ));
        }
        Ok(())
    }
}
