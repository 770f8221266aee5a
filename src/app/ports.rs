//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Host BLE stack ──▶ *Events traits ──▶ Peripheral (domain) ──▶ RadioPort ──▶ Host BLE stack
//! ```
//!
//! The radio stack is a capability the core *invokes* ([`RadioPort`]) and a
//! source of asynchronous callbacks the core *answers*
//! ([`ConnectionEvents`], [`CharacteristicEvents`], [`SecurityEvents`]).
//! The callbacks arrive on the stack's own task, so everything here takes
//! `&self` and the implementors are `Sync`.
//!
//! The boot notifier talks to [`ConnectivityPort`] and [`MailPort`];
//! persisted configuration goes through [`ConfigPort`].

use crate::config::SystemConfig;
use crate::error::{BleError, ConnectivityError, MailError};
use crate::identity::PeripheralIdentity;
use crate::pairing::{AuthOutcome, PairingSecret};

// ───────────────────────────────────────────────────────────────
// Radio port (domain → host stack)
// ───────────────────────────────────────────────────────────────

pub trait RadioPort: Sync {
    /// Push authentication mode, I/O capability and key distribution.
    fn apply_security(&self, secret: &PairingSecret) -> Result<(), BleError>;

    /// Register the GATT service and its characteristic.
    fn register_service(&self, identity: &PeripheralIdentity) -> Result<(), BleError>;

    /// (Re)start undirected connectable advertising.
    fn start_advertising(&self) -> Result<(), BleError>;

    /// Ask the stack to encrypt the current link, starting pairing if the
    /// central holds no bond yet.
    fn encrypt_link(&self) -> Result<(), BleError>;

    /// Replace the characteristic's stored value (served on read).
    fn set_value(&self, payload: &[u8]) -> Result<(), BleError>;

    /// Push the current value to the connected central.
    fn notify(&self, payload: &[u8]) -> Result<(), BleError>;

    /// Number of entries in the controller's accept list, if queryable.
    fn whitelist_size(&self) -> Option<u16>;
}

// ───────────────────────────────────────────────────────────────
// Callback groups (host stack → domain)
// ───────────────────────────────────────────────────────────────

/// Link lifecycle callbacks.
pub trait ConnectionEvents {
    fn on_connect(&self);
    fn on_disconnect(&self);
}

/// Characteristic access callbacks.  `value` is the attribute value as
/// stored by the stack at the time of the access.
pub trait CharacteristicEvents {
    fn on_read(&self, value: &[u8]);
    fn on_write(&self, value: &[u8]);
}

/// SMP callbacks.
pub trait SecurityEvents {
    fn on_passkey_request(&self) -> u32;
    fn on_passkey_notify(&self, passkey: u32);
    fn on_security_request(&self) -> bool;
    fn on_confirm_pin(&self, pin: u32) -> bool;
    fn on_authentication_complete(&self, outcome: &AuthOutcome);
}

/// Everything the host stack dispatches to, as one object.
pub trait StackCallbacks: ConnectionEvents + CharacteristicEvents + SecurityEvents + Sync {}

impl<T> StackCallbacks for T where T: ConnectionEvents + CharacteristicEvents + SecurityEvents + Sync {}

// ───────────────────────────────────────────────────────────────
// Connectivity / mail ports (boot notifier)
// ───────────────────────────────────────────────────────────────

pub trait ConnectivityPort {
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;

    /// Start station association without waiting for it to complete.
    fn begin(&mut self) -> Result<(), ConnectivityError>;

    fn is_connected(&self) -> bool;
}

/// A single outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub sender_name: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub high_priority: bool,
}

pub trait MailPort {
    fn send(&mut self, mail: &OutboundMail) -> Result<(), MailError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting; invalid values are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("storage I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Test doubles shared by unit tests
// ───────────────────────────────────────────────────────────────
