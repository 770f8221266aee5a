//! Unified error types for the TAM-110 firmware.
//!
//! One `Copy` enum per subsystem plus a single firmware-wide [`Error`]
//! that every subsystem converts into, so the boot path in `main` can
//! funnel everything through `?`.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible boot-time operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The host BLE stack rejected a request.
    Ble(BleError),
    /// Pairing policy could not be applied.
    Pairing(PairingError),
    /// A connection-state transition was requested from the wrong state.
    Transition(TransitionError),
    /// WiFi association failed.
    Connectivity(ConnectivityError),
    /// Boot mail could not be delivered.
    Mail(MailError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ble(e) => write!(f, "ble: {e}"),
            Self::Pairing(e) => write!(f, "pairing: {e}"),
            Self::Transition(e) => write!(f, "state: {e}"),
            Self::Connectivity(e) => write!(f, "wifi: {e}"),
            Self::Mail(e) => write!(f, "mail: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// BLE stack errors
// ---------------------------------------------------------------------------

/// Failures reported by the host BLE stack through [`RadioPort`](crate::app::ports::RadioPort).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    /// Controller or host stack failed to initialise.
    StackInit(i32),
    /// GATT service or characteristic registration failed.
    Registration(i32),
    /// Advertising could not be (re)started.
    Advertising(i32),
    /// Security parameters were rejected.
    Security(i32),
    /// Notify was refused, usually link-layer congestion.
    Congested,
    /// Notify or value update attempted with no link / handle.
    NotConnected,
    /// Payload exceeds the attribute length.
    PayloadTooLong,
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInit(code) => write!(f, "stack init failed (esp_err={code})"),
            Self::Registration(code) => write!(f, "GATT registration failed (esp_err={code})"),
            Self::Advertising(code) => write!(f, "advertising start failed (esp_err={code})"),
            Self::Security(code) => write!(f, "security params rejected (esp_err={code})"),
            Self::Congested => write!(f, "link congested"),
            Self::NotConnected => write!(f, "no active link"),
            Self::PayloadTooLong => write!(f, "payload exceeds attribute length"),
        }
    }
}

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Self::Ble(e)
    }
}

// ---------------------------------------------------------------------------
// Pairing errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    /// `configure()` was already called once.
    AlreadyConfigured,
    /// Passkey outside the six-digit range.
    PasskeyOutOfRange(u32),
    /// The radio refused the security parameters.
    Radio(BleError),
}

impl fmt::Display for PairingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyConfigured => write!(f, "security already configured"),
            Self::PasskeyOutOfRange(v) => write!(f, "passkey {v} exceeds 999999"),
            Self::Radio(e) => write!(f, "radio: {e}"),
        }
    }
}

impl From<PairingError> for Error {
    fn from(e: PairingError) -> Self {
        Self::Pairing(e)
    }
}

impl From<BleError> for PairingError {
    fn from(e: BleError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Connection state transitions
// ---------------------------------------------------------------------------

/// Rejected transition, carrying the state the machine was actually in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: crate::fsm::ConnectionState,
    pub to: crate::fsm::ConnectionState,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition {:?} -> {:?}", self.from, self.to)
    }
}

impl From<TransitionError> for Error {
    fn from(e: TransitionError) -> Self {
        Self::Transition(e)
    }
}

// ---------------------------------------------------------------------------
// WiFi errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    /// The driver refused to start association.
    ConnectionFailed,
    /// Association did not complete within the attempt budget.
    Timeout { attempts: u32 },
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::Timeout { attempts } => write!(f, "not associated after {attempts} attempts"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Mail errors
// ---------------------------------------------------------------------------

/// Step of the SMTP dialogue at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpStage {
    Greeting,
    Ehlo,
    Auth,
    MailFrom,
    RcptTo,
    Data,
    Body,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailError {
    /// TCP/TLS connection to the relay could not be established.
    Connect,
    /// Transport read/write failed mid-dialogue.
    Io(SmtpStage),
    /// Server replied with an unexpected code.
    Rejected { stage: SmtpStage, code: u16 },
    /// Server reply could not be parsed.
    Malformed(SmtpStage),
    /// A header field contains CR or LF.
    InvalidHeader,
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "could not connect to SMTP relay"),
            Self::Io(stage) => write!(f, "transport error during {stage:?}"),
            Self::Rejected { stage, code } => write!(f, "server rejected {stage:?} with {code}"),
            Self::Malformed(stage) => write!(f, "malformed reply during {stage:?}"),
            Self::InvalidHeader => write!(f, "header contains line break"),
        }
    }
}

impl From<MailError> for Error {
    fn from(e: MailError) -> Self {
        Self::Mail(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_wraps_radio_error() {
        let e: PairingError = BleError::Security(-1).into();
        assert_eq!(e, PairingError::Radio(BleError::Security(-1)));
    }

    #[test]
    fn display_names_subsystem() {
        let e: Error = MailError::Rejected { stage: SmtpStage::Auth, code: 535 }.into();
        assert_eq!(e.to_string(), "mail: server rejected Auth with 535");
        let e: Error = ConnectivityError::Timeout { attempts: 10 }.into();
        assert_eq!(e.to_string(), "wifi: not associated after 10 attempts");
    }
}
