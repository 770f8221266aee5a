//! Pairing policy: fixed-passkey, Secure-Connections-only LE pairing.
//!
//! The device has no keyboard and no yes/no button, so it declares a
//! display-only I/O capability.  The central therefore enters the passkey
//! shown on the device's own log/display.  The passkey itself never goes
//! over the air; SMP derives the link keys from it.
//!
//! Every security callback the stack raises lands here.  None of them
//! touch [`ConnectionState`](crate::fsm::ConnectionState): a failed
//! pairing is followed by an ordinary link-layer disconnect, and that is
//! what retracts the connection state.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::app::ports::RadioPort;
use crate::error::PairingError;

pub const DEFAULT_PASSKEY: u32 = 393_939;
pub const MAX_PASSKEY: u32 = 999_999;

// ───────────────────────────────────────────────────────────────
// Passkey
// ───────────────────────────────────────────────────────────────

/// Six-digit LE passkey (0..=999999).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passkey(u32);

impl Passkey {
    pub fn new(value: u32) -> Result<Self, PairingError> {
        if value > MAX_PASSKEY {
            return Err(PairingError::PasskeyOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for Passkey {
    fn default() -> Self {
        Self(DEFAULT_PASSKEY)
    }
}

impl fmt::Display for Passkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

// ───────────────────────────────────────────────────────────────
// SMP parameters
// ───────────────────────────────────────────────────────────────

/// Authentication requirement sent in the SMP Pairing Request/Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// LE Secure Connections required; legacy pairing is refused.
    SecureConnectionsOnly,
}

impl AuthMode {
    /// AuthReq bits (Core Vol 3 Part H 3.5.1): SC = bit 3.
    pub const fn bits(self) -> u8 {
        match self {
            Self::SecureConnectionsOnly => 0x08,
        }
    }
}

/// SMP I/O capability (Core Vol 3 Part H 2.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IoCapability {
    DisplayOnly = 0x00,
    DisplayYesNo = 0x01,
    KeyboardOnly = 0x02,
    NoInputNoOutput = 0x03,
    KeyboardDisplay = 0x04,
}

/// Keys the peripheral distributes / requests during bonding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDistribution(u8);

impl KeyDistribution {
    pub const ENC_KEY: Self = Self(0x01);
    pub const ID_KEY: Self = Self(0x02);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Immutable security material, fixed at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingSecret {
    pub passkey: Passkey,
    pub auth_mode: AuthMode,
    pub io_capability: IoCapability,
    pub key_distribution: KeyDistribution,
}

impl PairingSecret {
    pub fn new(passkey: Passkey) -> Self {
        Self {
            passkey,
            auth_mode: AuthMode::SecureConnectionsOnly,
            io_capability: IoCapability::DisplayOnly,
            key_distribution: KeyDistribution::ENC_KEY.union(KeyDistribution::ID_KEY),
        }
    }
}

impl Default for PairingSecret {
    fn default() -> Self {
        Self::new(Passkey::default())
    }
}

// ───────────────────────────────────────────────────────────────
// Authentication result
// ───────────────────────────────────────────────────────────────

/// Metadata the stack hands over when SMP finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    /// Stack-specific failure reason, meaningless on success.
    pub fail_reason: u8,
    pub peer: [u8; 6],
}

/// What the policy made of an [`AuthOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReport {
    Bonded { whitelist_len: Option<u16> },
    Failed { reason: u8 },
}

struct PeerAddr<'a>(&'a [u8; 6]);

impl fmt::Display for PeerAddr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Policy
// ───────────────────────────────────────────────────────────────

pub struct PairingPolicy {
    secret: PairingSecret,
    configured: AtomicBool,
}

impl PairingPolicy {
    pub const fn new(secret: PairingSecret) -> Self {
        Self {
            secret,
            configured: AtomicBool::new(false),
        }
    }

    pub fn secret(&self) -> &PairingSecret {
        &self.secret
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    /// Push the security parameters to the stack.  Call once, before
    /// advertising starts.
    pub fn configure(&self, radio: &impl RadioPort) -> Result<(), PairingError> {
        if self
            .configured
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Pairing: configure() called twice, ignoring");
            return Err(PairingError::AlreadyConfigured);
        }
        if let Err(e) = radio.apply_security(&self.secret) {
            self.configured.store(false, Ordering::Release);
            return Err(e.into());
        }
        info!(
            "Pairing: auth={:?} io_cap={:?} key_dist=0x{:02x}",
            self.secret.auth_mode,
            self.secret.io_capability,
            self.secret.key_distribution.bits()
        );
        Ok(())
    }

    pub fn on_passkey_requested(&self) -> u32 {
        info!("Pairing: passkey requested");
        self.secret.passkey.value()
    }

    pub fn on_passkey_notify(&self, passkey: u32) {
        info!("Pairing: peer will be asked for passkey {:06}", passkey);
    }

    /// The peripheral never refuses a security upgrade.
    pub fn on_security_requested(&self) -> bool {
        info!("Pairing: security request accepted");
        true
    }

    /// Fixed acceptance; the passkey exchange is the actual gate.
    pub fn on_confirm_pin(&self, pin: u32) -> bool {
        info!("Pairing: confirming PIN {:06}", pin);
        true
    }

    pub fn on_authentication_complete(
        &self,
        outcome: &AuthOutcome,
        radio: &impl RadioPort,
    ) -> AuthReport {
        if outcome.success {
            let whitelist_len = radio.whitelist_size();
            info!(
                "Pairing: authenticated {} (whitelist size: {:?})",
                PeerAddr(&outcome.peer),
                whitelist_len
            );
            AuthReport::Bonded { whitelist_len }
        } else {
            warn!(
                "Pairing: authentication with {} failed (reason=0x{:02x})",
                PeerAddr(&outcome.peer),
                outcome.fail_reason
            );
            AuthReport::Failed {
                reason: outcome.fail_reason,
            }
        }
    }
}
