//! Peripheral identity: advertised name, GATT layout, payload codec.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Props                   | Perms           |
//! |----------------|----------------------------------------|-------------------------|-----------------|
//! | Counter        | `beb5483e-36e1-4688-b7f5-ea07361b26a8` | Read+Write+Notify+Ind.  | Encrypted R/W   |
//!
//! The single service is `4fafc201-1fb5-459e-8fcc-c5c9c331914b`.

use core::fmt;

use crate::adapters::utils::is_printable_ascii;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const DEFAULT_DEVICE_NAME: &str = "TAM-110-50b0bd5c-c67b";
pub const SERVICE_UUID: u128 = 0x4fafc201_1fb5_459e_8fcc_c5c9c331914b;
pub const CHARACTERISTIC_UUID: u128 = 0xbeb5483e_36e1_4688_b7f5_ea07361b26a8;

/// Longest name that still fits a legacy advertising packet next to the
/// flags AD structure (31 - 3 flags - 2 name header).
pub const MAX_DEVICE_NAME_LEN: usize = 26;

/// Counter payload size on the wire.
pub const PAYLOAD_LEN: usize = 4;

/// Client Characteristic Configuration descriptor.
pub const CCCD_UUID: u16 = 0x2902;
pub const CCCD_LEN: usize = 2;
/// CCCD value at registration: notifications and indications off until
/// the central subscribes.
pub const CCCD_INITIAL: [u8; CCCD_LEN] = [0, 0];

pub type DeviceName = heapless::String<32>;

// ───────────────────────────────────────────────────────────────
// Characteristic properties (Bluetooth Core Vol 3 Part G 3.3.1.1)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharProperties(u8);

impl CharProperties {
    pub const READ: Self = Self(0x02);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

// ───────────────────────────────────────────────────────────────
// Attribute permissions (ESP-IDF `esp_gatt_perm_t` encoding)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrPermissions(u16);

impl AttrPermissions {
    pub const READ_ENCRYPTED: Self = Self(1 << 1);
    pub const WRITE_ENCRYPTED: Self = Self(1 << 5);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

// ───────────────────────────────────────────────────────────────
// Identity
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    EmptyName,
    NameTooLong,
    NonPrintableName,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "device name is empty"),
            Self::NameTooLong => write!(f, "device name exceeds {MAX_DEVICE_NAME_LEN} bytes"),
            Self::NonPrintableName => write!(f, "device name must be printable ASCII"),
        }
    }
}

/// Immutable description of what the peripheral exposes.
///
/// Built once at boot and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralIdentity {
    name: DeviceName,
    service_uuid: u128,
    characteristic_uuid: u128,
    properties: CharProperties,
    permissions: AttrPermissions,
}

impl PeripheralIdentity {
    pub fn new(name: &str) -> Result<Self, IdentityError> {
        validate_name(name)?;
        let mut n = DeviceName::new();
        n.push_str(name).map_err(|_| IdentityError::NameTooLong)?;
        Ok(Self::with_name(n))
    }

    fn with_name(name: DeviceName) -> Self {
        Self {
            name,
            service_uuid: SERVICE_UUID,
            characteristic_uuid: CHARACTERISTIC_UUID,
            properties: CharProperties::READ
                .union(CharProperties::WRITE)
                .union(CharProperties::NOTIFY)
                .union(CharProperties::INDICATE),
            permissions: AttrPermissions::READ_ENCRYPTED.union(AttrPermissions::WRITE_ENCRYPTED),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn service_uuid(&self) -> u128 {
        self.service_uuid
    }

    pub fn characteristic_uuid(&self) -> u128 {
        self.characteristic_uuid
    }

    pub fn properties(&self) -> CharProperties {
        self.properties
    }

    pub fn permissions(&self) -> AttrPermissions {
        self.permissions
    }
}

impl Default for PeripheralIdentity {
    fn default() -> Self {
        let mut name = DeviceName::new();
        let _ = name.push_str(DEFAULT_DEVICE_NAME);
        Self::with_name(name)
    }
}

pub fn validate_name(name: &str) -> Result<(), IdentityError> {
    if name.is_empty() {
        return Err(IdentityError::EmptyName);
    }
    if name.len() > MAX_DEVICE_NAME_LEN {
        return Err(IdentityError::NameTooLong);
    }
    if !is_printable_ascii(name) {
        return Err(IdentityError::NonPrintableName);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// UUID rendering
// ───────────────────────────────────────────────────────────────

/// Canonical hyphenated form, e.g. `4fafc201-1fb5-459e-8fcc-c5c9c331914b`.
pub struct Uuid128(pub u128);

impl fmt::Display for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff,
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Payload codec
// ───────────────────────────────────────────────────────────────

pub fn encode_counter(value: u32) -> [u8; PAYLOAD_LEN] {
    value.to_le_bytes()
}

pub fn decode_counter(raw: &[u8]) -> Option<u32> {
    let bytes: [u8; PAYLOAD_LEN] = raw.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
