//! Mock radio and delay for integration tests.
//!
//! Records every stack call so tests can assert on the full history
//! without a controller.

use std::sync::Mutex;

use embedded_hal::delay::DelayNs;
use tam110::app::ports::RadioPort;
use tam110::error::BleError;
use tam110::identity::{PeripheralIdentity, decode_counter};
use tam110::pairing::PairingSecret;

// ── Radio call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    ApplySecurity(PairingSecret),
    RegisterService(String),
    StartAdvertising,
    EncryptLink,
    SetValue(Vec<u8>),
    Notify(u32),
    WhitelistSize,
}

// ── MockRadio ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRadio {
    pub calls: Mutex<Vec<RadioCall>>,
    congested: Mutex<bool>,
    whitelist: Mutex<Option<u16>>,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notified(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RadioCall::Notify(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn adverts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RadioCall::StartAdvertising))
            .count()
    }

    pub fn set_congested(&self, congested: bool) {
        *self.congested.lock().unwrap() = congested;
    }

    pub fn set_whitelist(&self, size: Option<u16>) {
        *self.whitelist.lock().unwrap() = size;
    }

    fn record(&self, call: RadioCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RadioPort for MockRadio {
    fn apply_security(&self, secret: &PairingSecret) -> Result<(), BleError> {
        self.record(RadioCall::ApplySecurity(*secret));
        Ok(())
    }

    fn register_service(&self, identity: &PeripheralIdentity) -> Result<(), BleError> {
        self.record(RadioCall::RegisterService(identity.name().to_owned()));
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), BleError> {
        self.record(RadioCall::StartAdvertising);
        Ok(())
    }

    fn encrypt_link(&self) -> Result<(), BleError> {
        self.record(RadioCall::EncryptLink);
        Ok(())
    }

    fn set_value(&self, payload: &[u8]) -> Result<(), BleError> {
        self.record(RadioCall::SetValue(payload.to_vec()));
        Ok(())
    }

    fn notify(&self, payload: &[u8]) -> Result<(), BleError> {
        if *self.congested.lock().unwrap() {
            return Err(BleError::Congested);
        }
        let v = decode_counter(payload).ok_or(BleError::PayloadTooLong)?;
        self.record(RadioCall::Notify(v));
        Ok(())
    }

    fn whitelist_size(&self) -> Option<u16> {
        self.record(RadioCall::WhitelistSize);
        *self.whitelist.lock().unwrap()
    }
}

// ── MockDelay ─────────────────────────────────────────────────

/// Records requested waits instead of sleeping.
#[derive(Default)]
pub struct MockDelay {
    pub waits_ms: Vec<u32>,
}

#[allow(dead_code)]
impl MockDelay {
    pub fn total_ms(&self) -> u32 {
        self.waits_ms.iter().sum()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waits_ms.push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
    }
}
