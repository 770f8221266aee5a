//! Peripheral service: the hexagonal core.
//!
//! [`Peripheral`] is the process-wide peripheral context: identity,
//! pairing policy, connection state machine and the radio handle.  The
//! host stack dispatches every callback to it, and the tick loop reads
//! from it.  It is built exactly once at boot and lives for the rest of
//! the process.
//!
//! [`TickLoop`] is the single cooperative loop.  It owns the notification
//! emitter (and therefore the counter) and the delay provider.
//!
//! ```text
//!  stack task ──▶ ConnectionEvents / SecurityEvents ──▶ ┌────────────┐
//!                                                       │ Peripheral │ ──▶ RadioPort
//!  tick loop  ──▶ TickLoop::tick ──────────────────────▶ └────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::config::{BleConfig, MIN_SETTLE_DELAY_MS};
use crate::emitter::{EmitOutcome, NotificationEmitter};
use crate::error::{BleError, Error};
use crate::fsm::{ConnectionState, ConnectionStateMachine};
use crate::identity::{PeripheralIdentity, Uuid128, decode_counter};
use crate::pairing::{AuthOutcome, Passkey, PairingPolicy, PairingSecret};

use super::ports::{CharacteristicEvents, ConnectionEvents, RadioPort, SecurityEvents};

// ───────────────────────────────────────────────────────────────
// Peripheral context
// ───────────────────────────────────────────────────────────────

pub struct Peripheral<R: RadioPort> {
    identity: PeripheralIdentity,
    policy: PairingPolicy,
    state: ConnectionStateMachine,
    radio: R,
}

impl<R: RadioPort> Peripheral<R> {
    pub fn new(identity: PeripheralIdentity, secret: PairingSecret, radio: R) -> Self {
        Self {
            identity,
            policy: PairingPolicy::new(secret),
            state: ConnectionStateMachine::new(),
            radio,
        }
    }

    /// Build from the BLE section of the persisted config.
    pub fn from_config(config: &BleConfig, radio: R) -> Result<Self, Error> {
        let identity = PeripheralIdentity::new(&config.device_name)
            .map_err(|_| Error::Config("ble.device_name invalid"))?;
        let passkey = Passkey::new(config.passkey)?;
        Ok(Self::new(identity, PairingSecret::new(passkey), radio))
    }

    /// Boot sequence: security, GATT registration, advertising.
    ///
    /// Ends in `Advertising`.  Security is configured before the first
    /// advertisement so no central can connect under the default policy.
    pub fn start(&self) -> Result<(), Error> {
        self.policy.configure(&self.radio)?;
        self.radio.register_service(&self.identity)?;
        info!(
            "BLE: service {} / characteristic {} registered",
            Uuid128(self.identity.service_uuid()),
            Uuid128(self.identity.characteristic_uuid())
        );
        self.radio.start_advertising()?;
        self.state.advertising_started()?;
        info!("BLE: advertising as '{}'", self.identity.name());
        Ok(())
    }

    pub fn identity(&self) -> &PeripheralIdentity {
        &self.identity
    }

    pub fn policy(&self) -> &PairingPolicy {
        &self.policy
    }

    pub fn state(&self) -> &ConnectionStateMachine {
        &self.state
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }
}

impl<R: RadioPort> ConnectionEvents for Peripheral<R> {
    fn on_connect(&self) {
        self.state.on_connect();
        // Pairing starts as soon as the link is up rather than on the
        // first encrypted attribute access.
        if let Err(e) = self.radio.encrypt_link() {
            warn!("BLE: could not request link encryption ({})", e);
        }
        // Keep an advertising slot armed so another central can still
        // discover the service, where the controller supports it.
        if let Err(e) = self.radio.start_advertising() {
            warn!("BLE: could not re-arm advertising after connect ({})", e);
        }
    }

    fn on_disconnect(&self) {
        self.state.on_disconnect();
    }
}

impl<R: RadioPort> CharacteristicEvents for Peripheral<R> {
    fn on_read(&self, value: &[u8]) {
        if value.is_empty() {
            return;
        }
        match decode_counter(value) {
            Some(v) => info!("GATT: read, value={}", v),
            None => info!("GATT: read, {} bytes", value.len()),
        }
    }

    fn on_write(&self, value: &[u8]) {
        if value.is_empty() {
            return;
        }
        match core::str::from_utf8(value) {
            Ok(text) => info!("GATT: write, value=\"{}\"", text.escape_debug()),
            Err(_) => info!("GATT: write, {} raw bytes {:02x?}", value.len(), value),
        }
    }
}

impl<R: RadioPort> SecurityEvents for Peripheral<R> {
    fn on_passkey_request(&self) -> u32 {
        self.policy.on_passkey_requested()
    }

    fn on_passkey_notify(&self, passkey: u32) {
        self.policy.on_passkey_notify(passkey);
    }

    fn on_security_request(&self) -> bool {
        self.policy.on_security_requested()
    }

    fn on_confirm_pin(&self, pin: u32) -> bool {
        self.policy.on_confirm_pin(pin)
    }

    fn on_authentication_complete(&self, outcome: &AuthOutcome) {
        self.policy.on_authentication_complete(outcome, &self.radio);
    }
}

// ───────────────────────────────────────────────────────────────
// Tick loop
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do; slept for the idle interval.
    Idle,
    Notified(u32),
    NotifyFailed(u32),
    /// Advertising restarted and the state is back to `Advertising`.
    Readvertised,
    /// Advertising restarted but a central connected during the settle delay.
    ReadvertisePreempted,
    /// The stack refused to advertise; retried on the next tick.
    ReadvertiseFailed(BleError),
}

pub struct TickLoop<'a, R: RadioPort, D: DelayNs> {
    peripheral: &'a Peripheral<R>,
    emitter: NotificationEmitter,
    delay: D,
    settle_delay_ms: u32,
    idle_poll_ms: u32,
}

impl<'a, R: RadioPort, D: DelayNs> TickLoop<'a, R, D> {
    pub fn new(peripheral: &'a Peripheral<R>, config: &BleConfig, delay: D) -> Self {
        Self {
            peripheral,
            emitter: NotificationEmitter::new(config.notify_interval_ms),
            delay,
            settle_delay_ms: config.settle_delay_ms.max(MIN_SETTLE_DELAY_MS),
            idle_poll_ms: config.idle_poll_ms.max(1),
        }
    }

    /// Resume counting from `value` instead of zero.
    pub fn with_counter(mut self, value: u32) -> Self {
        self.emitter = NotificationEmitter::starting_at(value, self.emitter.interval_ms());
        self
    }

    pub fn counter(&self) -> u32 {
        self.emitter.counter()
    }

    pub fn settle_delay_ms(&self) -> u32 {
        self.settle_delay_ms
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn tick(&mut self) -> TickOutcome {
        let p = self.peripheral;
        match p.state.state() {
            ConnectionState::Connected => {
                match self.emitter.tick(&p.state, &p.radio, &mut self.delay) {
                    EmitOutcome::Sent(v) => TickOutcome::Notified(v),
                    EmitOutcome::Failed { value, .. } => TickOutcome::NotifyFailed(value),
                    // Link dropped between the two state reads.
                    EmitOutcome::Skipped => TickOutcome::Idle,
                }
            }
            ConnectionState::DisconnectingPendingReadvertise => self.readvertise(),
            ConnectionState::Idle | ConnectionState::Advertising => {
                self.delay.delay_ms(self.idle_poll_ms);
                TickOutcome::Idle
            }
        }
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
        }
    }

    fn readvertise(&mut self) -> TickOutcome {
        self.delay.delay_ms(self.settle_delay_ms);
        let p = self.peripheral;
        if let Err(e) = p.radio.start_advertising() {
            error!("BLE: advertising restart failed ({}), retrying next tick", e);
            return TickOutcome::ReadvertiseFailed(e);
        }
        match p.state.complete_readvertise() {
            Ok(()) => {
                info!("BLE: advertising restarted");
                TickOutcome::Readvertised
            }
            Err(e) => {
                info!("BLE: central reconnected during settle ({})", e);
                TickOutcome::ReadvertisePreempted
            }
        }
    }
}
