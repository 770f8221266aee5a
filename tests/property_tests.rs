//! Property and fuzz-style tests for the connection lifecycle and the
//! byte-level decoders.
//!
//! Runs on host (x86_64) only: proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use std::io::{Cursor, Read, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use proptest::prelude::*;

use tam110::adapters::nvs::NvsAdapter;
use tam110::adapters::smtp::SmtpSession;
use tam110::app::ports::{ConnectionEvents, OutboundMail, RadioPort};
use tam110::app::service::{Peripheral, TickLoop, TickOutcome};
use tam110::config::{MailConfig, SystemConfig};
use tam110::error::BleError;
use tam110::fsm::ConnectionState;
use tam110::identity::{PeripheralIdentity, decode_counter, encode_counter};
use tam110::pairing::PairingSecret;

// ── Fakes ─────────────────────────────────────────────────────

/// Radio that tracks the link the way the controller would and counts
/// notifications sent while no central was attached.
#[derive(Default)]
struct LinkRadio {
    link_up: AtomicBool,
    congested: AtomicBool,
    adverts: AtomicU32,
    stray_notifies: AtomicU32,
    sent: Mutex<Vec<u32>>,
}

impl RadioPort for LinkRadio {
    fn apply_security(&self, _secret: &PairingSecret) -> Result<(), BleError> {
        Ok(())
    }

    fn register_service(&self, _identity: &PeripheralIdentity) -> Result<(), BleError> {
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), BleError> {
        self.adverts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn encrypt_link(&self) -> Result<(), BleError> {
        Ok(())
    }

    fn set_value(&self, _payload: &[u8]) -> Result<(), BleError> {
        Ok(())
    }

    fn notify(&self, payload: &[u8]) -> Result<(), BleError> {
        if !self.link_up.load(Ordering::SeqCst) {
            self.stray_notifies.fetch_add(1, Ordering::SeqCst);
            return Err(BleError::NotConnected);
        }
        if self.congested.load(Ordering::SeqCst) {
            return Err(BleError::Congested);
        }
        let v = decode_counter(payload).ok_or(BleError::PayloadTooLong)?;
        self.sent.lock().unwrap().push(v);
        Ok(())
    }

    fn whitelist_size(&self) -> Option<u16> {
        None
    }
}

#[derive(Default)]
struct CountingDelay {
    total_ms: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}

// ── Connection lifecycle ──────────────────────────────────────

#[derive(Debug, Clone)]
enum LinkOp {
    Connect,
    Disconnect,
    Congest(bool),
    Tick,
}

fn arb_link_op() -> impl Strategy<Value = LinkOp> {
    prop_oneof![
        2 => Just(LinkOp::Connect),
        2 => Just(LinkOp::Disconnect),
        1 => any::<bool>().prop_map(LinkOp::Congest),
        6 => Just(LinkOp::Tick),
    ]
}

proptest! {
    /// Whatever the central does, notifications only go out on a live link,
    /// the counter advances by exactly one per delivered notification, and
    /// a disconnect always ends with advertising restarted.
    #[test]
    fn lifecycle_invariants_hold(
        start in any::<u32>(),
        ops in proptest::collection::vec(arb_link_op(), 1..64),
    ) {
        let p = Peripheral::from_config(&SystemConfig::default().ble, LinkRadio::default()).unwrap();
        p.start().unwrap();
        let mut lp = TickLoop::new(&p, &SystemConfig::default().ble, CountingDelay::default())
            .with_counter(start);
        let mut expected = start;

        for op in ops {
            match op {
                LinkOp::Connect => {
                    p.radio().link_up.store(true, Ordering::SeqCst);
                    p.on_connect();
                }
                LinkOp::Disconnect => {
                    p.radio().link_up.store(false, Ordering::SeqCst);
                    p.on_disconnect();
                }
                LinkOp::Congest(on) => p.radio().congested.store(on, Ordering::SeqCst),
                LinkOp::Tick => {
                    let before = lp.counter();
                    match lp.tick() {
                        TickOutcome::Notified(v) => {
                            prop_assert_eq!(v, expected);
                            expected = expected.wrapping_add(1);
                            prop_assert_eq!(lp.counter(), expected);
                        }
                        _ => prop_assert_eq!(lp.counter(), before),
                    }
                }
            }
        }

        prop_assert_eq!(p.radio().stray_notifies.load(Ordering::SeqCst), 0);
        let sent = p.radio().sent.lock().unwrap().clone();
        for pair in sent.windows(2) {
            prop_assert_eq!(pair[1], pair[0].wrapping_add(1));
        }

        if p.state().state() == ConnectionState::DisconnectingPendingReadvertise {
            let adverts = p.radio().adverts.load(Ordering::SeqCst);
            prop_assert_eq!(lp.tick(), TickOutcome::Readvertised);
            prop_assert_eq!(p.radio().adverts.load(Ordering::SeqCst), adverts + 1);
            prop_assert_eq!(p.state().state(), ConnectionState::Advertising);
        }
    }

    /// The counter wraps instead of saturating or panicking.
    #[test]
    fn counter_wraps_near_max(offset in 0u32..8, ticks in 1usize..16) {
        let start = u32::MAX - offset;
        let p = Peripheral::from_config(&SystemConfig::default().ble, LinkRadio::default()).unwrap();
        p.start().unwrap();
        p.radio().link_up.store(true, Ordering::SeqCst);
        p.on_connect();

        let mut lp = TickLoop::new(&p, &SystemConfig::default().ble, CountingDelay::default())
            .with_counter(start);
        for _ in 0..ticks {
            lp.tick();
        }
        prop_assert_eq!(lp.counter(), start.wrapping_add(ticks as u32));
    }

    /// Payload is exactly the little-endian counter.
    #[test]
    fn payload_is_little_endian(v in any::<u32>()) {
        let raw = encode_counter(v);
        prop_assert_eq!(raw, v.to_le_bytes());
        prop_assert_eq!(decode_counter(&raw), Some(v));
    }
}

// ── Decoder robustness ────────────────────────────────────────

/// Feeds arbitrary relay output, discards what the client writes.
struct GarbageRelay(Cursor<Vec<u8>>);

impl Read for GarbageRelay {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for GarbageRelay {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

proptest! {
    /// A stored config blob of any shape yields a valid config at boot.
    #[test]
    fn arbitrary_config_blob_never_blocks_boot(
        blob in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.sim_write_raw(&blob);
        let cfg = nvs.load_or_default();
        prop_assert!(cfg.validate().is_ok());
    }

    /// The SMTP client never panics on malformed relay output and only
    /// reports success if the relay acknowledged every step.
    #[test]
    fn smtp_client_survives_garbage(
        replies in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let mail = OutboundMail::from_config(&MailConfig::default());
        let mut session = SmtpSession::new(GarbageRelay(Cursor::new(replies.clone())));
        if session.deliver("user", "pass", &mail).is_ok() {
            let text = String::from_utf8_lossy(&replies);
            prop_assert!(text.contains("354"));
        }
    }
}
