//! Connection lifecycle scenarios: connect, stream, disconnect,
//! re-advertise, counter wraparound.

use embedded_hal::delay::DelayNs;
use tam110::app::ports::{ConnectionEvents, SecurityEvents};
use tam110::app::service::{Peripheral, TickLoop, TickOutcome};
use tam110::config::{BleConfig, MIN_SETTLE_DELAY_MS};
use tam110::fsm::ConnectionState;
use tam110::pairing::AuthOutcome;

use crate::mock_radio::{MockDelay, MockRadio, RadioCall};

fn booted() -> Peripheral<MockRadio> {
    let p = Peripheral::from_config(&BleConfig::default(), MockRadio::new()).unwrap();
    p.start().unwrap();
    p
}

fn authenticate(p: &Peripheral<MockRadio>) {
    assert!(p.on_security_request());
    assert_eq!(p.on_passkey_request(), 393_939);
    p.on_authentication_complete(&AuthOutcome {
        success: true,
        fail_reason: 0,
        peer: [0x24, 0x0a, 0xc4, 0x11, 0x22, 0x33],
    });
}

#[test]
fn boot_sequence_orders_security_before_advertising() {
    let p = booted();
    let calls = p.radio().calls();
    assert!(matches!(calls[0], RadioCall::ApplySecurity(_)));
    assert_eq!(
        calls[1],
        RadioCall::RegisterService("TAM-110-50b0bd5c-c67b".into())
    );
    assert_eq!(calls[2], RadioCall::StartAdvertising);
    assert_eq!(p.state().state(), ConnectionState::Advertising);
}

#[test]
fn connect_and_authenticate_then_stream() {
    let p = booted();
    let cfg = BleConfig::default();
    let mut lp = TickLoop::new(&p, &cfg, MockDelay::default());

    p.on_connect();
    authenticate(&p);
    assert_eq!(p.state().state(), ConnectionState::Connected);

    for expected in 0..5 {
        assert_eq!(lp.tick(), TickOutcome::Notified(expected));
    }
    assert_eq!(p.radio().notified(), vec![0, 1, 2, 3, 4]);
    assert!(lp.delay().waits_ms.iter().all(|&w| w >= cfg.notify_interval_ms));
}

#[test]
fn disconnect_mid_stream_readvertises_after_settle() {
    let p = booted();
    let cfg = BleConfig::default();
    let mut lp = TickLoop::new(&p, &cfg, MockDelay::default());

    p.on_connect();
    lp.tick();
    lp.tick();
    let adverts_before = p.radio().adverts();

    p.on_disconnect();
    assert_eq!(p.state().state(), ConnectionState::DisconnectingPendingReadvertise);

    assert_eq!(lp.tick(), TickOutcome::Readvertised);
    assert_eq!(p.state().state(), ConnectionState::Advertising);
    assert_eq!(p.radio().adverts(), adverts_before + 1);
    assert_eq!(lp.delay().waits_ms.last(), Some(&cfg.settle_delay_ms));
    assert!(cfg.settle_delay_ms >= MIN_SETTLE_DELAY_MS);

    for _ in 0..3 {
        assert_eq!(lp.tick(), TickOutcome::Idle);
    }
    assert_eq!(p.radio().notified(), vec![0, 1]);
}

#[test]
fn reconnect_resumes_counter() {
    let p = booted();
    let mut lp = TickLoop::new(&p, &BleConfig::default(), MockDelay::default());

    p.on_connect();
    lp.tick();
    lp.tick();
    p.on_disconnect();
    lp.tick();
    p.on_connect();
    assert_eq!(lp.tick(), TickOutcome::Notified(2));
}

#[test]
fn connect_before_readvertise_tick_keeps_link() {
    let p = booted();
    let mut lp = TickLoop::new(&p, &BleConfig::default(), MockDelay::default());

    p.on_connect();
    p.on_disconnect();
    // Lands before the tick loop gets to finish the re-advertise.
    p.on_connect();
    assert_eq!(lp.tick(), TickOutcome::Notified(0));
    assert_eq!(p.state().state(), ConnectionState::Connected);
}

/// Raises the link from inside the settle wait, like the stack task would.
struct ReconnectingDelay<'a> {
    peripheral: &'a Peripheral<MockRadio>,
    waits_ms: Vec<u32>,
}

impl DelayNs for ReconnectingDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        if self.waits_ms.is_empty() {
            self.peripheral.on_connect();
        }
        self.waits_ms.push(ms);
    }
}

#[test]
fn connect_during_settle_keeps_link() {
    let p = booted();
    let cfg = BleConfig::default();
    p.on_connect();
    p.on_disconnect();

    let delay = ReconnectingDelay {
        peripheral: &p,
        waits_ms: Vec::new(),
    };
    let mut lp = TickLoop::new(&p, &cfg, delay);
    assert_eq!(lp.tick(), TickOutcome::ReadvertisePreempted);
    assert_eq!(p.state().state(), ConnectionState::Connected);
    assert_eq!(lp.delay().waits_ms, vec![cfg.settle_delay_ms]);
    assert_eq!(lp.tick(), TickOutcome::Notified(0));
}

#[test]
fn connect_requests_encryption_before_streaming() {
    let p = booted();
    let mut lp = TickLoop::new(&p, &BleConfig::default(), MockDelay::default());
    p.on_connect();
    lp.tick();

    let calls = p.radio().calls();
    let encrypt = calls.iter().position(|c| *c == RadioCall::EncryptLink);
    let first_notify = calls.iter().position(|c| matches!(c, RadioCall::Notify(_)));
    assert!(encrypt.is_some());
    assert!(encrypt < first_notify);
}

#[test]
fn counter_wraps_at_max() {
    let p = booted();
    let mut lp =
        TickLoop::new(&p, &BleConfig::default(), MockDelay::default()).with_counter(u32::MAX);

    p.on_connect();
    assert_eq!(lp.tick(), TickOutcome::Notified(u32::MAX));
    assert_eq!(lp.counter(), 0);
    assert_eq!(lp.tick(), TickOutcome::Notified(0));
}

#[test]
fn congested_notify_is_not_counted() {
    let p = booted();
    let mut lp = TickLoop::new(&p, &BleConfig::default(), MockDelay::default());

    p.on_connect();
    p.radio().set_congested(true);
    assert_eq!(lp.tick(), TickOutcome::NotifyFailed(0));
    p.radio().set_congested(false);
    assert_eq!(lp.tick(), TickOutcome::Notified(0));
}

#[test]
fn nothing_sent_while_advertising() {
    let p = booted();
    let cfg = BleConfig::default();
    let mut lp = TickLoop::new(&p, &cfg, MockDelay::default());
    for _ in 0..10 {
        assert_eq!(lp.tick(), TickOutcome::Idle);
    }
    assert!(p.radio().notified().is_empty());
    assert_eq!(lp.delay().waits_ms, vec![cfg.idle_poll_ms; 10]);
}
