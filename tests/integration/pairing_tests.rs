//! Pairing policy as seen through the stack callbacks.

use tam110::app::ports::SecurityEvents;
use tam110::app::service::Peripheral;
use tam110::config::BleConfig;
use tam110::error::{Error, PairingError};
use tam110::fsm::ConnectionState;
use tam110::pairing::{AuthOutcome, AuthReport, IoCapability};

use crate::mock_radio::{MockRadio, RadioCall};

fn booted() -> Peripheral<MockRadio> {
    let p = Peripheral::from_config(&BleConfig::default(), MockRadio::new()).unwrap();
    p.start().unwrap();
    p
}

#[test]
fn callbacks_are_deterministic_across_calls() {
    let p = booted();
    for pin in [0, 123_456, 999_999] {
        assert!(p.on_security_request());
        assert!(p.on_confirm_pin(pin));
        assert_eq!(p.on_passkey_request(), 393_939);
    }
}

#[test]
fn custom_passkey_is_returned() {
    let cfg = BleConfig {
        passkey: 42,
        ..BleConfig::default()
    };
    let p = Peripheral::from_config(&cfg, MockRadio::new()).unwrap();
    assert_eq!(p.on_passkey_request(), 42);
    assert_eq!(p.policy().secret().passkey.to_string(), "000042");
}

#[test]
fn out_of_range_passkey_rejected() {
    let cfg = BleConfig {
        passkey: 1_000_000,
        ..BleConfig::default()
    };
    assert!(matches!(
        Peripheral::from_config(&cfg, MockRadio::new()),
        Err(Error::Pairing(PairingError::PasskeyOutOfRange(1_000_000)))
    ));
}

#[test]
fn security_is_applied_once() {
    let p = booted();
    assert_eq!(
        p.policy().configure(p.radio()),
        Err(PairingError::AlreadyConfigured)
    );
    let applied = p
        .radio()
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RadioCall::ApplySecurity(_)))
        .count();
    assert_eq!(applied, 1);
}

#[test]
fn secret_is_sc_only_display_only() {
    let p = booted();
    let RadioCall::ApplySecurity(secret) = p.radio().calls()[0] else {
        panic!("first call must apply security");
    };
    assert_eq!(secret.io_capability, IoCapability::DisplayOnly);
    assert_eq!(secret.auth_mode.bits(), 0x08);
    assert_eq!(secret.key_distribution.bits(), 0x03);
}

#[test]
fn auth_result_leaves_state_alone() {
    let p = booted();
    p.radio().set_whitelist(Some(1));
    let report = p.policy().on_authentication_complete(
        &AuthOutcome {
            success: true,
            fail_reason: 0,
            peer: [1, 2, 3, 4, 5, 6],
        },
        p.radio(),
    );
    assert_eq!(
        report,
        AuthReport::Bonded {
            whitelist_len: Some(1)
        }
    );
    assert_eq!(p.state().state(), ConnectionState::Advertising);

    let report = p.policy().on_authentication_complete(
        &AuthOutcome {
            success: false,
            fail_reason: 0x63,
            peer: [1, 2, 3, 4, 5, 6],
        },
        p.radio(),
    );
    assert_eq!(report, AuthReport::Failed { reason: 0x63 });
    assert_eq!(p.state().state(), ConnectionState::Advertising);
}
