//! Boot notification: WiFi join followed by exactly one mail, with the
//! BLE side unaffected by either outcome.

use std::cell::RefCell;
use std::io::{Cursor, Read, Write};
use std::rc::Rc;

use tam110::adapters::ble::BluedroidRadio;
use tam110::adapters::smtp::{Connector, SmtpMailer};
use tam110::adapters::wifi::WifiAdapter;
use tam110::app::boot::BootNotifier;
use tam110::app::service::Peripheral;
use tam110::config::SystemConfig;
use tam110::error::{ConnectivityError, MailError, SmtpStage};
use tam110::fsm::ConnectionState;

use crate::mock_radio::MockDelay;

/// Relay that answers from a fixed script and records what the client wrote.
struct ScriptedRelay {
    replies: &'static str,
    sent: Rc<RefCell<Vec<u8>>>,
    connects: u32,
}

impl ScriptedRelay {
    fn new(replies: &'static str) -> Self {
        Self {
            replies,
            sent: Rc::default(),
            connects: 0,
        }
    }

    fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.sent.borrow()).into_owned()
    }
}

struct RelayStream {
    input: Cursor<&'static [u8]>,
    sent: Rc<RefCell<Vec<u8>>>,
}

impl Read for RelayStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for RelayStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.sent.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Connector for ScriptedRelay {
    type Stream = RelayStream;

    fn connect(&mut self, _host: &str, _port: u16) -> Result<RelayStream, MailError> {
        self.connects += 1;
        Ok(RelayStream {
            input: Cursor::new(self.replies.as_bytes()),
            sent: Rc::clone(&self.sent),
        })
    }
}

const HAPPY_RELAY: &str = "220 smtp.example.com ESMTP\r\n\
                           250-smtp.example.com\r\n250 AUTH LOGIN PLAIN\r\n\
                           334 VXNlcm5hbWU6\r\n334 UGFzc3dvcmQ6\r\n235 2.7.0 Accepted\r\n\
                           250 2.1.0 OK\r\n250 2.1.5 OK\r\n\
                           354 Go ahead\r\n250 2.0.0 OK queued\r\n221 Bye\r\n";

fn advertising_peripheral(cfg: &SystemConfig) -> Peripheral<BluedroidRadio> {
    let radio = BluedroidRadio::init().unwrap();
    let p = Peripheral::from_config(&cfg.ble, radio).unwrap();
    p.start().unwrap();
    p
}

#[test]
fn unreachable_wifi_times_out_and_mail_fails_once() {
    let cfg = SystemConfig::default();
    let peripheral = advertising_peripheral(&cfg);
    let mut delay = MockDelay::default();

    let notifier = BootNotifier::new(
        WifiAdapter::new().sim_unreachable(),
        SmtpMailer::new(&cfg.mail),
        &cfg.wifi,
        &cfg.mail,
    );
    let (report, wifi) = notifier.run(&mut delay);

    assert_eq!(report.network, Err(ConnectivityError::Timeout { attempts: 10 }));
    assert_eq!(report.mail, Err(MailError::Connect));
    assert!(!report.delivered());
    assert_eq!(delay.waits_ms, vec![200; 10]);
    assert_eq!(delay.total_ms(), 2_000);
    drop(wifi);

    assert_eq!(peripheral.state().state(), ConnectionState::Advertising);
    assert!(peripheral.radio().sim_is_advertising());
}

#[test]
fn slow_wifi_then_delivery() {
    let cfg = SystemConfig::default();
    let mut relay = ScriptedRelay::new(HAPPY_RELAY);
    let mut delay = MockDelay::default();

    let notifier = BootNotifier::new(
        WifiAdapter::new().with_sim_latency(3),
        SmtpMailer::with_connector(&cfg.mail, &mut relay),
        &cfg.wifi,
        &cfg.mail,
    );
    let (report, _) = notifier.run(&mut delay);

    assert_eq!(report.network, Ok(4));
    assert_eq!(report.mail, Ok(()));
    assert_eq!(delay.waits_ms, vec![200; 3]);
    assert_eq!(relay.connects, 1);

    let transcript = relay.transcript();
    assert!(transcript.starts_with("EHLO "));
    assert!(transcript.contains("AUTH LOGIN\r\n"));
    assert!(transcript.contains(&format!("RCPT TO:<{}>\r\n", cfg.mail.recipient)));
    assert!(transcript.contains("Subject: TAM110-VERIFICATION_CODE\r\n"));
    assert!(transcript.contains("X-Priority: 1\r\n"));
    assert!(transcript.contains("Hello World! - Sent from ESP32 board"));
    assert!(transcript.contains("\r\n.\r\n"));
}

#[test]
fn relay_rejection_is_reported_not_fatal() {
    let cfg = SystemConfig::default();
    let peripheral = advertising_peripheral(&cfg);
    let mut relay = ScriptedRelay::new(
        "220 ready\r\n250 hi\r\n334 VXNlcm5hbWU6\r\n334 UGFzc3dvcmQ6\r\n535 5.7.8 Bad credentials\r\n",
    );

    let notifier = BootNotifier::new(
        WifiAdapter::new(),
        SmtpMailer::with_connector(&cfg.mail, &mut relay),
        &cfg.wifi,
        &cfg.mail,
    );
    let (report, _) = notifier.run(&mut MockDelay::default());

    assert_eq!(report.network, Ok(1));
    assert_eq!(
        report.mail,
        Err(MailError::Rejected {
            stage: SmtpStage::Auth,
            code: 535
        })
    );
    assert_eq!(relay.connects, 1);
    assert_eq!(peripheral.state().state(), ConnectionState::Advertising);
}
