//! One-shot boot notification.
//!
//! After the peripheral is advertising, the device joins WiFi (bounded
//! retry) and sends a single verification mail.  Nothing here is fatal:
//! every outcome is logged and reported, and the BLE side keeps running
//! whatever happens.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::{MailConfig, WifiConfig};
use crate::error::{ConnectivityError, MailError};

use super::ports::{ConnectivityPort, MailPort, OutboundMail};

/// Poll association up to `attempts` times, `interval_ms` apart.
///
/// Returns the 1-based attempt on which the link was up.
pub fn wait_for_network(
    wifi: &impl ConnectivityPort,
    attempts: u32,
    interval_ms: u32,
    delay: &mut impl DelayNs,
) -> Result<u32, ConnectivityError> {
    for attempt in 1..=attempts {
        if wifi.is_connected() {
            return Ok(attempt);
        }
        delay.delay_ms(interval_ms);
    }
    Err(ConnectivityError::Timeout { attempts })
}

impl OutboundMail {
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            sender_name: config.sender_name.as_str().into(),
            sender: config.account.as_str().into(),
            recipient: config.recipient.as_str().into(),
            subject: config.subject.as_str().into(),
            body: config.body.as_str().into(),
            high_priority: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootReport {
    /// Attempt on which WiFi came up, or why it did not.
    pub network: Result<u32, ConnectivityError>,
    pub mail: Result<(), MailError>,
}

impl BootReport {
    pub fn delivered(&self) -> bool {
        self.mail.is_ok()
    }
}

/// Send the boot mail when no WiFi driver could be brought up at all.
///
/// `cause` is recorded as the network outcome; the send still happens once.
pub fn notify_without_network(
    mut mailer: impl MailPort,
    mail_config: &MailConfig,
    cause: ConnectivityError,
) -> BootReport {
    warn!("Boot: no network driver ({}), sending anyway", cause);
    let mail = OutboundMail::from_config(mail_config);
    let result = mailer.send(&mail);
    if let Err(e) = result {
        warn!("Boot: verification mail failed ({})", e);
    }
    BootReport {
        network: Err(cause),
        mail: result,
    }
}

pub struct BootNotifier<W: ConnectivityPort, M: MailPort> {
    wifi: W,
    mailer: M,
    wifi_config: WifiConfig,
    mail: OutboundMail,
}

impl<W: ConnectivityPort, M: MailPort> BootNotifier<W, M> {
    pub fn new(wifi: W, mailer: M, wifi_config: &WifiConfig, mail_config: &MailConfig) -> Self {
        Self {
            wifi,
            mailer,
            wifi_config: wifi_config.clone(),
            mail: OutboundMail::from_config(mail_config),
        }
    }

    /// Join the network and send the mail.  Consumes the notifier: the
    /// mail goes out at most once per boot.
    ///
    /// The send is attempted even when association timed out, matching
    /// the "whichever comes first" contract; the mailer then fails fast.
    pub fn run(mut self, delay: &mut impl DelayNs) -> (BootReport, W) {
        let network = self.join(delay);
        match network {
            Ok(attempt) => info!("Boot: WiFi up after {} check(s)", attempt),
            Err(e) => warn!("Boot: WiFi not available ({}), sending anyway", e),
        }

        let mail = self.mailer.send(&self.mail);
        match mail {
            Ok(()) => info!("Boot: verification mail sent to <{}>", self.mail.recipient),
            Err(e) => warn!("Boot: verification mail failed ({})", e),
        }

        (BootReport { network, mail }, self.wifi)
    }

    fn join(&mut self, delay: &mut impl DelayNs) -> Result<u32, ConnectivityError> {
        self.wifi
            .set_credentials(&self.wifi_config.ssid, &self.wifi_config.password)?;
        self.wifi.begin()?;
        wait_for_network(
            &self.wifi,
            self.wifi_config.connect_attempts,
            self.wifi_config.attempt_interval_ms,
            delay,
        )
    }
}
