//! TAM-110 Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BluedroidRadio   NvsAdapter   WifiAdapter   SmtpMailer        │
//! │  (RadioPort)      (Config)     (Connectivity)(MailPort)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Peripheral (pure logic)                               │    │
//! │  │  ConnectionStateMachine · PairingPolicy · Emitter      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  BootNotifier (once) · TickLoop (forever)                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use tam110::adapters::ble::{self, BluedroidRadio};
use tam110::adapters::delay::SystemDelay;
use tam110::adapters::nvs::NvsAdapter;
use tam110::adapters::smtp::SmtpMailer;
use tam110::adapters::wifi::WifiAdapter;
use tam110::app::boot::{self, BootNotifier};
use tam110::app::service::{Peripheral, TickLoop};
use tam110::config::SystemConfig;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  TAM-110 v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => nvs.load_or_default(),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. BLE peripheral ─────────────────────────────────────
    // The peripheral context lives as long as the process; the stack
    // callbacks hold a 'static reference to it.
    let radio = BluedroidRadio::init().map_err(tam110::error::Error::from)?;
    let peripheral: &'static Peripheral<BluedroidRadio> =
        Box::leak(Box::new(Peripheral::from_config(&config.ble, radio)?));
    if !ble::bind_callbacks(peripheral) {
        anyhow::bail!("BLE stack callbacks already bound");
    }
    peripheral.start()?;
    info!("Waiting for a client connection to notify...");

    // ── 4. One-shot boot mail ─────────────────────────────────
    let mut delay = SystemDelay::new();
    let _wifi = match WifiAdapter::new(peripherals.modem, sysloop, Some(nvs_partition)) {
        Ok(wifi) => {
            let notifier =
                BootNotifier::new(wifi, SmtpMailer::new(&config.mail), &config.wifi, &config.mail);
            let (report, wifi) = notifier.run(&mut delay);
            info!(
                "Boot: network={:?} mail_delivered={}",
                report.network,
                report.delivered()
            );
            Some(wifi)
        }
        Err(e) => {
            let report = boot::notify_without_network(SmtpMailer::new(&config.mail), &config.mail, e);
            info!("Boot: mail_delivered={}", report.delivered());
            None
        }
    };

    // ── 5. Tick loop ──────────────────────────────────────────
    let mut tick_loop = TickLoop::new(peripheral, &config.ble, delay);
    tick_loop.run()
}
