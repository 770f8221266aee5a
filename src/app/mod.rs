//! Application core: peripheral logic behind port traits.
//!
//! The connection state machine, pairing policy and notification emitter
//! live in their own top-level modules; this layer wires them into the
//! peripheral context and the tick loop, and runs the boot notifier.
//! All interaction with the radio, WiFi, mail and flash goes through the
//! **port traits** in [`ports`], keeping this layer testable on the host.

pub mod boot;
pub mod ports;
pub mod service;
