//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter  | Implements         | Connects to                    |
//! |----------|--------------------|--------------------------------|
//! | `ble`    | RadioPort          | Bluedroid GAP/GATTS            |
//! | `delay`  | DelayNs            | FreeRTOS tick delay            |
//! | `nvs`    | ConfigPort         | NVS / in-memory store          |
//! | `smtp`   | MailPort           | ESP-TLS SMTP submission        |
//! | `wifi`   | ConnectivityPort   | ESP-IDF WiFi STA               |

pub mod ble;
pub mod delay;
pub mod nvs;
pub mod smtp;
pub(crate) mod utils;
pub mod wifi;
