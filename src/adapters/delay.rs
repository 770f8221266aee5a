//! Blocking delay adapter.
//!
//! - **`target_os = "espidf"`**: `esp_idf_hal::delay::FreeRtos`, which
//!   yields to other tasks (the Bluedroid task included) while waiting.
//! - **`not(target_os = "espidf")`**: `std::thread::sleep` for host-side
//!   simulation.

use embedded_hal::delay::DelayNs;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDelay;

impl SystemDelay {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::FreeRtos::delay_us(ns.div_ceil(1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

#[cfg(not(target_os = "espidf"))]
impl DelayNs for SystemDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
