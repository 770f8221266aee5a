//! Notification emitter.
//!
//! While the link is up, each tick writes the counter into the
//! characteristic, notifies, and then waits out the flow-control floor.
//! The counter lives for the whole process: it does not reset on
//! reconnect and wraps at `u32::MAX`.  Delivery is best-effort; a notify
//! the stack refuses is not retried within the same tick and the counter
//! is only advanced by notifies that went through.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::RadioPort;
use crate::error::BleError;
use crate::fsm::ConnectionStateMachine;
use crate::identity::encode_counter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Link not up; nothing was sent and no time was spent.
    Skipped,
    Sent(u32),
    Failed { value: u32, error: BleError },
}

pub struct NotificationEmitter {
    counter: u32,
    interval_ms: u32,
}

impl NotificationEmitter {
    pub fn new(interval_ms: u32) -> Self {
        Self::starting_at(0, interval_ms)
    }

    pub fn starting_at(counter: u32, interval_ms: u32) -> Self {
        Self {
            counter,
            interval_ms,
        }
    }

    /// Value the next notify will carry.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn tick(
        &mut self,
        state: &ConnectionStateMachine,
        radio: &impl RadioPort,
        delay: &mut impl DelayNs,
    ) -> EmitOutcome {
        if !state.is_connected() {
            return EmitOutcome::Skipped;
        }

        let value = self.counter;
        let payload = encode_counter(value);
        let result = radio.set_value(&payload).and_then(|()| radio.notify(&payload));

        let outcome = match result {
            Ok(()) => {
                self.counter = self.counter.wrapping_add(1);
                debug!("Emitter: notified {}", value);
                EmitOutcome::Sent(value)
            }
            Err(error) => {
                warn!("Emitter: notify of {} failed ({}), moving on", value, error);
                EmitOutcome::Failed { value, error }
            }
        };

        delay.delay_ms(self.interval_ms);
        outcome
    }
}
