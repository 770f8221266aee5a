//! Peripheral connection state machine.
//!
//! ```text
//!            boot                on_connect               on_disconnect
//!   Idle ──────────▶ Advertising ──────────▶ Connected ──────────────▶ DisconnectingPendingReadvertise
//!                        ▲                                                        │
//!                        └───────────── settle delay + restart advertising ───────┘
//! ```
//!
//! The state lives in a single `AtomicU8` because it is written from two
//! execution contexts: the host stack's callback task (connect/disconnect)
//! and the tick loop (re-advertise completion).  The tick loop only ever
//! moves `DisconnectingPendingReadvertise → Advertising`, and it does so
//! with a compare-and-swap, so a connect that lands during the settle
//! delay is never overwritten.
//!
//! Only a single link is tracked: `Connected` means "at least one central
//! is connected".

use core::sync::atomic::{AtomicU8, Ordering};

use log::{debug, info, warn};

use crate::error::TransitionError;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Advertising = 1,
    Connected = 2,
    /// A central dropped; advertising must be restarted after the settle delay.
    DisconnectingPendingReadvertise = 3,
}

impl ConnectionState {
    /// Convert a raw cell value back to `ConnectionState`.  The cell is only
    /// ever written with valid discriminants, so the fallback is unreachable
    /// in practice.
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Advertising,
            2 => Self::Connected,
            3 => Self::DisconnectingPendingReadvertise,
            _ => {
                debug_assert!(false, "invalid connection state: {raw}");
                Self::Idle
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Advertising => "Advertising",
            Self::Connected => "Connected",
            Self::DisconnectingPendingReadvertise => "DisconnectingPendingReadvertise",
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub struct ConnectionStateMachine {
    state: AtomicU8,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle as u8),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn readvertise_owed(&self) -> bool {
        self.state() == ConnectionState::DisconnectingPendingReadvertise
    }

    /// Boot-time transition once the service is registered and advertising
    /// has been started.
    pub fn advertising_started(&self) -> Result<(), TransitionError> {
        self.swap_from(ConnectionState::Idle, ConnectionState::Advertising)
    }

    /// Stack connect callback.  Last event wins: whatever the previous state
    /// was, the machine is now `Connected`.  Returns the previous state.
    pub fn on_connect(&self) -> ConnectionState {
        let prev = ConnectionState::from_raw(
            self.state
                .swap(ConnectionState::Connected as u8, Ordering::AcqRel),
        );
        match prev {
            ConnectionState::Idle => warn!("FSM: connect while Idle (advertising never started)"),
            ConnectionState::Connected => debug!("FSM: additional connect while Connected"),
            _ => {}
        }
        info!("FSM transition: {} -> Connected", prev.name());
        prev
    }

    /// Stack disconnect callback.  Records that a re-advertise is owed.
    /// Returns the previous state.
    pub fn on_disconnect(&self) -> ConnectionState {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let prev = ConnectionState::from_raw(current);
            match prev {
                ConnectionState::Idle => {
                    warn!("FSM: disconnect while Idle, ignored");
                    return prev;
                }
                ConnectionState::DisconnectingPendingReadvertise => return prev,
                ConnectionState::Advertising | ConnectionState::Connected => {}
            }
            match self.state.compare_exchange_weak(
                current,
                ConnectionState::DisconnectingPendingReadvertise as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    info!(
                        "FSM transition: {} -> DisconnectingPendingReadvertise",
                        prev.name()
                    );
                    return prev;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Tick-loop side of the cycle, called after advertising was restarted.
    ///
    /// Fails (leaving the state untouched) if a connect arrived in the
    /// meantime.
    pub fn complete_readvertise(&self) -> Result<(), TransitionError> {
        self.swap_from(
            ConnectionState::DisconnectingPendingReadvertise,
            ConnectionState::Advertising,
        )
    }

    fn swap_from(&self, from: ConnectionState, to: ConnectionState) -> Result<(), TransitionError> {
        match self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!("FSM transition: {} -> {}", from.name(), to.name());
                Ok(())
            }
            Err(actual) => Err(TransitionError {
                from: ConnectionState::from_raw(actual),
                to,
            }),
        }
    }
}
