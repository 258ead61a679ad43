#![cfg_attr(not(test), no_std)]

//! Driver for Ai-Thinker A9/A9G GSM/GPRS modules.
//!
//! Everything runs over one AT command channel: command echo and results,
//! unsolicited result codes and `+CIPRCV` socket payload share the same byte
//! stream and are separated by the [`engine::Engine`]. The [`gsm::Gsm`] and
//! [`gprs::Gprs`] state machines are driven exclusively through it.

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod gprs;
pub mod gsm;
pub mod registration;
pub mod socket;

#[cfg(test)]
mod test_helpers;

/// Connections the module can keep open at once.
pub const MAX_SOCKETS: usize = 8;

pub use clock::{Clock, SystemClock};
pub use config::{Apn, Config};
pub use engine::{Engine, Response};
pub use error::Error;
pub use gprs::{Connected, Gprs};
pub use gsm::{Gsm, SignalStrength};
pub use registration::NetworkStatus;
pub use socket::{Handle, SocketSet};
