//! ### TCP/IP commands
//!
//! The module keeps up to [`crate::MAX_SOCKETS`] connections open at once,
//! each identified by a small integer `mux`. Received payload is pushed by the
//! module as a `+CIPRCV` URC, see [`urc`].
pub mod types;
pub mod urc;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::{MultiplexMode, SendPromptMode};

/// Start up multi-IP connection +CIPMUX
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPMUX", NoResponse)]
pub struct SetMultipleConnections {
    #[at_arg(position = 0)]
    pub mode: MultiplexMode,
}

/// Start task and set APN, user name, password +CSTT
#[derive(Clone, AtatCmd)]
#[at_cmd("+CSTT", NoResponse, timeout_ms = 10000)]
pub struct SetApn<'a> {
    #[at_arg(position = 0, len = 64)]
    pub apn: &'a str,
    #[at_arg(position = 1, len = 32)]
    pub username: &'a str,
    #[at_arg(position = 2, len = 32)]
    pub password: &'a str,
}

/// Bring up wireless connection +CIICR
///
/// Activates the PDP context configured through [`SetApn`].
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIICR", NoResponse, timeout_ms = 85000)]
pub struct BringUpWirelessConnection;

/// Deactivate GPRS PDP context +CIPSHUT
///
/// Closes every open connection and deactivates the PDP context.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSHUT", NoResponse, timeout_ms = 65000)]
pub struct ShutConnections;

/// Get local IP address +CIFSR
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIFSR?", NoResponse)]
pub struct GetLocalIpAddress;

/// Start up TCP or UDP connection +CIPSTART
///
/// The response body carries the assigned connection number (`+CIPNUM:<n>`)
/// followed by `CONNECT OK`, `CONNECT FAIL` or `CONNECT ALREADY`.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSTART", NoResponse, timeout_ms = 75000)]
pub struct StartConnection<'a> {
    #[at_arg(position = 0, len = 3)]
    pub protocol: &'a str,
    #[at_arg(position = 1, len = 128)]
    pub host: &'a str,
    #[at_arg(position = 2)]
    pub port: u16,
}

/// Close TCP or UDP connection +CIPCLOSE
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPCLOSE", NoResponse)]
pub struct CloseConnection {
    #[at_arg(position = 0)]
    pub mux: u8,
}

/// Send data through TCP or UDP connection +CIPSEND
///
/// The command line is followed by exactly `length` raw bytes and a
/// terminating [`crate::command::CTRL_Z`].
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSEND", NoResponse, timeout_ms = 60000)]
pub struct SendData {
    #[at_arg(position = 0)]
    pub mux: u8,
    #[at_arg(position = 1)]
    pub length: usize,
}

/// Set prompt of '>' when module sends data +CIPSPRT
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSPRT", NoResponse)]
pub struct SetSendPrompt {
    #[at_arg(position = 0)]
    pub mode: SendPromptMode,
}
