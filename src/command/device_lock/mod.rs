//! ### Device lock

pub mod types;

use atat::atat_derive::AtatCmd;

use super::NoResponse;

/// Enter PIN +CPIN
///
/// Reads the SIM lock state. The response body (`+CPIN: <code>`) is decoded
/// with [`types::PinStatusCode::from_response`].
#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN?", NoResponse, timeout_ms = 10000)]
pub struct GetPinStatus;

/// Enter PIN +CPIN
///
/// Enter PIN. If no PIN request is pending, the corresponding error code is returned.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN", NoResponse, timeout_ms = 10000)]
pub struct SetPin<'a> {
    #[at_arg(position = 0, len = 8)]
    pub pin: &'a str,
}
