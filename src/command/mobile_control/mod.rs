//! ### Mobile equipment control and status
pub mod types;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::{ResetMode, TerminationErrorMode};

/// Report mobile termination error +CMEE
///
/// Configures the formatting of the result code `+CME ERROR: <err>` as an
/// indication of an error relating to the functionality of the MT.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMEE", NoResponse)]
pub struct SetReportMobileTerminationError {
    #[at_arg(position = 0)]
    pub n: TerminationErrorMode,
}

/// Module reset +RST
#[derive(Clone, AtatCmd)]
#[at_cmd("+RST", NoResponse, timeout_ms = 1000)]
pub struct Reset {
    #[at_arg(position = 0)]
    pub mode: ResetMode,
}

/// Module switch off +CPOF
#[derive(Clone, AtatCmd)]
#[at_cmd("+CPOF", NoResponse)]
pub struct PowerOff;
