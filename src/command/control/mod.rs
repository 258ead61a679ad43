//! ### V24 control and V25ter
//! These commands, unless specifically stated, do not implement set syntax using "=", read ("?"), or test ("=?").
pub mod types;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::{Echo, ResultCodeFormat};

/// Command echo E
///
/// Controls whether the module echoes characters received from the DTE
/// during command state.
#[derive(Clone, AtatCmd)]
#[at_cmd("E", NoResponse, value_sep = false)]
pub struct SetEcho {
    #[at_arg(position = 0)]
    pub enabled: Echo,
}

/// DCE response format V
///
/// Selects verbose (`OK`, `ERROR`) or numeric result codes. The engine only
/// understands the verbose format.
#[derive(Clone, AtatCmd)]
#[at_cmd("V", NoResponse, value_sep = false)]
pub struct SetResultCodeFormat {
    #[at_arg(position = 0)]
    pub format: ResultCodeFormat,
}

/// UART data rate configuration +IPR
#[derive(Clone, AtatCmd)]
#[at_cmd("+IPR", NoResponse)]
pub struct SetDataRate {
    #[at_arg(position = 0)]
    pub rate: u32,
}

/// Restore factory configuration and store it &F Z &W
#[derive(Clone, AtatCmd)]
#[at_cmd("&FZ&W", NoResponse, timeout_ms = 1000)]
pub struct FactoryReset;
