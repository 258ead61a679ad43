//! ### Short Messages Service
pub mod types;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::MessageFormat;

/// Preferred message format +CMGF
///
/// Sets the input and output format of the short messages.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGF", NoResponse)]
pub struct SetMessageFormat {
    #[at_arg(position = 0)]
    pub format: MessageFormat,
}
