//! ### Packet switched services
pub mod types;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::GPRSAttachedState;

/// GPRS attach or detach +CGATT
///
/// Register (attach) the MT to, or deregister (detach) the MT from the GPRS
/// service.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CGATT", NoResponse, timeout_ms = 10000)]
pub struct SetGPRSAttached {
    #[at_arg(position = 0)]
    pub state: GPRSAttachedState,
}
