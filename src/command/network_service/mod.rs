//! ### Network service
pub mod responses;

use atat::atat_derive::AtatCmd;
use responses::{NetworkRegistrationStatus, SignalQuality};

/// Network registration status +CREG
///
/// Reads the registration state of the MT in the circuit switched domain.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CREG?", NetworkRegistrationStatus)]
pub struct GetNetworkRegistrationStatus;

/// Signal quality +CSQ
///
/// Returns the received signal strength indication <rssi> and the channel
/// bit error rate <ber>.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CSQ", SignalQuality)]
pub struct GetSignalQuality;
