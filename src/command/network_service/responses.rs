//! Responses for Network service Commands
use atat::atat_derive::AtatResp;

/// Network registration status +CREG
#[derive(Debug, Clone, PartialEq, AtatResp)]
pub struct NetworkRegistrationStatus {
    /// Unsolicited result code mode
    #[at_arg(position = 0)]
    pub n: u8,
    /// 3GPP registration status, see [`crate::registration::Status`]
    #[at_arg(position = 1)]
    pub stat: u8,
}

/// Signal quality +CSQ
#[derive(Debug, Clone, PartialEq, AtatResp)]
pub struct SignalQuality {
    /// 0..=31, or 99 when not known or not detectable
    #[at_arg(position = 0)]
    pub rssi: u8,
    #[at_arg(position = 1)]
    pub ber: u8,
}

impl SignalQuality {
    pub const RSSI_UNKNOWN: u8 = 99;

    /// Received signal strength in dBm, `None` when not detectable.
    pub fn dbm(&self) -> Option<i16> {
        (self.rssi != Self::RSSI_UNKNOWN).then(|| 2 * i16::from(self.rssi) - 113)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::network_service::{GetNetworkRegistrationStatus, GetSignalQuality};
    use atat::AtatCmd;

    #[test]
    fn parse_registration_status() {
        let status = GetNetworkRegistrationStatus
            .parse(Ok(&b"+CREG: 0,5"[..]))
            .unwrap();
        assert_eq!(status, NetworkRegistrationStatus { n: 0, stat: 5 });
    }

    #[test]
    fn parse_signal_quality() {
        let quality = GetSignalQuality.parse(Ok(&b"+CSQ: 20,0"[..])).unwrap();
        assert_eq!(quality, SignalQuality { rssi: 20, ber: 0 });
        assert_eq!(quality.dbm(), Some(-73));

        let unknown = SignalQuality { rssi: 99, ber: 99 };
        assert_eq!(unknown.dbm(), None);
    }
}
