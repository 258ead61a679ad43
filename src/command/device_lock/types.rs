//! Argument and parameter types used by Device lock Commands and Responses

/// SIM lock state reported by `+CPIN?`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinStatusCode {
    /// MT is not pending for any password
    Ready,
    /// MT is waiting SIM PIN to be given
    SimPin,
    /// MT is waiting SIM PUK to be given
    SimPuk,
    /// MT is waiting SIM PIN2 to be given
    SimPin2,
    /// MT is waiting SIM PUK2 to be given
    SimPuk2,
    /// MT is waiting phone-to-SIM card password to be given
    PhSimPin,
    /// Any other lock state
    Other,
}

impl PinStatusCode {
    /// Decode the body of a `+CPIN?` response, e.g. `+CPIN: SIM PIN`.
    pub fn from_response(body: &[u8]) -> Option<Self> {
        let body = core::str::from_utf8(body).ok()?.trim();
        let code = body
            .strip_prefix("+CPIN:")
            .map(str::trim)
            .unwrap_or(body)
            .lines()
            .next()?
            .trim();

        Some(match code {
            "" => return None,
            "READY" => Self::Ready,
            "SIM PIN" => Self::SimPin,
            "SIM PUK" => Self::SimPuk,
            "SIM PIN2" => Self::SimPin2,
            "SIM PUK2" => Self::SimPuk2,
            "PH-SIM PIN" => Self::PhSimPin,
            _ => Self::Other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pin_status() {
        assert_eq!(
            PinStatusCode::from_response(b"+CPIN: READY"),
            Some(PinStatusCode::Ready)
        );
        assert_eq!(
            PinStatusCode::from_response(b"+CPIN:SIM PIN"),
            Some(PinStatusCode::SimPin)
        );
        assert_eq!(
            PinStatusCode::from_response(b"+CPIN: SIM PUK\r\n"),
            Some(PinStatusCode::SimPuk)
        );
        assert_eq!(
            PinStatusCode::from_response(b"+CPIN: NOT INSERTED"),
            Some(PinStatusCode::Other)
        );
        assert_eq!(PinStatusCode::from_response(b""), None);
    }
}
