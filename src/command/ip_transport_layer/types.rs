//! Argument and parameter types used by TCP/IP Commands and Responses
use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
pub enum MultiplexMode {
    /// 0: Single IP connection
    Single = 0,
    /// 1: Multi IP connection
    Multiple = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
pub enum SendPromptMode {
    /// 0: No prompt, "SEND OK" is still reported
    NoPrompt = 0,
    /// 1 (default): Echo '>' and "SEND OK"
    Prompt = 1,
}

/// Outcome reported in the body of a `+CIPSTART` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionResult {
    /// `CONNECT OK`, with the connection number assigned by the module
    Ok(u8),
    /// `CONNECT FAIL`
    Fail,
    /// `CONNECT ALREADY`
    Already,
}

impl ConnectionResult {
    const CONNECT_OK: &'static str = "CONNECT OK";
    const CONNECT_FAIL: &'static str = "CONNECT FAIL";
    const CONNECT_ALREADY: &'static str = "CONNECT ALREADY";
    const CIPNUM: &'static str = "+CIPNUM:";

    /// Classify a `+CIPSTART` response body.
    ///
    /// The connection number is taken from `+CIPNUM:<n>` when present,
    /// otherwise from the first decimal number in the body, defaulting to 0.
    pub fn from_response(body: &[u8]) -> Option<Self> {
        let body = core::str::from_utf8(body).ok()?;

        if body.contains(Self::CONNECT_OK) {
            let digits = body
                .find(Self::CIPNUM)
                .map(|idx| &body[idx + Self::CIPNUM.len()..])
                .unwrap_or(body);
            Some(Self::Ok(leading_number(digits).unwrap_or(0)))
        } else if body.contains(Self::CONNECT_FAIL) {
            Some(Self::Fail)
        } else if body.contains(Self::CONNECT_ALREADY) {
            Some(Self::Already)
        } else {
            None
        }
    }
}

/// First run of decimal digits in `s`.
fn leading_number(s: &str) -> Option<u8> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_ok_with_cipnum() {
        assert_eq!(
            ConnectionResult::from_response(b"+CIPNUM:2\r\n\r\nCONNECT OK"),
            Some(ConnectionResult::Ok(2))
        );
    }

    #[test]
    fn connect_ok_without_cipnum() {
        assert_eq!(
            ConnectionResult::from_response(b"1, CONNECT OK"),
            Some(ConnectionResult::Ok(1))
        );
        assert_eq!(
            ConnectionResult::from_response(b"CONNECT OK"),
            Some(ConnectionResult::Ok(0))
        );
    }

    #[test]
    fn connect_fail_and_already() {
        assert_eq!(
            ConnectionResult::from_response(b"CONNECT FAIL"),
            Some(ConnectionResult::Fail)
        );
        assert_eq!(
            ConnectionResult::from_response(b"+CIPNUM:0\r\nCONNECT ALREADY"),
            Some(ConnectionResult::Already)
        );
        assert_eq!(ConnectionResult::from_response(b"STATE: IP INITIAL"), None);
    }
}
