//! Unsolicited responses for TCP/IP Commands

/// Marker announcing a socket payload chunk:
/// `+CIPRCV,<mux>,<length>:<length raw bytes>\r\n`
pub const SOCKET_DATA: &[u8] = b"+CIPRCV,";

/// Longest `<mux>,<length>` header accepted before the `:` separator.
pub const SOCKET_DATA_HEADER_LEN: usize = 12;

/// Header of a `+CIPRCV` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketDataHeader {
    pub mux: u8,
    pub length: usize,
}

impl SocketDataHeader {
    /// Parse the `<mux>,<length>` part between the marker and the `:`.
    pub fn parse(header: &[u8]) -> Option<Self> {
        let header = core::str::from_utf8(header).ok()?;
        let (mux, length) = header.split_once(',')?;
        Some(Self {
            mux: mux.trim().parse().ok()?,
            length: length.trim().parse().ok()?,
        })
    }
}
