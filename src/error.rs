/// Error classes reported by the modem itself in a final result line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// Plain `ERROR`
    Error,
    /// `+CME ERROR: <n>`
    Cme(u16),
    /// `+CMS ERROR: <n>`
    Cms(u16),
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    // Engine errors
    /// No final result was classified before the deadline.
    Timeout,
    /// A command is already outstanding.
    Busy,
    /// A socket chunk was announced but never completed in time.
    ProtocolDesync,
    Overflow,
    Io(embedded_io::ErrorKind),

    // Errors reported by the modem
    Device(DeviceError),
    InvalidResponse,

    // Socket errors
    SocketSetFull,
    InvalidSocket,
    DuplicateSocket,
    ConnectFailed,

    // Attach errors
    BaudDetection,
    SimLocked,
    SimPinRequired,
    RegistrationDenied,
    StateTimeout,

    Atat(atat::Error),
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Timeout => defmt::write!(f, "Timeout"),
            Self::Busy => defmt::write!(f, "Busy"),
            Self::ProtocolDesync => defmt::write!(f, "ProtocolDesync"),
            Self::Overflow => defmt::write!(f, "Overflow"),
            Self::Io(e) => defmt::write!(f, "Io({:?})", defmt::Debug2Format(e)),
            Self::Device(e) => defmt::write!(f, "Device({:?})", e),
            Self::InvalidResponse => defmt::write!(f, "InvalidResponse"),
            Self::SocketSetFull => defmt::write!(f, "SocketSetFull"),
            Self::InvalidSocket => defmt::write!(f, "InvalidSocket"),
            Self::DuplicateSocket => defmt::write!(f, "DuplicateSocket"),
            Self::ConnectFailed => defmt::write!(f, "ConnectFailed"),
            Self::BaudDetection => defmt::write!(f, "BaudDetection"),
            Self::SimLocked => defmt::write!(f, "SimLocked"),
            Self::SimPinRequired => defmt::write!(f, "SimPinRequired"),
            Self::RegistrationDenied => defmt::write!(f, "RegistrationDenied"),
            Self::StateTimeout => defmt::write!(f, "StateTimeout"),
            Self::Atat(e) => defmt::write!(f, "Atat({:?})", e),
        }
    }
}

impl From<atat::Error> for Error {
    fn from(e: atat::Error) -> Self {
        Self::Atat(e)
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<core::str::Utf8Error> for Error {
    fn from(_: core::str::Utf8Error) -> Self {
        Self::InvalidResponse
    }
}

/// Map a transport error onto the crate error, keeping only its kind.
pub(crate) fn io<E: embedded_io::Error>(e: E) -> Error {
    Error::Io(e.kind())
}
