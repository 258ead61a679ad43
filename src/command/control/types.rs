//! Argument and parameter types used by V24 control and V25ter Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
pub enum Echo {
    /// 0: Echo off
    Off = 0,
    /// 1 (default): Echo on
    On = 1,
}

impl From<bool> for Echo {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::On
        } else {
            Self::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
pub enum ResultCodeFormat {
    /// 0: Numeric result codes
    Numeric = 0,
    /// 1 (default): Verbose result codes
    Verbose = 1,
}
