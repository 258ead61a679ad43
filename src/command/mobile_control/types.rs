//! Argument and parameter types used by Mobile equipment control and status Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
pub enum TerminationErrorMode {
    /// 0: +CME ERROR: <err> result code disabled and ERROR used
    Disabled = 0,
    /// 1: +CME ERROR: <err> result code enabled and numeric <err> values used
    Enabled = 1,
    /// 2: +CME ERROR: <err> result code enabled and verbose <err> values used
    Verbose = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
pub enum ResetMode {
    /// 1: Software reset of the whole module
    Reset = 1,
}
