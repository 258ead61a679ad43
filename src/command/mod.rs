//! AT Commands for the Ai-Thinker A9/A9G GSM/GPRS module family
//!
//! Grouped by command family; every command serialises itself through the
//! `atat` derive macros.

pub mod control;
pub mod device_lock;
pub mod ip_transport_layer;
pub mod mobile_control;
pub mod network_service;
pub mod psn;
pub mod sms;

use atat::atat_derive::{AtatCmd, AtatResp};

#[derive(Debug, Clone, PartialEq, AtatResp)]
pub struct NoResponse;

#[derive(Clone, AtatCmd)]
#[at_cmd("", NoResponse)]
pub struct AT;

/// Byte terminating a raw socket payload.
pub const CTRL_Z: u8 = 0x1A;
