use embassy_time::{Duration, Instant};

/// Attach state of the GSM or GPRS layer.
///
/// Each state machine keeps its own copy; the vocabulary is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkStatus {
    Error,
    Connecting,
    NetworkReady,
    #[default]
    NetworkOff,
    PacketReady,
    PacketOff,
}

/// 3GPP registration status as reported by `+CREG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    #[default]
    None,
    NotRegistering,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
}

impl From<u8> for Status {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::NotRegistering,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::Unknown,
            5 => Self::Roaming,
            _ => Self::None,
        }
    }
}

impl Status {
    pub fn registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationState {
    status: Status,
    started: Option<Instant>,
}

impl RegistrationState {
    pub const fn new() -> Self {
        Self {
            status: Status::None,
            started: None,
        }
    }

    /// How long the current status has been held.
    pub fn duration(&self, now: Instant) -> Duration {
        self.started
            .and_then(|started| now.checked_duration_since(started))
            .unwrap_or_else(|| Duration::from_ticks(0))
    }

    pub fn reset(&mut self) {
        self.status = Status::None;
        self.started = None;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status, now: Instant) {
        if self.status != status {
            debug!("Registration status {:?} -> {:?}", self.status, status);
            self.status = status;
            self.started = Some(now);
        }
    }

    pub fn registered(&self) -> bool {
        self.status.registered()
    }
}
