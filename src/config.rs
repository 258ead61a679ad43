use embassy_time::Duration;

/// Factory UART rate of the module.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) baud_rate: u32,
    pub(crate) verbose_errors: bool,
    pub(crate) quiet_period: Duration,
    pub(crate) send_timeout: Duration,
    pub(crate) chunk_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) autosense_timeout: Duration,
    pub(crate) network_poll_interval: Duration,
    pub(crate) sim_check_retries: u8,
    pub(crate) attach_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            verbose_errors: false,
            quiet_period: Duration::from_millis(20),
            send_timeout: Duration::from_secs(60),
            chunk_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            autosense_timeout: Duration::from_secs(10),
            network_poll_interval: Duration::from_millis(250),
            sim_check_retries: 1,
            attach_timeout: None,
        }
    }

    /// UART rate applied by [`Engine::init`](crate::engine::Engine::init).
    pub fn baud_rate<B: Into<u32>>(self, baud_rate: B) -> Self {
        Self {
            baud_rate: baud_rate.into(),
            ..self
        }
    }

    /// Report `+CME ERROR` / `+CMS ERROR` codes in verbose form.
    pub fn with_verbose_errors(self) -> Self {
        Self {
            verbose_errors: true,
            ..self
        }
    }

    pub fn with_quiet_period(self, quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            ..self
        }
    }

    pub fn with_send_timeout(self, send_timeout: Duration) -> Self {
        Self {
            send_timeout,
            ..self
        }
    }

    /// Upper bound on how long an announced socket chunk may take to arrive
    /// before the engine gives up on it.
    pub fn with_chunk_timeout(self, chunk_timeout: Duration) -> Self {
        Self {
            chunk_timeout,
            ..self
        }
    }

    pub fn with_poll_interval(self, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..self
        }
    }

    pub fn with_autosense_timeout(self, autosense_timeout: Duration) -> Self {
        Self {
            autosense_timeout,
            ..self
        }
    }

    pub fn with_network_poll_interval(self, network_poll_interval: Duration) -> Self {
        Self {
            network_poll_interval,
            ..self
        }
    }

    pub fn with_sim_check_retries(self, sim_check_retries: u8) -> Self {
        Self {
            sim_check_retries,
            ..self
        }
    }

    pub fn with_attach_timeout(self, attach_timeout: Duration) -> Self {
        Self {
            attach_timeout: Some(attach_timeout),
            ..self
        }
    }

    pub fn baud(&self) -> u32 {
        self.baud_rate
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Packet data credentials used when bringing up the PDP context.
#[derive(Debug, Clone, Default)]
pub enum Apn<'a> {
    #[default]
    None,
    Given {
        name: &'a str,
        username: Option<&'a str>,
        password: Option<&'a str>,
    },
}

impl<'a> Apn<'a> {
    pub const fn new(name: &'a str) -> Self {
        Self::Given {
            name,
            username: None,
            password: None,
        }
    }

    pub const fn with_credentials(name: &'a str, username: &'a str, password: &'a str) -> Self {
        Self::Given {
            name,
            username: Some(username),
            password: Some(password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.quiet_period, Duration::from_millis(20));
        assert_eq!(config.send_timeout, Duration::from_secs(60));
        assert_eq!(config.sim_check_retries, 1);
        assert!(config.attach_timeout.is_none());
        assert!(!config.verbose_errors);
    }

    #[test]
    fn builder_overrides() {
        let config = Config::new()
            .baud_rate(921_600_u32)
            .with_verbose_errors()
            .with_attach_timeout(Duration::from_secs(30))
            .with_sim_check_retries(3);

        assert_eq!(config.baud(), 921_600);
        assert!(config.verbose_errors);
        assert_eq!(config.attach_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.sim_check_retries, 3);
    }
}
