use embassy_time::Duration;
use embedded_io::{Read, ReadReady, Write};

use super::{Engine, Response};
use crate::clock::Clock;
use crate::command::{
    control::{
        types::{Echo, ResultCodeFormat},
        FactoryReset, SetDataRate, SetEcho, SetResultCodeFormat,
    },
    ip_transport_layer::{types::SendPromptMode, SetSendPrompt},
    mobile_control::{
        types::{ResetMode, TerminationErrorMode},
        PowerOff, Reset, SetReportMobileTerminationError,
    },
    AT,
};
use crate::config::DEFAULT_BAUD_RATE;
use crate::error::Error;

const AUTOSENSE_INTERVAL: Duration = Duration::from_millis(100);

impl<'d, T, C> Engine<'d, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    /// Bring the command interface into the state the engine relies on:
    /// verbose result codes, a responsive UART and no `>` prompt on
    /// `+CIPSEND`. Does nothing once initialised.
    ///
    /// A non-default [`Config::baud_rate`] is applied last with `AT+IPR`; the
    /// caller switches its transport to the new rate once this returns.
    ///
    /// [`Config::baud_rate`]: crate::config::Config::baud_rate
    pub fn init(&mut self) -> Result<(), Error> {
        if self.initialized {
            return Ok(());
        }

        // The module may still be booting, the result is checked by autosense.
        if let Err(e) = self.command(&SetResultCodeFormat {
            format: ResultCodeFormat::Verbose,
        }) {
            debug!("ATV1 failed: {:?}", e);
        }

        let timeout = self.config.autosense_timeout;
        self.autosense(timeout)?;

        let n = if self.config.verbose_errors {
            TerminationErrorMode::Verbose
        } else {
            TerminationErrorMode::Disabled
        };
        self.command(&SetReportMobileTerminationError { n })?
            .into_result()?;

        // Not supported by every firmware revision.
        if let Err(e) = self.command(&SetSendPrompt {
            mode: SendPromptMode::NoPrompt,
        }) {
            debug!("AT+CIPSPRT failed: {:?}", e);
        }

        let baud = self.config.baud_rate;
        if baud != DEFAULT_BAUD_RATE {
            self.set_data_rate(baud)?;
        }

        info!("Modem initialised");
        self.initialized = true;
        Ok(())
    }

    /// Send `AT` every 100 ms until the module answers `OK`.
    pub fn autosense(&mut self, timeout: Duration) -> Result<(), Error> {
        let start = self.clock.now();
        loop {
            if self.noop()? {
                return Ok(());
            }
            if self.clock.elapsed(start) >= timeout {
                return Err(Error::BaudDetection);
            }
            self.clock.delay(AUTOSENSE_INTERVAL);
        }
    }

    /// `AT`, returns whether the module answered `OK`.
    pub fn noop(&mut self) -> Result<bool, Error> {
        match self.command(&AT) {
            Ok(response) => Ok(response.is_ok()),
            Err(Error::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn set_echo(&mut self, enabled: bool) -> Result<(), Error> {
        self.command(&SetEcho {
            enabled: Echo::from(enabled),
        })?
        .into_result()?;
        self.echo = enabled;
        Ok(())
    }

    /// Soft reset if initialised, otherwise run [`Engine::init`].
    pub fn restart(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return self.init();
        }

        self.command(&Reset {
            mode: ResetMode::Reset,
        })?
        .into_result()?;
        self.echo = true;
        self.initialized = false;
        self.init()
    }

    pub fn factory_reset(&mut self) -> Result<Response, Error> {
        self.command(&FactoryReset)
    }

    pub fn power_off(&mut self) -> Result<(), Error> {
        self.command(&PowerOff)?.into_result()?;
        self.initialized = false;
        Ok(())
    }

    /// Change the module's UART rate. The transport must be switched by the
    /// caller once this returns.
    pub fn set_data_rate(&mut self, baud: u32) -> Result<(), Error> {
        self.command(&SetDataRate { rate: baud })?.into_result()
    }
}
