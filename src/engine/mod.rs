//! Command/response/URC engine.
//!
//! The [`Engine`] owns the serial transport and is the only place bytes are
//! read from or written to the modem. Everything it reads goes through the
//! [`Digester`], which separates command echo and results from unsolicited
//! lines and routes `+CIPRCV` socket payload straight into the registered
//! [`SocketIngress`].
//!
//! All operations are either non-blocking (`poll`, `ready`) or spin on the
//! non-blocking ones against a deadline, so socket data keeps flowing while a
//! caller waits on an unrelated command.
mod control;
mod digest;
mod urc;

pub use digest::{CommandState, Digester, Response, UrcState, INGRESS_BUF_SIZE};
pub use urc::{UrcHandler, UrcRegistry};

use core::ops::{Deref, DerefMut};

use atat::{helpers::LossyStr, AtatCmd};
use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::clock::Clock;
use crate::command::CTRL_Z;
use crate::config::Config;
use crate::error::{self, Error};
use crate::socket::SocketIngress;

pub const MAX_URC_HANDLERS: usize = 2;
pub const MAX_CMD_LEN: usize = 256;

const READ_CHUNK: usize = 64;

pub struct Engine<'d, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    transport: T,
    clock: C,
    config: Config,
    digester: Digester,
    echo: bool,
    initialized: bool,
    sockets: &'d dyn SocketIngress,
    urc_handlers: UrcRegistry<'d, MAX_URC_HANDLERS>,
}

impl<'d, T, C> Engine<'d, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    /// Take ownership of `transport`. Socket payload is delivered into
    /// `sockets`, which the caller keeps owning.
    pub fn new(transport: T, clock: C, config: Config, sockets: &'d dyn SocketIngress) -> Self {
        Self {
            transport,
            clock,
            config,
            digester: Digester::new(),
            echo: true,
            initialized: false,
            sockets,
            urc_handlers: UrcRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Time passed since `earlier` on the engine's clock.
    pub fn elapsed(&self, earlier: Instant) -> Duration {
        self.clock.elapsed(earlier)
    }

    pub fn delay(&mut self, duration: Duration) {
        self.clock.delay(duration)
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn command_state(&self) -> CommandState {
        self.digester.command_state()
    }

    pub fn urc_state(&self) -> UrcState {
        self.digester.urc_state()
    }

    /// Bytes accumulated and not yet classified.
    pub fn buffered(&self) -> usize {
        self.digester.buffered()
    }

    pub fn add_urc_handler(&mut self, handler: &'d dyn UrcHandler) {
        self.urc_handlers.add(handler)
    }

    pub fn remove_urc_handler(&mut self, handler: &dyn UrcHandler) {
        self.urc_handlers.remove(handler)
    }

    /// Drain every byte the transport has available and classify it.
    ///
    /// Fails with [`Error::ProtocolDesync`] if an announced socket chunk has
    /// not completed within the configured chunk timeout. The chunk is
    /// abandoned and classification resumes with the next byte.
    pub fn poll(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; READ_CHUNK];
        while self.transport.read_ready().map_err(error::io)? {
            let len = self.transport.read(&mut buf).map_err(error::io)?;
            if len == 0 {
                break;
            }
            let now = self.clock.now();
            self.digester.digest(&buf[..len], now, self.sockets, &self.urc_handlers);
        }

        if let Some(started) = self.digester.urc_started() {
            if self.clock.elapsed(started) > self.config.chunk_timeout {
                error!(
                    "Socket data chunk incomplete after {} ms, resynchronising",
                    self.config.chunk_timeout.as_millis()
                );
                self.digester.abort_urc();
                return Err(Error::ProtocolDesync);
            }
        }

        Ok(())
    }

    /// Write one command line.
    ///
    /// Waits for any socket chunk in flight and for the quiet period since the
    /// last response or URC before transmitting.
    pub fn send<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<(), Error> {
        if self.digester.command_state() != CommandState::Idle {
            return Err(Error::Busy);
        }
        if Cmd::MAX_LEN > MAX_CMD_LEN {
            return Err(Error::Overflow);
        }

        self.settle()?;

        let mut buf = [0u8; MAX_CMD_LEN];
        let len = cmd.write(&mut buf);
        trace!("Sending command: {:?}", LossyStr(&buf[..len]));

        self.transport.write_all(&buf[..len]).map_err(error::io)?;
        self.transport.flush().map_err(error::io)?;
        self.digester.command_sent(self.echo);
        Ok(())
    }

    fn settle(&mut self) -> Result<(), Error> {
        loop {
            self.poll()?;
            if self.digester.urc_state() == UrcState::Idle {
                break;
            }
            self.clock.delay_ms(1);
        }

        if let Some(last) = self.digester.last_activity() {
            let elapsed = self.clock.elapsed(last);
            if elapsed < self.config.quiet_period {
                self.clock.delay(self.config.quiet_period - elapsed);
            }
        }
        Ok(())
    }

    /// Write raw payload terminated by Ctrl-Z, for commands that take data
    /// after the command line.
    pub fn write_payload(&mut self, data: &[u8]) -> Result<(), Error> {
        self.transport.write_all(data).map_err(error::io)?;
        self.transport.write_all(&[CTRL_Z]).map_err(error::io)?;
        self.transport.flush().map_err(error::io)
    }

    /// Poll, then report the outcome of the outstanding or most recent command.
    pub fn ready(&mut self) -> Result<Response, Error> {
        self.poll()?;
        Ok(self.digester.outcome())
    }

    /// Spin on [`Engine::ready`] until a final result or `timeout`.
    ///
    /// On timeout the command is abandoned: the engine returns to idle with an
    /// empty buffer and [`Error::Timeout`] is returned. Device errors are
    /// returned as a [`Response`], not as `Err`.
    pub fn wait_for_response(&mut self, timeout: Duration) -> Result<Response, Error> {
        let start = self.clock.now();
        loop {
            match self.ready() {
                Ok(Response::Pending) => {}
                Ok(response) => return Ok(response),
                Err(e) => {
                    self.digester.abort_command();
                    return Err(e);
                }
            }

            if self.clock.elapsed(start) >= timeout {
                warn!("Response timeout after {} ms", timeout.as_millis());
                self.digester.abort_command();
                return Err(Error::Timeout);
            }
            self.clock.delay_ms(1);
        }
    }

    /// Like [`Engine::wait_for_response`], also copying the response body into
    /// `body`.
    pub fn wait_for_response_with<const N: usize>(
        &mut self,
        timeout: Duration,
        body: &mut String<N>,
    ) -> Result<Response, Error> {
        let response = self.wait_for_response(timeout)?;
        body.clear();
        body.push_str(core::str::from_utf8(self.response())?)
            .map_err(|_| Error::Overflow)?;
        Ok(response)
    }

    /// Body of the last completed response.
    pub fn response(&self) -> &[u8] {
        self.digester.body()
    }

    /// First line of the last response body starting with `prefix`.
    ///
    /// URCs arriving between the echo and the final result stay in the body,
    /// so callers expecting a tagged information line pick it out here.
    pub fn response_line(&self, prefix: &[u8]) -> Option<&[u8]> {
        self.response()
            .split(|&b| b == b'\n')
            .map(digest::trim)
            .find(|line| line.starts_with(prefix))
    }

    /// Send `cmd` and wait for its final result, bounded by the command's own
    /// timeout.
    pub fn command<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<Response, Error> {
        self.send(cmd)?;
        self.wait_for_response(Duration::from_millis(Cmd::MAX_TIMEOUT_MS.into()))
    }

    /// Send `cmd`, require `OK` and parse the body into the command's response.
    pub fn query<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        self.command(cmd)?.into_result()?;
        Ok(cmd.parse(Ok(self.response()))?)
    }

    /// Like [`Engine::query`], parsing only the body line tagged `prefix`.
    /// Falls back to the whole body when no line carries the tag.
    pub fn query_line<Cmd: AtatCmd>(
        &mut self,
        cmd: &Cmd,
        prefix: &[u8],
    ) -> Result<Cmd::Response, Error> {
        self.command(cmd)?.into_result()?;
        let line = self.response_line(prefix).unwrap_or(self.response());
        Ok(cmd.parse(Ok(line))?)
    }

    /// Drive a non-blocking `step` until it completes or fails, pausing the
    /// configured poll interval between attempts.
    ///
    /// Gives up with [`Error::StateTimeout`] once `timeout` has passed.
    pub fn block_on<R>(
        &mut self,
        timeout: Option<Duration>,
        mut step: impl FnMut(&mut Self) -> nb::Result<R, Error>,
    ) -> Result<R, Error> {
        let start = self.clock.now();
        loop {
            match step(self) {
                Ok(r) => return Ok(r),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {}
            }

            if let Some(timeout) = timeout {
                if self.clock.elapsed(start) >= timeout {
                    return Err(Error::StateTimeout);
                }
            }
            self.clock.delay(self.config.poll_interval);
        }
    }

    /// Forget the outstanding command. Its result, should it still arrive, is
    /// handled as an unsolicited line.
    pub fn abort_command(&mut self) {
        self.digester.abort_command();
    }

    /// Drop the outstanding command and any socket chunk in progress.
    pub fn abort(&mut self) {
        self.digester.abort();
    }

    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }
}

/// Disables command echo for its lifetime.
///
/// Echo is re-enabled when the guard is dropped, whatever path the caller
/// leaves by. A command still outstanding at that point is abandoned first.
pub struct EchoGuard<'e, 'd, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    engine: &'e mut Engine<'d, T, C>,
}

impl<'e, 'd, T, C> EchoGuard<'e, 'd, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    pub fn disable(engine: &'e mut Engine<'d, T, C>) -> Result<Self, Error> {
        engine.set_echo(false)?;
        Ok(Self { engine })
    }
}

impl<'e, 'd, T, C> Deref for EchoGuard<'e, 'd, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    type Target = Engine<'d, T, C>;

    fn deref(&self) -> &Self::Target {
        self.engine
    }
}

impl<'e, 'd, T, C> DerefMut for EchoGuard<'e, 'd, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine
    }
}

impl<'e, 'd, T, C> Drop for EchoGuard<'e, 'd, T, C>
where
    T: Read + Write + ReadReady,
    C: Clock,
{
    fn drop(&mut self) {
        if self.engine.command_state() != CommandState::Idle {
            self.engine.abort_command();
        }
        if let Err(e) = self.engine.set_echo(true) {
            warn!("Failed to restore command echo: {:?}", e);
        }
    }
}
