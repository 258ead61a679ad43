//! Packet data attach and TCP connection lifecycle.
use core::str::FromStr;

use atat::AtatCmd;
use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};
use no_std_net::Ipv4Addr;

use crate::clock::Clock;
use crate::command::{
    ip_transport_layer::{
        types::{ConnectionResult, MultiplexMode},
        BringUpWirelessConnection, CloseConnection, GetLocalIpAddress, SetApn,
        SetMultipleConnections, ShutConnections, StartConnection,
    },
    psn::{types::GPRSAttachedState, SetGPRSAttached},
};
use crate::config::Apn;
use crate::engine::{CommandState, Engine, Response};
use crate::error::Error;
use crate::registration::NetworkStatus;
use crate::socket::{Handle, SocketSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GprsState {
    Idle,
    Attach,
    WaitAttach,
    SetMux,
    WaitSetMux,
    SetCredentials,
    WaitSetCredentials,
    ActivateIp,
    WaitActivateIp,
    Deactivate,
    WaitDeactivate,
    Detach,
    WaitDetach,
}

/// Successful outcome of [`Gprs::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Connected {
    /// A new connection, buffered under the returned handle.
    New(Handle),
    /// The module reports the connection as already open. No socket is
    /// allocated for it.
    Already,
}

/// GPRS attach state machine, also owning the socket table.
///
/// Sockets are only ever added to the set on a successful connect and removed
/// on a successful close.
pub struct Gprs<'a, const N: usize, const L: usize> {
    sockets: &'a SocketSet<N, L>,
    apn: Apn<'a>,
    state: GprsState,
    status: NetworkStatus,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    failure: Option<Error>,
}

impl<'a, const N: usize, const L: usize> Gprs<'a, N, L> {
    pub const fn new(sockets: &'a SocketSet<N, L>) -> Self {
        Self {
            sockets,
            apn: Apn::None,
            state: GprsState::Idle,
            status: NetworkStatus::PacketOff,
            timeout: None,
            deadline: None,
            failure: None,
        }
    }

    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    pub fn state(&self) -> GprsState {
        self.state
    }

    /// Overall bound of synchronous attach and detach. `None` falls back to
    /// the engine's configured attach timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn open_sockets(&self) -> usize {
        self.sockets.len()
    }

    pub fn sockets(&self) -> &'a SocketSet<N, L> {
        self.sockets
    }

    /// Attach to GPRS and activate the PDP context for `apn`.
    pub fn attach<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        apn: Apn<'a>,
        synchronous: bool,
    ) -> Result<NetworkStatus, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        self.apn = apn;
        self.status = NetworkStatus::Connecting;
        self.start(engine, GprsState::Attach, synchronous)
    }

    /// Deactivate the PDP context and detach, closing every connection.
    pub fn detach<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        synchronous: bool,
    ) -> Result<NetworkStatus, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        self.start(engine, GprsState::Deactivate, synchronous)
    }

    fn start<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        state: GprsState,
        synchronous: bool,
    ) -> Result<NetworkStatus, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        self.failure = None;
        self.deadline = None;
        self.state = state;

        if !synchronous {
            return match self.ready(engine) {
                Ok(status) => Ok(status),
                Err(nb::Error::WouldBlock) => Ok(self.status),
                Err(nb::Error::Other(e)) => Err(e),
            };
        }

        let timeout = self.timeout.or(engine.config().attach_timeout);
        match engine.block_on(timeout, |engine| self.ready(engine)) {
            Err(Error::StateTimeout) => {
                engine.abort_command();
                Err(self.fail(Error::StateTimeout))
            }
            result => result,
        }
    }

    /// Non-blocking step of the attach or detach sequence.
    pub fn ready<T, C>(&mut self, engine: &mut Engine<'_, T, C>) -> nb::Result<NetworkStatus, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        if let Some(e) = &self.failure {
            return Err(nb::Error::Other(e.clone()));
        }
        if self.state == GprsState::Idle {
            return Ok(self.status);
        }

        let response = match engine.ready() {
            Ok(response) => response,
            Err(e) => {
                engine.abort_command();
                return Err(nb::Error::Other(self.fail(e)));
            }
        };
        if engine.command_state() != CommandState::Idle {
            if self.deadline.is_some_and(|deadline| engine.now() >= deadline) {
                engine.abort_command();
                return Err(nb::Error::Other(self.fail(Error::Timeout)));
            }
            return Err(nb::Error::WouldBlock);
        }

        match self.step(engine, response) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(self.fail(e))),
        }
    }

    fn step<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        response: Response,
    ) -> Result<Option<NetworkStatus>, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        match self.state {
            GprsState::Idle => Ok(Some(self.status)),
            GprsState::Attach => {
                let cmd = SetGPRSAttached {
                    state: GPRSAttachedState::Attached,
                };
                self.issue(engine, &cmd, GprsState::WaitAttach)
            }
            GprsState::WaitAttach => {
                response.into_result()?;
                self.state = GprsState::SetMux;
                self.step(engine, response)
            }
            GprsState::SetMux => {
                let cmd = SetMultipleConnections {
                    mode: MultiplexMode::Multiple,
                };
                self.issue(engine, &cmd, GprsState::WaitSetMux)
            }
            GprsState::WaitSetMux => {
                response.into_result()?;
                self.state = match self.apn {
                    Apn::None => GprsState::ActivateIp,
                    Apn::Given { .. } => GprsState::SetCredentials,
                };
                self.step(engine, response)
            }
            GprsState::SetCredentials => {
                let Apn::Given {
                    name,
                    username,
                    password,
                } = self.apn
                else {
                    self.state = GprsState::ActivateIp;
                    return self.step(engine, response);
                };
                let cmd = SetApn {
                    apn: name,
                    username: username.unwrap_or_default(),
                    password: password.unwrap_or_default(),
                };
                self.issue(engine, &cmd, GprsState::WaitSetCredentials)
            }
            GprsState::WaitSetCredentials => {
                response.into_result()?;
                self.state = GprsState::ActivateIp;
                self.step(engine, response)
            }
            GprsState::ActivateIp => {
                self.issue(engine, &BringUpWirelessConnection, GprsState::WaitActivateIp)
            }
            GprsState::WaitActivateIp => {
                response.into_result()?;
                info!("PDP context active");
                self.finish(NetworkStatus::PacketReady)
            }
            GprsState::Deactivate => {
                self.issue(engine, &ShutConnections, GprsState::WaitDeactivate)
            }
            GprsState::WaitDeactivate => {
                response.into_result()?;
                self.clear_sockets();
                self.state = GprsState::Detach;
                self.step(engine, response)
            }
            GprsState::Detach => {
                let cmd = SetGPRSAttached {
                    state: GPRSAttachedState::Detached,
                };
                self.issue(engine, &cmd, GprsState::WaitDetach)
            }
            GprsState::WaitDetach => {
                response.into_result()?;
                info!("GPRS detached");
                self.finish(NetworkStatus::PacketOff)
            }
        }
    }

    fn issue<T, C, Cmd>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        cmd: &Cmd,
        next: GprsState,
    ) -> Result<Option<NetworkStatus>, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
        Cmd: AtatCmd,
    {
        engine.send(cmd)?;
        self.deadline = Some(engine.now() + Duration::from_millis(Cmd::MAX_TIMEOUT_MS.into()));
        debug!("GPRS {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(None)
    }

    fn finish(&mut self, status: NetworkStatus) -> Result<Option<NetworkStatus>, Error> {
        self.state = GprsState::Idle;
        self.status = status;
        self.deadline = None;
        Ok(Some(status))
    }

    fn fail(&mut self, e: Error) -> Error {
        error!("GPRS {:?} failed: {:?}", self.state, e);
        self.state = GprsState::Idle;
        self.status = NetworkStatus::Error;
        self.failure = Some(e.clone());
        e
    }

    // `AT+CIPSHUT` closes every connection on the module side.
    fn clear_sockets(&self) {
        for handle in self.sockets.handles() {
            let _ = self.sockets.remove(handle);
        }
    }

    /// Open a TCP connection to `host:port`.
    ///
    /// Fails with [`Error::SocketSetFull`] without talking to the module when
    /// no socket slot is free.
    pub fn connect<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Connected, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        if self.sockets.is_full() {
            return Err(Error::SocketSetFull);
        }

        engine.send(&StartConnection {
            protocol: "TCP",
            host,
            port,
        })?;
        engine.wait_for_response(timeout)?.into_result()?;

        match ConnectionResult::from_response(engine.response()) {
            Some(ConnectionResult::Ok(mux)) => {
                if usize::from(mux) >= crate::MAX_SOCKETS {
                    error!("Module assigned out of range mux {}", mux);
                    return Err(Error::InvalidResponse);
                }
                let handle = Handle(mux);
                self.sockets.add(handle)?;
                info!("[{}] Connected to {}:{}", handle, host, port);
                Ok(Connected::New(handle))
            }
            Some(ConnectionResult::Already) => Ok(Connected::Already),
            Some(ConnectionResult::Fail) => {
                warn!("Connection to {}:{} failed", host, port);
                Err(Error::ConnectFailed)
            }
            None => Err(Error::InvalidResponse),
        }
    }

    pub fn close<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        handle: Handle,
        timeout: Duration,
    ) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        if !self.sockets.contains(handle) {
            return Err(Error::InvalidSocket);
        }

        engine.send(&CloseConnection { mux: handle.0 })?;
        engine.wait_for_response(timeout)?.into_result()?;
        self.sockets.remove(handle)?;
        info!("[{}] Closed", handle);
        Ok(())
    }

    pub fn send<T, C>(
        &self,
        engine: &mut Engine<'_, T, C>,
        handle: Handle,
        data: &[u8],
    ) -> Result<usize, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        self.sockets.send(engine, handle, data)
    }

    pub fn read<T, C>(
        &self,
        engine: &mut Engine<'_, T, C>,
        handle: Handle,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        self.sockets.read(engine, handle, buf, timeout)
    }

    /// Local IP address assigned by the network.
    pub fn ip_address<T, C>(&self, engine: &mut Engine<'_, T, C>) -> Result<Ipv4Addr, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        engine.command(&GetLocalIpAddress)?.into_result()?;

        let body = core::str::from_utf8(engine.response())?;
        let body = body.trim();
        let addr = body
            .strip_prefix("+CIFSR:")
            .unwrap_or(body)
            .trim_start()
            .lines()
            .next()
            .ok_or(Error::InvalidResponse)?;
        Ipv4Addr::from_str(addr.trim()).map_err(|_| Error::InvalidResponse)
    }
}
