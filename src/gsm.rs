//! Network attach: SIM unlock, message format and registration polling.
use core::fmt;

use atat::AtatCmd;
use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};

use crate::clock::Clock;
use crate::command::{
    device_lock::{types::PinStatusCode, GetPinStatus, SetPin},
    network_service::{GetNetworkRegistrationStatus, GetSignalQuality},
    sms::{types::MessageFormat, SetMessageFormat},
};
use crate::engine::{CommandState, Engine, Response};
use crate::error::Error;
use crate::registration::{NetworkStatus, RegistrationState, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GsmState {
    CheckSim,
    WaitCheckSim,
    UnlockSim,
    WaitUnlockSim,
    SetMessageFormat,
    WaitMessageFormat,
    CheckRegistration,
    WaitRegistration,
    Idle,
}

/// Coarse signal classification of an RSSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalStrength {
    Weak,
    Fair,
    Good,
    Excellent,
}

impl SignalStrength {
    pub fn from_dbm(dbm: i16) -> Self {
        if dbm < -100 {
            Self::Weak
        } else if dbm <= -90 {
            Self::Fair
        } else if dbm <= -60 {
            Self::Good
        } else {
            Self::Excellent
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "WEAK",
            Self::Fair => "FAIR",
            Self::Good => "GOOD",
            Self::Excellent => "EXCELLENT",
        }
    }
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GSM attach state machine.
///
/// [`Gsm::ready`] is the non-blocking step: each call consumes the result of
/// the command issued by the previous call and issues at most one new one.
/// A failure is sticky until the next [`Gsm::begin`].
pub struct Gsm<'a> {
    pin: Option<&'a str>,
    state: GsmState,
    status: NetworkStatus,
    timeout: Option<Duration>,
    retries: u8,
    deadline: Option<Instant>,
    failure: Option<Error>,
    registration: RegistrationState,
}

impl<'a> Default for Gsm<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Gsm<'a> {
    pub const fn new() -> Self {
        Self {
            pin: None,
            state: GsmState::Idle,
            status: NetworkStatus::NetworkOff,
            timeout: None,
            retries: 0,
            deadline: None,
            failure: None,
            registration: RegistrationState::new(),
        }
    }

    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    pub fn state(&self) -> GsmState {
        self.state
    }

    pub fn registration(&self) -> &RegistrationState {
        &self.registration
    }

    /// Overall bound of the synchronous attach. `None` falls back to the
    /// engine's configured attach timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Initialise (or restart) the modem and start attaching.
    ///
    /// With `synchronous` the attach is driven to completion here, otherwise
    /// the caller keeps calling [`Gsm::ready`].
    pub fn begin<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        pin: Option<&'a str>,
        restart: bool,
        synchronous: bool,
    ) -> Result<NetworkStatus, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        self.failure = None;
        let init = if restart {
            engine.restart()
        } else {
            engine.init()
        };
        if let Err(e) = init {
            return Err(self.fail(e));
        }

        self.pin = pin;
        self.retries = 0;
        self.deadline = None;
        self.state = GsmState::CheckSim;
        self.status = NetworkStatus::Connecting;

        if !synchronous {
            return Ok(self.status);
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

    pub fn ready<T, C>(&mut self, engine: &mut Engine<'_, T, C>) -> nb::Result<NetworkStatus, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        if let Some(e) = &self.failure {
            return Err(nb::Error::Other(e.clone()));
        }
        if self.state == GsmState::Idle {
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
        loop {
            match self.state {
                GsmState::CheckSim => {
                    return self.issue(engine, &GetPinStatus, GsmState::WaitCheckSim);
                }
                GsmState::WaitCheckSim => {
                    if let Err(e) = response.into_result() {
                        if self.retries >= engine.config().sim_check_retries {
                            return Err(e);
                        }
                        self.retries += 1;
                        debug!("SIM check failed, retry {}", self.retries);
                        self.state = GsmState::CheckSim;
                        continue;
                    }

                    let body = engine.response_line(b"+CPIN:").unwrap_or(engine.response());
                    self.state = match PinStatusCode::from_response(body) {
                        Some(PinStatusCode::Ready) => GsmState::SetMessageFormat,
                        Some(PinStatusCode::SimPin) => GsmState::UnlockSim,
                        code => {
                            warn!("SIM locked: {:?}", code);
                            return Err(Error::SimLocked);
                        }
                    };
                }
                GsmState::UnlockSim => {
                    let pin = self.pin.ok_or(Error::SimPinRequired)?;
                    return self.issue(engine, &SetPin { pin }, GsmState::WaitUnlockSim);
                }
                GsmState::WaitUnlockSim => {
                    response.into_result()?;
                    self.state = GsmState::SetMessageFormat;
                }
                GsmState::SetMessageFormat => {
                    let cmd = SetMessageFormat {
                        format: MessageFormat::Text,
                    };
                    return self.issue(engine, &cmd, GsmState::WaitMessageFormat);
                }
                GsmState::WaitMessageFormat => {
                    response.into_result()?;
                    self.state = GsmState::CheckRegistration;
                }
                GsmState::CheckRegistration => {
                    return self.issue(
                        engine,
                        &GetNetworkRegistrationStatus,
                        GsmState::WaitRegistration,
                    );
                }
                GsmState::WaitRegistration => {
                    response.into_result()?;
                    let body = engine.response_line(b"+CREG:").unwrap_or(engine.response());
                    let creg = GetNetworkRegistrationStatus.parse(Ok(body))?;
                    let status = Status::from(creg.stat);
                    self.registration.set_status(status, engine.now());

                    match status {
                        Status::Home | Status::Roaming => {
                            info!("Registered on network: {:?}", status);
                            self.state = GsmState::Idle;
                            self.status = NetworkStatus::NetworkReady;
                            return Ok(Some(self.status));
                        }
                        Status::Searching => {
                            self.status = NetworkStatus::Connecting;
                            debug!(
                                "Searching for network for {} ms",
                                self.registration.duration(engine.now()).as_millis()
                            );
                        }
                        Status::Denied => return Err(Error::RegistrationDenied),
                        _ => {}
                    }
                    self.state = GsmState::CheckRegistration;
                }
                GsmState::Idle => return Ok(Some(self.status)),
            }
        }
    }

    fn issue<T, C, Cmd>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        cmd: &Cmd,
        next: GsmState,
    ) -> Result<Option<NetworkStatus>, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
        Cmd: AtatCmd,
    {
        engine.send(cmd)?;
        self.deadline = Some(engine.now() + Duration::from_millis(Cmd::MAX_TIMEOUT_MS.into()));
        debug!("GSM {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(None)
    }

    fn fail(&mut self, e: Error) -> Error {
        error!("GSM attach failed: {:?}", e);
        self.state = GsmState::Idle;
        self.status = NetworkStatus::Error;
        self.failure = Some(e.clone());
        e
    }

    /// `AT+CREG?`: registered on the home network or roaming.
    pub fn is_access_alive<T, C>(&mut self, engine: &mut Engine<'_, T, C>) -> Result<bool, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        let creg = engine.query_line(&GetNetworkRegistrationStatus, b"+CREG:")?;
        let status = Status::from(creg.stat);
        self.registration.set_status(status, engine.now());
        Ok(status.registered())
    }

    /// Received signal strength in dBm, `None` if the module cannot tell.
    pub fn signal_quality<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
    ) -> Result<Option<i16>, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        Ok(engine.query_line(&GetSignalQuality, b"+CSQ:")?.dbm())
    }

    /// Poll registration until it succeeds or `timeout` passes.
    pub fn wait_for_network<T, C>(
        &mut self,
        engine: &mut Engine<'_, T, C>,
        timeout: Duration,
    ) -> Result<bool, Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        let start = engine.now();
        let interval = engine.config().network_poll_interval;
        loop {
            match self.is_access_alive(engine) {
                Ok(true) => return Ok(true),
                Ok(false) | Err(Error::Timeout) | Err(Error::Device(_)) => {}
                Err(e) => return Err(e),
            }
            if engine.elapsed(start) >= timeout {
                return Ok(false);
            }
            engine.delay(interval);
        }
    }

    pub fn shutdown<T, C>(&mut self, engine: &mut Engine<'_, T, C>) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
        C: Clock,
    {
        engine.power_off()?;
        self.state = GsmState::Idle;
        self.status = NetworkStatus::NetworkOff;
        self.registration.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::AT;
    use crate::config::Config;
    use crate::error::DeviceError;
    use crate::socket::NoSockets;
    use crate::test_helpers::{init_logger, MockClock, MockTransport, Wire};

    const OK: &[u8] = b"\r\nOK\r\n";

    fn engine(wire: &Wire, config: Config) -> Engine<'static, MockTransport, MockClock> {
        init_logger();
        Engine::new(wire.transport(), MockClock::new(), config, &NoSockets)
    }

    fn expect_init(wire: &Wire) {
        wire.expect("ATV1", OK);
        wire.expect("AT", OK);
        wire.expect("AT+CMEE=0", OK);
        wire.expect("AT+CIPSPRT=0", OK);
    }

    fn expect_creg(wire: &Wire, stat: u8) {
        let reply = std::format!("\r\n+CREG: 0,{}\r\n\r\nOK\r\n", stat);
        wire.expect("AT+CREG?", reply.as_bytes());
    }

    /// Drive `ready` by hand, recording every status it reports on the way.
    fn drive(
        gsm: &mut Gsm,
        engine: &mut Engine<'_, MockTransport, MockClock>,
    ) -> Result<NetworkStatus, Error> {
        for _ in 0..100 {
            match gsm.ready(engine) {
                Ok(status) => return Ok(status),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => engine.delay(Duration::from_millis(10)),
            }
        }
        panic!("state machine did not settle");
    }

    #[test]
    fn attach_synchronously() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
        wire.expect("AT+CMGF=1", OK);
        expect_creg(&wire, 0);
        expect_creg(&wire, 2);
        expect_creg(&wire, 1);
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Ok(NetworkStatus::NetworkReady)
        );
        assert_eq!(gsm.status(), NetworkStatus::NetworkReady);
        assert_eq!(gsm.state(), GsmState::Idle);
        assert!(gsm.registration().registered());
        wire.assert_done();
    }

    #[test]
    fn unlocks_sim_with_pin() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n");
        wire.expect("AT+CPIN=\"1234\"", OK);
        wire.expect("AT+CMGF=1", OK);
        expect_creg(&wire, 5);
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, Some("1234"), false, false),
            Ok(NetworkStatus::Connecting)
        );
        assert_eq!(drive(&mut gsm, &mut engine), Ok(NetworkStatus::NetworkReady));
        assert_eq!(gsm.registration().status(), Status::Roaming);
        wire.assert_done();
    }

    #[test]
    fn searching_reports_connecting() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
        wire.expect("AT+CMGF=1", OK);
        expect_creg(&wire, 2);
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        gsm.begin(&mut engine, None, false, false).unwrap();

        for _ in 0..10 {
            assert_eq!(gsm.ready(&mut engine), Err(nb::Error::WouldBlock));
            if gsm.registration().status() == Status::Searching {
                break;
            }
        }
        assert_eq!(gsm.registration().status(), Status::Searching);
        assert_eq!(gsm.status(), NetworkStatus::Connecting);
        // Registration is polled again right away.
        assert_eq!(gsm.state(), GsmState::WaitRegistration);
    }

    #[test]
    fn missing_pin_fails() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n");
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Err(Error::SimPinRequired)
        );
        assert_eq!(gsm.status(), NetworkStatus::Error);
        // Sticky
        assert_eq!(
            gsm.ready(&mut engine),
            Err(nb::Error::Other(Error::SimPinRequired))
        );
        wire.assert_done();
    }

    #[test]
    fn locked_sim_fails() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CPIN: SIM PUK\r\n\r\nOK\r\n");
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, Some("1234"), false, true),
            Err(Error::SimLocked)
        );
    }

    #[test]
    fn sim_check_retries_once() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CME ERROR: 14\r\n");
        wire.expect("AT+CPIN?", b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
        wire.expect("AT+CMGF=1", OK);
        expect_creg(&wire, 1);
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Ok(NetworkStatus::NetworkReady)
        );
        wire.assert_done();
    }

    #[test]
    fn sim_check_gives_up() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CME ERROR: 14\r\n");
        wire.expect("AT+CPIN?", b"\r\n+CME ERROR: 10\r\n");
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Err(Error::Device(DeviceError::Cme(10)))
        );
        assert_eq!(gsm.status(), NetworkStatus::Error);
    }

    #[test]
    fn registration_denied() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
        wire.expect("AT+CMGF=1", OK);
        expect_creg(&wire, 3);
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Err(Error::RegistrationDenied)
        );
        assert_eq!(gsm.status(), NetworkStatus::Error);
        assert_eq!(gsm.registration().status(), Status::Denied);
    }

    #[test]
    fn attach_timeout() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"");
        let mut engine = engine(
            &wire,
            Config::new().with_attach_timeout(Duration::from_secs(1)),
        );

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Err(Error::StateTimeout)
        );
        assert_eq!(gsm.status(), NetworkStatus::Error);
        assert_eq!(engine.command_state(), CommandState::Idle);
    }

    #[test]
    fn command_timeout_fails_machine() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"");
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        gsm.begin(&mut engine, None, false, false).unwrap();
        assert_eq!(gsm.ready(&mut engine), Err(nb::Error::WouldBlock));

        engine.delay(Duration::from_secs(11));
        assert_eq!(gsm.ready(&mut engine), Err(nb::Error::Other(Error::Timeout)));
        assert_eq!(engine.command_state(), CommandState::Idle);
    }

    #[test]
    fn desync_during_sim_check_fails_cleanly() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect("AT+CPIN?", b"\r\n+CIPRCV,0,50:ab");
        let mut engine = engine(
            &wire,
            Config::new().with_chunk_timeout(Duration::from_secs(1)),
        );

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Err(Error::ProtocolDesync)
        );
        assert_eq!(gsm.status(), NetworkStatus::Error);
        assert_eq!(gsm.state(), GsmState::Idle);
        assert_eq!(engine.command_state(), CommandState::Idle);
        assert_eq!(
            gsm.ready(&mut engine),
            Err(nb::Error::Other(Error::ProtocolDesync))
        );

        wire.expect("AT", OK);
        assert_eq!(engine.command(&AT), Ok(Response::Ok));
        wire.assert_done();
    }

    #[test]
    fn urc_inside_registration_reply() {
        let wire = Wire::new().with_echo();
        expect_init(&wire);
        wire.expect(
            "AT+CPIN?",
            b"\r\n+CPIN: READY\r\n\r\n+CTZV:24/10/16,12:00:00,+08\r\n\r\nOK\r\n",
        );
        wire.expect("AT+CMGF=1", OK);
        wire.expect(
            "AT+CREG?",
            b"\r\n+CTZV:24/10/16,12:00:00,+08\r\n\r\n+CREG: 0,1\r\n\r\nOK\r\n",
        );
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Ok(NetworkStatus::NetworkReady)
        );
        assert!(gsm.registration().registered());
        wire.assert_done();
    }

    #[test]
    fn init_failure_is_reported() {
        let wire = Wire::new().with_echo();
        let mut engine = engine(
            &wire,
            Config::new().with_autosense_timeout(Duration::from_millis(300)),
        );

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.begin(&mut engine, None, false, true),
            Err(Error::BaudDetection)
        );
        assert_eq!(gsm.status(), NetworkStatus::Error);
    }

    #[test]
    fn access_and_signal_queries() {
        let wire = Wire::new().with_echo();
        expect_creg(&wire, 5);
        wire.expect(
            "AT+CSQ",
            b"\r\n+CTZV:24/10/16,12:00:00,+08\r\n\r\n+CSQ: 31,0\r\n\r\nOK\r\n",
        );
        wire.expect("AT+CSQ", b"\r\n+CSQ: 99,99\r\n\r\nOK\r\n");
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(gsm.is_access_alive(&mut engine), Ok(true));
        assert_eq!(gsm.signal_quality(&mut engine), Ok(Some(-51)));
        assert_eq!(gsm.signal_quality(&mut engine), Ok(None));
        wire.assert_done();
    }

    #[test]
    fn wait_for_network_polls() {
        let wire = Wire::new().with_echo();
        expect_creg(&wire, 2);
        wire.expect("AT+CREG?", b"\r\nERROR\r\n");
        expect_creg(&wire, 1);
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.wait_for_network(&mut engine, Duration::from_secs(5)),
            Ok(true)
        );
        wire.assert_done();
    }

    #[test]
    fn wait_for_network_gives_up() {
        let wire = Wire::new().with_echo();
        for _ in 0..4 {
            expect_creg(&wire, 0);
        }
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        assert_eq!(
            gsm.wait_for_network(&mut engine, Duration::from_millis(600)),
            Ok(false)
        );
    }

    #[test]
    fn shutdown_powers_off() {
        let wire = Wire::new().with_echo();
        wire.expect("AT+CPOF", OK);
        let mut engine = engine(&wire, Config::new());

        let mut gsm = Gsm::new();
        gsm.shutdown(&mut engine).unwrap();
        assert_eq!(gsm.status(), NetworkStatus::NetworkOff);
    }

    #[test]
    fn signal_strength_classes() {
        assert_eq!(SignalStrength::from_dbm(-113), SignalStrength::Weak);
        assert_eq!(SignalStrength::from_dbm(-100), SignalStrength::Fair);
        assert_eq!(SignalStrength::from_dbm(-90), SignalStrength::Fair);
        assert_eq!(SignalStrength::from_dbm(-89), SignalStrength::Good);
        assert_eq!(SignalStrength::from_dbm(-60), SignalStrength::Good);
        assert_eq!(SignalStrength::from_dbm(-51), SignalStrength::Excellent);
        assert_eq!(SignalStrength::Fair.as_str(), "FAIR");
    }
}
