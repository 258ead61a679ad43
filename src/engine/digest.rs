//! Byte-level classification of the modem's output stream.
//!
//! Every byte is one of: command echo, part of a command result, part of an
//! unsolicited line, or raw socket payload announced by `+CIPRCV`. The
//! [`Digester`] is fed whatever the transport produced and re-evaluates after
//! every byte, since socket payload may end at any offset.
use atat::helpers::LossyStr;
use embassy_time::Instant;
use heapless::Vec;

use super::urc::UrcHandler;
use crate::command::ip_transport_layer::urc::{
    SocketDataHeader, SOCKET_DATA, SOCKET_DATA_HEADER_LEN,
};
use crate::error::{DeviceError, Error};
use crate::socket::SocketIngress;

pub const INGRESS_BUF_SIZE: usize = 256;

const LINE_END: &[u8] = b"\r\n";
const OK: &[u8] = b"OK";
const ERROR: &[u8] = b"ERROR";
const CME_ERROR: &[u8] = b"+CME ERROR:";
const CMS_ERROR: &[u8] = b"+CMS ERROR:";

/// Classified outcome of the most recent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    Pending,
    Ok,
    Error,
    /// `+CME ERROR: <n>`. Textual (verbose) errors carry code 0, the text is
    /// kept as the response body.
    CmeError(u16),
    /// `+CMS ERROR: <n>`
    CmsError(u16),
}

impl Response {
    /// Numeric outcome: 0 pending, 1 success, 2 plain error, 3 CME, 4 CMS.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Ok => 1,
            Self::Error => 2,
            Self::CmeError(_) => 3,
            Self::CmsError(_) => 4,
        }
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn into_result(self) -> Result<(), Error> {
        match self {
            Self::Pending => Err(Error::Busy),
            Self::Ok => Ok(()),
            Self::Error => Err(DeviceError::Error.into()),
            Self::CmeError(code) => Err(DeviceError::Cme(code).into()),
            Self::CmsError(code) => Err(DeviceError::Cms(code).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandState {
    Idle,
    /// Command written with echo enabled, echo line not yet seen.
    AwaitingEcho,
    AwaitingResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UrcState {
    Idle,
    /// `+CIPRCV,` seen, collecting `<mux>,<length>` up to `:`.
    ChunkHeader,
    ReceivingSocketChunk { mux: u8, remaining: usize },
    /// Payload complete, skipping the line terminator.
    ChunkTrailer,
}

pub struct Digester {
    buffer: Vec<u8, INGRESS_BUF_SIZE>,
    body: Vec<u8, INGRESS_BUF_SIZE>,
    header: Vec<u8, SOCKET_DATA_HEADER_LEN>,
    command: CommandState,
    urc: UrcState,
    outcome: Response,
    last_activity: Option<Instant>,
    urc_started: Option<Instant>,
}

impl Default for Digester {
    fn default() -> Self {
        Self::new()
    }
}

impl Digester {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            body: Vec::new(),
            header: Vec::new(),
            command: CommandState::Idle,
            urc: UrcState::Idle,
            outcome: Response::Pending,
            last_activity: None,
            urc_started: None,
        }
    }

    pub fn command_state(&self) -> CommandState {
        self.command
    }

    pub fn urc_state(&self) -> UrcState {
        self.urc
    }

    /// Outcome of the last command, `Pending` while one is outstanding.
    pub fn outcome(&self) -> Response {
        match self.command {
            CommandState::Idle => self.outcome,
            _ => Response::Pending,
        }
    }

    /// Trimmed text that preceded the final result line of the last command.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Bytes accumulated since the last classification boundary.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// When the last response, URC line or socket chunk completed.
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// When the socket chunk in progress was announced.
    pub fn urc_started(&self) -> Option<Instant> {
        self.urc_started
    }

    pub fn command_sent(&mut self, echo: bool) {
        self.body.clear();
        self.outcome = Response::Pending;
        self.command = if echo {
            CommandState::AwaitingEcho
        } else {
            CommandState::AwaitingResult
        };
    }

    /// Forget the outstanding command and any partially accumulated line.
    pub fn abort_command(&mut self) {
        self.command = CommandState::Idle;
        self.outcome = Response::Pending;
        self.buffer.clear();
    }

    /// Give up on a socket chunk in progress.
    pub fn abort_urc(&mut self) {
        self.urc = UrcState::Idle;
        self.urc_started = None;
        self.header.clear();
    }

    pub fn abort(&mut self) {
        self.abort_command();
        self.abort_urc();
    }

    pub fn digest(
        &mut self,
        data: &[u8],
        now: Instant,
        sockets: &dyn SocketIngress,
        urcs: &dyn UrcHandler,
    ) {
        let mut pos = 0;
        while pos < data.len() {
            match self.urc {
                UrcState::ReceivingSocketChunk { mux, remaining } => {
                    let n = remaining.min(data.len() - pos);
                    forward(sockets, mux, &data[pos..pos + n]);
                    pos += n;
                    self.urc = if n == remaining {
                        UrcState::ChunkTrailer
                    } else {
                        UrcState::ReceivingSocketChunk {
                            mux,
                            remaining: remaining - n,
                        }
                    };
                }
                UrcState::ChunkTrailer => match data[pos] {
                    b'\r' => pos += 1,
                    b'\n' => {
                        pos += 1;
                        self.finish_chunk(now);
                    }
                    // No terminator, the byte belongs to whatever follows.
                    _ => self.finish_chunk(now),
                },
                UrcState::ChunkHeader => {
                    self.digest_header(data[pos]);
                    pos += 1;
                }
                UrcState::Idle => {
                    let byte = data[pos];
                    pos += 1;
                    if self.buffer.push(byte).is_err() {
                        error!(
                            "Ingress buffer full, discarding {:?}",
                            LossyStr(&self.buffer)
                        );
                        self.buffer.clear();
                        let _ = self.buffer.push(byte);
                    }
                    self.classify(now, urcs);
                }
            }
        }
    }

    fn digest_header(&mut self, byte: u8) {
        if byte != b':' {
            if byte == b'\r' || byte == b'\n' || self.header.push(byte).is_err() {
                warn!("Malformed socket data header {:?}", LossyStr(&self.header));
                self.abort_urc();
            }
            return;
        }

        match SocketDataHeader::parse(&self.header) {
            Some(SocketDataHeader { mux, length }) => {
                trace!("[{}] Receiving {} bytes of socket data", mux, length);
                self.urc = if length == 0 {
                    UrcState::ChunkTrailer
                } else {
                    UrcState::ReceivingSocketChunk {
                        mux,
                        remaining: length,
                    }
                };
                self.header.clear();
            }
            None => {
                warn!("Malformed socket data header {:?}", LossyStr(&self.header));
                self.abort_urc();
            }
        }
    }

    fn finish_chunk(&mut self, now: Instant) {
        self.urc = UrcState::Idle;
        self.urc_started = None;
        self.last_activity = Some(now);
    }

    fn classify(&mut self, now: Instant, urcs: &dyn UrcHandler) {
        // Socket payload may interleave any command state.
        if self.buffer.ends_with(SOCKET_DATA) {
            let start = self.buffer.len() - SOCKET_DATA.len();
            self.buffer.truncate(start);
            self.header.clear();
            self.urc = UrcState::ChunkHeader;
            self.urc_started = Some(now);
            return;
        }

        if !self.buffer.ends_with(LINE_END) {
            return;
        }

        match self.command {
            CommandState::Idle => self.dispatch_urc(now, urcs),
            CommandState::AwaitingEcho => {
                let line = trim(&self.buffer);
                if line.is_empty() {
                    self.buffer.clear();
                } else if line.starts_with(b"AT") || line.starts_with(b"at") {
                    trace!("Echo {:?}", LossyStr(line));
                    self.buffer.clear();
                    self.command = CommandState::AwaitingResult;
                } else if !self.try_complete(now) {
                    self.dispatch_urc(now, urcs);
                }
            }
            CommandState::AwaitingResult => {
                self.try_complete(now);
            }
        }
    }

    /// Complete the outstanding command if the last line is a final result.
    fn try_complete(&mut self, now: Instant) -> bool {
        let end = self.buffer.len() - LINE_END.len();
        let start = self.buffer[..end]
            .windows(LINE_END.len())
            .rposition(|w| w == LINE_END)
            .map_or(0, |p| p + LINE_END.len());

        let Some((outcome, detail)) = final_result(trim(&self.buffer[start..end])) else {
            return false;
        };
        let body = if detail.is_empty() {
            trim(&self.buffer[..start])
        } else {
            detail
        };

        debug!("Response {:?}: {:?}", outcome, LossyStr(body));
        self.body.clear();
        // Never longer than the buffer it is taken from.
        let _ = self.body.extend_from_slice(body);

        self.outcome = outcome;
        self.command = CommandState::Idle;
        self.buffer.clear();
        self.last_activity = Some(now);
        true
    }

    fn dispatch_urc(&mut self, now: Instant, urcs: &dyn UrcHandler) {
        let line = trim(&self.buffer);
        if !line.is_empty() {
            if !urcs.handle(line) {
                debug!("Unhandled URC {:?}", LossyStr(line));
            }
            self.last_activity = Some(now);
        }
        self.buffer.clear();
    }
}

fn forward(sockets: &dyn SocketIngress, mux: u8, chunk: &[u8]) {
    match sockets.ingress(mux, chunk) {
        Some(stored) if stored < chunk.len() => {
            warn!(
                "[{}] Socket buffer full, dropped {} bytes",
                mux,
                chunk.len() - stored
            );
        }
        Some(_) => {}
        None => {
            warn!("[{}] No open socket, dropped {} bytes", mux, chunk.len());
        }
    }
}

/// Classify a complete, trimmed line as a final result code.
///
/// Returns the outcome together with the error detail text, if any.
fn final_result(line: &[u8]) -> Option<(Response, &[u8])> {
    if line == OK {
        Some((Response::Ok, &[]))
    } else if line == ERROR {
        Some((Response::Error, &[]))
    } else if let Some(detail) = line.strip_prefix(CME_ERROR) {
        let detail = trim(detail);
        Some((Response::CmeError(error_code(detail)), detail))
    } else if let Some(detail) = line.strip_prefix(CMS_ERROR) {
        let detail = trim(detail);
        Some((Response::CmsError(error_code(detail)), detail))
    } else {
        None
    }
}

fn error_code(detail: &[u8]) -> u16 {
    core::str::from_utf8(detail)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

pub(super) fn trim(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if !first.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    while let [rest @ .., last] = s {
        if !last.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    s
}
