use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::{raw::NoopRawMutex, Mutex};
use embassy_time::Duration;
use embedded_io::{Read, ReadReady, Write};
use heapless::{LinearMap, Vec};

use super::{RingBuffer, SocketIngress};
use crate::clock::Clock;
use crate::command::ip_transport_layer::SendData;
use crate::engine::{EchoGuard, Engine};
use crate::error::Error;

/// A handle, identifying a socket in a set. Equal to the module's `mux`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle(pub u8);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receive side of one open connection.
pub struct Socket<const L: usize> {
    handle: Handle,
    rx: RingBuffer<L>,
    dropped: usize,
}

impl<const L: usize> Socket<L> {
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            rx: RingBuffer::new(),
            dropped: 0,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Buffered bytes not yet read.
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Bytes discarded because they arrived while the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn recv_slice(&mut self, buf: &mut [u8]) -> usize {
        self.rx.dequeue_slice(buf)
    }

    fn ingress(&mut self, data: &[u8]) -> usize {
        let stored = self.rx.enqueue_slice(data);
        self.dropped = self.dropped.saturating_add(data.len() - stored);
        stored
    }
}

/// Open sockets, keyed by mux.
///
/// The set is shared between the engine, which appends incoming payload, and
/// the packet data machine, which opens and closes entries.
pub struct SocketSet<const N: usize, const L: usize> {
    sockets: Mutex<NoopRawMutex, RefCell<LinearMap<u8, Socket<L>, N>>>,
}

impl<const N: usize, const L: usize> Default for SocketSet<N, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const L: usize> SocketSet<N, L> {
    pub const fn new() -> Self {
        Self {
            sockets: Mutex::new(RefCell::new(LinearMap::new())),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.sockets.lock(|s| s.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.sockets.lock(|s| s.borrow().contains_key(&handle.0))
    }

    pub fn handles(&self) -> Vec<Handle, N> {
        self.sockets
            .lock(|s| s.borrow().keys().map(|&mux| Handle(mux)).collect())
    }

    pub fn available(&self, handle: Handle) -> Result<usize, Error> {
        self.with_socket(handle, |s| s.available())
    }

    pub fn dropped(&self, handle: Handle) -> Result<usize, Error> {
        self.with_socket(handle, |s| s.dropped())
    }

    pub fn with_socket<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut Socket<L>) -> R,
    ) -> Result<R, Error> {
        self.sockets.lock(|s| {
            s.borrow_mut()
                .get_mut(&handle.0)
                .map(f)
                .ok_or(Error::InvalidSocket)
        })
    }

    pub(crate) fn add(&self, handle: Handle) -> Result<(), Error> {
        self.sockets.lock(|s| {
            let mut sockets = s.borrow_mut();
            if sockets.contains_key(&handle.0) {
                return Err(Error::DuplicateSocket);
            }
            sockets
                .insert(handle.0, Socket::new(handle))
                .map_err(|_| Error::SocketSetFull)?;
            debug!("[{}] Socket opened", handle);
            Ok(())
        })
    }

    pub(crate) fn remove(&self, handle: Handle) -> Result<(), Error> {
        self.sockets.lock(|s| {
            s.borrow_mut()
                .remove(&handle.0)
                .ok_or(Error::InvalidSocket)?;
            debug!("[{}] Socket closed", handle);
            Ok(())
        })
    }

    /// Read up to `buf.len()` bytes from `handle`.
    ///
    /// Returns at once if enough data is buffered. Otherwise keeps polling the
    /// engine until `buf` is full or `timeout` has passed, and returns however
    /// many bytes arrived. Running out of time is not an error.
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
        let mut copied = self.with_socket(handle, |s| s.recv_slice(buf))?;
        if copied == buf.len() {
            return Ok(copied);
        }

        let start = engine.now();
        let interval = engine.config().poll_interval();
        loop {
            match engine.poll() {
                Ok(()) => {}
                Err(Error::ProtocolDesync) => {
                    warn!("[{}] Socket data lost to a truncated chunk", handle);
                }
                Err(e) => return Err(e),
            }

            let n = self.with_socket(handle, |s| s.recv_slice(&mut buf[copied..]))?;
            copied += n;

            let elapsed = engine.elapsed(start);
            if copied == buf.len() || elapsed >= timeout {
                return Ok(copied);
            }
            engine.delay(interval.min(timeout - elapsed));
        }
    }

    /// Send `data` on `handle` and wait for the module to accept it.
    ///
    /// Echo is turned off for the duration, so the payload is not reflected
    /// back, and is restored on every exit path.
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
        if !self.contains(handle) {
            return Err(Error::InvalidSocket);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut engine = EchoGuard::disable(engine)?;
        engine.send(&SendData {
            mux: handle.0,
            length: data.len(),
        })?;
        engine.write_payload(data)?;

        let timeout = engine.config().send_timeout();
        engine.wait_for_response(timeout)?.into_result()?;
        trace!("[{}] Sent {} bytes", handle, data.len());
        Ok(data.len())
    }
}

impl<const N: usize, const L: usize> SocketIngress for SocketSet<N, L> {
    fn ingress(&self, mux: u8, data: &[u8]) -> Option<usize> {
        self.sockets
            .lock(|s| s.borrow_mut().get_mut(&mux).map(|socket| socket.ingress(data)))
    }
}
