mod ring_buffer;
mod set;

pub use ring_buffer::RingBuffer;
pub use set::{Handle, Socket, SocketSet};

/// Sink for socket payload carried by `+CIPRCV` URCs.
///
/// The engine only holds a lookup reference to the implementor; allocating and
/// releasing sockets stays with whoever owns the set.
pub trait SocketIngress {
    /// Append `data` to the receive buffer of `mux`.
    ///
    /// Returns the number of bytes stored, or `None` when no socket is open on
    /// `mux`.
    fn ingress(&self, mux: u8, data: &[u8]) -> Option<usize>;
}

/// Ingress that has no sockets open.
pub struct NoSockets;

impl SocketIngress for NoSockets {
    fn ingress(&self, _mux: u8, _data: &[u8]) -> Option<usize> {
        None
    }
}
