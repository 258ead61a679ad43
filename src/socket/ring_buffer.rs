use core::cmp;

/// Fixed-capacity byte ring buffer backing a socket's receive side.
///
/// Bytes are appended at the tail by URC dispatch and drained from the head
/// by the consumer. Appends never overwrite unread data: whatever does not fit
/// in the free window is left to the caller to account for.
#[derive(Debug)]
pub struct RingBuffer<const N: usize> {
    storage: [u8; N],
    read_at: usize,
    length: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            storage: [0; N],
            read_at: 0,
            length: 0,
        }
    }

    pub fn clear(&mut self) {
        self.read_at = 0;
        self.length = 0;
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Number of bytes that can be appended before the buffer is full.
    pub fn window(&self) -> usize {
        N - self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_full(&self) -> bool {
        self.window() == 0
    }

    /// Index of the first free byte.
    fn write_at(&self) -> usize {
        if N == 0 {
            0
        } else {
            (self.read_at + self.length) % N
        }
    }

    /// Largest number of bytes that can be appended without wrapping.
    fn contiguous_window(&self) -> usize {
        cmp::min(self.window(), N - self.write_at())
    }

    /// Append as many bytes of `data` as fit and return how many were stored.
    pub fn enqueue_slice(&mut self, data: &[u8]) -> usize {
        if self.is_empty() {
            // Realign so the next append is contiguous.
            self.read_at = 0;
        }

        let mut stored = 0;
        // At most two contiguous regions: up to the end of storage, then from
        // its start up to `read_at`.
        for _ in 0..2 {
            let remaining = &data[stored..];
            let size = cmp::min(self.contiguous_window(), remaining.len());
            if size == 0 {
                break;
            }
            let write_at = self.write_at();
            self.storage[write_at..write_at + size].copy_from_slice(&remaining[..size]);
            self.length += size;
            stored += size;
        }
        stored
    }

    /// Move up to `buf.len()` bytes out of the buffer and return how many were
    /// copied.
    pub fn dequeue_slice(&mut self, buf: &mut [u8]) -> usize {
        let mut copied = 0;
        for _ in 0..2 {
            let contiguous = cmp::min(self.length, N - self.read_at);
            let size = cmp::min(contiguous, buf.len() - copied);
            if size == 0 {
                break;
            }
            buf[copied..copied + size]
                .copy_from_slice(&self.storage[self.read_at..self.read_at + size]);
            self.read_at = (self.read_at + size) % N;
            self.length -= size;
            copied += size;
        }
        copied
    }
}
