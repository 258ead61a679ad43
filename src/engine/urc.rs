use heapless::Vec;

/// Receiver of unsolicited lines that are not socket payload.
pub trait UrcHandler {
    /// Offered one trimmed URC line. Returns `true` if the line was consumed.
    fn handle(&self, urc: &[u8]) -> bool;
}

/// Capacity-bounded set of URC handlers, identified by address.
///
/// Adding to a full registry, adding a handler twice, or removing one that was
/// never added are all silently ignored.
pub struct UrcRegistry<'d, const N: usize> {
    handlers: Vec<&'d dyn UrcHandler, N>,
}

impl<'d, const N: usize> Default for UrcRegistry<'d, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d, const N: usize> UrcRegistry<'d, N> {
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contains(&self, handler: &dyn UrcHandler) -> bool {
        self.handlers.iter().any(|h| core::ptr::addr_eq(*h, handler))
    }

    pub fn add(&mut self, handler: &'d dyn UrcHandler) {
        if self.contains(handler) {
            return;
        }
        if self.handlers.push(handler).is_err() {
            warn!("URC handler registry full, handler not added");
        }
    }

    pub fn remove(&mut self, handler: &dyn UrcHandler) {
        self.handlers.retain(|h| !core::ptr::addr_eq(*h, handler));
    }
}

impl<'d, const N: usize> UrcHandler for UrcRegistry<'d, N> {
    fn handle(&self, urc: &[u8]) -> bool {
        self.handlers.iter().any(|h| h.handle(urc))
    }
}
