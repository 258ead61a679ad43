//! Deterministic stand-ins for the serial link and the clock.
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::sync::Once;
use std::vec::Vec;

use embassy_time::Instant;
use embedded_hal::delay::DelayNs;
use embedded_io::{ErrorType, Read, ReadReady, Write};
use env_logger::Env;

use crate::clock::Clock;
use crate::command::CTRL_Z;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("trace"))
            .is_test(true)
            .init();
    });
}

/// Clock that only moves when something delays on it.
#[derive(Debug, Default)]
pub struct MockClock {
    ns: Cell<u64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance_ns(&self, ns: u64) {
        self.ns.set(self.ns.get() + ns);
    }
}

impl DelayNs for MockClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance_ns(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance_ns(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_ns(u64::from(ms) * 1_000_000);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.ns.get() / 1_000)
    }
}

struct Exchange {
    command: String,
    reply: Vec<u8>,
}

#[derive(Default)]
struct WireState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    line: Vec<u8>,
    script: VecDeque<Exchange>,
    echo: bool,
}

impl WireState {
    fn transmit(&mut self, byte: u8) {
        self.tx.push(byte);
        self.line.push(byte);

        let line = if byte == CTRL_Z {
            &self.line[..self.line.len() - 1]
        } else if self.line.ends_with(b"\r\n") {
            &self.line[..self.line.len() - 2]
        } else {
            return;
        };
        let line = String::from_utf8_lossy(line).into_owned();
        self.line.clear();

        if self.echo && line.starts_with("AT") {
            self.rx.extend(line.as_bytes());
            self.rx.extend(b"\r\n");
        }
        match line.as_str() {
            "ATE0" => self.echo = false,
            "ATE1" => self.echo = true,
            _ => {}
        }

        if let Some(exchange) = self.script.pop_front() {
            assert_eq!(line, exchange.command, "unexpected command");
            self.rx.extend(exchange.reply);
        }
    }
}

/// Test side of a [`MockTransport`]: scripts replies and inspects traffic.
///
/// Every complete line written by the driver (terminated by `\r\n`, or by
/// Ctrl-Z for raw payload) is checked against the next scripted exchange and
/// its reply is queued for reading. With the script exhausted writes are only
/// recorded.
#[derive(Clone, Default)]
pub struct Wire(Rc<RefCell<WireState>>);

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo command lines back the way the module does, honouring `ATE0` and
    /// `ATE1`.
    pub fn with_echo(self) -> Self {
        self.0.borrow_mut().echo = true;
        self
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport { wire: self.clone() }
    }

    /// Expect `command` (without terminator) next, answering with `reply`.
    pub fn expect(&self, command: &str, reply: &[u8]) {
        self.0.borrow_mut().script.push_back(Exchange {
            command: command.into(),
            reply: reply.to_vec(),
        });
    }

    /// Queue bytes as if the module sent them unprompted.
    pub fn inject(&self, data: &[u8]) {
        self.0.borrow_mut().rx.extend(data);
    }

    pub fn written(&self) -> Vec<u8> {
        self.0.borrow().tx.clone()
    }

    pub fn unread(&self) -> usize {
        self.0.borrow().rx.len()
    }

    pub fn assert_done(&self) {
        let state = self.0.borrow();
        let pending: Vec<&str> = state.script.iter().map(|e| e.command.as_str()).collect();
        assert!(pending.is_empty(), "commands never sent: {:?}", pending);
    }
}

pub struct MockTransport {
    wire: Wire,
}

impl ErrorType for MockTransport {
    type Error = Infallible;
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.wire.0.borrow_mut();
        let n = buf.len().min(state.rx.len());
        for (dst, src) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl ReadReady for MockTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.wire.0.borrow().rx.is_empty())
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.wire.0.borrow_mut();
        for &byte in buf {
            state.transmit(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_exchange_with_echo() {
        let wire = Wire::new().with_echo();
        wire.expect("ATE0", b"\r\nOK\r\n");
        wire.expect("HELLO", b"\r\nOK\r\n");
        let mut transport = wire.transport();

        transport.write_all(b"ATE0\r\nHELLO").unwrap();
        transport.write_all(&[CTRL_Z]).unwrap();

        let mut buf = [0u8; 64];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ATE0\r\n\r\nOK\r\n\r\nOK\r\n");
        assert!(!transport.read_ready().unwrap());
        wire.assert_done();
    }

    #[test]
    fn clock_advances_on_delay() {
        let mut clock = MockClock::new();
        clock.delay_ms(3);
        clock.delay_us(500);
        assert_eq!(clock.now(), Instant::from_micros(3_500));
    }
}
