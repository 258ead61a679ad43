use embassy_time::{Delay, Duration, Instant};
use embedded_hal::delay::DelayNs;

/// Monotonic time source and blocking delay used by every spin loop in the
/// driver.
pub trait Clock: DelayNs {
    fn now(&self) -> Instant;

    /// Time elapsed since `earlier`, saturating at zero.
    fn elapsed(&self, earlier: Instant) -> Duration {
        self.now()
            .checked_duration_since(earlier)
            .unwrap_or_else(|| Duration::from_ticks(0))
    }

    fn delay(&mut self, duration: Duration) {
        self.delay_us(u32::try_from(duration.as_micros()).unwrap_or(u32::MAX));
    }
}

/// [`Clock`] backed by the `embassy-time` driver.
pub struct SystemClock<D = Delay> {
    delay: D,
}

impl SystemClock<Delay> {
    pub const fn new() -> Self {
        Self { delay: Delay }
    }
}

impl Default for SystemClock<Delay> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DelayNs> SystemClock<D> {
    pub fn with_delay(delay: D) -> Self {
        Self { delay }
    }
}

impl<D: DelayNs> DelayNs for SystemClock<D> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns)
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms)
    }
}

impl<D: DelayNs> Clock for SystemClock<D> {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockClock;

    #[test]
    fn elapsed_follows_delays() {
        let mut clock = MockClock::new();
        let start = clock.now();

        clock.delay(Duration::from_millis(250));
        assert_eq!(clock.elapsed(start), Duration::from_millis(250));

        clock.delay_ms(20);
        assert_eq!(clock.elapsed(start), Duration::from_millis(270));
    }

    #[test]
    fn elapsed_saturates() {
        let clock = MockClock::new();
        let later = clock.now() + Duration::from_secs(1);
        assert_eq!(clock.elapsed(later), Duration::from_ticks(0));
    }
}
