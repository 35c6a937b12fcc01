use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction shared by both periodic activities.
///
/// - now(): returns a monotonic Instant
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - spin(): one iteration of a bounded busy-wait
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Called once per busy-wait iteration. Real clocks only hint the CPU.
    fn spin(&self) {
        std::hint::spin_loop();
    }

    /// Microseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn us_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_micros()).unwrap_or(u64::MAX)
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
    fn sleep(&self, d: Duration) {
        (**self).sleep(d);
    }
    fn spin(&self) {
        (**self).spin();
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "virtual-clock"))]
pub mod virtual_clock {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic clock whose time only moves when told to.
    ///
    /// now() = origin + offset
    /// sleep(d) advances internal time by d without actually sleeping.
    /// spin() advances internal time by one microsecond.
    #[derive(Debug, Clone)]
    pub struct VirtualClock {
        origin: Instant,
        offset_us: Arc<AtomicU64>,
    }

    impl Default for VirtualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl VirtualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset_us: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn advance(&self, d: Duration) {
            let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
            let _ = self
                .offset_us
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                    Some(cur.saturating_add(us))
                });
        }

        /// Set the absolute offset relative to origin.
        pub fn set_offset(&self, d: Duration) {
            let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
            self.offset_us.store(us, Ordering::Release);
        }

        pub fn elapsed(&self) -> Duration {
            Duration::from_micros(self.offset_us.load(Ordering::Acquire))
        }
    }

    impl Clock for VirtualClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }

        fn spin(&self) {
            self.advance(Duration::from_micros(1));
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sleep_and_spin_advance_virtual_time() {
            let clock = VirtualClock::new();
            let t0 = clock.now();
            clock.sleep(Duration::from_micros(50));
            clock.spin();
            assert_eq!(clock.us_since(t0), 51);
        }

        #[test]
        fn clones_share_time() {
            let a = VirtualClock::new();
            let b = a.clone();
            a.advance(Duration::from_millis(5));
            assert_eq!(b.elapsed(), Duration::from_millis(5));
        }
    }
}
