//! Single-slot handoff between the fast sampler and the slow orchestrator.
//!
//! Field ownership:
//! - `armed`: set by the slow side (only while idle), cleared by the fast side.
//! - `low_ticks`, `high_ticks`, `samples`: written by the fast side while
//!   armed, reset by the slow side when arming.
//! - `status`: moved away from `NotReady` by the fast side (Release, after
//!   the counters), moved back by the slow side when it takes the result.
//! - `suspended`: toggled by the slow side around storage writes.
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

const NOT_READY: u8 = 0;
const OK: u8 = 1;
const TIMEOUT: u8 = 2;
const STUCK: u8 = 3;

/// Why a measurement failed. All causes are transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoFault {
    /// The echo never rose within the low window.
    Timeout,
    /// The echo stayed high beyond the high window.
    Stuck,
    /// The echo was valid but the distance is beyond display capacity.
    OutOfRange,
}

impl std::fmt::Display for EchoFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Timeout => "echo timeout",
            Self::Stuck => "echo stuck high",
            Self::OutOfRange => "echo out of range",
        })
    }
}

/// Outcome word of the slot. `NotReady` covers both "in flight" and
/// "already taken"; anything else is a result waiting to be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoStatus {
    NotReady,
    /// The echo rose and fell inside its windows; `high_ticks` is valid.
    Ok,
    Error(EchoFault),
}

/// A completed (or pending) measurement as seen by the slow side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoMeasurement {
    pub status: EchoStatus,
    pub low_ticks: u32,
    pub high_ticks: u32,
}

/// Lock-free mailbox for one echo measurement, shared by the fast sampler
/// and the slow orchestrator.
///
/// The fast side writes the tick counters with relaxed stores and then
/// publishes the outcome with a `Release` store of the status. The slow side
/// takes the status with an `AcqRel` swap, so whenever [`take`](Self::take)
/// returns something other than `NotReady` the counters it reads are the
/// ones written for that measurement. Re-arming resets the counters before
/// the `Release` store of `armed`, and is refused until the previous result
/// has been taken.
#[derive(Debug, Default)]
pub struct EchoSlot {
    status: AtomicU8,
    armed: AtomicBool,
    suspended: AtomicBool,
    low_ticks: AtomicU32,
    high_ticks: AtomicU32,
    samples: AtomicU32,
}

impl EchoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    // ── slow side ────────────────────────────────────────────────────────────

    /// Reset the counters and enable sampling.
    ///
    /// Refused while a measurement is in flight or a result is still
    /// unconsumed, so at most one result exists at any time.
    pub fn arm(&self) -> bool {
        if self.is_armed() || self.status.load(Ordering::Acquire) != NOT_READY {
            return false;
        }
        self.low_ticks.store(0, Ordering::Relaxed);
        self.high_ticks.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
        true
    }

    /// Consume the current result, leaving the slot `NotReady`.
    pub fn take(&self) -> EchoMeasurement {
        let code = self.status.swap(NOT_READY, Ordering::AcqRel);
        let status = match code {
            OK => EchoStatus::Ok,
            TIMEOUT => EchoStatus::Error(EchoFault::Timeout),
            STUCK => EchoStatus::Error(EchoFault::Stuck),
            _ => EchoStatus::NotReady,
        };
        EchoMeasurement {
            status,
            low_ticks: self.low_ticks.load(Ordering::Relaxed),
            high_ticks: self.high_ticks.load(Ordering::Relaxed),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Fast ticks processed since the last `arm`.
    pub fn samples(&self) -> u32 {
        self.samples.load(Ordering::Acquire)
    }

    /// Pause the fast side until the returned guard is dropped.
    pub fn suspend(&self) -> SuspendGuard<'_> {
        self.suspended.store(true, Ordering::Release);
        SuspendGuard { slot: self }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    // ── fast side ────────────────────────────────────────────────────────────

    pub(crate) fn is_sampling(&self) -> bool {
        self.is_armed() && !self.is_suspended()
    }

    pub(crate) fn bump_sample(&self) {
        self.samples.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn bump_low(&self) -> u32 {
        self.low_ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn bump_high(&self) -> u32 {
        self.high_ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn high_ticks(&self) -> u32 {
        self.high_ticks.load(Ordering::Relaxed)
    }

    /// Publish the outcome and stop sampling.
    pub(crate) fn complete(&self, status: EchoStatus) {
        let code = match status {
            EchoStatus::NotReady => return,
            EchoStatus::Ok => OK,
            EchoStatus::Error(EchoFault::Stuck) => STUCK,
            EchoStatus::Error(_) => TIMEOUT,
        };
        self.status.store(code, Ordering::Release);
        self.armed.store(false, Ordering::Release);
    }
}

/// Keeps the fast side paused while alive.
#[must_use]
pub struct SuspendGuard<'a> {
    slot: &'a EchoSlot,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.slot.suspended.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_refused_while_in_flight_or_unconsumed() {
        let slot = EchoSlot::new();
        assert!(slot.arm());
        assert!(!slot.arm(), "in flight");

        slot.bump_high();
        slot.complete(EchoStatus::Ok);
        assert!(!slot.is_armed());
        assert!(!slot.arm(), "result not consumed yet");

        let m = slot.take();
        assert_eq!(m.status, EchoStatus::Ok);
        assert_eq!(m.high_ticks, 1);
        assert!(slot.arm());
        assert_eq!(slot.take().high_ticks, 0, "arm resets counters");
    }

    #[test]
    fn take_is_exactly_once() {
        let slot = EchoSlot::new();
        slot.arm();
        slot.complete(EchoStatus::Error(EchoFault::Timeout));
        assert_eq!(slot.take().status, EchoStatus::Error(EchoFault::Timeout));
        assert_eq!(slot.take().status, EchoStatus::NotReady);
    }

    #[test]
    fn published_counters_are_visible_to_the_taker() {
        use std::sync::Arc;

        for _ in 0..200 {
            let slot = Arc::new(EchoSlot::new());
            assert!(slot.arm());
            let fast = Arc::clone(&slot);
            let worker = std::thread::spawn(move || {
                for _ in 0..37 {
                    fast.bump_low();
                }
                for _ in 0..23 {
                    fast.bump_high();
                }
                fast.complete(EchoStatus::Ok);
            });
            let m = loop {
                let m = slot.take();
                if m.status != EchoStatus::NotReady {
                    break m;
                }
                std::hint::spin_loop();
            };
            worker.join().unwrap();
            assert_eq!(m.status, EchoStatus::Ok);
            assert_eq!((m.low_ticks, m.high_ticks), (37, 23));
        }
    }

    #[test]
    fn suspend_guard_restores_sampling() {
        let slot = EchoSlot::new();
        slot.arm();
        {
            let _g = slot.suspend();
            assert!(!slot.is_sampling());
        }
        assert!(slot.is_sampling());
    }
}
