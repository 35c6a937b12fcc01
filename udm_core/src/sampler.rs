//! Fast echo-timing activity.
//!
//! `TimingSampler::on_tick` is the body of the fast periodic handler: it
//! classifies the echo pulse and publishes the result through the
//! [`EchoSlot`]. `FastTicker` runs it on a dedicated thread.
//!
//! Safety: Each `FastTicker` spawns exactly one thread that is automatically
//! shut down when the `FastTicker` is dropped, preventing thread leaks.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use udm_traits::EchoLine;
use udm_traits::clock::Clock;

use crate::config::EchoLimits;
use crate::measurement::{EchoFault, EchoSlot, EchoStatus};

#[derive(Debug, Clone, Copy)]
pub struct TimingSampler {
    limits: EchoLimits,
}

impl TimingSampler {
    pub fn new(limits: EchoLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &EchoLimits {
        &self.limits
    }

    /// One fast tick. Returns the status published on this tick, if any.
    ///
    /// A no-op while the slot is idle or suspended.
    pub fn on_tick(&self, slot: &EchoSlot, echo_high: bool) -> Option<EchoStatus> {
        if !slot.is_sampling() {
            return None;
        }
        slot.bump_sample();

        let outcome = if echo_high {
            let high = slot.bump_high();
            (high > self.limits.max_high_ticks).then_some(EchoStatus::Error(EchoFault::Stuck))
        } else if slot.high_ticks() >= self.limits.min_high_ticks {
            Some(EchoStatus::Ok)
        } else {
            let low = slot.bump_low();
            (low > self.limits.max_low_ticks).then_some(EchoStatus::Error(EchoFault::Timeout))
        };

        if let Some(status) = outcome {
            slot.complete(status);
        }
        outcome
    }
}

/// Thread running a [`TimingSampler`] at the fast period.
pub struct FastTicker {
    ticks: Arc<AtomicU64>,
    overruns: Arc<AtomicU64>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl FastTicker {
    pub fn spawn<E, C>(
        sampler: TimingSampler,
        slot: Arc<EchoSlot>,
        echo: Arc<E>,
        period: Duration,
        clock: C,
    ) -> Self
    where
        E: EchoLine + ?Sized + 'static,
        C: Clock + Send + Sync + 'static,
    {
        Self::spawn_with(sampler, slot, echo, period, clock, || {})
    }

    /// Like [`FastTicker::spawn`], running `on_start` on the new thread first
    /// (e.g. to raise its scheduling priority).
    pub fn spawn_with<E, C, F>(
        sampler: TimingSampler,
        slot: Arc<EchoSlot>,
        echo: Arc<E>,
        period: Duration,
        clock: C,
        on_start: F,
    ) -> Self
    where
        E: EchoLine + ?Sized + 'static,
        C: Clock + Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_clone = ticks.clone();
        let overruns = Arc::new(AtomicU64::new(0));
        let overruns_clone = overruns.clone();

        let join_handle = std::thread::spawn(move || {
            on_start();
            let mut next = clock.now() + period;
            loop {
                // Immediate shutdown check (lock-free atomic)
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("fast ticker received shutdown signal");
                    break;
                }

                if let Some(status) = sampler.on_tick(&slot, echo.is_high()) {
                    tracing::trace!(?status, "echo sampled");
                }
                ticks_clone.fetch_add(1, Ordering::Relaxed);

                let now = clock.now();
                if now < next {
                    clock.sleep(next - now);
                    next += period;
                } else {
                    // Missed the slot; resynchronize instead of bursting.
                    overruns_clone.fetch_add(1, Ordering::Relaxed);
                    next = now + period;
                }
            }
            tracing::trace!("fast ticker exiting cleanly");
        });

        Self {
            ticks,
            overruns,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Fast ticks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks that started after their deadline.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl Drop for FastTicker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("fast ticker joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(?e, "fast ticker panicked during shutdown");
                }
            }
        }
    }
}
