//! Drivers for the two periodic activities.
//!
//! - [`run`]: fast activity on its own thread, slow activity paced on the
//!   calling thread until shutdown or a tick budget is exhausted.
//! - [`spawn`]: the same loop on a background thread, publishing the latest
//!   [`TickReport`] through a bounded channel.
//! - [`Lockstep`] / [`run_lockstep`]: deterministic single-threaded driver
//!   for simulation and tests.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use udm_traits::clock::Clock;

use crate::distance::Distance;
use crate::error::{Result, UdmError};
use crate::measurement::EchoStatus;
use crate::orchestrator::{Orchestrator, TickReport};
use crate::sampler::{FastTicker, TimingSampler};

pub struct RunOptions {
    /// Stop after this many slow ticks.
    pub max_ticks: Option<u64>,
    /// Checked before every slow tick.
    pub shutdown: Arc<AtomicBool>,
    /// Runs on the fast thread before its first tick.
    pub on_fast_start: Option<Box<dyn FnOnce() + Send>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_ticks: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            on_fast_start: None,
        }
    }
}

impl core::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunOptions")
            .field("max_ticks", &self.max_ticks)
            .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
            .field("on_fast_start", &self.on_fast_start.is_some())
            .finish()
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub slow_ticks: u64,
    pub fast_ticks: u64,
    pub fast_overruns: u64,
    /// Slow ticks that started after their deadline.
    pub missed_deadlines: u64,
    pub triggers: u64,
    pub measurements: u64,
    pub faults: u64,
    pub saves: u64,
    pub distance: Distance,
    pub threshold_cm: u8,
}

impl RunStats {
    pub fn record(&mut self, r: &TickReport) {
        self.slow_ticks += 1;
        self.triggers += u64::from(r.armed);
        self.measurements += u64::from(r.echo == EchoStatus::Ok);
        self.faults += u64::from(r.fault.is_some());
        self.saves += u64::from(r.persisted.is_some_and(|o| o.touched_medium()));
        self.distance = r.distance;
        self.threshold_cm = r.threshold_cm;
    }
}

/// Run the controller on the calling thread until `opts.shutdown` is set or
/// `opts.max_ticks` slow ticks have elapsed.
///
/// A hardware error from the orchestrator ends the run; outputs are driven
/// idle in every case.
pub fn run(
    orch: &mut Orchestrator,
    opts: RunOptions,
    mut on_tick: impl FnMut(&TickReport),
) -> Result<RunStats> {
    let cfg = orch.config().clone();
    let sampler = TimingSampler::new(cfg.echo_limits());
    let clock = orch.clock().clone();
    let slot = orch.slot().clone();
    let echo = orch.echo().clone();
    let fast_period = cfg.timing.fast_period();
    let ticker = match opts.on_fast_start {
        Some(f) => FastTicker::spawn_with(sampler, slot, echo, fast_period, clock.clone(), f),
        None => FastTicker::spawn(sampler, slot, echo, fast_period, clock.clone()),
    };

    let period = cfg.timing.slow_period();
    let mut stats = RunStats::default();
    tracing::info!(
        fast_us = cfg.timing.fast_tick_us,
        slow_us = cfg.timing.slow_tick_us,
        max_ticks = ?opts.max_ticks,
        "controller running"
    );

    let mut next = clock.now() + period;
    let result = loop {
        if opts.shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break Ok(());
        }
        if opts.max_ticks.is_some_and(|n| stats.slow_ticks >= n) {
            break Ok(());
        }

        match orch.tick() {
            Ok(report) => {
                stats.record(&report);
                on_tick(&report);
            }
            Err(e) => break Err(e),
        }

        let now = clock.now();
        if now < next {
            clock.sleep(next - now);
            next += period;
        } else {
            stats.missed_deadlines += 1;
            next = now + period;
        }
    };

    stats.fast_ticks = ticker.ticks();
    stats.fast_overruns = ticker.overruns();
    drop(ticker);

    if let Err(e) = orch.shutdown() {
        tracing::warn!(error = ?e, "failed to idle outputs");
    }
    result?;
    tracing::info!(
        slow_ticks = stats.slow_ticks,
        missed = stats.missed_deadlines,
        overruns = stats.fast_overruns,
        "controller stopped"
    );
    Ok(stats)
}

/// Background controller started by [`spawn`].
///
/// Dropping the handle stops the controller and joins its threads.
pub struct ControllerHandle {
    rx: xch::Receiver<TickReport>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<Result<RunStats>>>,
}

impl ControllerHandle {
    /// Most recent report, if one arrived since the last call.
    pub fn latest(&self) -> Option<TickReport> {
        self.rx.try_iter().last()
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Stop the controller and wait for it.
    pub fn join(mut self) -> Result<RunStats> {
        self.stop();
        match self.join_handle.take() {
            Some(h) => h.join().map_err(|_| {
                eyre::Report::new(UdmError::State("controller thread panicked".into()))
            })?,
            None => Err(eyre::Report::new(UdmError::State(
                "controller already joined".into(),
            ))),
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(Ok(_)) => tracing::trace!("controller joined"),
                Ok(Err(e)) => tracing::warn!(error = ?e, "controller ended with error"),
                Err(e) => tracing::warn!(?e, "controller panicked during shutdown"),
            }
        }
    }
}

/// Start [`run`] on a background thread.
pub fn spawn(mut orch: Orchestrator, opts: RunOptions) -> ControllerHandle {
    let (tx, rx) = xch::bounded(1);
    let drain = rx.clone();
    let shutdown = opts.shutdown.clone();

    let join_handle = std::thread::spawn(move || {
        run(&mut orch, opts, |report| {
            // Keep only the newest report in the channel.
            if let Err(xch::TrySendError::Full(r)) = tx.try_send(report.clone()) {
                let _ = drain.try_recv();
                let _ = tx.try_send(r);
            }
        })
    });

    ControllerHandle {
        rx,
        shutdown,
        join_handle: Some(join_handle),
    }
}

/// Single-threaded driver: each slow tick is preceded by the number of fast
/// ticks that fit in one slow period, and every fast tick advances the clock
/// by one fast period. With a virtual clock the run is fully deterministic.
#[derive(Debug)]
pub struct Lockstep {
    sampler: TimingSampler,
    fast_per_slow: u32,
    fast_period: Duration,
    stats: RunStats,
}

impl Lockstep {
    pub fn new(orch: &Orchestrator) -> Self {
        let cfg = orch.config();
        Self {
            sampler: TimingSampler::new(cfg.echo_limits()),
            fast_per_slow: cfg.timing.fast_per_slow(),
            fast_period: cfg.timing.fast_period(),
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn slow_tick(&mut self, orch: &mut Orchestrator) -> Result<TickReport> {
        let slot = orch.slot().clone();
        let echo = orch.echo().clone();
        let clock = orch.clock().clone();
        let sampler = self.sampler;
        let period = self.fast_period;
        let mut fast = 0u64;

        let mut fast_tick = || {
            sampler.on_tick(&slot, echo.is_high());
            clock.sleep(period);
            fast += 1;
        };
        for _ in 0..self.fast_per_slow {
            fast_tick();
        }
        let report = orch.tick_with_pump(&mut fast_tick)?;

        self.stats.fast_ticks += fast;
        self.stats.record(&report);
        Ok(report)
    }
}

/// Run `ticks` slow ticks in lockstep, calling `on_tick` after each.
pub fn run_lockstep(
    orch: &mut Orchestrator,
    ticks: u64,
    mut on_tick: impl FnMut(&TickReport),
) -> Result<RunStats> {
    let mut lockstep = Lockstep::new(orch);
    for _ in 0..ticks {
        let report = lockstep.slow_tick(orch)?;
        on_tick(&report);
    }
    Ok(lockstep.stats.clone())
}
