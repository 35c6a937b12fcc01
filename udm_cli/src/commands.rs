//! Subcommand implementations.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use serde_json::json;
use udm_core::display::frame_text;
use udm_core::hw_error::map_hw_error;
use udm_core::{ControllerCfg, Distance, Lockstep, RunOptions, RunStats, TickReport};
use udm_hardware::util::ping_and_wait;
use udm_traits::{EchoLine, TriggerLine};
#[cfg(not(feature = "hardware"))]
use udm_traits::clock::MonotonicClock;
use udm_traits::clock::virtual_clock::VirtualClock;

use crate::board::{SimBoard, open_persistent_store, open_store};
use crate::cli::{PressScript, RtLock, SimFault};
use crate::rt::{fast_thread_hook, setup_rt_once};

/// Options for the real-time `run` command.
#[derive(Debug, Clone, Copy)]
pub struct RunArgs {
    pub ticks: Option<u64>,
    pub object_cm: u32,
    pub rt: bool,
    pub rt_prio: Option<i32>,
    pub rt_lock: Option<RtLock>,
    pub rt_cpu: Option<usize>,
    pub stats: bool,
}

pub struct Ctx<'a> {
    pub cfg: &'a udm_config::Config,
    pub ccfg: ControllerCfg,
    pub json: bool,
}

fn print_stats(stats: &RunStats, ccfg: &ControllerCfg) {
    eprintln!("\n--- UDM Stats ---");
    eprintln!("Slow ticks: {}", stats.slow_ticks);
    eprintln!(
        "Fast ticks: {} (overruns {})",
        stats.fast_ticks, stats.fast_overruns
    );
    eprintln!(
        "Period (us): fast {} / slow {}",
        ccfg.timing.fast_tick_us, ccfg.timing.slow_tick_us
    );
    eprintln!("Missed slow deadlines: {}", stats.missed_deadlines);
    eprintln!(
        "Triggers: {}  measurements: {}  faults: {}",
        stats.triggers, stats.measurements, stats.faults
    );
    eprintln!("Threshold saves: {}", stats.saves);
    eprintln!("-----------------\n");
}

fn summary_json(stats: &RunStats, frame: Option<String>) -> serde_json::Value {
    json!({
        "distance": {
            "meters": stats.distance.meters,
            "centimeters": stats.distance.centimeters,
            "out_of_range": stats.distance == Distance::OUT_OF_RANGE,
        },
        "threshold_cm": stats.threshold_cm,
        "frame": frame,
        "slow_ticks": stats.slow_ticks,
        "fast_ticks": stats.fast_ticks,
        "triggers": stats.triggers,
        "measurements": stats.measurements,
        "faults": stats.faults,
        "saves": stats.saves,
        "missed_deadlines": stats.missed_deadlines,
    })
}

fn print_reading(distance: Distance) {
    if distance == Distance::OUT_OF_RANGE {
        println!("distance: out of range");
    } else {
        println!("distance: {distance}");
    }
}

/// Log distance changes as they come in.
fn reading_logger() -> impl FnMut(&TickReport) {
    let mut last: Option<Distance> = None;
    move |r: &TickReport| {
        if r.fault.is_some() {
            tracing::debug!(tick = r.tick, fault = ?r.fault, lost = r.echo_lost, "echo lost");
        }
        if last != Some(r.distance) {
            tracing::info!(
                distance = %r.distance,
                threshold_cm = r.threshold_cm,
                "reading"
            );
            last = Some(r.distance);
        }
    }
}

/// Threaded controller until Ctrl-C or the tick budget runs out.
pub fn run(ctx: &Ctx<'_>, args: RunArgs, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    setup_rt_once(args.rt, args.rt_lock.unwrap_or_else(RtLock::os_default));
    let on_fast_start = args
        .rt
        .then(|| fast_thread_hook(args.rt_prio, args.rt_cpu));

    #[cfg(feature = "hardware")]
    let mut orch = crate::board::gpio_orchestrator(ctx.cfg, ctx.ccfg.clone())?;
    #[cfg(not(feature = "hardware"))]
    let mut orch = {
        let clock = MonotonicClock::new();
        let board = SimBoard::new(clock, args.object_cm, ctx.ccfg.timing.speed_of_sound_cm_s);
        board.build(clock, ctx.ccfg.clone(), open_store(ctx.cfg)?)?
    };

    tracing::info!(
        ticks = ?args.ticks,
        rt = args.rt,
        threshold_cm = orch.threshold_cm(),
        "controller starting"
    );
    let opts = RunOptions {
        max_ticks: args.ticks,
        shutdown,
        on_fast_start,
    };
    let stats = udm_core::run(&mut orch, opts, reading_logger())?;

    if ctx.json {
        println!("{}", summary_json(&stats, None));
    } else {
        print_reading(stats.distance);
        println!("threshold: {} cm", stats.threshold_cm);
    }
    if args.stats {
        print_stats(&stats, &ctx.ccfg);
    }
    Ok(())
}

/// Deterministic lockstep run; buttons follow the press script.
pub fn simulate(
    ctx: &Ctx<'_>,
    ticks: u64,
    object_cm: u32,
    presses: &[PressScript],
    fault: SimFault,
) -> eyre::Result<()> {
    let clock = VirtualClock::new();
    let board = SimBoard::new(clock.clone(), object_cm, ctx.ccfg.timing.speed_of_sound_cm_s);
    board.sensor.set_fault(fault.into());
    let mut orch = board.build(clock, ctx.ccfg.clone(), open_store(ctx.cfg)?)?;

    let mut lockstep = Lockstep::new(&orch);
    let mut log = reading_logger();
    for n in 1..=ticks {
        board.buttons.press(PressScript::levels_at(presses, n));
        let report = lockstep.slow_tick(&mut orch)?;
        log(&report);
    }
    let frame = frame_text(&board.panel.frame());
    orch.shutdown()?;

    let stats = lockstep.stats();
    if ctx.json {
        let mut v = summary_json(stats, Some(frame));
        v["button_state"] = json!(format!("{:?}", orch.button_state()));
        v["beeps"] = json!(board.panel.beeps());
        println!("{v}");
    } else {
        print_reading(stats.distance);
        println!("threshold: {} cm", orch.threshold_cm());
        println!("display: [{frame}]");
        println!("state: {:?}", orch.button_state());
    }
    Ok(())
}

/// Show or write the persisted alarm threshold.
pub fn threshold(ctx: &Ctx<'_>, set: Option<u8>) -> eyre::Result<()> {
    let mut store = open_persistent_store(ctx.cfg)?;
    let path = ctx.cfg.storage.path.as_deref().unwrap_or_default();

    match set {
        Some(cm) => {
            let outcome = store
                .save_threshold(&ctx.ccfg.store, cm)
                .wrap_err_with(|| format!("writing threshold to {path}"))?;
            tracing::info!(threshold_cm = cm, ?outcome, path, "threshold written");
            if ctx.json {
                println!(
                    "{}",
                    json!({ "threshold_cm": cm, "outcome": format!("{outcome:?}") })
                );
            } else {
                println!("threshold set to {cm} cm ({outcome:?})");
            }
        }
        None => {
            let cm = store
                .load_threshold(&ctx.ccfg.store)
                .wrap_err_with(|| format!("reading threshold from {path}"))?;
            if ctx.json {
                println!("{}", json!({ "threshold_cm": cm }));
            } else {
                println!("threshold: {cm} cm");
            }
        }
    }
    Ok(())
}

fn check_echo(
    trigger: &mut dyn TriggerLine,
    echo: &dyn EchoLine,
    lead: Duration,
    timeout: Duration,
) -> eyre::Result<Duration> {
    let width = ping_and_wait(trigger, echo, lead, timeout)
        .map_err(|e| eyre::Report::new(map_hw_error(&e)))
        .wrap_err("echo line stuck high")?;
    tracing::info!(echo_us = width.as_micros() as u64, "self-check ping");
    Ok(width)
}

/// Configuration is already validated by the time this runs; check the
/// store, then fire one trigger and require the echo to end in time.
///
/// Without the `hardware` feature the ping goes to the simulated sensor,
/// with `fault` injected, so `--fault stuck` fails the way a sensor with its
/// output held high would.
pub fn self_check(ctx: &Ctx<'_>, fault: SimFault) -> eyre::Result<()> {
    let store = udm_core::NonvolatileStore::new(open_store(ctx.cfg)?);
    let threshold_cm = store
        .load_threshold(&ctx.ccfg.store)
        .wrap_err("reading threshold")?;

    // Longest legitimate echo plus the pre-echo wait.
    let timeout = Duration::from_micros(u64::from(
        ctx.ccfg.echo.max_high_us + ctx.ccfg.echo.max_low_us,
    ));

    #[cfg(feature = "hardware")]
    {
        let pins = crate::board::gpio_pins(ctx.cfg)?;
        let board = udm_hardware::gpio::GpioBoard::open(&pins)
            .map_err(|e| eyre::Report::new(map_hw_error(&e)))
            .wrap_err("open GPIO board")?;
        if fault != SimFault::None {
            tracing::warn!(?fault, "fault injection only applies to the simulated sensor");
        }
        let mut board = board;
        // HC-SR04 raises the echo roughly half a millisecond after the trigger.
        check_echo(&mut board.trigger, &board.echo, Duration::from_micros(500), timeout)?;
    }
    #[cfg(not(feature = "hardware"))]
    {
        let board = SimBoard::new(MonotonicClock::new(), 50, ctx.ccfg.timing.speed_of_sound_cm_s);
        board.sensor.set_fault(fault.into());
        let mut trigger = board.sensor.trigger();
        check_echo(
            &mut trigger,
            &board.sensor,
            Duration::from_micros(udm_hardware::sim::SENSOR_LEAD_US),
            timeout,
        )?;
    }

    if ctx.json {
        println!("{}", json!({ "status": "ok", "threshold_cm": threshold_cm }));
    } else {
        println!("ok (threshold {threshold_cm} cm)");
    }
    Ok(())
}
