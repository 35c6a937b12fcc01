use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use udm_core::distance::estimate;
use udm_core::mocks::{EchoLevel, NullOutput};
use udm_core::{EchoLimits, EchoSlot, Lockstep, Orchestrator, TimingSampler};
use udm_hardware::{SimulatedPanel, SimulatedSensor};
use udm_traits::clock::virtual_clock::VirtualClock;

fn group_settings(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // Quick tweaking without CLI flags:
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p udm_core --bench slow_tick
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(10));
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
}

pub fn bench_slow_tick(c: &mut Criterion) {
    let mut g = c.benchmark_group("slow_tick");
    group_settings(&mut g);

    g.bench_function("orchestrator_tick_idle", |b| {
        let mut orch = Orchestrator::builder()
            .echo(Arc::new(EchoLevel::new()))
            .trigger(NullOutput)
            .display(NullOutput)
            .leds(NullOutput)
            .buzzer(NullOutput)
            .try_build()
            .unwrap();
        b.iter(|| black_box(orch.tick().unwrap()));
    });

    g.bench_function("lockstep_simulated_board", |b| {
        let clock = VirtualClock::new();
        let sensor = SimulatedSensor::new(clock.clone(), 20, 34655);
        let panel = SimulatedPanel::new();
        let mut orch = Orchestrator::builder()
            .clock(Arc::new(clock))
            .echo(Arc::new(sensor.clone()))
            .trigger(sensor.trigger())
            .display(panel.clone())
            .leds(panel.clone())
            .buzzer(panel)
            .try_build()
            .unwrap();
        let mut lockstep = Lockstep::new(&orch);
        b.iter(|| black_box(lockstep.slow_tick(&mut orch).unwrap()));
    });
    g.finish();
}

pub fn bench_fast_path(c: &mut Criterion) {
    let mut g = c.benchmark_group("fast_path");
    group_settings(&mut g);

    let sampler = TimingSampler::new(EchoLimits::default());
    g.bench_function("sampler_pulse_200", |b| {
        b.iter_batched(
            || {
                let slot = EchoSlot::new();
                slot.arm();
                slot
            },
            |slot| {
                for i in 0..210u32 {
                    black_box(sampler.on_tick(&slot, (5..205).contains(&i)));
                }
                black_box(slot.take())
            },
            BatchSize::SmallInput,
        )
    });
    g.bench_function("estimate", |b| {
        b.iter(|| black_box(estimate(black_box(200), 50, 34655)))
    });
    g.finish();
}

criterion_group!(slow_tick, bench_slow_tick, bench_fast_path);
criterion_main!(slow_tick);
