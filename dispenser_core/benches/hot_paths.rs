use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dispenser_core::actuator::plan;
use dispenser_core::time_sync::{ntp_to_civil, transmit_seconds};
use dispenser_core::{ActuatorState, BoundedField, Sample, interpret_axis};

// Joystick sweep: rest, full up, rest, full down, with some noise.
fn synth_axis(n: usize, seed: u32) -> Vec<u16> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    (0..n)
        .map(|i| {
            let base: u16 = match (i / 64) % 4 {
                1 => 4095,
                3 => 0,
                _ => 1981,
            };
            let jitter = (next() % 16) as u16;
            if base == 4095 { base - jitter } else { base.saturating_add(jitter) }
        })
        .collect()
}

fn group(c: &mut Criterion, name: &str) -> criterion::BenchmarkGroup<'_, criterion::measurement::WallTime> {
    let mut g = c.benchmark_group(name);
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p dispenser_core --bench hot_paths
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
    g
}

pub fn bench_axis(c: &mut Criterion) {
    let mut g = group(c, "axis");
    let samples = synth_axis(10_000, 0xC0FFEE);
    g.bench_function("interpret_axis_sweep", |b| {
        b.iter_batched(
            || BoundedField::new(12, 23),
            |mut field| {
                for &s in &samples {
                    black_box(interpret_axis(black_box(s), &mut field));
                }
                field
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

pub fn bench_ntp(c: &mut Criterion) {
    let mut g = group(c, "ntp");
    let mut reply = [0u8; 48];
    reply[0] = 0x1C;
    reply[40..44].copy_from_slice(&3_949_147_800u32.to_be_bytes());
    g.bench_function("parse_and_convert", |b| {
        b.iter(|| {
            let secs = transmit_seconds(black_box(&reply));
            black_box(secs.and_then(|s| ntp_to_civil(s, -10_800)))
        })
    });
    g.finish();
}

pub fn bench_hysteresis(c: &mut Criterion) {
    let mut g = group(c, "hysteresis");
    let readings: Vec<f32> = (0..10_000).map(|i| ((i % 200) as f32) * 0.5 + 10.0).collect();
    g.bench_function("plan_sweep", |b| {
        b.iter(|| {
            let mut state = ActuatorState::default();
            for &cm in &readings {
                let t = plan(&state, Sample::InRange(black_box(cm)), 40.0);
                state.servo_extended = match t {
                    dispenser_core::Transition::Extend => true,
                    dispenser_core::Transition::Retract => false,
                    dispenser_core::Transition::Hold => state.servo_extended,
                };
            }
            state
        })
    });
    g.finish();
}

criterion_group!(hot_paths, bench_axis, bench_ntp, bench_hysteresis);
criterion_main!(hot_paths);
