use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use lifegrid::{LifeConfig, LifeModel};
use std::time::Duration;

fn bench_model_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_step");
    // Allow env overrides for longer local runs.
    let samples: usize = std::env::var("LG_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);
    let measure: u64 = std::env::var("LG_BENCH_MEASURE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5);
    group.sample_size(samples);
    group.measurement_time(Duration::from_secs(measure));

    let steps: usize = std::env::var("LG_BENCH_STEPS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64);
    let sides: Vec<u32> = std::env::var("LG_BENCH_SIDES")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<u32>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![32, 64, 128]);

    for &side in &sides {
        group.bench_function(format!("steps{steps}_side{side}"), |b| {
            b.iter_batched(
                || {
                    let config = LifeConfig {
                        width: side,
                        height: side,
                        alive_fraction: 0.3,
                        rng_seed: Some(0xBEEF),
                        history_capacity: 1,
                        ..LifeConfig::default()
                    };
                    LifeModel::new(config).expect("model")
                },
                |mut model| {
                    for _ in 0..steps {
                        model.step().expect("step");
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_model_steps);
criterion_main!(benches);
