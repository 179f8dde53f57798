//! Criterion benchmarks for the simulation driver.
//!
//! Compares the three payoff evaluators on a path-dependent product, with
//! and without adjoint risks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pricer_pricing::mc::{simulate, AdMode, BlackScholes, EvaluatorKind, SimulationConfig};
use pricer_pricing::rng::PricerRng;
use pricer_script::ScriptProduct;

/// Monthly up-and-out call over one year.
fn barrier_product() -> ScriptProduct {
    let mut builder = ScriptProduct::builder()
        .event(0.0, "ALIVE = 1")
        .macro_text("CHECK", "IF SPOT() > BARRIER THEN ALIVE = 0 END")
        .constant("BARRIER", 130.0);
    for month in 1..12 {
        builder = builder.event(month as f64 / 12.0, "CHECK");
    }
    builder
        .event(1.0, "CHECK\nKO PAYS ALIVE * MAX(SPOT() - 100, 0)")
        .payoff("KO")
        .fuzzy(true)
        .build()
        .expect("benchmark product")
}

fn bench_evaluators(c: &mut Criterion) {
    let product = barrier_product();
    let model = BlackScholes::new(100.0, 0.2, 0.02, 0.0).expect("model");
    let rng = PricerRng::from_seed(42);

    let mut group = c.benchmark_group("evaluators");
    group.sample_size(20);

    for ad_mode in [AdMode::NoAd, AdMode::Reverse] {
        for evaluator in [
            EvaluatorKind::Exact,
            EvaluatorKind::Fuzzy,
            EvaluatorKind::Compiled,
        ] {
            let config = SimulationConfig::builder()
                .n_paths(10_000)
                .threads(Some(1))
                .evaluator(evaluator)
                .ad_mode(ad_mode)
                .build()
                .expect("config");
            group.bench_with_input(
                BenchmarkId::new(ad_mode.to_string(), evaluator),
                &config,
                |b, config| {
                    b.iter(|| {
                        simulate(black_box(&product), &model, &rng, config)
                            .expect("simulation")
                            .price
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_threads(c: &mut Criterion) {
    let product = barrier_product();
    let model = BlackScholes::new(100.0, 0.2, 0.02, 0.0).expect("model");
    let rng = PricerRng::from_seed(7);

    let mut group = c.benchmark_group("threads");
    group.sample_size(10);

    for threads in [1, 2, 4] {
        let config = SimulationConfig::builder()
            .n_paths(50_000)
            .threads(Some(threads))
            .ad_mode(AdMode::Reverse)
            .build()
            .expect("config");
        group.bench_with_input(BenchmarkId::from_parameter(threads), &config, |b, config| {
            b.iter(|| simulate(&product, &model, &rng, config).expect("simulation").price)
        });
    }
    group.finish();
}

criterion_group!(benches, bench_evaluators, bench_threads);
criterion_main!(benches);
