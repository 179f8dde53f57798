//! Criterion benchmarks for the adjoint tape.
//!
//! Compares eager recording (one node per operator) with folded recording
//! (one node per formula), and measures per-path replay cost with
//! mark/rewind against rebuilding the tape.

use std::cell::RefCell;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pricer_core::aad::{ExpressionExt, Number, Tape};

/// Gaussian draws for the replay benchmarks.
fn generate_draws(n: usize) -> Vec<f64> {
    (0..n).map(|i| ((i as f64) * 0.618).sin() * 2.0).collect()
}

/// Benchmark eager against folded recording of one formula.
fn bench_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("recording");

    group.bench_function("eager", |b| {
        let tape = RefCell::new(Tape::new());
        b.iter(|| {
            tape.borrow_mut().rewind();
            let x = Number::new(&tape, black_box(0.7));
            let y = Number::new(&tape, black_box(1.3));
            let f = (x * y).exp() + x / y - (x * x + y * y).sqrt();
            f.propagate_to_start();
            x.adjoint()
        });
    });

    group.bench_function("folded", |b| {
        let tape = RefCell::new(Tape::new());
        b.iter(|| {
            tape.borrow_mut().rewind();
            let x = Number::new(&tape, black_box(0.7));
            let y = Number::new(&tape, black_box(1.3));
            let (fx, fy) = (x.fold(), y.fold());
            let f = Number::from_expr((fx * fy).exp() + fx / fy - (fx * fx + fy * fy).sqrt());
            f.propagate_to_start();
            x.adjoint()
        });
    });

    group.finish();
}

/// Benchmark checkpointed replay over a number of paths.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for n_paths in [100, 1000, 10000] {
        let draws = generate_draws(n_paths);

        group.bench_with_input(BenchmarkId::new("rewind_to_mark", n_paths), &draws, |b, draws| {
            let tape = RefCell::new(Tape::new());
            b.iter(|| {
                tape.borrow_mut().rewind();
                let spot = Number::new(&tape, 100.0);
                let vol = Number::new(&tape, 0.2);
                tape.borrow_mut().mark();
                for &z in draws {
                    tape.borrow_mut().rewind_to_mark();
                    let s = spot * (vol * z - vol * vol * 0.5).exp();
                    (s - 100.0).max(Number::passive(0.0)).propagate_to_mark();
                }
                tape.borrow_mut().propagate_mark_to_start();
                black_box(spot.adjoint())
            });
        });

        group.bench_with_input(BenchmarkId::new("fresh_tape", n_paths), &draws, |b, draws| {
            b.iter(|| {
                let mut total = 0.0;
                for &z in draws {
                    let tape = RefCell::new(Tape::with_block_size(64));
                    let spot = Number::new(&tape, 100.0);
                    let vol = Number::new(&tape, 0.2);
                    let s = spot * (vol * z - vol * vol * 0.5).exp();
                    (s - 100.0).max(Number::passive(0.0)).propagate_to_start();
                    total += spot.adjoint();
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_recording, bench_replay);
criterion_main!(benches);
