//! Integration tests for the adjoint tape.
//!
//! Verifies:
//! - Eager and folded recording agree with analytic derivatives
//! - Mark/rewind replay yields the same gradient as fresh tapes
//! - Generic `Real` code gives identical values for `f64` and `Number`

use std::cell::RefCell;

use approx::assert_relative_eq;
use pricer_core::aad::{ExpressionExt, Number, Tape};
use pricer_core::traits::Real;
use proptest::prelude::*;

/// f(x, y) = x y + e^x / y - sqrt(x² + y²)
fn analytic(x: f64, y: f64) -> (f64, f64, f64) {
    let r = (x * x + y * y).sqrt();
    let value = x * y + x.exp() / y - r;
    let dx = y + x.exp() / y - x / r;
    let dy = x - x.exp() / (y * y) - y / r;
    (value, dx, dy)
}

fn eager(x0: f64, y0: f64) -> (f64, f64, f64) {
    let tape = RefCell::new(Tape::new());
    let x = Number::new(&tape, x0);
    let y = Number::new(&tape, y0);
    let f = x * y + x.exp() / y - (x * x + y * y).sqrt();
    f.propagate_to_start();
    (f.value(), x.adjoint(), y.adjoint())
}

fn folded(x0: f64, y0: f64) -> (f64, f64, f64) {
    let tape = RefCell::new(Tape::new());
    let x = Number::new(&tape, x0);
    let y = Number::new(&tape, y0);
    let (fx, fy) = (x.fold(), y.fold());
    let f = Number::from_expr(fx * fy + fx.exp() / fy - (fx * fx + fy * fy).sqrt());
    assert_eq!(tape.borrow().len(), 3);
    f.propagate_to_start();
    (f.value(), x.adjoint(), y.adjoint())
}

/// Path payoff recorded after the checkpoint: (s e^{v z} - k)^+ style with a
/// smooth max so every path contributes.
fn path_value<T: Real>(spot: T, vol: T, z: f64) -> T {
    let s = spot * (vol * z - vol * vol * 0.5).exp();
    (s - 100.0).max(T::zero()) + s * 0.01
}

#[test]
fn test_eager_matches_analytic() {
    let (v, dx, dy) = eager(0.3, 1.7);
    let (ev, edx, edy) = analytic(0.3, 1.7);
    assert_relative_eq!(v, ev, epsilon = 1e-13);
    assert_relative_eq!(dx, edx, epsilon = 1e-12);
    assert_relative_eq!(dy, edy, epsilon = 1e-12);
}

#[test]
fn test_real_generic_values_agree() {
    let tape = RefCell::new(Tape::new());
    let spot = Number::new(&tape, 105.0);
    let vol = Number::new(&tape, 0.25);
    let a = path_value(spot, vol, 0.4);
    let b = path_value(105.0, 0.25, 0.4);
    assert_eq!(a.value(), b);
}

#[test]
fn test_tape_memory_bounded_under_replay() {
    let tape = RefCell::new(Tape::with_block_size(64));
    let spot = Number::new(&tape, 100.0);
    let vol = Number::new(&tape, 0.2);
    tape.borrow_mut().mark();
    let mut max_len = 0;
    for i in 0..1000 {
        tape.borrow_mut().rewind_to_mark();
        let v = path_value(spot, vol, (i as f64 * 0.37).sin());
        v.propagate_to_mark();
        max_len = max_len.max(tape.borrow().len());
    }
    assert!(max_len < 32);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_eager_and_folded_agree(x in 0.1..3.0_f64, y in 0.5..4.0_f64) {
        let e = eager(x, y);
        let f = folded(x, y);
        let a = analytic(x, y);
        prop_assert!((e.0 - f.0).abs() < 1e-12 * (1.0 + a.0.abs()));
        prop_assert!((e.1 - a.1).abs() < 1e-10 * (1.0 + a.1.abs()));
        prop_assert!((f.1 - a.1).abs() < 1e-10 * (1.0 + a.1.abs()));
        prop_assert!((e.2 - a.2).abs() < 1e-10 * (1.0 + a.2.abs()));
        prop_assert!((f.2 - a.2).abs() < 1e-10 * (1.0 + a.2.abs()));
    }

    #[test]
    fn test_checkpoint_replay_matches_fresh_tapes(
        spot0 in 80.0..120.0_f64,
        vol0 in 0.05..0.5_f64,
        zs in proptest::collection::vec(-3.0..3.0_f64, 1..20),
    ) {
        // One tape, rewound to the mark for every path
        let tape = RefCell::new(Tape::new());
        let spot = Number::new(&tape, spot0);
        let vol = Number::new(&tape, vol0);
        tape.borrow_mut().mark();
        for &z in &zs {
            tape.borrow_mut().rewind_to_mark();
            path_value(spot, vol, z).propagate_to_mark();
        }
        tape.borrow_mut().propagate_mark_to_start();
        let replay = (spot.adjoint(), vol.adjoint());

        // A fresh tape per path, summed
        let mut fresh = (0.0, 0.0);
        for &z in &zs {
            let tape = RefCell::new(Tape::new());
            let spot = Number::new(&tape, spot0);
            let vol = Number::new(&tape, vol0);
            path_value(spot, vol, z).propagate_to_start();
            fresh.0 += spot.adjoint();
            fresh.1 += vol.adjoint();
        }

        prop_assert!((replay.0 - fresh.0).abs() <= 1e-12 * (1.0 + fresh.0.abs()));
        prop_assert!((replay.1 - fresh.1).abs() <= 1e-12 * (1.0 + fresh.1.abs()));
    }
}
