//! End-to-end tests of the simulation driver on scripted products.
//!
//! Covers deterministic single-path runs against direct evaluation,
//! reproducibility across thread counts and batch sizes, path-dependent
//! products under fixed draws, and error propagation.

use approx::assert_relative_eq;
use pricer_core::types::allocate_path;
use pricer_pricing::mc::{
    simulate, AdMode, BlackScholes, EvaluatorKind, Model, ModelPrototype, SimulationConfig,
    SimulationError,
};
use pricer_pricing::rng::{FixedGaussians, PricerRng};
use pricer_script::{PayoffEvaluator, ScriptProduct};
use proptest::prelude::*;

fn barrier_product() -> ScriptProduct {
    ScriptProduct::builder()
        .event(0.0, "ALIVE = 1")
        .event(0.25, "IF SPOT() > 120 THEN ALIVE = 0 END")
        .event(0.5, "IF SPOT() > 120 THEN ALIVE = 0 END")
        .event(
            1.0,
            "IF SPOT() > 120 THEN ALIVE = 0 END\nKO PAYS ALIVE * MAX(SPOT() - 100, 0)",
        )
        .payoff("KO")
        .build()
        .unwrap()
}

fn single_path_value(product: &ScriptProduct, model: &BlackScholes<f64>, z: &[f64]) -> f64 {
    let mut model = model.lift(|v| v);
    model.allocate(product.event_times(), product.defline());
    model.init(product.event_times(), product.defline()).unwrap();
    let mut path = allocate_path(product.defline());
    model.generate_path(z, &mut path).unwrap();
    let mut evaluator = product.evaluator::<f64>();
    evaluator.evaluate(product, &path).unwrap();
    evaluator.payoff()
}

// ============================================================================
// Deterministic Runs
// ============================================================================

#[test]
fn test_one_path_equals_direct_evaluation() {
    let product = barrier_product();
    let model = BlackScholes::new(100.0, 0.25, 0.02, 0.0).unwrap();
    let z = vec![0.3, -0.4, 1.1, 0.2];
    let config = SimulationConfig::builder().n_paths(1).build().unwrap();

    let result = simulate(&product, &model, &FixedGaussians::new(z.clone()), &config).unwrap();
    assert_eq!(result.payoffs.len(), 1);
    assert_eq!(result.price, single_path_value(&product, &model, &z));
    assert_eq!(result.std_error, 0.0);
}

#[test]
fn test_barrier_knock_out_under_fixed_draws() {
    let product = barrier_product();
    let model = BlackScholes::new(100.0, 0.2, 0.0, 0.0).unwrap();
    let config = SimulationConfig::builder().n_paths(2).build().unwrap();

    // A large draw on the second event breaches the barrier
    let knocked = simulate(
        &product,
        &model,
        &FixedGaussians::new(vec![0.0, 3.0, -3.0, 0.0]),
        &config,
    )
    .unwrap();
    assert_eq!(knocked.price, 0.0);

    let alive = simulate(
        &product,
        &model,
        &FixedGaussians::new(vec![0.0, 0.5, 0.5, 0.5]),
        &config,
    )
    .unwrap();
    assert!(alive.price > 0.0);
}

#[test]
fn test_fuzzy_barrier_is_smooth_in_spot() {
    let product = ScriptProduct::builder()
        .event(1.0, "IF SPOT() > 100 THEN DIGI PAYS 1 END")
        .payoff("DIGI")
        .fuzzy(true)
        .build()
        .unwrap();
    // Zero vol, spot just above the strike: inside the smoothing window
    let model = BlackScholes::new(100.0025, 0.0, 0.0, 0.0).unwrap();
    let config = SimulationConfig::builder()
        .n_paths(1)
        .evaluator(EvaluatorKind::Fuzzy)
        .fuzzy_epsilon(0.01)
        .ad_mode(AdMode::Reverse)
        .build()
        .unwrap();

    let result = simulate(&product, &model, &FixedGaussians::zeros(), &config).unwrap();
    assert_relative_eq!(result.price, 0.75, epsilon = 1e-9);
    assert_relative_eq!(result.risk("spot").unwrap(), 100.0, epsilon = 1e-6);
}

// ============================================================================
// Reproducibility
// ============================================================================

#[test]
fn test_reproducible_across_threads_and_batches() {
    let product = barrier_product();
    let model = BlackScholes::new(100.0, 0.3, 0.01, 0.0).unwrap();
    let rng = PricerRng::from_seed(2024);

    let run = |threads: usize, batch: usize| {
        let config = SimulationConfig::builder()
            .n_paths(3_000)
            .batch_size(batch)
            .threads(Some(threads))
            .ad_mode(AdMode::Reverse)
            .build()
            .unwrap();
        simulate(&product, &model, &rng, &config).unwrap()
    };

    let reference = run(1, 3_000);
    for (threads, batch) in [(2, 100), (4, 37), (3, 1_000)] {
        let other = run(threads, batch);
        assert_eq!(other.payoffs, reference.payoffs);
        assert_eq!(other.price, reference.price);
        for (a, b) in other.risks.iter().zip(&reference.risks) {
            assert_relative_eq!(a.value, b.value, max_relative = 1e-10, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_workers_bounded_by_batches() {
    let product = barrier_product();
    let model = BlackScholes::new(100.0, 0.2, 0.0, 0.0).unwrap();
    let config = SimulationConfig::builder()
        .n_paths(3)
        .threads(Some(8))
        .build()
        .unwrap();

    let result = simulate(&product, &model, &PricerRng::from_seed(1), &config).unwrap();
    assert_eq!(result.batches, 3);
    assert_eq!(result.workers, 3);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_domain_error_aborts_simulation() {
    let product = ScriptProduct::builder()
        .event(1.0, "X = SQRT(SPOT() - 100)")
        .payoff("X")
        .build()
        .unwrap();
    let model = BlackScholes::new(100.0, 0.2, 0.0, 0.0).unwrap();
    let config = SimulationConfig::builder()
        .n_paths(10_000)
        .threads(Some(2))
        .build()
        .unwrap();

    let err = simulate(&product, &model, &PricerRng::from_seed(4), &config).unwrap_err();
    assert!(matches!(err, SimulationError::Script(_)));
}

#[test]
fn test_invalid_config_rejected() {
    assert!(SimulationConfig::builder().n_paths(0).build().is_err());
    assert!(SimulationConfig::builder()
        .n_paths(10)
        .fuzzy_epsilon(0.0)
        .build()
        .is_err());
}

mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_fixed_draws_equal_direct_evaluation(
            spot in 60.0f64..140.0,
            vol in 0.05f64..0.5,
            z in proptest::collection::vec(-3.0f64..3.0, 4),
        ) {
            let product = barrier_product();
            let model = BlackScholes::new(spot, vol, 0.01, 0.0).unwrap();
            let config = SimulationConfig::builder()
                .n_paths(3)
                .evaluator(EvaluatorKind::Compiled)
                .build()
                .unwrap();

            let result = simulate(&product, &model, &FixedGaussians::new(z.clone()), &config).unwrap();
            let direct = single_path_value(&product, &model, &z);
            for p in &result.payoffs {
                prop_assert_eq!(*p, direct);
            }
        }
    }
}
