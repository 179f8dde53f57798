//! End-to-end tests for scripted products.
//!
//! Verifies:
//! - Exact, fuzzy and compiled evaluators on digital and smoothed payoffs
//! - Bytecode and tree evaluation agree in value and in adjoints
//! - Constant folding does not change results
//! - Domain analysis contains every value reached on a path

use std::cell::RefCell;
use std::collections::BTreeMap;

use approx::assert_relative_eq;
use pricer_core::aad::{Number, Tape};
use pricer_core::types::{allocate_path, Scenario};
use pricer_script::analysis::{index_variables, process_ifs, DomainProcessor};
use pricer_script::parser::parse_event;
use pricer_script::{PayoffEvaluator, ScriptError, ScriptProduct};
use proptest::prelude::*;

const DIGITAL: &str = "IF SPOT() > 100 THEN OPT PAYS 1 END";

fn product(events: &[(f64, &str)], payoff: &str, fuzzy: bool) -> ScriptProduct {
    events
        .iter()
        .fold(ScriptProduct::builder(), |b, (t, text)| b.event(*t, *text))
        .payoff(payoff)
        .fuzzy(fuzzy)
        .build()
        .unwrap()
}

fn path_f64(product: &ScriptProduct, spots: &[f64]) -> Scenario<f64> {
    let mut path = allocate_path(product.defline());
    for (sample, &s) in path.iter_mut().zip(spots) {
        sample.spot = s;
    }
    path
}

fn value_with<E: PayoffEvaluator<f64>>(mut evaluator: E, product: &ScriptProduct, spots: &[f64]) -> f64 {
    evaluator.evaluate(product, &path_f64(product, spots)).unwrap();
    evaluator.payoff()
}

fn try_value<E: PayoffEvaluator<f64>>(
    mut evaluator: E,
    product: &ScriptProduct,
    spots: &[f64],
) -> Result<f64, ScriptError> {
    evaluator.evaluate(product, &path_f64(product, spots))?;
    Ok(evaluator.payoff())
}

fn exact(product: &ScriptProduct, spots: &[f64]) -> f64 {
    value_with(product.evaluator(), product, spots)
}

fn compiled(product: &ScriptProduct, spots: &[f64]) -> f64 {
    value_with(product.compiled_evaluator(), product, spots)
}

fn fuzzy(product: &ScriptProduct, spots: &[f64], eps: f64) -> f64 {
    value_with(product.fuzzy_evaluator(eps).unwrap(), product, spots)
}

/// Value and spot adjoint of a one-event product evaluated on a tape.
fn with_adjoint<'t, E: PayoffEvaluator<Number<'t>>>(
    tape: &'t RefCell<Tape>,
    mut evaluator: E,
    product: &ScriptProduct,
    spot: f64,
) -> (f64, f64) {
    let s = Number::new(tape, spot);
    let mut path: Scenario<Number<'t>> = allocate_path(product.defline());
    path[0].spot = s;
    evaluator.evaluate(product, &path).unwrap();
    let v = evaluator.payoff();
    v.propagate_to_start();
    (v.value(), s.adjoint())
}

#[test]
fn test_digital_all_evaluators() {
    let p = product(&[(1.0, DIGITAL)], "OPT", false);
    assert_eq!(exact(&p, &[110.0]), 1.0);
    assert_eq!(exact(&p, &[90.0]), 0.0);
    assert_eq!(compiled(&p, &[110.0]), 1.0);
    assert_eq!(compiled(&p, &[90.0]), 0.0);
    assert_eq!(fuzzy(&p, &[110.0], 0.01), 1.0);
    assert_eq!(fuzzy(&p, &[90.0], 0.01), 0.0);
}

#[test]
fn test_smooth_at_the_money() {
    let p = product(&[(1.0, "X = SMOOTH(SPOT() - 100, 1, 0, 2)")], "X", false);
    assert_relative_eq!(exact(&p, &[100.0]), 0.5, epsilon = 1e-15);
    assert_relative_eq!(compiled(&p, &[100.0]), 0.5, epsilon = 1e-15);
    assert_relative_eq!(exact(&p, &[100.5]), 0.75, epsilon = 1e-15);
}

#[test]
fn test_fuzzy_digital_inside_window() {
    let p = product(&[(1.0, DIGITAL)], "OPT", true);
    let v = fuzzy(&p, &[100.0025], 0.01);
    assert_relative_eq!(v, 0.75, epsilon = 1e-9);
    assert!(v > 0.0 && v < 1.0);
    assert_eq!(exact(&p, &[100.0025]), 1.0);
}

#[test]
fn test_fuzzy_digital_half_window_from_strike() {
    let p = product(&[(1.0, DIGITAL)], "OPT", true);
    let v = fuzzy(&p, &[100.005], 0.01);
    assert!(v > 0.0 && v < 1.0, "got {}", v);
    assert_relative_eq!(v, 1.0, epsilon = 1e-9);
}

#[test]
fn test_and_evaluates_both_operands() {
    let p = product(
        &[(1.0, "IF SPOT() > 100 AND LOG(SPOT() - 100) > 0 THEN X PAYS 1 END")],
        "X",
        false,
    );
    let tree = try_value(p.evaluator(), &p, &[50.0]);
    let vm = try_value(p.compiled_evaluator(), &p, &[50.0]);
    assert!(matches!(tree, Err(ScriptError::Domain { .. })));
    assert_eq!(tree, vm);
    assert_eq!(exact(&p, &[110.0]), 1.0);
}

#[test]
fn test_fuzzy_comparison_epsilon_overrides_default() {
    let p = product(&[(1.0, "IF SPOT() > 100; 1 THEN OPT PAYS 1 END")], "OPT", true);
    assert_relative_eq!(fuzzy(&p, &[100.25], 0.01), 0.75, epsilon = 1e-12);
}

#[test]
fn test_fuzzy_discrete_window_keeps_second_level_linear() {
    let p = product(
        &[(0.5, "IF SPOT() > 100 THEN HIT = 1 END"), (1.0, "IF HIT > 0 THEN OPT PAYS 1 END")],
        "OPT",
        true,
    );
    // HIT takes {0, 1}: the second comparison ramps over exactly that gap.
    assert_relative_eq!(fuzzy(&p, &[100.0025, 0.0], 0.01), 0.75, epsilon = 1e-9);
    assert_eq!(fuzzy(&p, &[120.0, 0.0], 0.01), 1.0);
}

#[test]
fn test_fuzzy_delta_is_ramp_slope() {
    let p = product(&[(1.0, DIGITAL)], "OPT", true);
    let tape = RefCell::new(Tape::new());
    let evaluator = p.fuzzy_evaluator::<Number>(0.01).unwrap();
    let (v, delta) = with_adjoint(&tape, evaluator, &p, 100.0025);
    assert_relative_eq!(v, 0.75, epsilon = 1e-9);
    assert_relative_eq!(delta, 100.0, epsilon = 1e-9);
}

#[test]
fn test_fuzzy_nested_blend() {
    let p = product(
        &[(
            1.0,
            "IF SPOT() > 100 THEN IF SPOT() > 100.002 THEN X = 2 ELSE X = 1 END ELSE X = -1 END",
        )],
        "X",
        true,
    );
    // Outer degree 0.75, inner degree 0.55
    let inner = 0.55 * 2.0 + 0.45 * 1.0;
    let expected = 0.75 * inner + 0.25 * -1.0;
    assert_relative_eq!(fuzzy(&p, &[100.0025], 0.01), expected, epsilon = 1e-9);
}

#[test]
fn test_domain_error_during_evaluation() {
    let p = product(&[(1.0, "X = SQRT(SPOT() - 100)")], "X", false);
    let mut evaluator = p.evaluator::<f64>();
    let err = evaluator.evaluate(&p, &path_f64(&p, &[50.0])).unwrap_err();
    assert!(matches!(err, ScriptError::Domain { .. }));
}

#[test]
fn test_domain_error_at_construction() {
    let err = ScriptProduct::builder()
        .event(1.0, "A = 0 X = SPOT() / A")
        .payoff("X")
        .build()
        .unwrap_err();
    assert!(matches!(err, ScriptError::Domain { .. }));
}

#[test]
fn test_constant_folding_preserves_value() {
    let folded = product(
        &[(1.0, "A = 2 B = A * 3 + 1 IF SPOT() > B * 10 THEN X PAYS SPOT() - B ELSE X PAYS B END")],
        "X",
        false,
    );
    let literal = product(
        &[(1.0, "IF SPOT() > 70 THEN X PAYS SPOT() - 7 ELSE X PAYS 7 END")],
        "X",
        false,
    );
    assert!(folded.describe().contains("[=7]"));
    for spot in [50.0, 70.0, 71.0, 100.0] {
        assert_eq!(exact(&folded, &[spot]), exact(&literal, &[spot]));
        assert_eq!(compiled(&folded, &[spot]), exact(&literal, &[spot]));
    }
}

#[test]
fn test_pays_discounts_by_numeraire() {
    let p = product(&[(1.0, "X PAYS SPOT()"), (2.0, "X PAYS SPOT()")], "X", false);
    let mut path = path_f64(&p, &[100.0, 100.0]);
    path[0].numeraire = 1.25;
    path[1].numeraire = 2.0;
    let mut evaluator = p.compiled_evaluator::<f64>();
    evaluator.evaluate(&p, &path).unwrap();
    assert_relative_eq!(evaluator.payoff(), 80.0 + 50.0, epsilon = 1e-12);
}

const BARRIER: [(f64, &str); 3] = [
    (0.25, "IF SPOT() > 100 THEN N = N + 1 END"),
    (0.5, "IF SPOT() > 110 THEN N = N + 2 END X = MAX(SPOT() - 100, 0)"),
    (
        1.0,
        "Y = SQRT(X) Z = -Y IF N >= 2 AND SPOT() < 150 THEN OPT PAYS EXP(-Y / 10) * N ELSE OPT PAYS MIN(Z, LOG(SPOT())) END",
    ),
];

/// Single-event scripts covering combinators, SMOOTH, explicit tolerances
/// and branches that fail outside their domain.
const EQUIVALENCE: [&str; 5] = [
    "IF SPOT() > 100 AND LOG(SPOT() - 100) > 0 THEN X PAYS 1 END",
    "IF SPOT() < 80 OR SQRT(SPOT() - 90) > 3 THEN X PAYS SPOT() ELSE X PAYS 1 END",
    "X = SMOOTH(SPOT() - 100, SPOT() / 2, 50, 5)",
    "IF SPOT() >= 100; 0.5 THEN X = 1 END IF SPOT() != 120: 1 THEN X = X + 2 END",
    "IF SPOT() > 90 AND SPOT() < 130 OR SPOT() = 150; 10 THEN X PAYS MIN(SPOT(), 120) - 90 END",
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_compiled_matches_tree_on_script_corpus(spot in 50.0..160.0_f64) {
        for text in EQUIVALENCE {
            let p = product(&[(1.0, text)], "X", false);
            let tree = try_value(p.evaluator(), &p, &[spot]);
            let vm = try_value(p.compiled_evaluator(), &p, &[spot]);
            prop_assert_eq!(tree, vm, "{}", text);
        }
    }

    #[test]
    fn test_compiled_matches_tree(spots in proptest::collection::vec(50.0..160.0_f64, 3)) {
        let p = product(&BARRIER, "OPT", false);
        let tree = exact(&p, &spots);
        let vm = compiled(&p, &spots);
        prop_assert_eq!(tree, vm);
    }

    #[test]
    fn test_compiled_matches_tree_adjoints(spot in 60.0..140.0_f64) {
        let p = product(
            &[(1.0, "IF SPOT() > 100 THEN OPT PAYS (SPOT() - 100) * 2 ELSE OPT PAYS SQRT(SPOT()) * LOG(SPOT()) END")],
            "OPT",
            false,
        );
        let tape = RefCell::new(Tape::new());
        let (tv, td) = with_adjoint(&tape, p.evaluator::<Number>(), &p, spot);
        let tape = RefCell::new(Tape::new());
        let (cv, cd) = with_adjoint(&tape, p.compiled_evaluator::<Number>(), &p, spot);
        prop_assert!((tv - cv).abs() <= 1e-12 * (1.0 + tv.abs()));
        prop_assert!((td - cd).abs() <= 1e-12 * (1.0 + td.abs()));
    }

    #[test]
    fn test_domains_contain_path_values(spots in proptest::collection::vec(50.0..160.0_f64, 3)) {
        let constants = BTreeMap::new();
        let mut events: Vec<_> = BARRIER
            .iter()
            .enumerate()
            .map(|(i, (_, text))| parse_event(text, i, &constants).unwrap())
            .collect();
        let names = index_variables(&mut events);
        process_ifs(&mut events);
        let mut processor = DomainProcessor::new(names.len(), false);
        processor.process(&mut events).unwrap();

        let p = product(&BARRIER, "OPT", false);
        prop_assert_eq!(p.var_names(), names.as_slice());
        let mut evaluator = p.evaluator::<f64>();
        evaluator.evaluate(&p, &path_f64(&p, &spots)).unwrap();
        for (i, v) in evaluator.variables().iter().enumerate() {
            prop_assert!(
                processor.domains()[i].includes(*v),
                "{} = {} outside {}",
                names[i],
                v,
                processor.domains()[i]
            );
        }
    }
}
