//! Stack machine executing compiled events.
//!
//! One dispatch loop over the bytecode stream with a numeric stack, a
//! boolean stack and the variable array. Stack capacity is reserved from
//! the depths recorded by the compiler. The true branch of an `IfElse` runs
//! in a nested call bounded by its jump target; everything else is flat.

use pricer_core::traits::Real;
use pricer_core::types::Sample;

use crate::ast::{BinOp, Func};
use crate::compiler::{CompiledEvent, OpCode};
use crate::error::{ScriptError, ScriptResult};
use crate::evaluator::{check_scenario, PayoffEvaluator};
use crate::intrinsics::{apply_binary, apply_unary, smooth};
use crate::product::ScriptProduct;

/// Reusable stacks.
#[derive(Debug)]
pub struct VmState<T> {
    numbers: Vec<T>,
    bools: Vec<bool>,
}

impl<T: Real> Default for VmState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> VmState<T> {
    /// Empty stacks.
    pub fn new() -> Self {
        Self {
            numbers: Vec::new(),
            bools: Vec::new(),
        }
    }
}

fn underflow() -> ScriptError {
    ScriptError::Analysis("compiled stream underflows its stack".to_string())
}

#[inline]
fn pop<V>(stack: &mut Vec<V>) -> ScriptResult<V> {
    stack.pop().ok_or_else(underflow)
}

#[inline]
fn top<V>(stack: &mut [V]) -> ScriptResult<&mut V> {
    stack.last_mut().ok_or_else(underflow)
}

/// Executes one compiled event against a sample, updating `variables`.
///
/// # Errors
/// `Domain` when an operator is evaluated outside its domain.
pub fn evaluate_compiled<T: Real>(
    event: &CompiledEvent,
    sample: &Sample<T>,
    variables: &mut [T],
    state: &mut VmState<T>,
) -> ScriptResult<()> {
    state.numbers.clear();
    state.bools.clear();
    state.numbers.reserve(event.max_stack);
    state.bools.reserve(event.max_bool_stack);
    run(event, 0, event.code.len(), sample, variables, state)
}

fn run<T: Real>(
    event: &CompiledEvent,
    first: usize,
    last: usize,
    sample: &Sample<T>,
    variables: &mut [T],
    state: &mut VmState<T>,
) -> ScriptResult<()> {
    let code = &event.code;
    let constants = &event.constants;
    let konst = |at: usize| T::from_f64(constants[code[at]]);

    let mut i = first;
    while i < last {
        let op = OpCode::decode(code[i])
            .ok_or_else(|| ScriptError::Analysis(format!("invalid opcode {} at {}", code[i], i)))?;
        match op {
            OpCode::Add => {
                let b = pop(&mut state.numbers)?;
                *top(&mut state.numbers)? += b;
            }
            OpCode::AddConst => *top(&mut state.numbers)? += konst(i + 1),
            OpCode::Sub => {
                let b = pop(&mut state.numbers)?;
                *top(&mut state.numbers)? -= b;
            }
            OpCode::SubConst => *top(&mut state.numbers)? -= konst(i + 1),
            OpCode::ConstSub => {
                let x = top(&mut state.numbers)?;
                *x = konst(i + 1) - *x;
            }
            OpCode::Mult => {
                let b = pop(&mut state.numbers)?;
                *top(&mut state.numbers)? *= b;
            }
            OpCode::MultConst => *top(&mut state.numbers)? *= konst(i + 1),
            OpCode::Div => {
                let b = pop(&mut state.numbers)?;
                let x = top(&mut state.numbers)?;
                *x = apply_binary(BinOp::Div, *x, b)?;
            }
            OpCode::DivConst => {
                let x = top(&mut state.numbers)?;
                *x = apply_binary(BinOp::Div, *x, konst(i + 1))?;
            }
            OpCode::ConstDiv => {
                let x = top(&mut state.numbers)?;
                *x = apply_binary(BinOp::Div, konst(i + 1), *x)?;
            }
            OpCode::Pow => {
                let b = pop(&mut state.numbers)?;
                let x = top(&mut state.numbers)?;
                *x = apply_binary(BinOp::Pow, *x, b)?;
            }
            OpCode::PowConst => {
                let x = top(&mut state.numbers)?;
                *x = apply_binary(BinOp::Pow, *x, konst(i + 1))?;
            }
            OpCode::ConstPow => {
                let x = top(&mut state.numbers)?;
                *x = apply_binary(BinOp::Pow, konst(i + 1), *x)?;
            }
            OpCode::Max2 => {
                let b = pop(&mut state.numbers)?;
                let x = top(&mut state.numbers)?;
                *x = Real::max(*x, b);
            }
            OpCode::Max2Const => {
                let x = top(&mut state.numbers)?;
                *x = Real::max(*x, konst(i + 1));
            }
            OpCode::Min2 => {
                let b = pop(&mut state.numbers)?;
                let x = top(&mut state.numbers)?;
                *x = Real::min(*x, b);
            }
            OpCode::Min2Const => {
                let x = top(&mut state.numbers)?;
                *x = Real::min(*x, konst(i + 1));
            }
            OpCode::Spot => state.numbers.push(sample.spot),
            OpCode::Var => state.numbers.push(variables[code[i + 1]]),
            OpCode::Const => state.numbers.push(konst(i + 1)),
            OpCode::Assign => variables[code[i + 1]] = pop(&mut state.numbers)?,
            OpCode::AssignConst => variables[code[i + 1]] = konst(i + 2),
            OpCode::Pays => {
                let paid = pop(&mut state.numbers)?;
                variables[code[i + 1]] += paid / sample.numeraire;
            }
            OpCode::PaysConst => variables[code[i + 1]] += konst(i + 2) / sample.numeraire,
            OpCode::If => {
                if !pop(&mut state.bools)? {
                    i = code[i + 1];
                    continue;
                }
            }
            OpCode::IfElse => {
                let (end_true, end_false) = (code[i + 1], code[i + 2]);
                if pop(&mut state.bools)? {
                    run(event, i + 3, end_true, sample, variables, state)?;
                    i = end_false;
                } else {
                    i = end_true;
                }
                continue;
            }
            OpCode::Equal => {
                let x = pop(&mut state.numbers)?.value();
                state.bools.push(x.abs() < constants[code[i + 1]]);
            }
            OpCode::Sup => {
                let x = pop(&mut state.numbers)?.value();
                state.bools.push(x > constants[code[i + 1]]);
            }
            OpCode::SupEqual => {
                let x = pop(&mut state.numbers)?.value();
                state.bools.push(x > -constants[code[i + 1]]);
            }
            OpCode::And => {
                let b = pop(&mut state.bools)?;
                let a = top(&mut state.bools)?;
                *a = *a && b;
            }
            OpCode::Or => {
                let b = pop(&mut state.bools)?;
                let a = top(&mut state.bools)?;
                *a = *a || b;
            }
            OpCode::Not => {
                let a = top(&mut state.bools)?;
                *a = !*a;
            }
            OpCode::True => state.bools.push(true),
            OpCode::False => state.bools.push(false),
            OpCode::Smooth => {
                let eps = pop(&mut state.numbers)?;
                let v_neg = pop(&mut state.numbers)?;
                let v_pos = pop(&mut state.numbers)?;
                let x = top(&mut state.numbers)?;
                *x = smooth(*x, v_pos, v_neg, eps)?;
            }
            OpCode::Sqrt => {
                let x = top(&mut state.numbers)?;
                *x = apply_unary(Func::Sqrt, *x)?;
            }
            OpCode::Log => {
                let x = top(&mut state.numbers)?;
                *x = apply_unary(Func::Log, *x)?;
            }
            OpCode::Exp => {
                let x = top(&mut state.numbers)?;
                *x = Real::exp(*x);
            }
            OpCode::Uminus => {
                let x = top(&mut state.numbers)?;
                *x = -*x;
            }
        }
        i += 1 + op.operands();
    }
    Ok(())
}

/// Evaluator running the compiled streams of a product.
#[derive(Debug)]
pub struct CompiledEvaluator<T> {
    variables: Vec<T>,
    state: VmState<T>,
    payoff_index: usize,
}

impl<T: Real> CompiledEvaluator<T> {
    /// Evaluator with `n_vars` variables, all zero.
    pub fn new(n_vars: usize, payoff_index: usize) -> Self {
        Self {
            variables: vec![T::zero(); n_vars],
            state: VmState::new(),
            payoff_index,
        }
    }
}

impl<T: Real> PayoffEvaluator<T> for CompiledEvaluator<T> {
    fn evaluate(&mut self, product: &ScriptProduct, scenario: &[Sample<T>]) -> ScriptResult<()> {
        check_scenario(product, scenario)?;
        self.variables.fill(T::zero());
        for (event, sample) in product.compiled().iter().zip(scenario) {
            evaluate_compiled(event, sample, &mut self.variables, &mut self.state)?;
        }
        Ok(())
    }

    fn variables(&self) -> &[T] {
        &self.variables
    }

    fn payoff(&self) -> T {
        self.variables[self.payoff_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;
    use pricer_core::types::allocate_path;

    fn product(events: &[(f64, &str)], payoff: &str) -> ScriptProduct {
        events
            .iter()
            .fold(ScriptProduct::builder(), |b, (t, text)| b.event(*t, *text))
            .payoff(payoff)
            .build()
            .unwrap()
    }

    fn run_both(product: &ScriptProduct, spots: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut path = allocate_path::<f64>(product.defline());
        for (sample, &s) in path.iter_mut().zip(spots) {
            sample.spot = s;
        }
        let mut tree: Evaluator<f64> = product.evaluator();
        let mut vm: CompiledEvaluator<f64> = product.compiled_evaluator();
        tree.evaluate(product, &path).unwrap();
        vm.evaluate(product, &path).unwrap();
        (tree.variables().to_vec(), vm.variables().to_vec())
    }

    #[test]
    fn test_vm_matches_tree_on_branches() {
        let p = product(
            &[(
                1.0,
                "IF SPOT() > 100 AND SPOT() <= 120 THEN X = SPOT() - 100 ELSE X = 0 END \
                 IF X != 0 THEN Y PAYS 2 * X END",
            )],
            "Y",
        );
        for spot in [90.0, 100.0, 110.0, 120.0, 130.0] {
            let (tree, vm) = run_both(&p, &[spot]);
            assert_eq!(tree, vm, "spot {}", spot);
        }
    }

    #[test]
    fn test_vm_constant_operands() {
        let p = product(
            &[(1.0, "A = 2 / SPOT() B = 2 ^ (SPOT() / 100) C = MIN(SPOT(), 95, 105) D = 1 - SPOT()")],
            "A",
        );
        let (tree, vm) = run_both(&p, &[100.0]);
        assert_eq!(tree, vm);
        assert_eq!(vm, vec![0.02, 2.0, 95.0, -99.0]);
    }

    #[test]
    fn test_vm_nested_if_else_across_events() {
        let p = product(
            &[
                (0.5, "S1 = SPOT()"),
                (
                    1.0,
                    "IF S1 > 100 THEN IF SPOT() > S1 THEN P PAYS 1 ELSE P PAYS 2 END ELSE P PAYS 3 END",
                ),
            ],
            "P",
        );
        assert_eq!(run_both(&p, &[110.0, 120.0]).1, vec![110.0, 1.0]);
        assert_eq!(run_both(&p, &[110.0, 105.0]).1, vec![110.0, 2.0]);
        assert_eq!(run_both(&p, &[90.0, 120.0]).1, vec![90.0, 3.0]);
    }

    #[test]
    fn test_vm_domain_error() {
        let p = product(&[(1.0, "X = LOG(SPOT() - 100)")], "X");
        let mut path = allocate_path::<f64>(p.defline());
        path[0].spot = 90.0;
        let mut vm: CompiledEvaluator<f64> = p.compiled_evaluator();
        assert!(matches!(
            vm.evaluate(&p, &path),
            Err(ScriptError::Domain { .. })
        ));
    }

    #[test]
    fn test_vm_rejects_short_scenario() {
        let p = product(&[(1.0, "X = SPOT()"), (2.0, "Y = SPOT()")], "Y");
        let path = allocate_path::<f64>(&p.defline()[..1]);
        let mut vm: CompiledEvaluator<f64> = p.compiled_evaluator();
        assert!(matches!(vm.evaluate(&p, &path), Err(ScriptError::Product(_))));
    }
}
