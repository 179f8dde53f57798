//! Tree-walking evaluation with crisp conditions.
//!
//! [`Evaluator`] runs the analysed statements directly. Constant subtrees
//! are read from their annotation instead of being recomputed.

use pricer_core::traits::Real;
use pricer_core::types::{check_path, Sample};

use crate::ast::{Cond, CondKind, Expr, ExprKind, Func, Statement};
use crate::error::{ScriptError, ScriptResult};
use crate::intrinsics::{apply_binary, apply_unary, compare, smooth, tolerance};
use crate::product::ScriptProduct;

/// Evaluates a product along one scenario.
///
/// Implemented by the exact, fuzzy and compiled evaluators. Each instance
/// owns its variable array and is reused across paths.
pub trait PayoffEvaluator<T: Real> {
    /// Resets all variables to zero and runs every event against the
    /// matching sample of `scenario`.
    ///
    /// # Errors
    /// `Product` when the scenario does not match the product's event dates,
    /// `Domain` when an operator is evaluated outside its domain.
    fn evaluate(&mut self, product: &ScriptProduct, scenario: &[Sample<T>]) -> ScriptResult<()>;

    /// Variable values after the last evaluation.
    fn variables(&self) -> &[T];

    /// Value of the payoff variable after the last evaluation.
    fn payoff(&self) -> T;
}

pub(crate) fn check_scenario<T>(product: &ScriptProduct, scenario: &[Sample<T>]) -> ScriptResult<()> {
    check_path(product.defline(), scenario).map_err(|e| ScriptError::Product(e.to_string()))
}

/// Value of an expression.
///
/// # Errors
/// `Domain` when an operator is evaluated outside its domain.
pub fn eval_expr<T: Real>(expr: &Expr, variables: &[T], sample: &Sample<T>) -> ScriptResult<T> {
    if let Some(c) = expr.constant {
        return Ok(T::from_f64(c));
    }
    let eval = |e: &Expr| eval_expr(e, variables, sample);
    match &expr.kind {
        ExprKind::Const(v) => Ok(T::from_f64(*v)),
        ExprKind::Var(var) => Ok(variables[var.index]),
        ExprKind::Spot => Ok(sample.spot),
        ExprKind::Neg(arg) => Ok(-eval(arg)?),
        ExprKind::Plus(arg) => eval(arg),
        ExprKind::Binary(op, lhs, rhs) => apply_binary(*op, eval(lhs)?, eval(rhs)?),
        ExprKind::Func(func, args) => match (func, args.as_slice()) {
            (Func::Log | Func::Sqrt | Func::Exp, [x]) => apply_unary(*func, eval(x)?),
            (Func::Min | Func::Max, [first, rest @ ..]) => {
                let mut acc = eval(first)?;
                for arg in rest {
                    let v = eval(arg)?;
                    acc = if *func == Func::Max {
                        Real::max(acc, v)
                    } else {
                        Real::min(acc, v)
                    };
                }
                Ok(acc)
            }
            (Func::Smooth, [x, v_pos, v_neg, eps]) => {
                smooth(eval(x)?, eval(v_pos)?, eval(v_neg)?, eval(eps)?)
            }
            _ => Err(ScriptError::Arity {
                function: func.name().to_string(),
                got: args.len(),
            }),
        },
    }
}

/// Crisp truth value of a condition.
///
/// # Errors
/// Propagates evaluation errors of compared expressions.
pub fn eval_cond<T: Real>(cond: &Cond, variables: &[T], sample: &Sample<T>) -> ScriptResult<bool> {
    if let Some(b) = cond.fixed {
        return Ok(b);
    }
    match &cond.kind {
        CondKind::True => Ok(true),
        CondKind::False => Ok(false),
        CondKind::Compare(c) => {
            let x = eval_expr(&c.arg, variables, sample)?;
            Ok(compare(c.op, x.value(), tolerance(c.eps)))
        }
        CondKind::Not(arg) => Ok(!eval_cond(arg, variables, sample)?),
        // Both operands are evaluated, as in the bytecode
        CondKind::And(lhs, rhs) => {
            let a = eval_cond(lhs, variables, sample)?;
            let b = eval_cond(rhs, variables, sample)?;
            Ok(a && b)
        }
        CondKind::Or(lhs, rhs) => {
            let a = eval_cond(lhs, variables, sample)?;
            let b = eval_cond(rhs, variables, sample)?;
            Ok(a || b)
        }
    }
}

/// Exact tree-walking evaluator.
#[derive(Clone, Debug)]
pub struct Evaluator<T> {
    variables: Vec<T>,
    payoff_index: usize,
}

impl<T: Real> Evaluator<T> {
    /// Evaluator with `n_vars` variables, all zero.
    pub fn new(n_vars: usize, payoff_index: usize) -> Self {
        Self {
            variables: vec![T::zero(); n_vars],
            payoff_index,
        }
    }

    fn statement(&mut self, stmt: &Statement, sample: &Sample<T>) -> ScriptResult<()> {
        match stmt {
            Statement::Assign(var, expr) => {
                self.variables[var.index] = eval_expr(expr, &self.variables, sample)?;
            }
            Statement::Pays(var, expr) => {
                let paid = eval_expr(expr, &self.variables, sample)?;
                self.variables[var.index] += paid / sample.numeraire;
            }
            Statement::If(block) => {
                let branch = if eval_cond(&block.cond, &self.variables, sample)? {
                    &block.then
                } else {
                    &block.otherwise
                };
                for s in branch {
                    self.statement(s, sample)?;
                }
            }
            Statement::Collect(stmts) => {
                for s in stmts {
                    self.statement(s, sample)?;
                }
            }
        }
        Ok(())
    }
}

impl<T: Real> PayoffEvaluator<T> for Evaluator<T> {
    fn evaluate(&mut self, product: &ScriptProduct, scenario: &[Sample<T>]) -> ScriptResult<()> {
        check_scenario(product, scenario)?;
        self.variables.fill(T::zero());
        for (event, sample) in product.events().iter().zip(scenario) {
            for stmt in event {
                self.statement(stmt, sample)?;
            }
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
