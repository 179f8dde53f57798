//! Fuzzy evaluation: conditions as degrees of truth.
//!
//! Each comparison evaluates to a number in `[0, 1]` through a call spread
//! (`>`/`>=`) or a butterfly (`=`). When domain analysis found that the
//! compared expression takes isolated values around zero, the kernel spans
//! exactly the gap between them; otherwise it spans `eps` centred on zero.
//!
//! An `IF` with a degree strictly between `0` and `1` runs both branches and
//! blends every affected variable:
//! `var = d * var_true + (1 - d) * var_false`.

use pricer_core::math::smoothing::{butterfly, butterfly_bounds, call_spread, call_spread_bounds};
use pricer_core::traits::Real;
use pricer_core::types::Sample;

use crate::ast::{CompareOp, Comparison, Cond, CondKind, Statement};
use crate::error::{ScriptError, ScriptResult};
use crate::evaluator::{check_scenario, eval_expr, PayoffEvaluator};
use crate::product::ScriptProduct;

/// Degrees within this of `0` or `1` run a single branch.
pub const BRANCH_CUTOFF: f64 = 2.0e-14;

const ONE_MINUS_CUTOFF: f64 = 1.0 - BRANCH_CUTOFF;

/// Saved variable values for one nesting level: before the block, and
/// after its true branch.
type LevelScratch<T> = (Vec<T>, Vec<T>);

/// Tree-walking evaluator with smoothed conditions.
#[derive(Clone, Debug)]
pub struct FuzzyEvaluator<T> {
    variables: Vec<T>,
    payoff_index: usize,
    epsilon: f64,
    levels: Vec<LevelScratch<T>>,
    depth: usize,
}

impl<T: Real> FuzzyEvaluator<T> {
    /// Evaluator with default smoothing width `epsilon` and scratch space
    /// for `max_nested_ifs` levels.
    ///
    /// # Errors
    /// `Product` when `epsilon` is not positive.
    pub fn new(
        n_vars: usize,
        payoff_index: usize,
        max_nested_ifs: usize,
        epsilon: f64,
    ) -> ScriptResult<Self> {
        if !(epsilon > 0.0) {
            return Err(ScriptError::Product(format!(
                "fuzzy epsilon must be positive, got {}",
                epsilon
            )));
        }
        let levels = (0..max_nested_ifs)
            .map(|_| (Vec::with_capacity(n_vars), Vec::with_capacity(n_vars)))
            .collect();
        Ok(Self {
            variables: vec![T::zero(); n_vars],
            payoff_index,
            epsilon,
            levels,
            depth: 0,
        })
    }

    /// Default smoothing width.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn comparison(&self, c: &Comparison, sample: &Sample<T>) -> ScriptResult<T> {
        let x = eval_expr(&c.arg, &self.variables, sample)?;
        let window = c.discrete && c.lb < c.rb;
        let eps = c.eps.filter(|&e| e > 0.0).unwrap_or(self.epsilon);
        Ok(match c.op {
            CompareOp::Equal if window && c.lb <= 0.0 && c.rb >= 0.0 => {
                butterfly_bounds(x, c.lb, c.rb)
            }
            CompareOp::Equal => butterfly(x, eps),
            CompareOp::Sup | CompareOp::SupEqual if window => call_spread_bounds(x, c.lb, c.rb),
            CompareOp::Sup | CompareOp::SupEqual => call_spread(x, eps),
        })
    }

    /// Degree of truth in `[0, 1]`.
    fn degree(&self, cond: &Cond, sample: &Sample<T>) -> ScriptResult<T> {
        if let Some(b) = cond.fixed {
            return Ok(if b { T::one() } else { T::zero() });
        }
        match &cond.kind {
            CondKind::True => Ok(T::one()),
            CondKind::False => Ok(T::zero()),
            CondKind::Compare(c) => self.comparison(c, sample),
            CondKind::Not(arg) => Ok(T::one() - self.degree(arg, sample)?),
            CondKind::And(lhs, rhs) => Ok(self.degree(lhs, sample)? * self.degree(rhs, sample)?),
            CondKind::Or(lhs, rhs) => {
                let (a, b) = (self.degree(lhs, sample)?, self.degree(rhs, sample)?);
                Ok(a + b - a * b)
            }
        }
    }

    fn statements(&mut self, stmts: &[Statement], sample: &Sample<T>) -> ScriptResult<()> {
        stmts.iter().try_for_each(|s| self.statement(s, sample))
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
                let d = self.degree(&block.cond, sample)?;
                let dv = d.value();
                if dv > ONE_MINUS_CUTOFF {
                    self.statements(&block.then, sample)?;
                } else if dv < BRANCH_CUTOFF {
                    self.statements(&block.otherwise, sample)?;
                } else {
                    let level = self.depth;
                    if level >= self.levels.len() {
                        self.levels.resize_with(level + 1, Default::default);
                    }
                    let (mut before, mut after_true) = std::mem::take(&mut self.levels[level]);
                    self.depth += 1;

                    before.clear();
                    before.extend(block.affected.iter().map(|&i| self.variables[i]));
                    self.statements(&block.then, sample)?;

                    after_true.clear();
                    for (&i, &v) in block.affected.iter().zip(&before) {
                        after_true.push(self.variables[i]);
                        self.variables[i] = v;
                    }
                    self.statements(&block.otherwise, sample)?;

                    let not_d = T::one() - d;
                    for (&i, &t) in block.affected.iter().zip(&after_true) {
                        self.variables[i] = d * t + not_d * self.variables[i];
                    }

                    self.depth -= 1;
                    self.levels[level] = (before, after_true);
                }
            }
            Statement::Collect(stmts) => self.statements(stmts, sample)?,
        }
        Ok(())
    }
}

impl<T: Real> PayoffEvaluator<T> for FuzzyEvaluator<T> {
    fn evaluate(&mut self, product: &ScriptProduct, scenario: &[Sample<T>]) -> ScriptResult<()> {
        check_scenario(product, scenario)?;
        self.variables.fill(T::zero());
        self.depth = 0;
        for (event, sample) in product.events().iter().zip(scenario) {
            self.statements(event, sample)?;
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
