//! Domain analysis of variables and conditions.
//!
//! Walks the events in execution order, tracking a [`Domain`] for every
//! variable. Each comparison is classified as always true, always false or
//! path-dependent; for path-dependent comparisons in fuzzy products the
//! smoothing window is narrowed to the gap around zero when the compared
//! expression takes isolated values.

use tracing::trace;

use super::domain::{Bound, Domain, Interval};
use crate::ast::{BinOp, CompareOp, Comparison, Cond, CondKind, Event, Expr, ExprKind, Func, Statement};
use crate::error::{ScriptError, ScriptResult};
use crate::intrinsics::{apply_binary, apply_unary};

/// Fallback half-width of a discrete fuzzy window.
const DEFAULT_HALF_WINDOW: f64 = 0.5;

/// Variable domains and the fuzzy flag.
#[derive(Debug)]
pub struct DomainProcessor {
    domains: Vec<Domain>,
    fuzzy: bool,
}

impl DomainProcessor {
    /// Every variable starts at `{0}`.
    pub fn new(n_vars: usize, fuzzy: bool) -> Self {
        Self {
            domains: vec![Domain::singleton(0.0); n_vars],
            fuzzy,
        }
    }

    /// Analyses all events, annotating conditions in place.
    ///
    /// # Errors
    /// `Domain` when an intrinsic is applied to an isolated value outside
    /// its domain, `Analysis` for `SMOOTH` of a discrete argument.
    pub fn process(&mut self, events: &mut [Event]) -> ScriptResult<()> {
        for event in events.iter_mut() {
            for stmt in event.iter_mut() {
                self.statement(stmt)?;
            }
        }
        Ok(())
    }

    /// Variable domains after the last event.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    fn statement(&mut self, stmt: &mut Statement) -> ScriptResult<()> {
        match stmt {
            Statement::Assign(var, expr) => {
                self.domains[var.index] = self.expr(expr)?;
            }
            Statement::Pays(var, expr) => {
                let paid = self.expr(expr)?.checked_div(&Domain::non_negative())?;
                self.domains[var.index] = &self.domains[var.index] + &paid;
            }
            Statement::If(block) => {
                self.cond(&mut block.cond)?;
                match block.cond.fixed {
                    Some(true) => self.statements(&mut block.then)?,
                    Some(false) => self.statements(&mut block.otherwise)?,
                    None => {
                        let before: Vec<Domain> =
                            block.affected.iter().map(|&i| self.domains[i].clone()).collect();
                        self.statements(&mut block.then)?;
                        let after_true: Vec<Domain> = block
                            .affected
                            .iter()
                            .zip(before)
                            .map(|(&i, d)| std::mem::replace(&mut self.domains[i], d))
                            .collect();
                        self.statements(&mut block.otherwise)?;
                        for (&i, d) in block.affected.iter().zip(after_true) {
                            self.domains[i] = self.domains[i].union(&d);
                        }
                    }
                }
            }
            Statement::Collect(stmts) => self.statements(stmts)?,
        }
        Ok(())
    }

    fn statements(&mut self, stmts: &mut [Statement]) -> ScriptResult<()> {
        stmts.iter_mut().try_for_each(|s| self.statement(s))
    }

    fn expr(&self, expr: &Expr) -> ScriptResult<Domain> {
        match &expr.kind {
            ExprKind::Const(v) => Ok(Domain::singleton(*v)),
            ExprKind::Var(var) => Ok(self.domains[var.index].clone()),
            ExprKind::Spot => Ok(Domain::real_line()),
            ExprKind::Neg(arg) => Ok(-&self.expr(arg)?),
            ExprKind::Plus(arg) => self.expr(arg),
            ExprKind::Binary(op, lhs, rhs) => {
                let (a, b) = (self.expr(lhs)?, self.expr(rhs)?);
                match op {
                    BinOp::Add => Ok(&a + &b),
                    BinOp::Sub => Ok(&a - &b),
                    BinOp::Mul => Ok(&a * &b),
                    BinOp::Div => a.checked_div(&b),
                    BinOp::Pow => a.apply_func2(
                        &b,
                        |x, y| apply_binary(BinOp::Pow, x, y),
                        Domain::real_line(),
                    ),
                }
            }
            ExprKind::Func(func, args) => self.func(*func, args),
        }
    }

    fn func(&self, func: Func, args: &[Expr]) -> ScriptResult<Domain> {
        match (func, args) {
            (Func::Log, [x]) => self
                .expr(x)?
                .apply_func(|v| apply_unary(Func::Log, v), Domain::real_line()),
            (Func::Sqrt, [x]) => self
                .expr(x)?
                .apply_func(|v| apply_unary(Func::Sqrt, v), Domain::non_negative()),
            (Func::Exp, [x]) => self
                .expr(x)?
                .apply_func(|v| apply_unary(Func::Exp, v), Domain::non_negative()),
            (Func::Min | Func::Max, [first, rest @ ..]) => {
                let mut acc = self.expr(first)?;
                for arg in rest {
                    let d = self.expr(arg)?;
                    acc = if func == Func::Min { acc.min(&d) } else { acc.max(&d) };
                }
                Ok(acc)
            }
            (Func::Smooth, [x, v_pos, v_neg, eps]) => {
                if self.expr(x)?.is_discrete() {
                    return Err(ScriptError::Analysis(
                        "SMOOTH called with discrete x".to_string(),
                    ));
                }
                self.expr(eps)?;
                let (p, n) = (self.expr(v_pos)?, self.expr(v_neg)?);
                let left = min_bound(p.min_bound(), n.min_bound());
                let right = max_bound(p.max_bound(), n.max_bound());
                Ok(Domain::from_interval(Interval::new(left, right)?))
            }
            _ => Err(ScriptError::Arity {
                function: func.name().to_string(),
                got: args.len(),
            }),
        }
    }

    fn cond(&self, cond: &mut Cond) -> ScriptResult<()> {
        cond.fixed = match &mut cond.kind {
            CondKind::True => Some(true),
            CondKind::False => Some(false),
            CondKind::Compare(cmp) => self.comparison(cmp)?,
            CondKind::Not(arg) => {
                self.cond(arg)?;
                arg.fixed.map(|b| !b)
            }
            CondKind::And(lhs, rhs) => {
                self.cond(lhs)?;
                self.cond(rhs)?;
                match (lhs.fixed, rhs.fixed) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            }
            CondKind::Or(lhs, rhs) => {
                self.cond(lhs)?;
                self.cond(rhs)?;
                match (lhs.fixed, rhs.fixed) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }
            }
        };
        Ok(())
    }

    fn comparison(&self, cmp: &mut Comparison) -> ScriptResult<Option<bool>> {
        let d = self.expr(&cmp.arg)?;
        let fixed = match cmp.op {
            CompareOp::Equal => {
                if !d.can_be_zero() {
                    Some(false)
                } else if !d.can_be_non_zero() {
                    Some(true)
                } else {
                    if self.fuzzy {
                        cmp.discrete = d.zero_is_discrete();
                        if cmp.discrete {
                            cmp.rb = d.smallest_pos_lb(true).unwrap_or(DEFAULT_HALF_WINDOW);
                            cmp.lb = d.biggest_neg_rb(true).unwrap_or(-DEFAULT_HALF_WINDOW);
                        }
                    }
                    None
                }
            }
            CompareOp::Sup | CompareOp::SupEqual => {
                let strict = cmp.op == CompareOp::Sup;
                if !d.can_be_positive(strict) {
                    Some(false)
                } else if !d.can_be_negative(!strict) {
                    Some(true)
                } else {
                    if self.fuzzy {
                        self.fuzzy_window(cmp, &d, strict);
                    }
                    None
                }
            }
        };
        trace!(comparison = %cmp.op.name(), domain = %d, ?fixed, "classified comparison");
        Ok(fixed)
    }

    fn fuzzy_window(&self, cmp: &mut Comparison, d: &Domain, strict: bool) {
        let can_be_zero = d.can_be_zero();
        cmp.discrete = !can_be_zero || d.zero_is_discrete();
        if !cmp.discrete {
            return;
        }
        let pos = d.smallest_pos_lb(true).unwrap_or(DEFAULT_HALF_WINDOW);
        let neg = d.biggest_neg_rb(true).unwrap_or(-DEFAULT_HALF_WINDOW);
        let (lb, rb) = if !can_be_zero {
            (neg, pos)
        } else if strict {
            (0.0, pos)
        } else {
            (neg, 0.0)
        };
        cmp.lb = lb;
        cmp.rb = rb;
    }
}

fn min_bound(a: Bound, b: Bound) -> Bound {
    if b.lt(a) {
        b
    } else {
        a
    }
}

fn max_bound(a: Bound, b: Bound) -> Bound {
    if b.gt(a) {
        b
    } else {
        a
    }
}
