//! Constant folding.
//!
//! Marks every expression whose value is known at build time and stores
//! that value in [`Expr::constant`](crate::ast::Expr::constant).
//!
//! Variables start as the constant `0`. An unconditional assignment carries
//! the constancy of its right-hand side to the variable. An assignment inside
//! an `IF`, or any `PAYS`, taints the variable: it is never constant again.
//! Values are computed with the same rules as the evaluators, so an operator
//! applied outside its domain fails the build.

use crate::ast::{Cond, CondKind, Event, Expr, ExprKind, Func, Statement};
use crate::error::{ScriptError, ScriptResult};
use crate::intrinsics::{apply_binary, apply_unary, smooth};

struct ConstFolder {
    values: Vec<Option<f64>>,
    tainted: Vec<bool>,
    nesting: usize,
}

impl ConstFolder {
    fn write(&mut self, index: usize, value: Option<f64>, conditional: bool) {
        if conditional || self.tainted[index] {
            self.tainted[index] = true;
            self.values[index] = None;
        } else {
            self.values[index] = value;
        }
    }

    fn statement(&mut self, stmt: &mut Statement) -> ScriptResult<()> {
        match stmt {
            Statement::Assign(var, expr) => {
                let value = self.expr(expr)?;
                self.write(var.index, value, self.nesting > 0);
            }
            Statement::Pays(var, expr) => {
                self.expr(expr)?;
                self.write(var.index, None, true);
            }
            Statement::If(block) => {
                self.cond(&mut block.cond)?;
                self.nesting += 1;
                for s in block.then.iter_mut().chain(block.otherwise.iter_mut()) {
                    self.statement(s)?;
                }
                self.nesting -= 1;
            }
            Statement::Collect(stmts) => {
                for s in stmts.iter_mut() {
                    self.statement(s)?;
                }
            }
        }
        Ok(())
    }

    fn cond(&mut self, cond: &mut Cond) -> ScriptResult<()> {
        match &mut cond.kind {
            CondKind::True | CondKind::False => Ok(()),
            CondKind::Compare(c) => self.expr(&mut c.arg).map(|_| ()),
            CondKind::Not(arg) => self.cond(arg),
            CondKind::And(lhs, rhs) | CondKind::Or(lhs, rhs) => {
                self.cond(lhs)?;
                self.cond(rhs)
            }
        }
    }

    fn expr(&self, expr: &mut Expr) -> ScriptResult<Option<f64>> {
        let value = match &mut expr.kind {
            ExprKind::Const(v) => Some(*v),
            ExprKind::Var(var) => self.values[var.index],
            ExprKind::Spot => None,
            ExprKind::Neg(arg) => self.expr(arg)?.map(|v| -v),
            ExprKind::Plus(arg) => self.expr(arg)?,
            ExprKind::Binary(op, lhs, rhs) => {
                let (a, b) = (self.expr(lhs)?, self.expr(rhs)?);
                match (a, b) {
                    (Some(a), Some(b)) => Some(apply_binary(*op, a, b)?),
                    _ => None,
                }
            }
            ExprKind::Func(func, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    values.push(self.expr(arg)?);
                }
                match values.iter().copied().collect::<Option<Vec<f64>>>() {
                    Some(vs) => Some(fold_func(*func, &vs)?),
                    None => None,
                }
            }
        };
        expr.constant = value;
        Ok(value)
    }
}

fn fold_func(func: Func, args: &[f64]) -> ScriptResult<f64> {
    match (func, args) {
        (Func::Log | Func::Sqrt | Func::Exp, [x]) => apply_unary(func, *x),
        (Func::Min, [first, rest @ ..]) => Ok(rest.iter().fold(*first, |acc, &v| acc.min(v))),
        (Func::Max, [first, rest @ ..]) => Ok(rest.iter().fold(*first, |acc, &v| acc.max(v))),
        (Func::Smooth, [x, p, n, eps]) => smooth(*x, *p, *n, *eps),
        _ => Err(ScriptError::Arity {
            function: func.name().to_string(),
            got: args.len(),
        }),
    }
}

/// Folds constants in place and returns, for every variable, its value
/// after the last event when that value is known.
///
/// # Errors
/// `Domain` when a constant operand lies outside an operator's domain.
pub fn fold_constants(events: &mut [Event], n_vars: usize) -> ScriptResult<Vec<Option<f64>>> {
    let mut folder = ConstFolder {
        values: vec![Some(0.0); n_vars],
        tainted: vec![false; n_vars],
        nesting: 0,
    };
    for stmt in events.iter_mut().flat_map(|e| e.iter_mut()) {
        folder.statement(stmt)?;
    }
    Ok(folder.values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::index_variables;
    use crate::parser::parse_event;
    use std::collections::BTreeMap;

    fn fold(sources: &[&str]) -> ScriptResult<(Vec<Event>, Vec<Option<f64>>)> {
        let constants = BTreeMap::new();
        let mut events = sources
            .iter()
            .enumerate()
            .map(|(i, s)| parse_event(s, i, &constants))
            .collect::<ScriptResult<Vec<_>>>()?;
        let names = index_variables(&mut events);
        let values = fold_constants(&mut events, names.len())?;
        Ok((events, values))
    }

    fn rhs(stmt: &Statement) -> &Expr {
        match stmt {
            Statement::Assign(_, e) | Statement::Pays(_, e) => e,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_top_level_assignments_propagate() {
        let (events, values) = fold(&["A = 2 B = A * 3 + MAX(1, A)", "C = SQRT(B + 1)"]).unwrap();
        assert_eq!(values, vec![Some(2.0), Some(8.0), Some(3.0)]);
        assert_eq!(rhs(&events[1][0]).constant, Some(3.0));
    }

    #[test]
    fn test_unassigned_variables_are_zero() {
        let (_, values) = fold(&["A = B + 1"]).unwrap();
        assert_eq!(values[0], Some(1.0));
    }

    #[test]
    fn test_spot_is_never_constant() {
        let (events, values) = fold(&["A = SPOT() * 0 B = 1"]).unwrap();
        assert_eq!(values[0], None);
        assert_eq!(rhs(&events[0][0]).constant, None);
    }

    #[test]
    fn test_conditional_assignment_taints() {
        let (events, values) = fold(&[
            "A = 1 IF SPOT() > 100 THEN A = 2 END A = 5 B = A",
        ])
        .unwrap();
        assert_eq!(values, vec![None, None]);
        assert_eq!(rhs(&events[0][3]).constant, None);
    }

    #[test]
    fn test_pays_taints() {
        let (_, values) = fold(&["A PAYS 1", "A = 3"]).unwrap();
        assert_eq!(values[0], None);
    }

    #[test]
    fn test_condition_arguments_are_folded() {
        let (events, _) = fold(&["A = 1 IF A + 1 > 0 THEN B = 1 END"]).unwrap();
        match &events[0][1] {
            Statement::If(block) => match &block.cond.kind {
                CondKind::Compare(c) => assert_eq!(c.arg.constant, Some(2.0)),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_constant_outside_domain_fails() {
        assert!(matches!(
            fold(&["A = LOG(0)"]).unwrap_err(),
            ScriptError::Domain { ref function, .. } if function == "LOG"
        ));
        assert!(matches!(
            fold(&["A = 1 / (2 - 2)"]).unwrap_err(),
            ScriptError::Domain { ref function, .. } if function == "/"
        ));
        assert!(fold(&["A = SQRT(-4)"]).is_err());
    }

    #[test]
    fn test_reads_inside_branch_before_write() {
        let (events, _) = fold(&["A = 4 IF SPOT() > 1 THEN B = A A = 1 END"]).unwrap();
        match &events[0][1] {
            Statement::If(block) => assert_eq!(rhs(&block.then[0]).constant, Some(4.0)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
