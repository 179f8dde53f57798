//! Variable indexing.
//!
//! Assigns every variable name a slot in a flat table, in order of first
//! appearance across all events, and writes the slot into each reference.

use std::collections::HashMap;

use crate::ast::{Cond, CondKind, Event, Expr, ExprKind, Statement, VarRef};

#[derive(Default)]
struct VarTable {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl VarTable {
    fn index(&mut self, var: &mut VarRef) {
        let next = self.names.len();
        let index = *self.lookup.entry(var.name.clone()).or_insert(next);
        if index == next {
            self.names.push(var.name.clone());
        }
        var.index = index;
    }

    fn statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Assign(var, expr) | Statement::Pays(var, expr) => {
                self.index(var);
                self.expr(expr);
            }
            Statement::If(block) => {
                self.cond(&mut block.cond);
                block
                    .then
                    .iter_mut()
                    .chain(block.otherwise.iter_mut())
                    .for_each(|s| self.statement(s));
            }
            Statement::Collect(stmts) => stmts.iter_mut().for_each(|s| self.statement(s)),
        }
    }

    fn cond(&mut self, cond: &mut Cond) {
        match &mut cond.kind {
            CondKind::True | CondKind::False => {}
            CondKind::Compare(c) => self.expr(&mut c.arg),
            CondKind::Not(arg) => self.cond(arg),
            CondKind::And(lhs, rhs) | CondKind::Or(lhs, rhs) => {
                self.cond(lhs);
                self.cond(rhs);
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Const(_) | ExprKind::Spot => {}
            ExprKind::Var(var) => self.index(var),
            ExprKind::Neg(arg) | ExprKind::Plus(arg) => self.expr(arg),
            ExprKind::Binary(_, lhs, rhs) => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Func(_, args) => args.iter_mut().for_each(|a| self.expr(a)),
        }
    }
}

/// Indexes all variables and returns the names by slot.
pub fn index_variables(events: &mut [Event]) -> Vec<String> {
    let mut table = VarTable::default();
    for stmt in events.iter_mut().flat_map(|e| e.iter_mut()) {
        table.statement(stmt);
    }
    table.names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_event;
    use std::collections::BTreeMap;

    #[test]
    fn test_first_appearance_order_across_events() {
        let constants = BTreeMap::new();
        let mut events = vec![
            parse_event("B = 1 A = B + C", 0, &constants).unwrap(),
            parse_event("IF A > 0 THEN D PAYS B END", 1, &constants).unwrap(),
        ];
        let names = index_variables(&mut events);
        assert_eq!(names, vec!["B", "A", "C", "D"]);
        match &events[1][0] {
            Statement::If(block) => match &block.then[0] {
                Statement::Pays(var, _) => assert_eq!(var.index, 3),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }
}
