//! Collapse of statically decided conditions.
//!
//! Runs after domain analysis. A fixed condition becomes a literal `TRUE` or
//! `FALSE`, and an `IF` whose condition is fixed is replaced by the branch
//! that is always taken, wrapped in a `Collect`.

use crate::ast::{Cond, CondKind, Event, Statement};

fn collapse_cond(cond: &mut Cond) {
    match cond.fixed {
        Some(true) => cond.kind = CondKind::True,
        Some(false) => cond.kind = CondKind::False,
        None => match &mut cond.kind {
            CondKind::True | CondKind::False | CondKind::Compare(_) => {}
            CondKind::Not(arg) => collapse_cond(arg),
            CondKind::And(lhs, rhs) | CondKind::Or(lhs, rhs) => {
                collapse_cond(lhs);
                collapse_cond(rhs);
            }
        },
    }
}

fn collapse_statements(stmts: &mut [Statement]) -> usize {
    stmts.iter_mut().map(collapse_statement).sum()
}

fn collapse_statement(stmt: &mut Statement) -> usize {
    let replacement = match stmt {
        Statement::Assign(..) | Statement::Pays(..) => return 0,
        Statement::Collect(stmts) => return collapse_statements(stmts),
        Statement::If(block) => match block.cond.fixed {
            Some(taken) => {
                let mut body = std::mem::take(if taken {
                    &mut block.then
                } else {
                    &mut block.otherwise
                });
                let nested = collapse_statements(&mut body);
                (Statement::Collect(body), nested + 1)
            }
            None => {
                collapse_cond(&mut block.cond);
                return collapse_statements(&mut block.then) + collapse_statements(&mut block.otherwise);
            }
        },
    };
    *stmt = replacement.0;
    replacement.1
}

/// Collapses fixed conditions in place and returns the number of `IF`
/// blocks removed.
pub fn collapse_constant_conditions(events: &mut [Event]) -> usize {
    events.iter_mut().map(|e| collapse_statements(e)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{index_variables, process_ifs, DomainProcessor};
    use crate::parser::parse_event;
    use std::collections::BTreeMap;

    fn prepare(source: &str) -> Vec<Event> {
        let mut events = vec![parse_event(source, 0, &BTreeMap::new()).unwrap()];
        let names = index_variables(&mut events);
        process_ifs(&mut events);
        DomainProcessor::new(names.len(), false)
            .process(&mut events)
            .unwrap();
        events
    }

    #[test]
    fn test_fixed_if_becomes_taken_branch() {
        let mut events = prepare("X = 1 IF X > 0 THEN Y = 1 ELSE Y = 2 END");
        assert_eq!(collapse_constant_conditions(&mut events), 1);
        match &events[0][1] {
            Statement::Collect(body) => {
                assert_eq!(body.len(), 1);
                let mut out = String::new();
                body[0].describe_into(&mut out, 0);
                assert_eq!(out, "ASSIGN(Y, 1)\n");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fixed_false_without_else_is_empty() {
        let mut events = prepare("X = 1 IF X < 0 THEN Y = 1 END");
        collapse_constant_conditions(&mut events);
        assert_eq!(events[0][1], Statement::Collect(vec![]));
    }

    #[test]
    fn test_fixed_sub_condition_becomes_literal() {
        let mut events = prepare("X = 1 IF X > 0 AND SPOT() > 100 THEN Y = 1 END");
        assert_eq!(collapse_constant_conditions(&mut events), 0);
        match &events[0][1] {
            Statement::If(block) => assert_eq!(block.cond.to_string(), "AND(TRUE, SUP(SUB(SPOT(), 100)))"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
