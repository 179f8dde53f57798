//! Affected-variable sets and nesting depth of `IF` blocks.
//!
//! The fuzzy evaluator and the domain processor both run each branch of an
//! undecided `IF` separately and recombine. They need to know which
//! variables a block can modify, including through nested blocks.

use crate::ast::{Event, Statement};

fn process(stmts: &mut [Statement], depth: usize, max_depth: &mut usize) -> Vec<usize> {
    let mut written = Vec::new();
    for stmt in stmts {
        match stmt {
            Statement::Assign(var, _) | Statement::Pays(var, _) => written.push(var.index),
            Statement::If(block) => {
                *max_depth = (*max_depth).max(depth + 1);
                let mut affected = process(&mut block.then, depth + 1, max_depth);
                affected.extend(process(&mut block.otherwise, depth + 1, max_depth));
                affected.sort_unstable();
                affected.dedup();
                written.extend_from_slice(&affected);
                block.affected = affected;
            }
            Statement::Collect(inner) => written.extend(process(inner, depth, max_depth)),
        }
    }
    written
}

/// Fills [`IfStatement::affected`](crate::ast::IfStatement::affected) and
/// returns the maximum `IF` nesting depth. Requires indexed variables.
pub fn process_ifs(events: &mut [Event]) -> usize {
    let mut max_depth = 0;
    for event in events.iter_mut() {
        process(event, 0, &mut max_depth);
    }
    max_depth
}
