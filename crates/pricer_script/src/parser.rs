//! Recursive-descent parser for event text.
//!
//! # Grammar
//!
//! ```text
//! event      := statement*
//! statement  := IF cond THEN statement* [ELSE statement*] (END | ENDIF)
//!             | VAR = expr
//!             | VAR PAYS expr
//! cond       := cond_l2 (OR cond_l2)*
//! cond_l2    := cond_atom (AND cond_atom)*
//! cond_atom  := ( cond ) | expr CMP expr [(; | :) NUMBER]*
//! expr       := expr_l2 ((+ | -) expr_l2)*
//! expr_l2    := expr_l3 ((* | /) expr_l3)*
//! expr_l3    := expr_l4 (^ expr_l4)*
//! expr_l4    := (+ | -) expr_l4 | ( expr ) | NUMBER | VAR | FUNC ( args )
//! ```
//!
//! A parenthesised group at the start of a condition is a sub-condition
//! unless the token after the closing parenthesis is a comparator or an
//! arithmetic operator, in which case it opens an expression.
//!
//! Comparisons are lowered to a comparison of one expression against zero:
//! `a < b` becomes `SUP(b - a)`, `a != b` becomes `NOT(EQUAL(a - b))`.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::ast::{BinOp, CompareOp, Cond, CondKind, Event, Expr, ExprKind, Func, IfStatement, Statement, VarRef};
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::{tokenize, Token};

/// Length of the source excerpt attached to parse errors.
const FRAGMENT_LEN: usize = 24;

/// Parses the text of one event.
///
/// The text is upper-cased first. Names found in `constants` are replaced by
/// their values. Variable references are left unindexed.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use pricer_script::parser::parse_event;
///
/// let event = parse_event("x pays max(spot() - 100, 0)", 0, &BTreeMap::new()).unwrap();
/// assert_eq!(event.len(), 1);
/// ```
pub fn parse_event(source: &str, event: usize, constants: &BTreeMap<String, f64>) -> ScriptResult<Event> {
    let source = source.to_uppercase();
    let tokens = tokenize(&source).map_err(|span| ScriptError::Parse {
        event,
        message: "unrecognised character".to_string(),
        fragment: excerpt(&source, span.start),
    })?;
    let mut parser = Parser {
        source: &source,
        end: tokens.len(),
        tokens,
        pos: 0,
        event,
        constants,
    };
    let mut statements = Vec::new();
    while parser.pos < parser.end {
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

fn excerpt(source: &str, start: usize) -> String {
    let rest = source.get(start..).unwrap_or("");
    let line = rest.lines().next().unwrap_or("");
    line.chars().take(FRAGMENT_LEN).collect::<String>().trim().to_string()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    /// Exclusive limit of the current sub-range
    end: usize,
    event: usize,
    constants: &'a BTreeMap<String, f64>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        if self.pos < self.end {
            self.tokens.get(self.pos).map(|(t, _)| t)
        } else {
            None
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let fragment = match self.tokens.get(self.pos) {
            Some((_, span)) if self.pos < self.end => excerpt(self.source, span.start),
            _ => "end of event".to_string(),
        };
        ScriptError::Parse {
            event: self.event,
            message: message.into(),
            fragment,
        }
    }

    fn expect_more(&self) -> ScriptResult<()> {
        if self.pos < self.end {
            Ok(())
        } else {
            Err(self.error("unexpected end of statement"))
        }
    }

    /// Index of the `)` matching the `(` at the current position.
    fn find_match(&self) -> ScriptResult<usize> {
        let mut opens = 0usize;
        for i in self.pos..self.end {
            match self.tokens[i].0 {
                Token::LParen => opens += 1,
                Token::RParen => {
                    opens -= 1;
                    if opens == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        Err(self.error("opening ( has no matching closing )"))
    }

    /// Runs `f` on the tokens strictly inside the parentheses opening at the
    /// current position and closing at `close`, then moves past `close`.
    fn within<T>(&mut self, close: usize, f: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        let saved = self.end;
        self.advance();
        self.end = close;
        let result = f(self)?;
        if self.pos != close {
            return Err(self.error("unexpected token before )"));
        }
        self.end = saved;
        self.pos = close + 1;
        Ok(result)
    }

    // === Statements ===

    fn statement(&mut self) -> ScriptResult<Statement> {
        match self.peek() {
            Some(Token::If) => self.if_block(),
            Some(Token::Ident(_)) => {
                let var = self.assigned_var()?;
                self.expect_more()?;
                match self.peek() {
                    Some(Token::Eq) => {
                        self.advance();
                        self.expect_more()?;
                        Ok(Statement::Assign(var, self.expr()?))
                    }
                    Some(Token::Pays) => {
                        self.advance();
                        self.expect_more()?;
                        Ok(Statement::Pays(var, self.expr()?))
                    }
                    _ => Err(self.error("statement without an instruction")),
                }
            }
            _ => Err(self.error("statement must start with IF or a variable")),
        }
    }

    fn assigned_var(&mut self) -> ScriptResult<VarRef> {
        let name = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(self.error("expected a variable name")),
        };
        if name == "SPOT" || Func::from_name(&name).is_some() {
            return Err(self.error(format!("Variable name {} conflicts with a keyword", name)));
        }
        if self.constants.contains_key(&name) {
            return Err(self.error(format!("Variable name {} is a product constant", name)));
        }
        self.advance();
        Ok(VarRef::new(name))
    }

    fn if_block(&mut self) -> ScriptResult<Statement> {
        self.advance();
        if self.pos >= self.end {
            return Err(self.error("`IF` is not followed by `THEN`"));
        }
        let cond = self.cond()?;
        if self.peek() != Some(&Token::Then) {
            return Err(self.error("`IF` is not followed by `THEN`"));
        }
        self.advance();

        let mut then = Vec::new();
        while !matches!(self.peek(), None | Some(Token::Else | Token::End | Token::EndIf)) {
            then.push(self.statement()?);
        }
        if self.pos >= self.end {
            return Err(self.error("`IF/THEN` is not followed by `ELSE` or `END`"));
        }

        let mut otherwise = Vec::new();
        if self.peek() == Some(&Token::Else) {
            self.advance();
            while !matches!(self.peek(), None | Some(Token::End | Token::EndIf)) {
                otherwise.push(self.statement()?);
            }
            if self.pos >= self.end {
                return Err(self.error("`IF/THEN/ELSE` is not followed by `END`"));
            }
        }
        self.advance();

        Ok(Statement::If(IfStatement {
            cond,
            then,
            otherwise,
            affected: Vec::new(),
        }))
    }

    // === Conditions ===

    fn cond(&mut self) -> ScriptResult<Cond> {
        let mut lhs = self.cond_l2()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            self.expect_more()?;
            let rhs = self.cond_l2()?;
            lhs = Cond::new(CondKind::Or(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn cond_l2(&mut self) -> ScriptResult<Cond> {
        let mut lhs = self.cond_atom()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            self.expect_more()?;
            let rhs = self.cond_atom()?;
            lhs = Cond::new(CondKind::And(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn cond_atom(&mut self) -> ScriptResult<Cond> {
        if self.peek() == Some(&Token::LParen) {
            let close = self.find_match()?;
            let opens_expression = close + 1 < self.end
                && self
                    .tokens
                    .get(close + 1)
                    .is_some_and(|(t, _)| t.is_comparator() || t.is_arithmetic());
            if !opens_expression {
                return self.within(close, |p| p.cond());
            }
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ScriptResult<Cond> {
        let lhs = self.expr()?;
        self.expect_more()?;
        let comparator = match self.peek() {
            Some(t) if t.is_comparator() => t.clone(),
            _ => return Err(self.error("elementary condition has no valid comparator")),
        };
        self.advance();
        self.expect_more()?;
        let rhs = self.expr()?;
        let eps = self.comparison_options()?;

        let diff = |a: Expr, b: Expr| Expr::binary(BinOp::Sub, a, b);
        Ok(match comparator {
            Token::Eq => Cond::compare(CompareOp::Equal, diff(lhs, rhs), eps),
            Token::NotEq => Cond::new(CondKind::Not(Box::new(Cond::compare(
                CompareOp::Equal,
                diff(lhs, rhs),
                eps,
            )))),
            Token::Gt => Cond::compare(CompareOp::Sup, diff(lhs, rhs), eps),
            Token::Lt => Cond::compare(CompareOp::Sup, diff(rhs, lhs), eps),
            Token::Ge => Cond::compare(CompareOp::SupEqual, diff(lhs, rhs), eps),
            Token::Le => Cond::compare(CompareOp::SupEqual, diff(rhs, lhs), eps),
            _ => return Err(self.error("elementary condition has no valid comparator")),
        })
    }

    /// `;eps` or `:eps` suffixes. The last one wins.
    fn comparison_options(&mut self) -> ScriptResult<Option<f64>> {
        let mut eps = None;
        while matches!(self.peek(), Some(Token::Semicolon | Token::Colon)) {
            self.advance();
            match self.peek() {
                Some(Token::Number(v)) => {
                    eps = Some(*v);
                    self.advance();
                }
                _ => return Err(self.error("comparison option is not a number")),
            }
        }
        Ok(eps)
    }

    // === Expressions ===

    fn expr(&mut self) -> ScriptResult<Expr> {
        let mut lhs = self.expr_l2()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            self.expect_more()?;
            let rhs = self.expr_l2()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn expr_l2(&mut self) -> ScriptResult<Expr> {
        let mut lhs = self.expr_l3()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            self.expect_more()?;
            let rhs = self.expr_l3()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn expr_l3(&mut self) -> ScriptResult<Expr> {
        let mut lhs = self.expr_l4()?;
        while self.peek() == Some(&Token::Caret) {
            self.advance();
            self.expect_more()?;
            let rhs = self.expr_l4()?;
            lhs = Expr::binary(BinOp::Pow, lhs, rhs);
        }
        Ok(lhs)
    }

    fn expr_l4(&mut self) -> ScriptResult<Expr> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.expect_more()?;
                Ok(Expr::new(ExprKind::Plus(Box::new(self.expr_l4()?))))
            }
            Some(Token::Minus) => {
                self.advance();
                self.expect_more()?;
                Ok(Expr::new(ExprKind::Neg(Box::new(self.expr_l4()?))))
            }
            Some(Token::LParen) => {
                let close = self.find_match()?;
                self.within(close, |p| p.expr())
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> ScriptResult<Expr> {
        match self.peek().cloned() {
            Some(Token::Number(v)) => {
                self.advance();
                Ok(Expr::constant(v))
            }
            Some(Token::Ident(name)) => {
                self.advance();
                if name == "SPOT" {
                    let args = self.arguments()?;
                    if !args.is_empty() {
                        return Err(ScriptError::Arity {
                            function: name,
                            got: args.len(),
                        });
                    }
                    return Ok(Expr::new(ExprKind::Spot));
                }
                if let Some(func) = Func::from_name(&name) {
                    let args = self.arguments()?;
                    let (min, max) = func.arity();
                    if args.len() < min || args.len() > max {
                        return Err(ScriptError::Arity {
                            function: name,
                            got: args.len(),
                        });
                    }
                    return Ok(Expr::new(ExprKind::Func(func, args)));
                }
                match self.constants.get(&name) {
                    Some(&v) => Ok(Expr::constant(v)),
                    None => Ok(Expr::new(ExprKind::Var(VarRef::new(name)))),
                }
            }
            Some(t) => Err(self.error(format!("unexpected token `{}`", t))),
            None => Err(self.error("unexpected end of statement")),
        }
    }

    fn arguments(&mut self) -> ScriptResult<Vec<Expr>> {
        if self.peek() != Some(&Token::LParen) {
            return Err(self.error("No opening ( following function name"));
        }
        let close = self.find_match()?;
        self.within(close, |p| {
            let mut args = Vec::new();
            while p.pos < p.end {
                args.push(p.expr()?);
                match p.peek() {
                    None => {}
                    Some(Token::Comma) => {
                        p.advance();
                        p.expect_more()?;
                    }
                    Some(_) => return Err(p.error("Arguments must be separated by commas")),
                }
            }
            Ok(args)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ScriptResult<Event> {
        parse_event(source, 0, &BTreeMap::new())
    }

    fn single_expr(source: &str) -> Expr {
        match parse(source).unwrap().remove(0) {
            Statement::Assign(_, e) => e,
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    fn message(err: ScriptError) -> String {
        match err {
            ScriptError::Parse { message, .. } => message,
            other => other.to_string(),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        let e = single_expr("X = 1 + 2 * 3 ^ 2");
        assert_eq!(e.to_string(), "ADD(1, MUL(2, POW(3, 2)))");
    }

    #[test]
    fn test_power_is_left_associative() {
        assert_eq!(single_expr("X = 2 ^ 3 ^ 2").to_string(), "POW(POW(2, 3), 2)");
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(single_expr("X = -SPOT()").to_string(), "NEG(SPOT())");
        assert_eq!(single_expr("X = +-1").to_string(), "PLUS(NEG(1))");
        assert_eq!(single_expr("X = 2 * -Y").to_string(), "MUL(2, NEG(Y))");
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(single_expr("X = (1 + 2) * 3").to_string(), "MUL(ADD(1, 2), 3)");
    }

    #[test]
    fn test_case_insensitive_names() {
        let event = parse("x pays max(spot() - 100, 0)").unwrap();
        match &event[0] {
            Statement::Pays(var, e) => {
                assert_eq!(var.name, "X");
                assert_eq!(e.to_string(), "MAX(SUB(SPOT(), 100), 0)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_statements_need_no_separator() {
        let event = parse("X = 1 Y = X + 1\nZ PAYS Y").unwrap();
        assert_eq!(event.len(), 3);
    }

    #[test]
    fn test_comparator_lowering() {
        let cases = [
            ("IF A = B THEN X = 1 END", "EQUAL(SUB(A, B))"),
            ("IF A != B THEN X = 1 END", "NOT(EQUAL(SUB(A, B)))"),
            ("IF A > B THEN X = 1 END", "SUP(SUB(A, B))"),
            ("IF A < B THEN X = 1 END", "SUP(SUB(B, A))"),
            ("IF A >= B THEN X = 1 END", "SUPEQUAL(SUB(A, B))"),
            ("IF A <= B THEN X = 1 END", "SUPEQUAL(SUB(B, A))"),
        ];
        for (source, expected) in cases {
            match parse(source).unwrap().remove(0) {
                Statement::If(block) => assert_eq!(block.cond.to_string(), expected),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_comparison_epsilon_suffix() {
        let event = parse("IF SPOT() > 100; 0.5 THEN X = 1 END").unwrap();
        match &event[0] {
            Statement::If(block) => match &block.cond.kind {
                CondKind::Compare(c) => assert_eq!(c.eps, Some(0.5)),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("IF SPOT() > 100 : 0.25 THEN X = 1 ENDIF").is_ok());
    }

    #[test]
    fn test_parenthesised_conditions() {
        let event = parse("IF (SPOT() > 100 AND SPOT() < 120) OR X = 1 THEN Y = 1 END").unwrap();
        match &event[0] {
            Statement::If(block) => assert!(matches!(block.cond.kind, CondKind::Or(_, _))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parenthesised_expression_in_condition() {
        let event = parse("IF (SPOT() - 100) * 2 > 0 THEN Y = 1 END").unwrap();
        match &event[0] {
            Statement::If(block) => {
                assert_eq!(block.cond.to_string(), "SUP(SUB(MUL(SUB(SPOT(), 100), 2), 0))")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_if_else_nesting() {
        let event = parse(
            "IF SPOT() > 100 THEN
                IF SPOT() > 110 THEN X = 2 ELSE X = 1 END
             ELSE
                X = 0
             ENDIF",
        )
        .unwrap();
        match &event[0] {
            Statement::If(block) => {
                assert_eq!(block.then.len(), 1);
                assert_eq!(block.otherwise.len(), 1);
                assert!(matches!(block.then[0], Statement::If(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_constants_are_substituted() {
        let mut constants = BTreeMap::new();
        constants.insert("STRIKE".to_string(), 100.0);
        let event = parse_event("X = SPOT() - strike", 0, &constants).unwrap();
        match &event[0] {
            Statement::Assign(_, e) => assert_eq!(e.to_string(), "SUB(SPOT(), 100)"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_event("STRIKE = 1", 0, &constants).is_err());
    }

    #[test]
    fn test_missing_then() {
        let err = parse("IF SPOT() > 100 X = 1 END").unwrap_err();
        assert_eq!(message(err), "`IF` is not followed by `THEN`");
    }

    #[test]
    fn test_missing_end() {
        let err = parse("IF SPOT() > 100 THEN X = 1").unwrap_err();
        assert_eq!(message(err), "`IF/THEN` is not followed by `ELSE` or `END`");
        let err = parse("IF SPOT() > 100 THEN X = 1 ELSE X = 2").unwrap_err();
        assert_eq!(message(err), "`IF/THEN/ELSE` is not followed by `END`");
    }

    #[test]
    fn test_unmatched_parenthesis() {
        let err = parse("X = (1 + 2").unwrap_err();
        assert_eq!(message(err), "opening ( has no matching closing )");
    }

    #[test]
    fn test_wrong_arity() {
        let err = parse("X = SQRT(1, 2)").unwrap_err();
        assert!(matches!(err, ScriptError::Arity { ref function, got: 2 } if function == "SQRT"));
        assert!(parse("X = MAX(1)").is_err());
        assert!(parse("X = SPOT(1)").is_err());
        assert!(parse("X = SMOOTH(1, 2, 3)").is_err());
    }

    #[test]
    fn test_missing_comma() {
        let err = parse("X = MAX(1 2)").unwrap_err();
        assert_eq!(message(err), "Arguments must be separated by commas");
    }

    #[test]
    fn test_invalid_comparator() {
        let err = parse("IF SPOT() THEN X = 1 END").unwrap_err();
        assert_eq!(message(err), "elementary condition has no valid comparator");
    }

    #[test]
    fn test_statement_without_instruction() {
        let err = parse("X 1").unwrap_err();
        assert_eq!(message(err), "statement without an instruction");
    }

    #[test]
    fn test_unexpected_end_of_statement() {
        let err = parse("X = 1 +").unwrap_err();
        assert_eq!(message(err), "unexpected end of statement");
        match parse("X =").unwrap_err() {
            ScriptError::Parse { fragment, .. } => assert_eq!(fragment, "end of event"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reserved_variable_name() {
        assert!(parse("LOG = 1").is_err());
        assert!(parse("SPOT = 1").is_err());
    }

    #[test]
    fn test_unrecognised_character_fragment() {
        match parse("X = 1 $ 2").unwrap_err() {
            ScriptError::Parse { message, fragment, .. } => {
                assert_eq!(message, "unrecognised character");
                assert_eq!(fragment, "$ 2");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
