//! Abstract syntax tree of payoff scripts.
//!
//! Every pass works on these enums with exhaustive matching. Analysis
//! results are stored on the nodes themselves:
//! - [`Expr::constant`]: value of a constant subtree, set by constant folding
//! - [`Cond::fixed`]: statically known outcome, set by domain analysis
//! - [`Comparison`] `discrete`/`lb`/`rb`: fuzzy smoothing window
//! - [`IfStatement::affected`]: variables written inside the block

use std::fmt;

/// Intrinsic functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    /// Natural logarithm
    Log,
    /// Square root
    Sqrt,
    /// Exponential
    Exp,
    /// Smallest argument
    Min,
    /// Largest argument
    Max,
    /// `SMOOTH(x, vPos, vNeg, eps)`
    Smooth,
}

impl Func {
    /// Looks up an intrinsic by its upper-case name. `SPOT` is handled
    /// separately since it produces [`ExprKind::Spot`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LOG" => Some(Func::Log),
            "SQRT" => Some(Func::Sqrt),
            "EXP" => Some(Func::Exp),
            "MIN" => Some(Func::Min),
            "MAX" => Some(Func::Max),
            "SMOOTH" => Some(Func::Smooth),
            _ => None,
        }
    }

    /// Script name.
    pub fn name(self) -> &'static str {
        match self {
            Func::Log => "LOG",
            Func::Sqrt => "SQRT",
            Func::Exp => "EXP",
            Func::Min => "MIN",
            Func::Max => "MAX",
            Func::Smooth => "SMOOTH",
        }
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Func::Log | Func::Sqrt | Func::Exp => (1, 1),
            Func::Min | Func::Max => (2, 1000),
            Func::Smooth => (4, 4),
        }
    }
}

/// Binary arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `^`
    Pow,
}

impl BinOp {
    /// Name used in functional-form dumps and domain errors.
    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "ADD",
            BinOp::Sub => "SUB",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
            BinOp::Pow => "POW",
        }
    }
}

/// Reference to a script variable.
///
/// `index` is meaningless until the variable indexer has run.
#[derive(Clone, Debug, PartialEq)]
pub struct VarRef {
    /// Upper-case name
    pub name: String,
    /// Slot in the product's variable table
    pub index: usize,
}

impl VarRef {
    /// Unindexed reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: usize::MAX,
        }
    }
}

/// Numeric expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// Node kind and arguments
    pub kind: ExprKind,
    /// Value when the whole subtree is constant
    pub constant: Option<f64>,
}

/// Expression node kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Literal
    Const(f64),
    /// Variable read
    Var(VarRef),
    /// Spot observed at the event date
    Spot,
    /// Unary minus
    Neg(Box<Expr>),
    /// Unary plus
    Plus(Box<Expr>),
    /// Binary arithmetic
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Intrinsic call
    Func(Func, Vec<Expr>),
}

impl Expr {
    /// Wraps a kind with no constant annotation. Literals are constant.
    pub fn new(kind: ExprKind) -> Self {
        let constant = match kind {
            ExprKind::Const(v) => Some(v),
            _ => None,
        };
        Self { kind, constant }
    }

    /// Literal.
    pub fn constant(value: f64) -> Self {
        Self::new(ExprKind::Const(value))
    }

    /// Binary node.
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)))
    }
}

/// Comparison operators after lowering. The argument is always compared
/// against zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// `x = 0`
    Equal,
    /// `x > 0`
    Sup,
    /// `x >= 0`
    SupEqual,
}

impl CompareOp {
    /// Name used in functional-form dumps.
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Equal => "EQUAL",
            CompareOp::Sup => "SUP",
            CompareOp::SupEqual => "SUPEQUAL",
        }
    }
}

/// Elementary comparison of an expression against zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    /// Operator
    pub op: CompareOp,
    /// Compared expression
    pub arg: Expr,
    /// Explicit tolerance from a `;eps` or `:eps` suffix
    pub eps: Option<f64>,
    /// The argument takes isolated values around zero
    pub discrete: bool,
    /// Left edge of the fuzzy window when discrete
    pub lb: f64,
    /// Right edge of the fuzzy window when discrete
    pub rb: f64,
}

impl Comparison {
    /// Comparison with no analysis results.
    pub fn new(op: CompareOp, arg: Expr, eps: Option<f64>) -> Self {
        Self {
            op,
            arg,
            eps,
            discrete: false,
            lb: -0.5,
            rb: 0.5,
        }
    }
}

/// Boolean condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Cond {
    /// Node kind and arguments
    pub kind: CondKind,
    /// Outcome when known statically
    pub fixed: Option<bool>,
}

/// Condition node kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum CondKind {
    /// Always true
    True,
    /// Always false
    False,
    /// Comparison against zero
    Compare(Comparison),
    /// Negation
    Not(Box<Cond>),
    /// Conjunction
    And(Box<Cond>, Box<Cond>),
    /// Disjunction
    Or(Box<Cond>, Box<Cond>),
}

impl Cond {
    /// Wraps a kind. Literal conditions are fixed.
    pub fn new(kind: CondKind) -> Self {
        let fixed = match kind {
            CondKind::True => Some(true),
            CondKind::False => Some(false),
            _ => None,
        };
        Self { kind, fixed }
    }

    /// Comparison node.
    pub fn compare(op: CompareOp, arg: Expr, eps: Option<f64>) -> Self {
        Self::new(CondKind::Compare(Comparison::new(op, arg, eps)))
    }
}

/// `IF` block.
#[derive(Clone, Debug, PartialEq)]
pub struct IfStatement {
    /// Condition
    pub cond: Cond,
    /// Statements run when the condition holds
    pub then: Vec<Statement>,
    /// Statements run otherwise, empty without `ELSE`
    pub otherwise: Vec<Statement>,
    /// Sorted indices of variables written anywhere inside the block
    pub affected: Vec<usize>,
}

/// Script statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `var = expr`
    Assign(VarRef, Expr),
    /// `var PAYS expr`
    Pays(VarRef, Expr),
    /// `IF cond THEN ... [ELSE ...] END`
    If(IfStatement),
    /// Unconditional sequence, left behind when an `IF` collapses
    Collect(Vec<Statement>),
}

/// Statements of one event date.
pub type Event = Vec<Statement>;

fn fmt_number(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    write!(f, "{}", v)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Const(v) => return fmt_number(f, *v),
            ExprKind::Var(var) => write!(f, "{}", var.name)?,
            ExprKind::Spot => f.write_str("SPOT()")?,
            ExprKind::Neg(arg) => write!(f, "NEG({})", arg)?,
            ExprKind::Plus(arg) => write!(f, "PLUS({})", arg)?,
            ExprKind::Binary(op, lhs, rhs) => write!(f, "{}({}, {})", op.name(), lhs, rhs)?,
            ExprKind::Func(func, args) => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")?;
            }
        }
        if let Some(v) = self.constant {
            f.write_str("[=")?;
            fmt_number(f, v)?;
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CondKind::True => f.write_str("TRUE"),
            CondKind::False => f.write_str("FALSE"),
            CondKind::Compare(c) => {
                write!(f, "{}({}", c.op.name(), c.arg)?;
                if let Some(eps) = c.eps {
                    write!(f, "; eps={}", eps)?;
                }
                if c.discrete {
                    write!(f, "; window=[{}, {}]", c.lb, c.rb)?;
                }
                f.write_str(")")
            }
            CondKind::Not(arg) => write!(f, "NOT({})", arg),
            CondKind::And(lhs, rhs) => write!(f, "AND({}, {})", lhs, rhs),
            CondKind::Or(lhs, rhs) => write!(f, "OR({}, {})", lhs, rhs),
        }
    }
}

impl Statement {
    /// Appends the functional form of the statement to `out`, one line per
    /// statement, nested blocks indented by two spaces.
    pub fn describe_into(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        match self {
            Statement::Assign(var, expr) => {
                out.push_str(&format!("{}ASSIGN({}, {})\n", pad, var.name, expr));
            }
            Statement::Pays(var, expr) => {
                out.push_str(&format!("{}PAYS({}, {})\n", pad, var.name, expr));
            }
            Statement::If(block) => {
                let names: Vec<String> = block.affected.iter().map(|i| i.to_string()).collect();
                out.push_str(&format!(
                    "{}IF({}) AFFECTS [{}]\n",
                    pad,
                    block.cond,
                    names.join(", ")
                ));
                for s in &block.then {
                    s.describe_into(out, indent + 2);
                }
                if !block.otherwise.is_empty() {
                    out.push_str(&format!("{}ELSE\n", pad));
                    for s in &block.otherwise {
                        s.describe_into(out, indent + 2);
                    }
                }
                out.push_str(&format!("{}END\n", pad));
            }
            Statement::Collect(stmts) => {
                out.push_str(&format!("{}COLLECT\n", pad));
                for s in stmts {
                    s.describe_into(out, indent + 2);
                }
            }
        }
    }
}
