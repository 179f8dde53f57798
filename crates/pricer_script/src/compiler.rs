//! Compilation of analysed events to a flat bytecode stream.
//!
//! A [`CompiledEvent`] is a `Vec<usize>` of opcodes interleaved with their
//! operands, plus a constant pool. Operands are variable slots, constant
//! pool indices or absolute jump targets. The stream does not depend on the
//! numeric type that later executes it.
//!
//! | Opcode | Operands | Effect |
//! |--------|----------|--------|
//! | `Const` | `k` | push `constants[k]` |
//! | `Var` | `v` | push variable `v` |
//! | `AddConst`, `SubConst`, ... | `k` | combine top with `constants[k]` |
//! | `Assign` / `AssignConst` | `v` / `v k` | write variable `v` |
//! | `Pays` / `PaysConst` | `v` / `v k` | `v += value / numeraire` |
//! | `Equal`, `Sup`, `SupEqual` | `k` | compare top against tolerance `constants[k]` |
//! | `If` | `end` | jump to `end` when false |
//! | `IfElse` | `end_true end_false` | run `[i+3, end_true)` when true, then jump to `end_false` |

use tracing::debug;

use crate::ast::{BinOp, CompareOp, Cond, CondKind, Event, Expr, ExprKind, Func, Statement};
use crate::intrinsics::{compare, tolerance};

/// Bytecode instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum OpCode {
    /// Pop two, push sum
    Add,
    /// Top plus constant
    AddConst,
    /// Pop two, push difference
    Sub,
    /// Top minus constant
    SubConst,
    /// Constant minus top
    ConstSub,
    /// Pop two, push product
    Mult,
    /// Top times constant
    MultConst,
    /// Pop two, push quotient
    Div,
    /// Top over constant
    DivConst,
    /// Constant over top
    ConstDiv,
    /// Pop two, push power
    Pow,
    /// Top to a constant power
    PowConst,
    /// Constant to the top power
    ConstPow,
    /// Pop two, push maximum
    Max2,
    /// Maximum of top and constant
    Max2Const,
    /// Pop two, push minimum
    Min2,
    /// Minimum of top and constant
    Min2Const,
    /// Push spot
    Spot,
    /// Push variable
    Var,
    /// Push constant
    Const,
    /// Pop into variable
    Assign,
    /// Write constant into variable
    AssignConst,
    /// Pop and pay into variable
    Pays,
    /// Pay constant into variable
    PaysConst,
    /// Conditional without else
    If,
    /// Conditional with else
    IfElse,
    /// Pop, push `|x| < tol`
    Equal,
    /// Pop, push `x > tol`
    Sup,
    /// Pop, push `x > -tol`
    SupEqual,
    /// Pop two booleans, push conjunction
    And,
    /// Pop two booleans, push disjunction
    Or,
    /// Pop four, push `SMOOTH`
    Smooth,
    /// Square root of top
    Sqrt,
    /// Logarithm of top
    Log,
    /// Negate top boolean
    Not,
    /// Negate top
    Uminus,
    /// Exponential of top
    Exp,
    /// Push true
    True,
    /// Push false
    False,
}

impl OpCode {
    /// Every opcode in discriminant order.
    pub const ALL: [OpCode; 39] = [
        OpCode::Add,
        OpCode::AddConst,
        OpCode::Sub,
        OpCode::SubConst,
        OpCode::ConstSub,
        OpCode::Mult,
        OpCode::MultConst,
        OpCode::Div,
        OpCode::DivConst,
        OpCode::ConstDiv,
        OpCode::Pow,
        OpCode::PowConst,
        OpCode::ConstPow,
        OpCode::Max2,
        OpCode::Max2Const,
        OpCode::Min2,
        OpCode::Min2Const,
        OpCode::Spot,
        OpCode::Var,
        OpCode::Const,
        OpCode::Assign,
        OpCode::AssignConst,
        OpCode::Pays,
        OpCode::PaysConst,
        OpCode::If,
        OpCode::IfElse,
        OpCode::Equal,
        OpCode::Sup,
        OpCode::SupEqual,
        OpCode::And,
        OpCode::Or,
        OpCode::Smooth,
        OpCode::Sqrt,
        OpCode::Log,
        OpCode::Not,
        OpCode::Uminus,
        OpCode::Exp,
        OpCode::True,
        OpCode::False,
    ];

    /// Decodes a stream word.
    #[inline]
    pub fn decode(word: usize) -> Option<OpCode> {
        Self::ALL.get(word).copied()
    }

    /// Operand words following the opcode.
    pub fn operands(self) -> usize {
        match self {
            OpCode::AssignConst | OpCode::PaysConst | OpCode::IfElse => 2,
            OpCode::AddConst
            | OpCode::SubConst
            | OpCode::ConstSub
            | OpCode::MultConst
            | OpCode::DivConst
            | OpCode::ConstDiv
            | OpCode::PowConst
            | OpCode::ConstPow
            | OpCode::Max2Const
            | OpCode::Min2Const
            | OpCode::Var
            | OpCode::Const
            | OpCode::Assign
            | OpCode::Pays
            | OpCode::If
            | OpCode::Equal
            | OpCode::Sup
            | OpCode::SupEqual => 1,
            _ => 0,
        }
    }
}

/// Bytecode of one event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledEvent {
    pub(crate) code: Vec<usize>,
    pub(crate) constants: Vec<f64>,
    pub(crate) max_stack: usize,
    pub(crate) max_bool_stack: usize,
}

impl CompiledEvent {
    /// Opcodes and operands.
    pub fn code(&self) -> &[usize] {
        &self.code
    }

    /// Constant pool.
    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    /// Deepest numeric stack reached.
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Deepest boolean stack reached.
    pub fn max_bool_stack(&self) -> usize {
        self.max_bool_stack
    }

    /// Decoded instruction sequence, for inspection.
    pub fn instructions(&self) -> Vec<(OpCode, &[usize])> {
        let mut out = Vec::new();
        let mut i = 0;
        while let Some(op) = self.code.get(i).and_then(|&w| OpCode::decode(w)) {
            let end = (i + 1 + op.operands()).min(self.code.len());
            out.push((op, &self.code[i + 1..end]));
            i = end;
        }
        out
    }
}

#[derive(Default)]
struct Compiler {
    out: CompiledEvent,
    depth: usize,
    bool_depth: usize,
}

impl Compiler {
    fn emit(&mut self, op: OpCode) {
        self.out.code.push(op as usize);
    }

    fn emit_with(&mut self, op: OpCode, operand: usize) {
        self.out.code.push(op as usize);
        self.out.code.push(operand);
    }

    fn constant(&mut self, value: f64) -> usize {
        match self
            .out
            .constants
            .iter()
            .position(|c| c.to_bits() == value.to_bits())
        {
            Some(k) => k,
            None => {
                self.out.constants.push(value);
                self.out.constants.len() - 1
            }
        }
    }

    fn push(&mut self) {
        self.depth += 1;
        self.out.max_stack = self.out.max_stack.max(self.depth);
    }

    fn pop(&mut self, n: usize) {
        self.depth -= n;
    }

    fn push_bool(&mut self) {
        self.bool_depth += 1;
        self.out.max_bool_stack = self.out.max_bool_stack.max(self.bool_depth);
    }

    fn pop_bool(&mut self) {
        self.bool_depth -= 1;
    }

    fn placeholder(&mut self) -> usize {
        self.out.code.push(0);
        self.out.code.len() - 1
    }

    fn patch(&mut self, at: usize) {
        self.out.code[at] = self.out.code.len();
    }

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Assign(var, expr) | Statement::Pays(var, expr) => {
                let (plain, with_const) = match stmt {
                    Statement::Pays(..) => (OpCode::Pays, OpCode::PaysConst),
                    _ => (OpCode::Assign, OpCode::AssignConst),
                };
                match expr.constant {
                    Some(c) => {
                        let k = self.constant(c);
                        self.emit_with(with_const, var.index);
                        self.out.code.push(k);
                    }
                    None => {
                        self.expr(expr);
                        self.emit_with(plain, var.index);
                        self.pop(1);
                    }
                }
            }
            Statement::If(block) => {
                self.cond(&block.cond);
                self.pop_bool();
                if block.otherwise.is_empty() {
                    self.emit(OpCode::If);
                    let end = self.placeholder();
                    block.then.iter().for_each(|s| self.statement(s));
                    self.patch(end);
                } else {
                    self.emit(OpCode::IfElse);
                    let end_true = self.placeholder();
                    let end_false = self.placeholder();
                    block.then.iter().for_each(|s| self.statement(s));
                    self.patch(end_true);
                    block.otherwise.iter().for_each(|s| self.statement(s));
                    self.patch(end_false);
                }
            }
            Statement::Collect(stmts) => stmts.iter().for_each(|s| self.statement(s)),
        }
    }

    fn cond(&mut self, cond: &Cond) {
        if let Some(b) = cond.fixed {
            self.emit(if b { OpCode::True } else { OpCode::False });
            self.push_bool();
            return;
        }
        match &cond.kind {
            CondKind::True => {
                self.emit(OpCode::True);
                self.push_bool();
            }
            CondKind::False => {
                self.emit(OpCode::False);
                self.push_bool();
            }
            CondKind::Compare(c) => {
                let tol = tolerance(c.eps);
                match c.arg.constant {
                    Some(x) => {
                        self.emit(if compare(c.op, x, tol) {
                            OpCode::True
                        } else {
                            OpCode::False
                        });
                    }
                    None => {
                        self.expr(&c.arg);
                        let k = self.constant(tol);
                        let op = match c.op {
                            CompareOp::Equal => OpCode::Equal,
                            CompareOp::Sup => OpCode::Sup,
                            CompareOp::SupEqual => OpCode::SupEqual,
                        };
                        self.emit_with(op, k);
                        self.pop(1);
                    }
                }
                self.push_bool();
            }
            CondKind::Not(arg) => {
                self.cond(arg);
                self.emit(OpCode::Not);
            }
            CondKind::And(lhs, rhs) | CondKind::Or(lhs, rhs) => {
                self.cond(lhs);
                self.cond(rhs);
                self.emit(if matches!(cond.kind, CondKind::And(..)) {
                    OpCode::And
                } else {
                    OpCode::Or
                });
                self.pop_bool();
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        if let Some(c) = expr.constant {
            let k = self.constant(c);
            self.emit_with(OpCode::Const, k);
            self.push();
            return;
        }
        match &expr.kind {
            ExprKind::Const(v) => {
                let k = self.constant(*v);
                self.emit_with(OpCode::Const, k);
                self.push();
            }
            ExprKind::Var(var) => {
                self.emit_with(OpCode::Var, var.index);
                self.push();
            }
            ExprKind::Spot => {
                self.emit(OpCode::Spot);
                self.push();
            }
            ExprKind::Neg(arg) => {
                self.expr(arg);
                self.emit(OpCode::Uminus);
            }
            ExprKind::Plus(arg) => self.expr(arg),
            ExprKind::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
            ExprKind::Func(func, args) => self.func(*func, args),
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) {
        match (lhs.constant, rhs.constant) {
            (_, Some(c)) => {
                self.expr(lhs);
                let k = self.constant(c);
                let code = match op {
                    BinOp::Add => OpCode::AddConst,
                    BinOp::Sub => OpCode::SubConst,
                    BinOp::Mul => OpCode::MultConst,
                    BinOp::Div => OpCode::DivConst,
                    BinOp::Pow => OpCode::PowConst,
                };
                self.emit_with(code, k);
            }
            (Some(c), None) => {
                self.expr(rhs);
                let k = self.constant(c);
                let code = match op {
                    BinOp::Add => OpCode::AddConst,
                    BinOp::Sub => OpCode::ConstSub,
                    BinOp::Mul => OpCode::MultConst,
                    BinOp::Div => OpCode::ConstDiv,
                    BinOp::Pow => OpCode::ConstPow,
                };
                self.emit_with(code, k);
            }
            (None, None) => {
                self.expr(lhs);
                self.expr(rhs);
                self.emit(match op {
                    BinOp::Add => OpCode::Add,
                    BinOp::Sub => OpCode::Sub,
                    BinOp::Mul => OpCode::Mult,
                    BinOp::Div => OpCode::Div,
                    BinOp::Pow => OpCode::Pow,
                });
                self.pop(1);
            }
        }
    }

    fn func(&mut self, func: Func, args: &[Expr]) {
        match func {
            Func::Log | Func::Sqrt | Func::Exp => {
                args.iter().for_each(|a| self.expr(a));
                self.emit(match func {
                    Func::Log => OpCode::Log,
                    Func::Sqrt => OpCode::Sqrt,
                    _ => OpCode::Exp,
                });
            }
            Func::Min | Func::Max => {
                let (plain, with_const) = if func == Func::Max {
                    (OpCode::Max2, OpCode::Max2Const)
                } else {
                    (OpCode::Min2, OpCode::Min2Const)
                };
                let mut args = args.iter();
                if let Some(first) = args.next() {
                    self.expr(first);
                }
                for arg in args {
                    match arg.constant {
                        Some(c) => {
                            let k = self.constant(c);
                            self.emit_with(with_const, k);
                        }
                        None => {
                            self.expr(arg);
                            self.emit(plain);
                            self.pop(1);
                        }
                    }
                }
            }
            Func::Smooth => {
                args.iter().for_each(|a| self.expr(a));
                self.emit(OpCode::Smooth);
                self.pop(3);
            }
        }
    }
}

/// Compiles one analysed event.
pub fn compile_event(event: &Event) -> CompiledEvent {
    let mut compiler = Compiler::default();
    event.iter().for_each(|s| compiler.statement(s));
    debug!(
        words = compiler.out.code.len(),
        constants = compiler.out.constants.len(),
        max_stack = compiler.out.max_stack,
        "compiled event"
    );
    compiler.out
}
