//! Differentiable scalar recorded on a [`Tape`].

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::expr::{Expression, Leaf};
use super::math;
use super::tape::{Edge, NodeId, Tape};

#[derive(Clone, Copy)]
struct Active<'t> {
    tape: &'t RefCell<Tape>,
    node: NodeId,
}

/// Value with an optional link to the tape node that produced it.
///
/// A number without a node is passive: it behaves as a constant and
/// arithmetic on passive numbers records nothing. As soon as one operand is
/// active, each operator records one node on that operand's tape
/// (eager recording). For longer formulas, [`Number::fold`] starts a folded
/// expression that records a single node when materialised with
/// [`Number::from_expr`].
///
/// The tape handle is carried in the number itself, so several tapes can be
/// live at once, one per worker thread.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use pricer_core::aad::{Number, Tape};
///
/// let tape = RefCell::new(Tape::new());
/// let x = Number::new(&tape, 2.0);
/// let y = Number::new(&tape, 3.0);
/// let z = x * y + x.exp();
///
/// z.propagate_to_start();
/// assert!((x.adjoint() - (3.0 + 2.0_f64.exp())).abs() < 1e-12);
/// assert!((y.adjoint() - 2.0).abs() < 1e-12);
/// ```
#[derive(Clone, Copy)]
pub struct Number<'t> {
    value: f64,
    active: Option<Active<'t>>,
}

impl fmt::Debug for Number<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Number")
            .field("value", &self.value)
            .field("node", &self.node())
            .finish()
    }
}

impl<'t> Number<'t> {
    /// Registers `value` as a new input on `tape`.
    pub fn new(tape: &'t RefCell<Tape>, value: f64) -> Self {
        let node = tape.borrow_mut().record_leaf();
        Self {
            value,
            active: Some(Active { tape, node }),
        }
    }

    /// Constant that records nothing.
    #[inline]
    pub const fn passive(value: f64) -> Self {
        Self {
            value,
            active: None,
        }
    }

    /// Materialises a folded expression as one node.
    pub fn from_expr<E: Expression<'t>>(expr: E) -> Self {
        let value = expr.value();
        match expr.tape() {
            None => Self::passive(value),
            Some(tape) => {
                let node = tape
                    .borrow_mut()
                    .record_folded(E::LEAVES, |edges| expr.push_edges(1.0, edges));
                Self {
                    value,
                    active: Some(Active { tape, node }),
                }
            }
        }
    }

    /// Starts a folded expression with this number as its only leaf.
    #[inline]
    pub fn fold(self) -> Leaf<'t> {
        Leaf::new(self)
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Tape node, if active.
    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        self.active.map(|a| a.node)
    }

    /// Tape handle, if active.
    #[inline]
    pub fn tape(&self) -> Option<&'t RefCell<Tape>> {
        self.active.map(|a| a.tape)
    }

    /// Returns true when the number is recorded on a tape.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// First adjoint. Passive numbers report zero.
    pub fn adjoint(&self) -> f64 {
        self.active
            .map_or(0.0, |a| a.tape.borrow().adjoint(a.node))
    }

    /// Overwrites the first adjoint. No effect on passive numbers.
    pub fn set_adjoint(&self, value: f64) {
        if let Some(a) = self.active {
            a.tape.borrow_mut().set_adjoint(a.node, value);
        }
    }

    /// Seeds this number's adjoint with one and propagates to the first node.
    pub fn propagate_to_start(&self) {
        if let Some(a) = self.active {
            let mut tape = a.tape.borrow_mut();
            tape.set_adjoint(a.node, 1.0);
            tape.propagate_to_start(a.node);
        }
    }

    /// Seeds this number's adjoint with one and propagates to the tape's
    /// checkpoint.
    pub fn propagate_to_mark(&self) {
        if let Some(a) = self.active {
            let mut tape = a.tape.borrow_mut();
            tape.set_adjoint(a.node, 1.0);
            tape.propagate_to_mark(a.node);
        }
    }

    #[inline]
    fn unary(self, value: f64, weight: f64) -> Self {
        match self.active {
            None => Self::passive(value),
            Some(a) => {
                let node = a
                    .tape
                    .borrow_mut()
                    .record_node([Edge::new(weight, Some(a.node))]);
                Self {
                    value,
                    active: Some(Active { tape: a.tape, node }),
                }
            }
        }
    }

    #[inline]
    fn binary(lhs: Self, rhs: Self, value: f64, w_lhs: f64, w_rhs: f64) -> Self {
        let tape = match (lhs.active, rhs.active) {
            (None, None) => return Self::passive(value),
            (Some(a), _) | (None, Some(a)) => a.tape,
        };
        debug_assert!(
            rhs.tape().map_or(true, |t| std::ptr::eq(t, tape)),
            "operands recorded on different tapes"
        );
        let node = tape.borrow_mut().record_node([
            Edge::new(w_lhs, lhs.node()),
            Edge::new(w_rhs, rhs.node()),
        ]);
        Self {
            value,
            active: Some(Active { tape, node }),
        }
    }

    /// `e^x`.
    pub fn exp(self) -> Self {
        let v = self.value.exp();
        self.unary(v, v)
    }

    /// Natural logarithm.
    pub fn ln(self) -> Self {
        self.unary(self.value.ln(), 1.0 / self.value)
    }

    /// Square root.
    pub fn sqrt(self) -> Self {
        let v = self.value.sqrt();
        self.unary(v, 0.5 / v)
    }

    /// Absolute value.
    pub fn abs(self) -> Self {
        self.unary(self.value.abs(), math::abs_derivative(self.value))
    }

    /// Standard normal density.
    pub fn normal_pdf(self) -> Self {
        let v = math::normal_pdf(self.value);
        self.unary(v, -self.value * v)
    }

    /// Standard normal distribution.
    pub fn normal_cdf(self) -> Self {
        self.unary(math::normal_cdf(self.value), math::normal_pdf(self.value))
    }

    /// Complementary error function.
    pub fn erfc(self) -> Self {
        self.unary(math::erfc(self.value), math::erfc_derivative(self.value))
    }

    /// `self^exponent`.
    pub fn powf(self, exponent: Self) -> Self {
        let v = self.value.powf(exponent.value);
        let (dx, dy) = math::pow_partials(self.value, exponent.value, v);
        Self::binary(self, exponent, v, dx, dy)
    }

    /// `self^exponent` with a constant exponent.
    pub fn powf_scalar(self, exponent: f64) -> Self {
        let v = self.value.powf(exponent);
        let (dx, _) = math::pow_partials(self.value, exponent, v);
        self.unary(v, dx)
    }

    /// Larger of two numbers. Ties pick `other`.
    pub fn max(self, other: Self) -> Self {
        if self.value > other.value {
            self
        } else {
            other
        }
    }

    /// Smaller of two numbers. Ties pick `other`.
    pub fn min(self, other: Self) -> Self {
        if self.value < other.value {
            self
        } else {
            other
        }
    }
}

impl From<f64> for Number<'_> {
    fn from(value: f64) -> Self {
        Number::passive(value)
    }
}

impl PartialEq for Number<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for Number<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl PartialEq<f64> for Number<'_> {
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

impl PartialOrd<f64> for Number<'_> {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.value.partial_cmp(other)
    }
}

impl<'t> Add for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Number::binary(self, rhs, self.value + rhs.value, 1.0, 1.0)
    }
}

impl<'t> Sub for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Number::binary(self, rhs, self.value - rhs.value, 1.0, -1.0)
    }
}

impl<'t> Mul for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Number::binary(self, rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl<'t> Div for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        let v = self.value / rhs.value;
        Number::binary(self, rhs, v, inv, -v * inv)
    }
}

impl<'t> Neg for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn neg(self) -> Self {
        self.unary(-self.value, -1.0)
    }
}

impl<'t> Add<f64> for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn add(self, rhs: f64) -> Self {
        self.unary(self.value + rhs, 1.0)
    }
}

impl<'t> Sub<f64> for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn sub(self, rhs: f64) -> Self {
        self.unary(self.value - rhs, 1.0)
    }
}

impl<'t> Mul<f64> for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self.unary(self.value * rhs, rhs)
    }
}

impl<'t> Div<f64> for Number<'t> {
    type Output = Number<'t>;
    #[inline]
    fn div(self, rhs: f64) -> Self {
        self.unary(self.value / rhs, 1.0 / rhs)
    }
}

impl<'t> Add<Number<'t>> for f64 {
    type Output = Number<'t>;
    #[inline]
    fn add(self, rhs: Number<'t>) -> Number<'t> {
        rhs + self
    }
}

impl<'t> Sub<Number<'t>> for f64 {
    type Output = Number<'t>;
    #[inline]
    fn sub(self, rhs: Number<'t>) -> Number<'t> {
        rhs.unary(self - rhs.value, -1.0)
    }
}

impl<'t> Mul<Number<'t>> for f64 {
    type Output = Number<'t>;
    #[inline]
    fn mul(self, rhs: Number<'t>) -> Number<'t> {
        rhs * self
    }
}

impl<'t> Div<Number<'t>> for f64 {
    type Output = Number<'t>;
    #[inline]
    fn div(self, rhs: Number<'t>) -> Number<'t> {
        let v = self / rhs.value;
        rhs.unary(v, -v / rhs.value)
    }
}

macro_rules! impl_assign_ops {
    ($($trait:ident, $method:ident, $op:tt);*) => {
        $(
            impl<'t> $trait for Number<'t> {
                #[inline]
                fn $method(&mut self, rhs: Self) {
                    *self = *self $op rhs;
                }
            }

            impl<'t> $trait<f64> for Number<'t> {
                #[inline]
                fn $method(&mut self, rhs: f64) {
                    *self = *self $op rhs;
                }
            }
        )*
    };
}

impl_assign_ops!(
    AddAssign, add_assign, +;
    SubAssign, sub_assign, -;
    MulAssign, mul_assign, *;
    DivAssign, div_assign, /
);
