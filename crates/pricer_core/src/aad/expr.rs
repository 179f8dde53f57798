//! Folded expressions.
//!
//! Arithmetic on [`Leaf`], [`Binary`] and [`Unary`] builds a value-carrying
//! expression type instead of recording one tape node per operation. The
//! expression type knows its leaf count at compile time
//! ([`Expression::LEAVES`]), so [`Number::from_expr`] can reserve the exact
//! number of edge slots and record the whole formula as a single node.
//!
//! ```
//! use std::cell::RefCell;
//! use pricer_core::aad::{ExpressionExt, Number, Tape};
//!
//! let tape = RefCell::new(Tape::new());
//! let x = Number::new(&tape, 2.0);
//! let y = Number::new(&tape, 3.0);
//!
//! // One node with edges to x and y.
//! let z = Number::from_expr(x.fold() * y.fold() + x.fold().exp());
//! assert_eq!(tape.borrow().len(), 3);
//!
//! z.propagate_to_start();
//! assert!((y.adjoint() - 2.0).abs() < 1e-12);
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::{Add, Div, Mul, Neg, Sub};

use super::math;
use super::number::Number;
use super::tape::{Edge, Tape};

/// Value-carrying expression over tape leaves.
pub trait Expression<'t>: Copy {
    /// Number of leaves, counting repeats.
    const LEAVES: usize;

    /// Value of the expression.
    fn value(&self) -> f64;

    /// Tape of the first active leaf, if any.
    fn tape(&self) -> Option<&'t RefCell<Tape>>;

    /// Writes `adjoint * ∂self/∂leaf` for every leaf into `edges`, which has
    /// exactly [`Self::LEAVES`] slots.
    fn push_edges(&self, adjoint: f64, edges: &mut [Edge]);
}

/// Binary operator rule.
pub trait BinaryOp: Copy {
    /// Evaluates the operator.
    fn apply(lhs: f64, rhs: f64) -> f64;
    /// Partials with respect to both operands, given the result `v`.
    fn partials(lhs: f64, rhs: f64, v: f64) -> (f64, f64);
}

/// Unary operator rule, possibly holding a scalar operand.
pub trait UnaryOp: Copy {
    /// Evaluates the operator.
    fn apply(&self, x: f64) -> f64;
    /// Derivative at `x`, given the result `v`.
    fn derivative(&self, x: f64, v: f64) -> f64;
}

/// Expression leaf wrapping a [`Number`].
#[derive(Clone, Copy, Debug)]
pub struct Leaf<'t>(Number<'t>);

impl<'t> Leaf<'t> {
    /// Wraps a number.
    #[inline]
    pub fn new(number: Number<'t>) -> Self {
        Self(number)
    }
}

impl<'t> From<Number<'t>> for Leaf<'t> {
    fn from(number: Number<'t>) -> Self {
        Self(number)
    }
}

impl<'t> Expression<'t> for Leaf<'t> {
    const LEAVES: usize = 1;

    #[inline]
    fn value(&self) -> f64 {
        self.0.value()
    }

    #[inline]
    fn tape(&self) -> Option<&'t RefCell<Tape>> {
        self.0.tape()
    }

    #[inline]
    fn push_edges(&self, adjoint: f64, edges: &mut [Edge]) {
        edges[0] = Edge::new(adjoint, self.0.node());
    }
}

/// Binary node of a folded expression.
#[derive(Clone, Copy, Debug)]
pub struct Binary<'t, L, R, O> {
    lhs: L,
    rhs: R,
    value: f64,
    _marker: PhantomData<(&'t (), O)>,
}

impl<'t, L: Expression<'t>, R: Expression<'t>, O: BinaryOp> Binary<'t, L, R, O> {
    /// Combines two expressions.
    #[inline]
    pub fn new(lhs: L, rhs: R) -> Self {
        Self {
            value: O::apply(lhs.value(), rhs.value()),
            lhs,
            rhs,
            _marker: PhantomData,
        }
    }
}

impl<'t, L: Expression<'t>, R: Expression<'t>, O: BinaryOp> Expression<'t>
    for Binary<'t, L, R, O>
{
    const LEAVES: usize = L::LEAVES + R::LEAVES;

    #[inline]
    fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    fn tape(&self) -> Option<&'t RefCell<Tape>> {
        self.lhs.tape().or_else(|| self.rhs.tape())
    }

    #[inline]
    fn push_edges(&self, adjoint: f64, edges: &mut [Edge]) {
        let (dl, dr) = O::partials(self.lhs.value(), self.rhs.value(), self.value);
        let (left, right) = edges.split_at_mut(L::LEAVES);
        self.lhs.push_edges(adjoint * dl, left);
        self.rhs.push_edges(adjoint * dr, right);
    }
}

/// Unary node of a folded expression.
#[derive(Clone, Copy, Debug)]
pub struct Unary<'t, A, O> {
    arg: A,
    op: O,
    value: f64,
    _marker: PhantomData<&'t ()>,
}

impl<'t, A: Expression<'t>, O: UnaryOp> Unary<'t, A, O> {
    /// Applies `op` to `arg`.
    #[inline]
    pub fn new(arg: A, op: O) -> Self {
        Self {
            value: op.apply(arg.value()),
            arg,
            op,
            _marker: PhantomData,
        }
    }
}

impl<'t, A: Expression<'t>, O: UnaryOp> Expression<'t> for Unary<'t, A, O> {
    const LEAVES: usize = A::LEAVES;

    #[inline]
    fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    fn tape(&self) -> Option<&'t RefCell<Tape>> {
        self.arg.tape()
    }

    #[inline]
    fn push_edges(&self, adjoint: f64, edges: &mut [Edge]) {
        let d = self.op.derivative(self.arg.value(), self.value);
        self.arg.push_edges(adjoint * d, edges);
    }
}

/// Operator rules.
pub mod ops {
    use super::{math, BinaryOp, UnaryOp};

    macro_rules! binary_op {
        ($(#[$doc:meta])* $name:ident, |$l:ident, $r:ident| $apply:expr, |$pl:ident, $pr:ident, $v:ident| $partials:expr) => {
            $(#[$doc])*
            #[derive(Clone, Copy, Debug, Default)]
            pub struct $name;

            impl BinaryOp for $name {
                #[inline]
                fn apply($l: f64, $r: f64) -> f64 {
                    $apply
                }
                #[inline]
                #[allow(unused_variables)]
                fn partials($pl: f64, $pr: f64, $v: f64) -> (f64, f64) {
                    $partials
                }
            }
        };
    }

    binary_op!(
        /// `l + r`
        AddOp, |l, r| l + r, |l, r, v| (1.0, 1.0)
    );
    binary_op!(
        /// `l - r`
        SubOp, |l, r| l - r, |l, r, v| (1.0, -1.0)
    );
    binary_op!(
        /// `l * r`
        MulOp, |l, r| l * r, |l, r, v| (r, l)
    );
    binary_op!(
        /// `l / r`
        DivOp, |l, r| l / r, |l, r, v| (1.0 / r, -v / r)
    );
    binary_op!(
        /// `l ^ r`
        PowOp, |l, r| l.powf(r), |l, r, v| math::pow_partials(l, r, v)
    );
    binary_op!(
        /// `max(l, r)`, ties pick `r`
        MaxOp, |l, r| if l > r { l } else { r }, |l, r, v| if l > r { (1.0, 0.0) } else { (0.0, 1.0) }
    );
    binary_op!(
        /// `min(l, r)`, ties pick `r`
        MinOp, |l, r| if l < r { l } else { r }, |l, r, v| if l < r { (1.0, 0.0) } else { (0.0, 1.0) }
    );

    macro_rules! unary_op {
        ($(#[$doc:meta])* $name:ident ( $($field:ident)? ), |$s:ident, $x:ident| $apply:expr, |$ds:ident, $dx:ident, $v:ident| $derivative:expr) => {
            $(#[$doc])*
            #[derive(Clone, Copy, Debug)]
            pub struct $name($(pub $field)?);

            impl UnaryOp for $name {
                #[inline]
                #[allow(unused_variables)]
                fn apply(&self, $x: f64) -> f64 {
                    let $s = self;
                    $apply
                }
                #[inline]
                #[allow(unused_variables)]
                fn derivative(&self, $dx: f64, $v: f64) -> f64 {
                    let $ds = self;
                    $derivative
                }
            }
        };
    }

    unary_op!(
        /// `x + c`
        AddScalar(f64), |s, x| x + s.0, |s, x, v| 1.0
    );
    unary_op!(
        /// `x - c`
        SubScalar(f64), |s, x| x - s.0, |s, x, v| 1.0
    );
    unary_op!(
        /// `c - x`
        ScalarSub(f64), |s, x| s.0 - x, |s, x, v| -1.0
    );
    unary_op!(
        /// `x * c`
        MulScalar(f64), |s, x| x * s.0, |s, x, v| s.0
    );
    unary_op!(
        /// `x / c`
        DivScalar(f64), |s, x| x / s.0, |s, x, v| 1.0 / s.0
    );
    unary_op!(
        /// `c / x`
        ScalarDiv(f64), |s, x| s.0 / x, |s, x, v| -v / x
    );
    unary_op!(
        /// `x ^ c`
        PowScalar(f64), |s, x| x.powf(s.0), |s, x, v| s.0 * x.powf(s.0 - 1.0)
    );
    unary_op!(
        /// `c ^ x`
        ScalarPow(f64), |s, x| s.0.powf(x), |s, x, v| v * s.0.ln()
    );
    unary_op!(
        /// `-x`
        NegOp(), |s, x| -x, |s, x, v| -1.0
    );
    unary_op!(
        /// `e^x`
        ExpOp(), |s, x| x.exp(), |s, x, v| v
    );
    unary_op!(
        /// `ln x`
        LogOp(), |s, x| x.ln(), |s, x, v| 1.0 / x
    );
    unary_op!(
        /// `√x`
        SqrtOp(), |s, x| x.sqrt(), |s, x, v| 0.5 / v
    );
    unary_op!(
        /// `|x|`
        AbsOp(), |s, x| x.abs(), |s, x, v| math::abs_derivative(x)
    );
    unary_op!(
        /// Standard normal density
        NormalDensOp(), |s, x| math::normal_pdf(x), |s, x, v| -x * v
    );
    unary_op!(
        /// Standard normal distribution
        NormalCdfOp(), |s, x| math::normal_cdf(x), |s, x, v| math::normal_pdf(x)
    );
    unary_op!(
        /// Complementary error function
        ErfcOp(), |s, x| math::erfc(x), |s, x, v| math::erfc_derivative(x)
    );
}

use ops::*;

macro_rules! expression_ops {
    ($lt:lifetime, [$($gen:ident),*], $ty:ty) => {
        impl<$lt, $($gen,)* Rhs> Add<Rhs> for $ty
        where
            $ty: Expression<$lt>,
            Rhs: Expression<$lt>,
        {
            type Output = Binary<$lt, $ty, Rhs, AddOp>;
            #[inline]
            fn add(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$lt, $($gen,)* Rhs> Sub<Rhs> for $ty
        where
            $ty: Expression<$lt>,
            Rhs: Expression<$lt>,
        {
            type Output = Binary<$lt, $ty, Rhs, SubOp>;
            #[inline]
            fn sub(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$lt, $($gen,)* Rhs> Mul<Rhs> for $ty
        where
            $ty: Expression<$lt>,
            Rhs: Expression<$lt>,
        {
            type Output = Binary<$lt, $ty, Rhs, MulOp>;
            #[inline]
            fn mul(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$lt, $($gen,)* Rhs> Div<Rhs> for $ty
        where
            $ty: Expression<$lt>,
            Rhs: Expression<$lt>,
        {
            type Output = Binary<$lt, $ty, Rhs, DivOp>;
            #[inline]
            fn div(self, rhs: Rhs) -> Self::Output {
                Binary::new(self, rhs)
            }
        }

        impl<$lt, $($gen),*> Neg for $ty
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, NegOp>;
            #[inline]
            fn neg(self) -> Self::Output {
                Unary::new(self, NegOp())
            }
        }

        impl<$lt, $($gen),*> Add<f64> for $ty
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, AddScalar>;
            #[inline]
            fn add(self, rhs: f64) -> Self::Output {
                Unary::new(self, AddScalar(rhs))
            }
        }

        impl<$lt, $($gen),*> Sub<f64> for $ty
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, SubScalar>;
            #[inline]
            fn sub(self, rhs: f64) -> Self::Output {
                Unary::new(self, SubScalar(rhs))
            }
        }

        impl<$lt, $($gen),*> Mul<f64> for $ty
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, MulScalar>;
            #[inline]
            fn mul(self, rhs: f64) -> Self::Output {
                Unary::new(self, MulScalar(rhs))
            }
        }

        impl<$lt, $($gen),*> Div<f64> for $ty
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, DivScalar>;
            #[inline]
            fn div(self, rhs: f64) -> Self::Output {
                Unary::new(self, DivScalar(rhs))
            }
        }

        impl<$lt, $($gen),*> Add<$ty> for f64
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, AddScalar>;
            #[inline]
            fn add(self, rhs: $ty) -> Self::Output {
                Unary::new(rhs, AddScalar(self))
            }
        }

        impl<$lt, $($gen),*> Sub<$ty> for f64
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, ScalarSub>;
            #[inline]
            fn sub(self, rhs: $ty) -> Self::Output {
                Unary::new(rhs, ScalarSub(self))
            }
        }

        impl<$lt, $($gen),*> Mul<$ty> for f64
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, MulScalar>;
            #[inline]
            fn mul(self, rhs: $ty) -> Self::Output {
                Unary::new(rhs, MulScalar(self))
            }
        }

        impl<$lt, $($gen),*> Div<$ty> for f64
        where
            $ty: Expression<$lt>,
        {
            type Output = Unary<$lt, $ty, ScalarDiv>;
            #[inline]
            fn div(self, rhs: $ty) -> Self::Output {
                Unary::new(rhs, ScalarDiv(self))
            }
        }
    };
}

expression_ops!('t, [], Leaf<'t>);
expression_ops!('t, [L, R, O], Binary<'t, L, R, O>);
expression_ops!('t, [A, O], Unary<'t, A, O>);

/// Intrinsic functions on folded expressions.
pub trait ExpressionExt<'t>: Expression<'t> + Sized {
    /// `e^x`.
    fn exp(self) -> Unary<'t, Self, ExpOp> {
        Unary::new(self, ExpOp())
    }

    /// Natural logarithm.
    fn ln(self) -> Unary<'t, Self, LogOp> {
        Unary::new(self, LogOp())
    }

    /// Square root.
    fn sqrt(self) -> Unary<'t, Self, SqrtOp> {
        Unary::new(self, SqrtOp())
    }

    /// Absolute value.
    fn abs(self) -> Unary<'t, Self, AbsOp> {
        Unary::new(self, AbsOp())
    }

    /// Standard normal density.
    fn normal_pdf(self) -> Unary<'t, Self, NormalDensOp> {
        Unary::new(self, NormalDensOp())
    }

    /// Standard normal distribution.
    fn normal_cdf(self) -> Unary<'t, Self, NormalCdfOp> {
        Unary::new(self, NormalCdfOp())
    }

    /// Complementary error function.
    fn erfc(self) -> Unary<'t, Self, ErfcOp> {
        Unary::new(self, ErfcOp())
    }

    /// `self^c`.
    fn powf_scalar(self, exponent: f64) -> Unary<'t, Self, PowScalar> {
        Unary::new(self, PowScalar(exponent))
    }

    /// `base^self`.
    fn scalar_powf(self, base: f64) -> Unary<'t, Self, ScalarPow> {
        Unary::new(self, ScalarPow(base))
    }

    /// `self^exponent`.
    fn powf<R: Expression<'t>>(self, exponent: R) -> Binary<'t, Self, R, PowOp> {
        Binary::new(self, exponent)
    }

    /// Larger of two expressions.
    fn max<R: Expression<'t>>(self, other: R) -> Binary<'t, Self, R, MaxOp> {
        Binary::new(self, other)
    }

    /// Smaller of two expressions.
    fn min<R: Expression<'t>>(self, other: R) -> Binary<'t, Self, R, MinOp> {
        Binary::new(self, other)
    }

    /// Records the expression as one node.
    fn materialize(self) -> Number<'t> {
        Number::from_expr(self)
    }
}

impl<'t, E: Expression<'t>> ExpressionExt<'t> for E {}
