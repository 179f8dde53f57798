//! Numeric abstraction shared by plain and differentiable scalars.
//!
//! Payoff evaluators, the bytecode VM and simulation models are written once
//! against [`Real`] and instantiated twice:
//! - `f64` for plain valuation
//! - [`Number`] for valuation with adjoint recording
//!
//! All dispatch is static. Instantiating with `Number` is what puts the
//! computation on the tape.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

use crate::aad::{math, Number};

/// Scalar type usable in generic pricing code.
///
/// # Examples
/// ```
/// use pricer_core::traits::Real;
///
/// fn discount<T: Real>(rate: T, time: f64) -> T {
///     (-(rate * time)).exp()
/// }
///
/// let df: f64 = discount(0.05, 1.0);
/// assert!((df - 0.951229).abs() < 1e-5);
/// ```
pub trait Real:
    Copy
    + Debug
    + PartialOrd
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// Constant with no derivative information.
    fn from_f64(value: f64) -> Self;

    /// Plain value.
    fn value(&self) -> f64;

    /// `e^x`.
    fn exp(self) -> Self;

    /// Natural logarithm.
    fn ln(self) -> Self;

    /// Square root.
    fn sqrt(self) -> Self;

    /// Absolute value.
    fn abs(self) -> Self;

    /// `self^exponent`.
    fn powf(self, exponent: Self) -> Self;

    /// Larger of two values.
    fn max(self, other: Self) -> Self;

    /// Smaller of two values.
    fn min(self, other: Self) -> Self;

    /// Standard normal distribution.
    fn normal_cdf(self) -> Self;

    /// Standard normal density.
    fn normal_pdf(self) -> Self;

    /// Complementary error function.
    fn erfc(self) -> Self;

    /// Log-normal update `self * e^(drift + std_dev * z)`.
    ///
    /// Path generation calls this once per time step; `Number` records it
    /// as a single folded node.
    #[inline]
    fn lognormal_step(self, drift: Self, std_dev: Self, z: f64) -> Self {
        self * (drift + std_dev * z).exp()
    }
}

impl Real for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }

    #[inline]
    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        if self > other {
            self
        } else {
            other
        }
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        if self < other {
            self
        } else {
            other
        }
    }

    #[inline]
    fn normal_cdf(self) -> Self {
        math::normal_cdf(self)
    }

    #[inline]
    fn normal_pdf(self) -> Self {
        math::normal_pdf(self)
    }

    #[inline]
    fn erfc(self) -> Self {
        math::erfc(self)
    }
}

impl Zero for Number<'_> {
    fn zero() -> Self {
        Number::passive(0.0)
    }

    fn is_zero(&self) -> bool {
        self.value() == 0.0
    }
}

impl One for Number<'_> {
    fn one() -> Self {
        Number::passive(1.0)
    }
}

impl Real for Number<'_> {
    #[inline]
    fn from_f64(value: f64) -> Self {
        Number::passive(value)
    }

    #[inline]
    fn value(&self) -> f64 {
        Number::value(self)
    }

    #[inline]
    fn exp(self) -> Self {
        Number::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        Number::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        Number::sqrt(self)
    }

    #[inline]
    fn abs(self) -> Self {
        Number::abs(self)
    }

    #[inline]
    fn powf(self, exponent: Self) -> Self {
        Number::powf(self, exponent)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        Number::max(self, other)
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        Number::min(self, other)
    }

    #[inline]
    fn normal_cdf(self) -> Self {
        Number::normal_cdf(self)
    }

    #[inline]
    fn normal_pdf(self) -> Self {
        Number::normal_pdf(self)
    }

    #[inline]
    fn erfc(self) -> Self {
        Number::erfc(self)
    }

    #[inline]
    fn lognormal_step(self, drift: Self, std_dev: Self, z: f64) -> Self {
        use crate::aad::ExpressionExt;
        Number::from_expr(self.fold() * (drift.fold() + std_dev.fold() * z).exp())
    }
}
