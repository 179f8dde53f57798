//! Smooth approximations for discontinuous payoff building blocks.
//!
//! Digital conditions (`x > 0`, `x = 0`) have zero derivative almost
//! everywhere, which makes their adjoints useless. The kernels here replace
//! them with piecewise-linear ramps of finite width so that sensitivities
//! flow through conditional payoffs.
//!
//! All functions are generic over [`Real`], so the same code runs on `f64`
//! and on tape-recorded numbers. Branch selection uses plain values and only
//! the selected formula is recorded.

use crate::traits::Real;

/// Call spread over a symmetric window: a smooth version of `1{x > 0}`.
///
/// # Mathematical Definition
/// ```text
/// cs(x, ε) = 0                   if x < -ε/2
///          = 1                   if x >  ε/2
///          = (x + ε/2) / ε       otherwise
/// ```
///
/// # Panics
/// Panics if `epsilon <= 0`.
///
/// # Examples
/// ```
/// use pricer_core::math::smoothing::call_spread;
///
/// assert_eq!(call_spread(-1.0_f64, 0.5), 0.0);
/// assert_eq!(call_spread(0.0_f64, 0.5), 0.5);
/// assert_eq!(call_spread(1.0_f64, 0.5), 1.0);
/// ```
#[inline]
pub fn call_spread<T: Real>(x: T, epsilon: f64) -> T {
    assert!(epsilon > 0.0, "epsilon must be positive");
    let half = 0.5 * epsilon;
    let v = x.value();
    if v < -half {
        T::zero()
    } else if v > half {
        T::one()
    } else {
        (x + half) / epsilon
    }
}

/// Call spread over an explicit window `[lb, rb]`.
///
/// # Mathematical Definition
/// ```text
/// cs(x, lb, rb) = 0                     if x < lb
///               = 1                     if x > rb
///               = (x - lb) / (rb - lb)  otherwise
/// ```
///
/// # Panics
/// Panics if `rb <= lb`.
#[inline]
pub fn call_spread_bounds<T: Real>(x: T, lb: f64, rb: f64) -> T {
    assert!(rb > lb, "call spread window must be non-empty");
    let v = x.value();
    if v < lb {
        T::zero()
    } else if v > rb {
        T::one()
    } else {
        (x - lb) / (rb - lb)
    }
}

/// Butterfly over a symmetric window: a smooth version of `1{x = 0}`.
///
/// # Mathematical Definition
/// ```text
/// bf(x, ε) = 0                    if |x| > ε/2
///          = (ε/2 - |x|) / (ε/2)  otherwise
/// ```
///
/// # Panics
/// Panics if `epsilon <= 0`.
///
/// # Examples
/// ```
/// use pricer_core::math::smoothing::butterfly;
///
/// assert_eq!(butterfly(0.0_f64, 1.0), 1.0);
/// assert_eq!(butterfly(0.25_f64, 1.0), 0.5);
/// assert_eq!(butterfly(0.75_f64, 1.0), 0.0);
/// ```
#[inline]
pub fn butterfly<T: Real>(x: T, epsilon: f64) -> T {
    assert!(epsilon > 0.0, "epsilon must be positive");
    let half = 0.5 * epsilon;
    if x.value().abs() > half {
        T::zero()
    } else {
        (-x.abs() + half) / half
    }
}

/// Butterfly over an asymmetric window `[lb, rb]` with `lb <= 0 <= rb`.
///
/// Peaks at one for `x = 0` and reaches zero at both window edges.
#[inline]
pub fn butterfly_bounds<T: Real>(x: T, lb: f64, rb: f64) -> T {
    let v = x.value();
    if v < lb || v > rb {
        T::zero()
    } else if v < 0.0 {
        -(x / lb) + 1.0
    } else if v > 0.0 {
        -(x / rb) + 1.0
    } else {
        T::one()
    }
}

/// Linear blend between two values: a smooth version of
/// `if x > 0 { v_pos } else { v_neg }`.
///
/// # Mathematical Definition
/// ```text
/// s(x, p, n, ε) = n                               if x < -ε/2
///               = p                               if x >  ε/2
///               = n + (p - n) (x + ε/2) / ε       otherwise
/// ```
///
/// # Panics
/// Panics if `epsilon <= 0`.
#[inline]
pub fn smooth_step<T: Real>(x: T, v_pos: T, v_neg: T, epsilon: f64) -> T {
    assert!(epsilon > 0.0, "epsilon must be positive");
    let half = 0.5 * epsilon;
    let v = x.value();
    if v < -half {
        v_neg
    } else if v > half {
        v_pos
    } else {
        v_neg + (v_pos - v_neg) * (0.5 / half) * (x + half)
    }
}
