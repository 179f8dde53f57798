//! Numeric rules of script operators, shared by constant folding, the
//! tree-walking evaluators and the bytecode VM.
//!
//! Keeping them in one place guarantees that a value folded at build time is
//! bit-identical to the value computed at simulation time.

use pricer_core::math::smoothing::smooth_step;
use pricer_core::traits::Real;

use crate::ast::{BinOp, CompareOp, Func};
use crate::error::{ScriptError, ScriptResult};

/// Comparison tolerance when the script gives none.
pub const DEFAULT_TOLERANCE: f64 = 1.0e-12;

/// Applies a binary operator.
///
/// # Errors
/// `Domain` when a division or power produces a non-finite value.
#[inline]
pub fn apply_binary<T: Real>(op: BinOp, lhs: T, rhs: T) -> ScriptResult<T> {
    match op {
        BinOp::Add => Ok(lhs + rhs),
        BinOp::Sub => Ok(lhs - rhs),
        BinOp::Mul => Ok(lhs * rhs),
        BinOp::Div => {
            let r = lhs / rhs;
            if r.value().is_finite() {
                Ok(r)
            } else {
                Err(ScriptError::domain("/", rhs.value()))
            }
        }
        BinOp::Pow => {
            let r = lhs.powf(rhs);
            if r.value().is_finite() {
                Ok(r)
            } else {
                Err(ScriptError::domain("^", lhs.value()))
            }
        }
    }
}

/// Applies a one-argument intrinsic.
///
/// # Errors
/// `Domain` for `LOG` of a non-positive value or `SQRT` of a negative one.
#[inline]
pub fn apply_unary<T: Real>(func: Func, x: T) -> ScriptResult<T> {
    let v = x.value();
    match func {
        Func::Log if v <= 0.0 => Err(ScriptError::domain("LOG", v)),
        Func::Log => Ok(x.ln()),
        Func::Sqrt if v < 0.0 => Err(ScriptError::domain("SQRT", v)),
        Func::Sqrt => Ok(x.sqrt()),
        Func::Exp => Ok(x.exp()),
        Func::Min | Func::Max | Func::Smooth => Err(ScriptError::Arity {
            function: func.name().to_string(),
            got: 1,
        }),
    }
}

/// `SMOOTH(x, vPos, vNeg, eps)`.
///
/// # Errors
/// `Domain` when `eps` is not positive.
#[inline]
pub fn smooth<T: Real>(x: T, v_pos: T, v_neg: T, eps: T) -> ScriptResult<T> {
    let e = eps.value();
    if e > 0.0 {
        Ok(smooth_step(x, v_pos, v_neg, e))
    } else {
        Err(ScriptError::domain("SMOOTH", e))
    }
}

/// Crisp comparison of `x` against zero.
///
/// - `Equal`: `|x| < tol`
/// - `Sup`: `x > tol`
/// - `SupEqual`: `x > -tol`
#[inline]
pub fn compare(op: CompareOp, x: f64, tol: f64) -> bool {
    match op {
        CompareOp::Equal => x.abs() < tol,
        CompareOp::Sup => x > tol,
        CompareOp::SupEqual => x > -tol,
    }
}

/// Tolerance of a comparison.
#[inline]
pub fn tolerance(eps: Option<f64>) -> f64 {
    eps.unwrap_or(DEFAULT_TOLERANCE)
}
