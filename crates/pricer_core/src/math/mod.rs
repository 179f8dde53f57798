//! Mathematical building blocks for payoff evaluation.
//!
//! - `smoothing`: call spread, butterfly and linear-blend kernels used by
//!   fuzzy condition evaluation

pub mod smoothing;
