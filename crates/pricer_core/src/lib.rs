//! # pricer_core: Differentiation Foundation for Scripted Monte Carlo
//!
//! ## Layer 1 (Foundation) Role
//!
//! pricer_core is the bottom layer of the workspace, providing:
//! - Reverse-mode adjoint differentiation: arena, tape, differentiable numbers
//!   and folded expressions (`aad`)
//! - The numeric abstraction shared by `f64` and tape numbers (`traits::Real`)
//! - Smoothing kernels for fuzzy condition evaluation (`math::smoothing`)
//! - Scenario types exchanged between models and payoffs (`types::scenario`)
//! - Error types: `AadError`, `ScenarioError` (`types::error`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other pricer_* crates, with minimal external dependencies:
//! - num-traits: `Zero`/`One` for generic numeric code
//! - thiserror: Error derivation
//! - serde: Serialisation of scenario definitions (optional)
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::cell::RefCell;
//! use pricer_core::aad::{Number, Tape};
//! use pricer_core::math::smoothing::call_spread;
//! use pricer_core::traits::Real;
//!
//! fn digital<T: Real>(spot: T, strike: f64) -> T {
//!     call_spread(spot - strike, 1.0)
//! }
//!
//! // Plain valuation
//! assert_eq!(digital(100.25_f64, 100.0), 0.75);
//!
//! // Valuation with adjoints
//! let tape = RefCell::new(Tape::new());
//! let spot = Number::new(&tape, 100.25);
//! let v = digital(spot, 100.0);
//! v.propagate_to_start();
//! assert!((spot.adjoint() - 1.0).abs() < 1e-12);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialisation for `SampleDef`

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod aad;
pub mod math;
pub mod traits;
pub mod types;
