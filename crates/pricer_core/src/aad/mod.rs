//! Reverse-mode adjoint algorithmic differentiation.
//!
//! ## Components
//!
//! - [`Arena`]: block storage with stable positions and mark/rewind
//! - [`Tape`]: recorded nodes, weighted edges and adjoint slots
//! - [`Number`]: differentiable scalar recorded eagerly, one node per operator
//! - [`Expression`]: folded formulas recorded as one node with de-duplicated
//!   leaf edges
//! - [`math`]: scalar intrinsics (`normal_cdf`, `erfc`, ...) and their derivatives
//!
//! ## Threading
//!
//! A tape is single-threaded and is shared by reference through a
//! `RefCell`. Parallel code gives each worker its own tape and reduces the
//! parameter adjoints after the workers finish.
//!
//! ## Usage
//!
//! ```
//! use std::cell::RefCell;
//! use pricer_core::aad::{Number, Tape};
//!
//! let tape = RefCell::new(Tape::new());
//! let spot = Number::new(&tape, 100.0);
//! let vol = Number::new(&tape, 0.2);
//! tape.borrow_mut().mark();
//!
//! let mut total = 0.0;
//! for z in [0.3, -1.1, 0.8] {
//!     tape.borrow_mut().rewind_to_mark();
//!     let s = spot * (vol * z).exp();
//!     total += s.value();
//!     s.propagate_to_mark();
//! }
//! tape.borrow_mut().propagate_mark_to_start();
//! assert!(spot.adjoint() > 0.0);
//! ```

mod arena;
mod expr;
pub mod math;
mod number;
mod tape;

pub use arena::{Arena, Position};
pub use expr::{ops, Binary, BinaryOp, Expression, ExpressionExt, Leaf, Unary, UnaryOp};
pub use number::Number;
pub use tape::{Edge, Node, NodeId, Tape};
