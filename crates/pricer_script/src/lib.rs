//! # pricer_script: Payoff Scripting Language
//!
//! ## Layer 2 Role
//!
//! pricer_script turns payoff scripts into products that a Monte Carlo
//! driver can evaluate along simulated scenarios:
//! - Lexing and parsing of event scripts (`lexer`, `parser`, `ast`)
//! - Analysis passes: variable indexing, `IF` nesting, domain analysis,
//!   constant condition collapse and constant folding (`analysis`)
//! - Compilation to bytecode and a stack machine (`compiler`, `vm`)
//! - Exact, fuzzy and compiled evaluators behind one trait (`evaluator`,
//!   `fuzzy`)
//! - Product assembly, event schedules and declarative definitions
//!   (`product`, `schedule`, `definition`)
//!
//! Every evaluator is generic over [`pricer_core::traits::Real`], so the
//! same product values a path in `f64` or records it on an adjoint tape.
//!
//! ## Script Language
//!
//! ```text
//! IF SPOT() > STRIKE THEN
//!     OPT PAYS SPOT() - STRIKE
//! END
//! ```
//!
//! - Statements: `var = expr`, `var PAYS expr`, `IF cond THEN ... [ELSE ...] END`
//! - Expressions: `+ - * / ^`, unary `+ -`, `SPOT()`, `LOG`, `SQRT`, `EXP`,
//!   `MIN`, `MAX`, `SMOOTH(x, v_pos, v_neg, eps)`
//! - Conditions: `= != < > <= >=` with optional `;eps`, combined with `AND`, `OR`
//! - Scripts are case-insensitive
//!
//! ## Usage Examples
//!
//! ```rust
//! use pricer_core::types::allocate_path;
//! use pricer_script::{PayoffEvaluator, ScriptProduct};
//!
//! let product = ScriptProduct::builder()
//!     .event(1.0, "IF SPOT() > 100 THEN OPT PAYS SPOT() - 100 END")
//!     .payoff("OPT")
//!     .build()
//!     .unwrap();
//!
//! let mut path = allocate_path::<f64>(product.defline());
//! path[0].spot = 110.0;
//!
//! let mut evaluator = product.compiled_evaluator::<f64>();
//! evaluator.evaluate(&product, &path).unwrap();
//! assert_eq!(evaluator.payoff(), 10.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable deserialisation of `ProductDefinition`

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod analysis;
pub mod ast;
pub mod compiler;
pub mod definition;
pub mod error;
pub mod evaluator;
pub mod fuzzy;
pub mod intrinsics;
pub mod lexer;
pub mod parser;
pub mod product;
pub mod schedule;
pub mod vm;

pub use compiler::{compile_event, CompiledEvent, OpCode};
pub use definition::{EventDefinition, ProductDefinition};
pub use error::{ScriptError, ScriptResult};
pub use evaluator::{Evaluator, PayoffEvaluator};
pub use fuzzy::FuzzyEvaluator;
pub use product::{ScriptProduct, ScriptProductBuilder};
pub use schedule::{Fixing, Schedule, Tenor};
pub use vm::{CompiledEvaluator, VmState};
