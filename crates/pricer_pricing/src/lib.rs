//! # Pricer Engine (Layer 3: Simulation)
//!
//! ## Layer 3 Role
//!
//! pricer_pricing runs scripted products through Monte Carlo:
//! - Random streams with deterministic per-path skip-ahead (`rng`)
//! - The model interface and a Black-Scholes model (`mc::model`, `mc::black_scholes`)
//! - The batched, multi-threaded driver with optional adjoint risks (`mc::simulation`)
//!
//! ## Layer Integration
//!
//! - Layer 1 (pricer_core): tape, differentiable numbers, scenario types
//! - Layer 2 (pricer_script): products and their evaluators
//!
//! ## Usage Example
//!
//! ```rust
//! use pricer_pricing::mc::{simulate, BlackScholes, EvaluatorKind, SimulationConfig};
//! use pricer_pricing::rng::PricerRng;
//! use pricer_script::ScriptProduct;
//!
//! let product = ScriptProduct::builder()
//!     .event(1.0, "IF SPOT() > 100 THEN DIGI PAYS 1 END")
//!     .payoff("DIGI")
//!     .build()
//!     .unwrap();
//! let model = BlackScholes::new(100.0, 0.2, 0.0, 0.0).unwrap();
//! let config = SimulationConfig::builder()
//!     .n_paths(1_000)
//!     .evaluator(EvaluatorKind::Compiled)
//!     .build()
//!     .unwrap();
//!
//! let result = simulate(&product, &model, &PricerRng::from_seed(1), &config).unwrap();
//! assert!(result.price > 0.3 && result.price < 0.6);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialisation of configuration enums and results

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod mc;
pub mod rng;

pub use mc::{simulate, BlackScholes, Dupire, SimulationConfig, SimulationError, SimulationResult};
