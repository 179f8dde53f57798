//! Monte Carlo simulation of scripted products.
//!
//! # Architecture
//!
//! ```text
//! simulate(product, model, rng, config)
//! ├── SimulationConfig   (paths, batching, evaluator, AD mode, threads)
//! ├── ModelPrototype     (BlackScholes, Dupire; lifted per worker)
//! ├── RandomStream       (cloned per worker, repositioned per batch)
//! └── Workers
//!     ├── generate_path()
//!     ├── PayoffEvaluator::evaluate()
//!     └── tape rewind / propagate to mark (reverse mode)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use pricer_pricing::mc::{simulate, AdMode, BlackScholes, SimulationConfig};
//! use pricer_pricing::rng::PricerRng;
//! use pricer_script::ScriptProduct;
//!
//! let product = ScriptProduct::builder()
//!     .event(1.0, "CALL PAYS MAX(SPOT() - 100, 0)")
//!     .payoff("CALL")
//!     .build()
//!     .unwrap();
//! let model = BlackScholes::new(100.0, 0.2, 0.02, 0.0).unwrap();
//! let config = SimulationConfig::builder()
//!     .n_paths(2_000)
//!     .seed(42)
//!     .ad_mode(AdMode::Reverse)
//!     .build()
//!     .unwrap();
//!
//! let result = simulate(&product, &model, &PricerRng::from_seed(42), &config).unwrap();
//! assert!(result.price > 5.0 && result.price < 15.0);
//! assert!(result.risk("spot").unwrap() > 0.0);
//! ```

pub mod black_scholes;
pub mod config;
pub mod dupire;
pub mod error;
pub mod model;
pub mod simulation;

pub use black_scholes::BlackScholes;
pub use config::{
    AdMode, EvaluatorKind, SimulationConfig, SimulationConfigBuilder, DEFAULT_BATCH_SIZE,
    DEFAULT_FUZZY_EPSILON,
};
pub use dupire::Dupire;
pub use error::{ConfigError, ModelError, SimulationError};
pub use model::{Model, ModelPrototype};
pub use simulation::{simulate, Sensitivity, SimulationResult};
