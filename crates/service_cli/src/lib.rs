//! scriptmc - command-line pricing of scripted products
//!
//! Loads a product file (script events plus Black-Scholes parameters),
//! resolves the run configuration and drives pricer_pricing.
//!
//! # Commands
//!
//! - `scriptmc price --product <file>` - Price a product, optionally with risks
//! - `scriptmc parse --product <file>` - Dump the analysed and compiled product
//! - `scriptmc check` - Report thread counts and the resolved configuration
//!
//! # Architecture
//!
//! As part of the **S**ervice layer, this crate orchestrates the pricer
//! layers; it holds no pricing logic of its own.

pub mod commands;
pub mod config;
pub mod error;
pub mod product_file;

pub use error::{CliError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
