//! CLI command implementations
//!
//! Each submodule implements a specific CLI command and returns the text to
//! print.

pub mod check;
pub mod parse;
pub mod price;

pub use price::{OutputFormat, PriceReport};
