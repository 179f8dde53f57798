//! Core value types.
//!
//! This module provides:
//! - `scenario`: Per-event market samples produced by a model and consumed by payoffs
//! - `error`: Structured error types for tape access and scenario layout
//!
//! # Re-exports
//!
//! - [`Sample`], [`SampleDef`], [`Scenario`], [`allocate_path`], [`initialize_path`],
//!   [`check_path`] from `scenario`
//! - [`AadError`], [`ScenarioError`] from `error`

pub mod error;
pub mod scenario;

pub use error::{AadError, ScenarioError};
pub use scenario::{allocate_path, check_path, initialize_path, Sample, SampleDef, Scenario};
