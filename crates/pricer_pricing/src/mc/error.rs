//! Error types for the Monte Carlo driver.
//!
//! This module defines structured error types for configuration validation,
//! model setup and runtime failures of a simulation.

use pricer_core::types::{AadError, ScenarioError};
use pricer_script::ScriptError;
use thiserror::Error;

/// Configuration error for the simulation driver.
///
/// These errors occur at build time when invalid parameters are provided.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Path count outside valid range [1, 10_000_000].
    #[error("Invalid path count {0}: must be in range [1, 10_000_000]")]
    InvalidPathCount(usize),
    /// Batch size outside valid range [1, 1_000_000].
    #[error("Invalid batch size {0}: must be in range [1, 1_000_000]")]
    InvalidBatchSize(usize),
    /// Invalid parameter value with name and description.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the invalid value.
        value: String,
    },
}

/// Model setup and path generation errors.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ModelError {
    /// Parameter outside its admissible range.
    #[error("Invalid model parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        /// Parameter label.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// Admissible range.
        reason: &'static str,
    },
    /// Event times are negative or not increasing.
    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),
    /// Gaussian buffer does not match the simulation dimension.
    #[error("Gaussian buffer has {actual} values, model needs {expected}")]
    DimensionMismatch {
        /// Simulation dimension.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },
    /// Path generated before `init`.
    #[error("Model is not initialised for a timeline")]
    NotInitialised,
    /// Product observables the model cannot supply.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// Any failure of a simulation run. No partial result is returned.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SimulationError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Model setup or path generation failed.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Payoff evaluation failed.
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// Tape configuration failed.
    #[error(transparent)]
    Tape(#[from] AadError),
    /// Worker pool could not be created.
    #[error("Thread pool: {0}")]
    ThreadPool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidPathCount(0);
        assert!(err.to_string().contains("Invalid path count 0"));

        let err = ConfigError::InvalidBatchSize(2_000_000);
        assert!(err.to_string().contains("Invalid batch size 2000000"));

        let err = ConfigError::InvalidParameter {
            name: "fuzzy_epsilon",
            value: "must be positive".to_string(),
        };
        assert!(err.to_string().contains("fuzzy_epsilon"));
    }

    #[test]
    fn test_simulation_error_from() {
        let err: SimulationError = ScriptError::UnknownVariable("X".to_string()).into();
        assert!(matches!(err, SimulationError::Script(_)));

        let err: SimulationError = ModelError::NotInitialised.into();
        assert_eq!(err.to_string(), "Model is not initialised for a timeline");
    }
}
