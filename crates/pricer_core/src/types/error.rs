//! Error types for structured error handling.
//!
//! This module provides:
//! - `AadError`: Errors from checked tape access and tape configuration
//! - `ScenarioError`: Errors from scenario allocation against a timeline

use thiserror::Error;

/// Tape access and configuration errors.
///
/// Hot-path tape operations panic on misuse. These errors are returned by
/// the checked entry points used at API boundaries.
///
/// # Variants
/// - `TapeNotEmpty`: Configuration change attempted after recording started
/// - `InvalidAdjointCount`: Zero adjoints requested, or adjoint index out of range
/// - `NotOnTape`: Node was rewound away
///
/// # Examples
/// ```
/// use pricer_core::types::AadError;
///
/// let err = AadError::InvalidAdjointCount(0);
/// assert_eq!(format!("{}", err), "Invalid adjoint count or index: 0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AadError {
    /// Tape already holds nodes
    #[error("Tape is not empty")]
    TapeNotEmpty,

    /// Adjoint count is zero or the index is out of range
    #[error("Invalid adjoint count or index: {0}")]
    InvalidAdjointCount(usize),

    /// Node no longer on the tape
    #[error("Node is not on the tape")]
    NotOnTape,
}

/// Scenario layout errors.
///
/// # Examples
/// ```
/// use pricer_core::types::ScenarioError;
///
/// let err = ScenarioError::LengthMismatch { expected: 3, actual: 2 };
/// assert_eq!(
///     format!("{}", err),
///     "Scenario length mismatch: expected 3 samples, got 2"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    /// Definition line and scenario lengths differ
    #[error("Scenario length mismatch: expected {expected} samples, got {actual}")]
    LengthMismatch {
        /// Samples in the definition line
        expected: usize,
        /// Samples in the scenario
        actual: usize,
    },

    /// Maturity lies before the event it is attached to
    #[error("Maturity {maturity} precedes event time {time}")]
    MaturityBeforeEvent {
        /// Event time in years
        time: String,
        /// Offending maturity in years
        maturity: String,
    },
}
