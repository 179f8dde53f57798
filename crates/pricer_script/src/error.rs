//! Error types for script construction and evaluation.

use thiserror::Error;

/// Script errors.
///
/// Parse and arity errors surface when a product is built. Domain errors
/// surface either at build time (constant folding, domain analysis) or
/// during evaluation.
///
/// # Examples
/// ```
/// use pricer_script::ScriptError;
///
/// let err = ScriptError::Domain { function: "LOG".to_string(), value: -1.0 };
/// assert_eq!(format!("{}", err), "LOG called outside its domain with -1");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Malformed event text
    #[error("Parse error in event {event}: {message} (at '{fragment}')")]
    Parse {
        /// Event index
        event: usize,
        /// What went wrong
        message: String,
        /// Source text at the failure point
        fragment: String,
    },

    /// Intrinsic called with the wrong number of arguments
    #[error("Function {function}: wrong number of arguments (got {got})")]
    Arity {
        /// Intrinsic name
        function: String,
        /// Arguments supplied
        got: usize,
    },

    /// Variable name not present in any event
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Function evaluated outside its domain
    #[error("{function} called outside its domain with {value}")]
    Domain {
        /// Function or operator name
        function: String,
        /// Offending argument
        value: f64,
    },

    /// Static analysis failure
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Inconsistent product definition
    #[error("Product error: {0}")]
    Product(String),
}

impl ScriptError {
    pub(crate) fn domain(function: &str, value: f64) -> Self {
        Self::Domain {
            function: function.to_string(),
            value,
        }
    }
}

/// Result alias for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;
