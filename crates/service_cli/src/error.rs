//! CLI error types.

use pricer_pricing::mc::SimulationError;
use pricer_script::ScriptError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by `scriptmc` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Input file does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Command-line argument or product file content is invalid
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Product could not be built
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Simulation failed
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CliError::FileNotFound("product.toml".to_string());
        assert_eq!(err.to_string(), "File not found: product.toml");

        let err: CliError = ScriptError::UnknownVariable("X".to_string()).into();
        assert!(err.to_string().starts_with("Script error"));
    }
}
