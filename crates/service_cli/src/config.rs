//! Application configuration.
//!
//! Settings come from four sources, highest priority first:
//!
//! 1. command-line arguments;
//! 2. `SCRIPTMC_*` environment variables;
//! 3. a TOML configuration file;
//! 4. defaults.
//!
//! ```toml
//! log_level = "debug"
//! threads = 4
//!
//! [simulation]
//! paths = 100000
//! seed = 7
//! evaluator = "compiled"
//! aad = "reverse"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pricer_pricing::mc::{
    AdMode, ConfigError as SimulationConfigError, EvaluatorKind, SimulationConfig,
    DEFAULT_BATCH_SIZE, DEFAULT_FUZZY_EPSILON,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error(transparent)]
    Simulation(#[from] SimulationConfigError),
}

/// Log levels accepted by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

/// Default simulation settings, the `[simulation]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of paths
    pub paths: usize,
    /// Seed of the random stream
    pub seed: u64,
    /// Paths per batch
    pub batch_size: usize,
    /// Payoff evaluator
    pub evaluator: EvaluatorKind,
    /// Default smoothing width of fuzzy conditions
    pub fuzzy_epsilon: f64,
    /// Adjoint risks on or off
    pub aad: AdMode,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            paths: 10_000,
            seed: 42,
            batch_size: DEFAULT_BATCH_SIZE,
            evaluator: EvaluatorKind::Exact,
            fuzzy_epsilon: DEFAULT_FUZZY_EPSILON,
            aad: AdMode::NoAd,
        }
    }
}

/// Resolved application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log level used when `RUST_LOG` is unset
    pub log_level: LogLevel,
    /// Worker threads; the rayon default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// Simulation defaults
    pub simulation: SimulationSettings,
}

/// Overrides given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Log level override
    pub log_level: Option<String>,
    /// Thread count override
    pub threads: Option<usize>,
    /// Path count override
    pub paths: Option<usize>,
    /// Seed override
    pub seed: Option<u64>,
    /// Evaluator override
    pub evaluator: Option<String>,
    /// AD mode override
    pub aad: Option<String>,
}

fn parse_env<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `SCRIPTMC_*` environment variables over the
    /// defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides every setting for which `lookup` returns a value.
    ///
    /// `lookup` receives the full variable name, e.g. `SCRIPTMC_PATHS`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("SCRIPTMC_LOG_LEVEL") {
            self.log_level = v.parse()?;
        }
        if let Some(v) = lookup("SCRIPTMC_THREADS") {
            self.threads = Some(parse_env("SCRIPTMC_THREADS", &v)?);
        }
        if let Some(v) = lookup("SCRIPTMC_PATHS") {
            self.simulation.paths = parse_env("SCRIPTMC_PATHS", &v)?;
        }
        if let Some(v) = lookup("SCRIPTMC_SEED") {
            self.simulation.seed = parse_env("SCRIPTMC_SEED", &v)?;
        }
        if let Some(v) = lookup("SCRIPTMC_BATCH_SIZE") {
            self.simulation.batch_size = parse_env("SCRIPTMC_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("SCRIPTMC_FUZZY_EPSILON") {
            self.simulation.fuzzy_epsilon = parse_env("SCRIPTMC_FUZZY_EPSILON", &v)?;
        }
        if let Some(v) = lookup("SCRIPTMC_EVALUATOR") {
            self.simulation.evaluator = v.parse()?;
        }
        if let Some(v) = lookup("SCRIPTMC_AAD") {
            self.simulation.aad = v.parse()?;
        }
        Ok(())
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(level) = &cli.log_level {
            self.log_level = level.parse()?;
        }
        if cli.threads.is_some() {
            self.threads = cli.threads;
        }
        if let Some(paths) = cli.paths {
            self.simulation.paths = paths;
        }
        if let Some(seed) = cli.seed {
            self.simulation.seed = seed;
        }
        if let Some(evaluator) = &cli.evaluator {
            self.simulation.evaluator = evaluator.parse()?;
        }
        if let Some(aad) = &cli.aad {
            self.simulation.aad = aad.parse()?;
        }
        Ok(())
    }

    /// Driver configuration for these settings.
    pub fn simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        let s = &self.simulation;
        Ok(SimulationConfig::builder()
            .n_paths(s.paths)
            .seed(s.seed)
            .batch_size(s.batch_size)
            .evaluator(s.evaluator)
            .fuzzy_epsilon(s.fuzzy_epsilon)
            .ad_mode(s.aad)
            .threads(self.threads)
            .build()?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation_config().map(|_| ())
    }
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<AppConfig, ConfigError> {
    build_config_with(cli, |key| std::env::var(key).ok())
}

/// [`build_config`] with an explicit environment lookup.
pub fn build_config_with(
    cli: &CliArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config_file {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    config.apply_env(lookup)?;
    config.merge_with_cli(cli)?;
    config.validate()?;
    Ok(config)
}
