//! Monte Carlo simulation configuration.
//!
//! This module provides configuration types and builders for scripted
//! Monte Carlo simulations with optional adjoint differentiation.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Maximum number of simulation paths allowed.
pub const MAX_PATHS: usize = 10_000_000;

/// Maximum number of paths per batch.
pub const MAX_BATCH_SIZE: usize = 1_000_000;

/// Default number of paths per batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Default smoothing width of the fuzzy evaluator.
pub const DEFAULT_FUZZY_EPSILON: f64 = 0.01;

/// Automatic differentiation mode for risk computation.
///
/// - `NoAd`: Plain `f64` valuation
/// - `Reverse`: Every path is recorded on a per-thread tape and the payoff
///   adjoint is propagated back to the model parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AdMode {
    /// No automatic differentiation.
    #[default]
    NoAd,

    /// Reverse mode AD (adjoint accumulation).
    ///
    /// One backward sweep per path yields sensitivities to every model
    /// parameter.
    Reverse,
}

/// Payoff evaluator used on every path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EvaluatorKind {
    /// Tree walking with crisp conditions.
    #[default]
    Exact,
    /// Tree walking with smoothed conditions.
    Fuzzy,
    /// Bytecode with crisp conditions.
    Compiled,
}

impl FromStr for AdMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noad" | "none" | "off" => Ok(AdMode::NoAd),
            "reverse" | "aad" | "on" => Ok(AdMode::Reverse),
            other => Err(ConfigError::InvalidParameter {
                name: "ad_mode",
                value: format!("unknown mode '{}'", other),
            }),
        }
    }
}

impl fmt::Display for AdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdMode::NoAd => "noad",
            AdMode::Reverse => "reverse",
        })
    }
}

impl FromStr for EvaluatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(EvaluatorKind::Exact),
            "fuzzy" => Ok(EvaluatorKind::Fuzzy),
            "compiled" => Ok(EvaluatorKind::Compiled),
            other => Err(ConfigError::InvalidParameter {
                name: "evaluator",
                value: format!("unknown evaluator '{}'", other),
            }),
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvaluatorKind::Exact => "exact",
            EvaluatorKind::Fuzzy => "fuzzy",
            EvaluatorKind::Compiled => "compiled",
        })
    }
}

/// Monte Carlo simulation configuration.
///
/// Immutable configuration specifying simulation parameters.
/// Use [`SimulationConfigBuilder`] to construct instances.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::mc::{AdMode, EvaluatorKind, SimulationConfig};
///
/// let config = SimulationConfig::builder()
///     .n_paths(10_000)
///     .evaluator(EvaluatorKind::Compiled)
///     .ad_mode(AdMode::Reverse)
///     .seed(42)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.n_paths(), 10_000);
/// assert_eq!(config.batch_size(), 8192);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    n_paths: usize,
    seed: u64,
    batch_size: usize,
    evaluator: EvaluatorKind,
    fuzzy_epsilon: f64,
    ad_mode: AdMode,
    threads: Option<usize>,
}

impl SimulationConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    /// Returns the number of simulation paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Returns the seed of the random stream.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the requested batch size.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the payoff evaluator kind.
    #[inline]
    pub fn evaluator(&self) -> EvaluatorKind {
        self.evaluator
    }

    /// Returns the default smoothing width of the fuzzy evaluator.
    #[inline]
    pub fn fuzzy_epsilon(&self) -> f64 {
        self.fuzzy_epsilon
    }

    /// Returns the AD mode.
    #[inline]
    pub fn ad_mode(&self) -> AdMode {
        self.ad_mode
    }

    /// Returns the requested worker count, `None` for the rayon default.
    #[inline]
    pub fn threads(&self) -> Option<usize> {
        self.threads
    }

    /// Worker count: the requested one, or the size of the current rayon
    /// pool.
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(rayon::current_num_threads).max(1)
    }

    /// Paths per batch for `threads` workers: `min(batch_size,
    /// ceil(n_paths / threads))`, so that every worker gets a batch.
    pub fn effective_batch_size(&self, threads: usize) -> usize {
        let per_thread = self.n_paths.div_ceil(threads.max(1));
        self.batch_size.min(per_thread).max(1)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `n_paths` is 0 or greater than 10,000,000
    /// - `batch_size` is 0 or greater than 1,000,000
    /// - `fuzzy_epsilon` is not a positive number
    /// - `threads` is `Some(0)`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_paths == 0 || self.n_paths > MAX_PATHS {
            return Err(ConfigError::InvalidPathCount(self.n_paths));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if !(self.fuzzy_epsilon > 0.0 && self.fuzzy_epsilon.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "fuzzy_epsilon",
                value: format!("{} is not positive", self.fuzzy_epsilon),
            });
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidParameter {
                name: "threads",
                value: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`SimulationConfig`].
///
/// Provides a fluent API with validation at build time.
#[derive(Clone, Debug)]
pub struct SimulationConfigBuilder {
    n_paths: Option<usize>,
    seed: u64,
    batch_size: usize,
    evaluator: EvaluatorKind,
    fuzzy_epsilon: f64,
    ad_mode: AdMode,
    threads: Option<usize>,
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self {
            n_paths: None,
            seed: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            evaluator: EvaluatorKind::default(),
            fuzzy_epsilon: DEFAULT_FUZZY_EPSILON,
            ad_mode: AdMode::default(),
            threads: None,
        }
    }
}

impl SimulationConfigBuilder {
    /// Sets the number of simulation paths, in [1, 10_000_000].
    #[inline]
    pub fn n_paths(mut self, n_paths: usize) -> Self {
        self.n_paths = Some(n_paths);
        self
    }

    /// Sets the seed of the random stream.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of paths per batch, in [1, 1_000_000].
    #[inline]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the payoff evaluator.
    #[inline]
    pub fn evaluator(mut self, evaluator: EvaluatorKind) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Sets the default smoothing width of the fuzzy evaluator.
    #[inline]
    pub fn fuzzy_epsilon(mut self, eps: f64) -> Self {
        self.fuzzy_epsilon = eps;
        self
    }

    /// Sets the AD mode.
    #[inline]
    pub fn ad_mode(mut self, ad_mode: AdMode) -> Self {
        self.ad_mode = ad_mode;
        self
    }

    /// Sets the worker count; `None` uses the rayon default.
    #[inline]
    pub fn threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `n_paths` is not set or any value fails
    /// [`SimulationConfig::validate`].
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let n_paths = self.n_paths.ok_or(ConfigError::InvalidParameter {
            name: "n_paths",
            value: "must be specified".to_string(),
        })?;

        let config = SimulationConfig {
            n_paths,
            seed: self.seed,
            batch_size: self.batch_size,
            evaluator: self.evaluator,
            fuzzy_epsilon: self.fuzzy_epsilon,
            ad_mode: self.ad_mode,
            threads: self.threads,
        };

        config.validate()?;
        Ok(config)
    }
}
