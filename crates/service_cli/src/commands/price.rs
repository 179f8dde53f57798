//! Price command implementation
//!
//! Prices a product file with the pricer_pricing driver.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use pricer_pricing::mc::{simulate, EvaluatorKind, Sensitivity, SimulationResult};
use pricer_pricing::rng::PricerRng;
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::product_file::{PricingModel, ProductFile};
use crate::{CliError, Result};

/// Output format of the price command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON document
    Json,
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(CliError::InvalidArgument(format!(
                "Unknown format: {}. Supported: table, json",
                other
            ))),
        }
    }
}

/// Priced product as reported to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceReport {
    /// Monte Carlo price
    pub price: f64,
    /// Standard error of the price
    pub std_error: f64,
    /// Half-width of the 95% confidence interval
    pub confidence_95: f64,
    /// Paths simulated
    pub paths: usize,
    /// Batches the paths were split into
    pub batches: usize,
    /// Workers that ran
    pub workers: usize,
    /// Evaluator used
    pub evaluator: String,
    /// AD mode used
    pub aad: String,
    /// Parameter sensitivities
    pub risks: Vec<Sensitivity>,
}

impl PriceReport {
    fn new(result: SimulationResult, config: &AppConfig) -> Self {
        Self {
            price: result.price,
            std_error: result.std_error,
            confidence_95: result.confidence_95(),
            paths: result.paths,
            batches: result.batches,
            workers: result.workers,
            evaluator: config.simulation.evaluator.to_string(),
            aad: config.simulation.aad.to_string(),
            risks: result.risks,
        }
    }

    fn to_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "┌────────────────┬──────────────────┐");
        let _ = writeln!(out, "│ {:<14} │ {:>16.6} │", "Price", self.price);
        let _ = writeln!(out, "│ {:<14} │ {:>16.6} │", "Std error", self.std_error);
        let _ = writeln!(out, "│ {:<14} │ {:>16.6} │", "95% half-width", self.confidence_95);
        let _ = writeln!(out, "│ {:<14} │ {:>16} │", "Paths", self.paths);
        let _ = writeln!(out, "│ {:<14} │ {:>16} │", "Workers", self.workers);
        let _ = writeln!(out, "│ {:<14} │ {:>16} │", "Evaluator", self.evaluator);
        if !self.risks.is_empty() {
            let _ = writeln!(out, "├────────────────┼──────────────────┤");
            for risk in &self.risks {
                let label = format!("d/d {}", risk.label);
                let _ = writeln!(out, "│ {:<14} │ {:>16.6} │", label, risk.value);
            }
        }
        let _ = writeln!(out, "└────────────────┴──────────────────┘");
        out
    }
}

/// Prices the product in `product_path` and returns the rendered report.
pub fn run(product_path: &Path, config: &AppConfig, format: OutputFormat) -> Result<String> {
    info!(product = %product_path.display(), "Starting pricing");

    let file = ProductFile::load(product_path)?;
    let fuzzy = config.simulation.evaluator == EvaluatorKind::Fuzzy;
    let product = file.build_product(fuzzy)?;
    let model = file.build_model()?;
    let sim_config = config.simulation_config()?;
    let rng = PricerRng::from_seed(sim_config.seed());
    info!(model = model.name(), "Model built");

    let result = match &model {
        PricingModel::BlackScholes(m) => simulate(&product, m, &rng, &sim_config)?,
        PricingModel::Dupire(m) => simulate(&product, m, &rng, &sim_config)?,
    };
    let report = PriceReport::new(result, config);
    info!(price = report.price, "Pricing complete");

    match format {
        OutputFormat::Table => Ok(report.to_table()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("table").unwrap(), OutputFormat::Table);
        assert!(matches!(
            OutputFormat::from_str("csv"),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_table_lists_risks() {
        let report = PriceReport {
            price: 10.5,
            std_error: 0.1,
            confidence_95: 0.196,
            paths: 100,
            batches: 2,
            workers: 2,
            evaluator: "exact".to_string(),
            aad: "reverse".to_string(),
            risks: vec![Sensitivity {
                label: "spot".to_string(),
                value: 0.6,
            }],
        };
        let table = report.to_table();
        assert!(table.contains("10.500000"));
        assert!(table.contains("d/d spot"));
    }
}
