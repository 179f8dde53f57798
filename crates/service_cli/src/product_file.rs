//! Product files: a scripted product and the model to price it under.
//!
//! ```toml
//! [product]
//! payoff = "CALL"
//!
//! [[product.events]]
//! time = 1.0
//! script = "CALL PAYS MAX(SPOT() - K, 0)"
//!
//! [product.constants]
//! K = 100.0
//!
//! [model]
//! spot = 100.0
//! vol = 0.2
//! rate = 0.03
//! ```
//!
//! A local volatility surface replaces `vol` with a `[model.local_vol]`
//! table holding one row of `vols` per grid spot:
//!
//! ```toml
//! [model.local_vol]
//! spots = [80.0, 100.0, 125.0]
//! times = [0.0, 1.0]
//! vols = [[0.25, 0.22], [0.2, 0.19], [0.18, 0.18]]
//! max_dt = 0.1
//! ```

use std::path::Path;

use pricer_pricing::mc::{dupire::DEFAULT_MAX_DT, BlackScholes, Dupire, SimulationError};
use pricer_script::{ProductDefinition, ScriptProduct};
use serde::Deserialize;
use tracing::debug;

use crate::error::{CliError, Result};

fn default_max_dt() -> f64 {
    DEFAULT_MAX_DT
}

/// Dupire surface, the `[model.local_vol]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalVolSection {
    /// Spot grid
    pub spots: Vec<f64>,
    /// Time grid
    pub times: Vec<f64>,
    /// One row per grid spot, one column per grid time
    pub vols: Vec<Vec<f64>>,
    /// Longest simulation step
    #[serde(default = "default_max_dt")]
    pub max_dt: f64,
}

/// Model parameters, the `[model]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSection {
    /// Initial spot
    pub spot: f64,
    /// Black-Scholes volatility
    #[serde(default)]
    pub vol: Option<f64>,
    /// Continuously compounded rate
    #[serde(default)]
    pub rate: f64,
    /// Dividend yield
    #[serde(default)]
    pub div: f64,
    /// Local volatility surface
    #[serde(default)]
    pub local_vol: Option<LocalVolSection>,
}

/// Model built from a product file.
#[derive(Debug, Clone)]
pub enum PricingModel {
    /// Flat volatility
    BlackScholes(BlackScholes<f64>),
    /// Local volatility surface
    Dupire(Dupire<f64>),
}

impl PricingModel {
    /// Short model name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            PricingModel::BlackScholes(_) => "black-scholes",
            PricingModel::Dupire(_) => "dupire",
        }
    }
}

/// Parsed product file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductFile {
    /// Product definition
    pub product: ProductDefinition,
    /// Model parameters
    pub model: ModelSection,
}

impl ProductFile {
    /// Reads and parses a product file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let file = Self::parse(&content)?;
        debug!(
            path = %path.display(),
            events = file.product.events.len(),
            "product file loaded"
        );
        Ok(file)
    }

    /// Parses product file contents.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CliError::InvalidArgument(format!("invalid product file: {}", e)))
    }

    /// Builds the product. `fuzzy` enables the analysis needed by the fuzzy
    /// evaluator.
    pub fn build_product(&self, fuzzy: bool) -> Result<ScriptProduct> {
        Ok(self
            .product
            .clone()
            .into_builder()?
            .fuzzy(fuzzy)
            .build()?)
    }

    /// Builds the model: Black-Scholes when `vol` is given, Dupire when
    /// `local_vol` is.
    pub fn build_model(&self) -> Result<PricingModel> {
        let m = &self.model;
        let model = match (m.vol, &m.local_vol) {
            (Some(vol), None) => {
                BlackScholes::new(m.spot, vol, m.rate, m.div).map(PricingModel::BlackScholes)
            }
            (None, Some(surface)) => {
                if let Some(row) = surface.vols.iter().find(|r| r.len() != surface.times.len()) {
                    return Err(CliError::InvalidArgument(format!(
                        "local_vol row has {} values for {} times",
                        row.len(),
                        surface.times.len()
                    )));
                }
                Dupire::new(
                    m.spot,
                    m.rate,
                    m.div,
                    surface.spots.clone(),
                    surface.times.clone(),
                    surface.vols.concat(),
                )
                .and_then(|d| d.max_dt(surface.max_dt))
                .map(PricingModel::Dupire)
            }
            _ => {
                return Err(CliError::InvalidArgument(
                    "model needs exactly one of vol and local_vol".to_string(),
                ))
            }
        };
        model.map_err(|e| CliError::Simulation(SimulationError::from(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALL: &str = r#"
[product]
payoff = "CALL"

[[product.events]]
time = 1.0
script = "CALL PAYS MAX(SPOT() - K, 0)"

[product.constants]
K = 100.0

[model]
spot = 100.0
vol = 0.2
"#;

    #[test]
    fn test_parse_product_file() {
        let file = ProductFile::parse(CALL).unwrap();
        assert_eq!(file.product.payoff, "CALL");
        assert_eq!(file.product.events.len(), 1);
        assert_eq!(file.product.constants.get("K"), Some(&100.0));
        assert_eq!(file.model.rate, 0.0);

        let product = file.build_product(false).unwrap();
        assert_eq!(product.event_times(), &[1.0]);
        assert!(file.build_model().is_ok());
    }

    #[test]
    fn test_invalid_contents() {
        assert!(matches!(
            ProductFile::parse("[model]\nspot = 1.0\nvol = 0.1\n"),
            Err(CliError::InvalidArgument(_))
        ));

        let mut file = ProductFile::parse(CALL).unwrap();
        file.model.spot = -1.0;
        assert!(matches!(file.build_model(), Err(CliError::Simulation(_))));

        file.product.events[0].script = "CALL PAYS MAX(SPOT() - K".to_string();
        assert!(matches!(file.build_product(false), Err(CliError::Script(_))));
    }

    #[test]
    fn test_local_vol_model() {
        let content = CALL.replace(
            "vol = 0.2\n",
            "\n[model.local_vol]\nspots = [80.0, 120.0]\ntimes = [0.0, 1.0]\nvols = [[0.3, 0.25], [0.2, 0.18]]\n",
        );
        let file = ProductFile::parse(&content).unwrap();
        let surface = file.model.local_vol.as_ref().unwrap();
        assert_eq!(surface.max_dt, DEFAULT_MAX_DT);
        match file.build_model().unwrap() {
            PricingModel::Dupire(model) => {
                assert_eq!(model.vols(), &[0.3, 0.25, 0.2, 0.18]);
            }
            other => panic!("expected dupire, got {}", other.name()),
        }

        let mut ragged = file.clone();
        if let Some(surface) = ragged.model.local_vol.as_mut() {
            surface.vols[1].pop();
        }
        assert!(matches!(ragged.build_model(), Err(CliError::InvalidArgument(_))));

        let mut both = file;
        both.model.vol = Some(0.2);
        assert!(matches!(both.build_model(), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = ProductFile::load(Path::new("/nonexistent/product.toml")).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }
}
