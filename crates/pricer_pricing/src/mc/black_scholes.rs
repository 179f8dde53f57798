//! Black-Scholes model under the bank-account numeraire.
//!
//! The spot follows `dS = (r - q) S dt + σ S dW`, simulated exactly between
//! consecutive event times:
//!
//! ```text
//! S(t_i) = S(t_{i-1}) · exp((r - q - σ²/2) Δt + σ √Δt · z_i)
//! ```
//!
//! Numeraire `exp(r t)`, forwards `S(t) exp((r - q)(T - t))`, discount
//! factors `exp(-r (T - t))`.

use pricer_core::traits::Real;
use pricer_core::types::{SampleDef, Scenario, ScenarioError};

use super::error::ModelError;
use super::model::{Model, ModelPrototype};

/// Labels of the parameters, in [`Model::parameters`] order.
pub const BLACK_SCHOLES_LABELS: [&str; 4] = ["spot", "vol", "rate", "div"];

/// Per-event quantities that do not depend on the draws.
#[derive(Clone, Debug)]
struct Step<T> {
    has_noise: bool,
    drift: T,
    std_dev: T,
    numeraire: T,
    forward_factors: Vec<T>,
    discounts: Vec<T>,
}

/// Black-Scholes model with spot, volatility, rate and dividend yield.
///
/// # Examples
///
/// ```rust
/// use pricer_core::types::{allocate_path, SampleDef};
/// use pricer_pricing::mc::{BlackScholes, Model};
///
/// let mut model = BlackScholes::new(100.0, 0.0, 0.05, 0.0).unwrap();
/// let timeline = [1.0];
/// let defline = [SampleDef::at(1.0)];
/// model.allocate(&timeline, &defline);
/// model.init(&timeline, &defline).unwrap();
///
/// let mut path = allocate_path(&defline);
/// model.generate_path(&[0.0], &mut path).unwrap();
/// assert!((path[0].spot - 100.0 * 0.05_f64.exp()).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct BlackScholes<T> {
    spot: T,
    vol: T,
    rate: T,
    div: T,
    steps: Vec<Step<T>>,
    initialised: bool,
}

impl<T: Real> BlackScholes<T> {
    /// Model with the given parameters.
    ///
    /// # Errors
    /// `InvalidParameter` for a non-positive spot, a negative volatility or
    /// any non-finite value.
    pub fn new(spot: T, vol: T, rate: T, div: T) -> Result<Self, ModelError> {
        let checks = [
            ("spot", spot.value(), spot.value() > 0.0, "must be positive"),
            ("vol", vol.value(), vol.value() >= 0.0, "must be non-negative"),
            ("rate", rate.value(), true, "must be finite"),
            ("div", div.value(), true, "must be finite"),
        ];
        for (name, value, ok, reason) in checks {
            if !ok || !value.is_finite() {
                return Err(ModelError::InvalidParameter {
                    name,
                    value,
                    reason,
                });
            }
        }
        Ok(Self {
            spot,
            vol,
            rate,
            div,
            steps: Vec::new(),
            initialised: false,
        })
    }

    /// Initial spot.
    pub fn spot(&self) -> T {
        self.spot
    }

    /// Volatility.
    pub fn vol(&self) -> T {
        self.vol
    }

    /// Continuously compounded rate.
    pub fn rate(&self) -> T {
        self.rate
    }

    /// Continuous dividend yield.
    pub fn div(&self) -> T {
        self.div
    }
}

impl<T: Real> Model<T> for BlackScholes<T> {
    fn allocate(&mut self, timeline: &[f64], defline: &[SampleDef]) {
        self.steps = defline
            .iter()
            .take(timeline.len())
            .map(|def| Step {
                has_noise: false,
                drift: T::zero(),
                std_dev: T::zero(),
                numeraire: T::one(),
                forward_factors: vec![T::one(); def.forward_mats.len()],
                discounts: vec![T::one(); def.discount_mats.len()],
            })
            .collect();
        self.initialised = false;
    }

    fn init(&mut self, timeline: &[f64], defline: &[SampleDef]) -> Result<(), ModelError> {
        if timeline.len() != defline.len() {
            return Err(ModelError::InvalidTimeline(format!(
                "{} event times for {} sample definitions",
                timeline.len(),
                defline.len()
            )));
        }
        if self.steps.len() != timeline.len() {
            self.allocate(timeline, defline);
        }

        let carry = self.rate - self.div;
        let drift_rate = carry - self.vol * self.vol * 0.5;
        let mut previous = 0.0;
        for ((&t, def), step) in timeline.iter().zip(defline).zip(self.steps.iter_mut()) {
            if !t.is_finite() || t < previous {
                return Err(ModelError::InvalidTimeline(format!(
                    "event time {} after {}",
                    t, previous
                )));
            }
            def.validate(t)?;

            let dt = t - previous;
            step.has_noise = dt > 0.0;
            step.drift = drift_rate * dt;
            step.std_dev = self.vol * dt.sqrt();
            step.numeraire = if def.numeraire {
                (self.rate * t).exp()
            } else {
                T::one()
            };
            step.forward_factors.clear();
            step.forward_factors
                .extend(def.forward_mats.iter().map(|&m| (carry * (m - t)).exp()));
            step.discounts.clear();
            step.discounts
                .extend(def.discount_mats.iter().map(|&m| (-(self.rate * (m - t))).exp()));
            previous = t;
        }
        self.initialised = true;
        Ok(())
    }

    fn sim_dim(&self) -> usize {
        self.steps.len()
    }

    fn generate_path(&self, gaussians: &[f64], path: &mut Scenario<T>) -> Result<(), ModelError> {
        if !self.initialised {
            return Err(ModelError::NotInitialised);
        }
        if gaussians.len() < self.steps.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.steps.len(),
                actual: gaussians.len(),
            });
        }
        if path.len() != self.steps.len() {
            return Err(ScenarioError::LengthMismatch {
                expected: self.steps.len(),
                actual: path.len(),
            }
            .into());
        }

        let mut spot = self.spot;
        for ((step, sample), &z) in self.steps.iter().zip(path.iter_mut()).zip(gaussians) {
            if step.has_noise {
                spot = spot.lognormal_step(step.drift, step.std_dev, z);
            }
            sample.spot = spot;
            sample.numeraire = step.numeraire;
            for (forward, &factor) in sample.forwards.iter_mut().zip(&step.forward_factors) {
                *forward = spot * factor;
            }
            for (discount, &df) in sample.discounts.iter_mut().zip(&step.discounts) {
                *discount = df;
            }
        }
        Ok(())
    }

    fn parameters(&self) -> Vec<T> {
        vec![self.spot, self.vol, self.rate, self.div]
    }

    fn parameter_labels(&self) -> Vec<String> {
        BLACK_SCHOLES_LABELS.iter().map(|s| s.to_string()).collect()
    }
}

impl ModelPrototype for BlackScholes<f64> {
    type Lifted<T: Real> = BlackScholes<T>;

    fn lift<T: Real>(&self, mut f: impl FnMut(f64) -> T) -> BlackScholes<T> {
        BlackScholes {
            spot: f(self.spot),
            vol: f(self.vol),
            rate: f(self.rate),
            div: f(self.div),
            steps: Vec::new(),
            initialised: false,
        }
    }
}
