//! Market samples exchanged between models and payoffs.
//!
//! A product declares, for each event date, which market observables it
//! needs ([`SampleDef`]). A model fills one [`Sample`] per event date along
//! each simulated path, and the payoff reads them back. The sequence of
//! samples for one path is a [`Scenario`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::error::ScenarioError;
use crate::traits::Real;

/// Observables requested at one event date.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleDef {
    /// Whether the numeraire is needed.
    pub numeraire: bool,
    /// Maturities of the forwards observed at the event date.
    pub forward_mats: Vec<f64>,
    /// Maturities of the discount factors observed at the event date.
    pub discount_mats: Vec<f64>,
}

impl SampleDef {
    /// Definition with the numeraire, the forward to `time` and the discount
    /// to `time`. This is what a script event needs.
    pub fn at(time: f64) -> Self {
        Self {
            numeraire: true,
            forward_mats: vec![time],
            discount_mats: vec![time],
        }
    }

    /// Checks that no maturity precedes the event time.
    pub fn validate(&self, time: f64) -> Result<(), ScenarioError> {
        match self
            .forward_mats
            .iter()
            .chain(self.discount_mats.iter())
            .find(|&&m| m < time)
        {
            Some(m) => Err(ScenarioError::MaturityBeforeEvent {
                time: time.to_string(),
                maturity: m.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Observables at one event date on one path.
#[derive(Clone, Debug)]
pub struct Sample<T> {
    /// Underlying spot.
    pub spot: T,
    /// Numeraire value, one when not requested.
    pub numeraire: T,
    /// Forwards, one per [`SampleDef::forward_mats`] entry.
    pub forwards: Vec<T>,
    /// Discount factors, one per [`SampleDef::discount_mats`] entry.
    pub discounts: Vec<T>,
}

impl<T: Real> Sample<T> {
    /// Sized for `def` and initialised.
    pub fn allocate(def: &SampleDef) -> Self {
        let mut sample = Self {
            spot: T::zero(),
            numeraire: T::one(),
            forwards: vec![T::zero(); def.forward_mats.len()],
            discounts: vec![T::one(); def.discount_mats.len()],
        };
        sample.initialize();
        sample
    }

    /// Resets to neutral values: unit numeraire and discounts, forwards and
    /// spot at 100.
    pub fn initialize(&mut self) {
        self.spot = T::from_f64(100.0);
        self.numeraire = T::one();
        self.forwards.fill(T::from_f64(100.0));
        self.discounts.fill(T::one());
    }
}

/// One path of samples, one per event date.
pub type Scenario<T> = Vec<Sample<T>>;

/// Allocates a scenario for a definition line.
pub fn allocate_path<T: Real>(defline: &[SampleDef]) -> Scenario<T> {
    defline.iter().map(Sample::allocate).collect()
}

/// Resets every sample of a scenario.
pub fn initialize_path<T: Real>(path: &mut Scenario<T>) {
    path.iter_mut().for_each(Sample::initialize);
}

/// Checks a scenario against its definition line.
pub fn check_path<T>(defline: &[SampleDef], path: &[Sample<T>]) -> Result<(), ScenarioError> {
    if defline.len() != path.len() {
        return Err(ScenarioError::LengthMismatch {
            expected: defline.len(),
            actual: path.len(),
        });
    }
    Ok(())
}
