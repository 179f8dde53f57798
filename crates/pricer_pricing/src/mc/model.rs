//! Model interface of the simulation driver.
//!
//! A [`Model`] turns one path of Gaussian draws into a [`Scenario`]: the
//! samples a product requested at each of its event times. Models are
//! generic over [`Real`] so the same code fills `f64` scenarios or records
//! them on an adjoint tape.
//!
//! The driver never shares a model across threads. Each worker asks the
//! [`ModelPrototype`] for its own copy with [`ModelPrototype::lift`], which
//! is where the parameters become tape leaves in reverse mode.

use pricer_core::traits::Real;
use pricer_core::types::{SampleDef, Scenario};

use super::error::ModelError;

/// Path generator over a product timeline.
pub trait Model<T: Real> {
    /// Sizes internal buffers for `timeline` and `defline`.
    fn allocate(&mut self, timeline: &[f64], defline: &[SampleDef]);

    /// Precomputes everything that does not depend on the draws. In reverse
    /// mode this runs once per worker, before the tape checkpoint.
    ///
    /// # Errors
    /// `InvalidTimeline` for negative or decreasing times, `Scenario` when
    /// a requested maturity precedes its event.
    fn init(&mut self, timeline: &[f64], defline: &[SampleDef]) -> Result<(), ModelError>;

    /// Gaussian draws per path.
    fn sim_dim(&self) -> usize;

    /// Fills `path` from one path of draws.
    ///
    /// # Errors
    /// `NotInitialised` before `init`, `DimensionMismatch` when `gaussians`
    /// is shorter than [`Model::sim_dim`].
    fn generate_path(&self, gaussians: &[f64], path: &mut Scenario<T>) -> Result<(), ModelError>;

    /// Parameters in the order of [`Model::parameter_labels`].
    fn parameters(&self) -> Vec<T>;

    /// Parameter names, used to label risks.
    fn parameter_labels(&self) -> Vec<String>;
}

/// Thread-shareable model description that produces per-thread models.
pub trait ModelPrototype: Sync {
    /// Model with parameters of type `T`.
    type Lifted<T: Real>: Model<T>;

    /// Copy of the model with every parameter mapped through `f`.
    fn lift<T: Real>(&self, f: impl FnMut(f64) -> T) -> Self::Lifted<T>;
}
