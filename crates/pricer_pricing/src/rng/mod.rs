//! # Random Number Generation Infrastructure
//!
//! Random streams feeding the Monte Carlo driver. A stream hands out one
//! path of draws per `fill_*` call and can be repositioned on any path, so
//! each batch of paths reproduces the same numbers whichever thread runs it.
//!
//! ## Module Structure
//!
//! - [`prng`]: Seeded PRNG with O(1) skip-ahead through per-path seeds
//! - [`fixed`]: Fixed Gaussian vector on every path, for deterministic tests
//!
//! ## Usage Example
//!
//! ```rust
//! use pricer_pricing::rng::{PricerRng, RandomStream};
//!
//! let mut rng = PricerRng::from_seed(12345);
//! rng.init(252);
//!
//! // Path 1000 without drawing paths 0..1000
//! rng.skip_to(1000);
//! let mut gaussians = vec![0.0; 252];
//! rng.fill_normal(&mut gaussians);
//! ```

pub mod fixed;
pub mod prng;

pub use fixed::FixedGaussians;
pub use prng::{splitmix64, PricerRng};

/// Source of random draws for simulated paths.
///
/// Cloned once per worker thread; clones are independent.
pub trait RandomStream: Clone + Send {
    /// Prepares for paths of `dim` draws and positions on path 0.
    fn init(&mut self, dim: usize);

    /// Draws per path, as set by [`RandomStream::init`].
    fn dim(&self) -> usize;

    /// Fills one path of uniforms in [0, 1) and moves to the next path.
    fn fill_uniform(&mut self, buffer: &mut [f64]);

    /// Fills one path of standard normals and moves to the next path.
    fn fill_normal(&mut self, buffer: &mut [f64]);

    /// Positions the stream so that the next fill draws path `path`.
    fn skip_to(&mut self, path: usize);
}
