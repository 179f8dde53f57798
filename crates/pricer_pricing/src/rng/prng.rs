//! Pseudo-random number generator with per-path streams.
//!
//! This module provides [`PricerRng`], a seeded PRNG whose draws for path
//! `p` come from a `StdRng` seeded with `splitmix64(seed ^ p)`. Skipping to
//! any path is O(1), so batches can be handed to threads in any order and
//! still reproduce the same paths.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use super::RandomStream;

/// SplitMix64 finaliser, used to decorrelate the per-path seeds.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::rng::splitmix64;
///
/// assert_ne!(splitmix64(0), splitmix64(1));
/// assert_eq!(splitmix64(42), splitmix64(42));
/// ```
#[inline]
pub fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Monte Carlo simulation random number generator.
///
/// Each `fill_*` call through [`RandomStream`] draws one whole path and
/// moves on to the next.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::rng::{PricerRng, RandomStream};
///
/// let mut rng = PricerRng::from_seed(42);
/// rng.init(3);
///
/// let mut first = vec![0.0; 3];
/// rng.fill_normal(&mut first);
///
/// // Replaying path 0 gives the same draws
/// let mut again = vec![0.0; 3];
/// rng.skip_to(0);
/// rng.fill_normal(&mut again);
/// assert_eq!(first, again);
/// ```
#[derive(Clone, Debug)]
pub struct PricerRng {
    inner: StdRng,
    seed: u64,
    path: usize,
    dim: usize,
}

impl PricerRng {
    /// Creates a generator positioned on path 0.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Self::path_stream(seed, 0),
            seed,
            path: 0,
            dim: 0,
        }
    }

    fn path_stream(seed: u64, path: usize) -> StdRng {
        StdRng::seed_from_u64(splitmix64(seed ^ path as u64))
    }

    /// Returns the seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Path the next fill will draw.
    #[inline]
    pub fn path(&self) -> usize {
        self.path
    }

    /// Generates a single uniform random value in [0, 1) from the current
    /// path's stream.
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Generates a single standard normal variate from the current path's
    /// stream.
    ///
    /// Uses the Ziggurat algorithm via `rand_distr::StandardNormal`.
    #[inline]
    pub fn gen_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }

    fn next_path(&mut self) {
        self.skip_to(self.path + 1);
    }
}

impl RandomStream for PricerRng {
    fn init(&mut self, dim: usize) {
        self.dim = dim;
        self.skip_to(0);
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn fill_uniform(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = self.inner.gen();
        }
        self.next_path();
    }

    fn fill_normal(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = StandardNormal.sample(&mut self.inner);
        }
        self.next_path();
    }

    fn skip_to(&mut self, path: usize) {
        self.path = path;
        self.inner = Self::path_stream(self.seed, path);
    }
}
