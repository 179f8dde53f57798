//! Deterministic stream for tests: every path receives the same draws.

use pricer_core::traits::Real;

use super::RandomStream;

/// Stream returning a fixed Gaussian vector for every path.
///
/// Shorter vectors are repeated cyclically to fill the buffer; uniforms are
/// the normal CDF of the same values.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::rng::{FixedGaussians, RandomStream};
///
/// let mut rng = FixedGaussians::new(vec![0.5, -1.0]);
/// let mut buf = vec![0.0; 3];
/// rng.fill_normal(&mut buf);
/// assert_eq!(buf, vec![0.5, -1.0, 0.5]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FixedGaussians {
    values: Vec<f64>,
    dim: usize,
}

impl FixedGaussians {
    /// Stream returning `values` on every path.
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, dim: 0 }
    }

    /// All-zero draws: every path follows the deterministic drift.
    pub fn zeros() -> Self {
        Self::new(vec![0.0])
    }

    fn fill(&self, buffer: &mut [f64], map: impl Fn(f64) -> f64) {
        if self.values.is_empty() {
            buffer.fill(map(0.0));
            return;
        }
        for (out, &v) in buffer.iter_mut().zip(self.values.iter().cycle()) {
            *out = map(v);
        }
    }
}

impl RandomStream for FixedGaussians {
    fn init(&mut self, dim: usize) {
        self.dim = dim;
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn fill_uniform(&mut self, buffer: &mut [f64]) {
        self.fill(buffer, <f64 as Real>::normal_cdf);
    }

    fn fill_normal(&mut self, buffer: &mut [f64]) {
        self.fill(buffer, |v| v);
    }

    fn skip_to(&mut self, _path: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zeros_give_half_uniforms() {
        let mut rng = FixedGaussians::zeros();
        let mut buf = vec![1.0; 4];
        rng.fill_uniform(&mut buf);
        for u in buf {
            assert_relative_eq!(u, 0.5, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_every_path_identical() {
        let mut rng = FixedGaussians::new(vec![1.0, 2.0]);
        rng.init(2);
        let mut a = vec![0.0; 2];
        let mut b = vec![0.0; 2];
        rng.fill_normal(&mut a);
        rng.skip_to(1000);
        rng.fill_normal(&mut b);
        assert_eq!(a, b);
        assert_eq!(rng.dim(), 2);
    }
}
