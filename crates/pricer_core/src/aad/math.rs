//! Scalar intrinsics and their derivatives.

use std::f64::consts::{PI, SQRT_2};

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal density.
#[inline]
pub fn normal_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal cumulative distribution.
///
/// Hart's double precision rational approximation in West's arrangement.
/// Accurate to about `1e-15` over the whole line.
pub fn normal_cdf(x: f64) -> f64 {
    let z = x.abs();
    let tail = if z > 37.0 {
        0.0
    } else {
        let e = (-z * z / 2.0).exp();
        if z < 7.071_067_811_865_47 {
            let mut n = 3.526_249_659_989_11e-2 * z + 0.700_383_064_443_688;
            n = n * z + 6.373_962_203_531_65;
            n = n * z + 33.912_866_078_383;
            n = n * z + 112.079_291_497_871;
            n = n * z + 221.213_596_169_931;
            n = n * z + 220.206_867_912_376;
            let mut d = 8.838_834_764_831_84e-2 * z + 1.755_667_163_182_64;
            d = d * z + 16.064_177_579_207;
            d = d * z + 86.780_732_202_946_1;
            d = d * z + 296.564_248_779_674;
            d = d * z + 637.333_633_378_831;
            d = d * z + 793.826_512_519_948;
            d = d * z + 440.413_735_824_752;
            e * n / d
        } else {
            let mut b = z + 0.65;
            b = z + 4.0 / b;
            b = z + 3.0 / b;
            b = z + 2.0 / b;
            b = z + 1.0 / b;
            e / b / 2.506_628_274_631
        }
    };
    if x <= 0.0 {
        tail
    } else {
        1.0 - tail
    }
}

/// Complementary error function, `erfc(x) = 2 N(-x √2)`.
#[inline]
pub fn erfc(x: f64) -> f64 {
    2.0 * normal_cdf(-x * SQRT_2)
}

/// Derivative of [`erfc`].
#[inline]
pub fn erfc_derivative(x: f64) -> f64 {
    -2.0 / PI.sqrt() * (-x * x).exp()
}

/// Derivative of `|x|`. Zero is treated as the negative side.
#[inline]
pub fn abs_derivative(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Partials of `x^y` with respect to `x` and `y`, given `v = x^y`.
#[inline]
pub fn pow_partials(x: f64, y: f64, v: f64) -> (f64, f64) {
    let dx = y * x.powf(y - 1.0);
    let dy = if x > 0.0 { v * x.ln() } else { 0.0 };
    (dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_cdf_reference_values() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_relative_eq!(normal_cdf(1.0), 0.841_344_746_068_542_9, epsilon = 1e-14);
        assert_relative_eq!(normal_cdf(-1.96), 0.024_997_895_148_220_43, epsilon = 1e-14);
        assert_relative_eq!(normal_cdf(8.0), 1.0, epsilon = 1e-14);
        assert_eq!(normal_cdf(-40.0), 0.0);
    }

    #[test]
    fn test_normal_cdf_symmetry() {
        for &x in &[0.1, 0.7, 2.3, 5.0, 7.5] {
            assert_relative_eq!(normal_cdf(x) + normal_cdf(-x), 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_erfc_matches_known_values() {
        assert_relative_eq!(erfc(0.0), 1.0, epsilon = 1e-15);
        assert_relative_eq!(erfc(1.0), 0.157_299_207_050_285_13, epsilon = 1e-14);
    }

    #[test]
    fn test_erfc_derivative_finite_difference() {
        let h = 1e-6;
        for &x in &[-1.0, 0.3, 1.2] {
            let fd = (erfc(x + h) - erfc(x - h)) / (2.0 * h);
            assert_relative_eq!(erfc_derivative(x), fd, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_normal_pdf_peak() {
        assert_relative_eq!(normal_pdf(0.0), 1.0 / (2.0 * PI).sqrt(), epsilon = 1e-15);
    }
}
