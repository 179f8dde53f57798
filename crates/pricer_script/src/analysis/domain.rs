//! Interval arithmetic over the extended real line.
//!
//! A [`Domain`] is a sorted set of disjoint [`Interval`]s, each bounded by
//! a [`Bound`] that is either finite or infinite. Domains over-approximate
//! the set of values a script expression can take on any path.
//!
//! Comparisons between bounds use an absolute tolerance [`EPS`]. Infinite
//! bounds behave as `±BIG` when a numeric value is needed.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::error::{ScriptError, ScriptResult};

/// Magnitude standing in for an infinite bound.
pub const BIG: f64 = 1.0e12;

/// Tolerance of bound comparisons.
pub const EPS: f64 = 1.0e-12;

/// End point of an interval.
#[derive(Clone, Copy, Debug)]
pub enum Bound {
    /// `-∞`
    MinusInf,
    /// Finite value
    Finite(f64),
    /// `+∞`
    PlusInf,
}

impl Bound {
    /// Numeric value, `±BIG` for infinities.
    pub fn value(self) -> f64 {
        match self {
            Bound::MinusInf => -BIG,
            Bound::Finite(v) => v,
            Bound::PlusInf => BIG,
        }
    }

    /// Either infinity.
    pub fn is_inf(self) -> bool {
        !matches!(self, Bound::Finite(_))
    }

    /// `> EPS` when strict, `> -EPS` otherwise.
    pub fn is_positive(self, strict: bool) -> bool {
        match self {
            Bound::PlusInf => true,
            Bound::MinusInf => false,
            Bound::Finite(v) => v > if strict { EPS } else { -EPS },
        }
    }

    /// `< -EPS` when strict, `< EPS` otherwise.
    pub fn is_negative(self, strict: bool) -> bool {
        match self {
            Bound::MinusInf => true,
            Bound::PlusInf => false,
            Bound::Finite(v) => v < if strict { -EPS } else { EPS },
        }
    }

    /// Finite and within `EPS` of zero.
    pub fn is_zero(self) -> bool {
        matches!(self, Bound::Finite(v) if v.abs() < EPS)
    }

    /// Strictly smaller, beyond tolerance.
    pub fn lt(self, other: Bound) -> bool {
        match (self, other) {
            (Bound::MinusInf, Bound::MinusInf) => false,
            (Bound::MinusInf, _) => true,
            (_, Bound::MinusInf) => false,
            (Bound::PlusInf, _) => false,
            (_, Bound::PlusInf) => true,
            (Bound::Finite(a), Bound::Finite(b)) => a < b - EPS,
        }
    }

    /// Strictly greater, beyond tolerance.
    pub fn gt(self, other: Bound) -> bool {
        other.lt(self)
    }

    fn min(self, other: Bound) -> Bound {
        if other.lt(self) {
            other
        } else {
            self
        }
    }

    fn max(self, other: Bound) -> Bound {
        if other.gt(self) {
            other
        } else {
            self
        }
    }

    fn recip(self) -> Bound {
        Bound::Finite(1.0 / self.value())
    }
}

impl PartialEq for Bound {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Bound::PlusInf, Bound::PlusInf) | (Bound::MinusInf, Bound::MinusInf) => true,
            (Bound::Finite(a), Bound::Finite(b)) => (a - b).abs() < EPS,
            _ => false,
        }
    }
}

impl Neg for Bound {
    type Output = Bound;

    fn neg(self) -> Bound {
        match self {
            Bound::MinusInf => Bound::PlusInf,
            Bound::Finite(v) => Bound::Finite(-v),
            Bound::PlusInf => Bound::MinusInf,
        }
    }
}

impl Mul for Bound {
    type Output = Bound;

    /// With an infinite factor the sign decides the infinity; a zero
    /// factor yields the other factor.
    fn mul(self, rhs: Bound) -> Bound {
        match (self, rhs) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a * b),
            _ => {
                if (self.is_positive(true) && rhs.is_positive(true))
                    || (self.is_negative(true) && rhs.is_negative(true))
                {
                    Bound::PlusInf
                } else if self.is_zero() {
                    rhs
                } else if rhs.is_zero() {
                    self
                } else {
                    Bound::MinusInf
                }
            }
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::MinusInf => f.write_str("-inf"),
            Bound::Finite(v) => write!(f, "{}", v),
            Bound::PlusInf => f.write_str("+inf"),
        }
    }
}

/// Closed interval `[left, right]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    left: Bound,
    right: Bound,
}

impl Interval {
    /// Checked constructor.
    ///
    /// # Errors
    /// `Analysis` when `left` is `+∞`, `right` is `-∞` or `left > right`.
    pub fn new(left: Bound, right: Bound) -> ScriptResult<Self> {
        if matches!(left, Bound::PlusInf) || matches!(right, Bound::MinusInf) || left.gt(right) {
            return Err(ScriptError::Analysis(format!(
                "inconsistent bounds [{}, {}]",
                left, right
            )));
        }
        Ok(Self { left, right })
    }

    /// `{v}`.
    pub fn singleton(v: f64) -> Self {
        Self {
            left: Bound::Finite(v),
            right: Bound::Finite(v),
        }
    }

    /// `(-∞, +∞)`.
    pub fn real_line() -> Self {
        Self {
            left: Bound::MinusInf,
            right: Bound::PlusInf,
        }
    }

    /// `[0, +∞)`.
    pub fn non_negative() -> Self {
        Self {
            left: Bound::Finite(0.0),
            right: Bound::PlusInf,
        }
    }

    /// Left end point.
    pub fn left(&self) -> Bound {
        self.left
    }

    /// Right end point.
    pub fn right(&self) -> Bound {
        self.right
    }

    /// Either end point is infinite.
    pub fn is_inf(&self) -> bool {
        self.left.is_inf() || self.right.is_inf()
    }

    /// Every element is positive.
    pub fn is_positive(&self, strict: bool) -> bool {
        self.left.is_positive(strict)
    }

    /// Every element is negative.
    pub fn is_negative(&self, strict: bool) -> bool {
        self.right.is_negative(strict)
    }

    /// Single finite value.
    pub fn is_singleton(&self) -> bool {
        !self.is_inf() && self.left == self.right
    }

    /// `{0}`.
    pub fn is_zero(&self) -> bool {
        self.is_singleton() && self.left.is_zero()
    }

    /// Contains `x`, within tolerance.
    pub fn includes(&self, x: f64) -> bool {
        let x = Bound::Finite(x);
        !x.lt(self.left) && !self.right.lt(x)
    }

    /// Overlaps or touches `other`.
    pub fn intersects(&self, other: &Interval) -> bool {
        let lb = self.left.max(other.left);
        let rb = self.right.min(other.right);
        !rb.lt(lb)
    }

    /// Smallest interval containing both.
    pub fn merge(&self, other: &Interval) -> Interval {
        Interval {
            left: self.left.min(other.left),
            right: self.right.max(other.right),
        }
    }

    /// `1 / self`.
    ///
    /// # Errors
    /// `Domain` when the interval is `{0}`.
    pub fn inverse(&self) -> ScriptResult<Interval> {
        if self.is_zero() {
            return Err(ScriptError::domain("/", 0.0));
        }
        if self.is_singleton() {
            return Ok(Interval::singleton(1.0 / self.left.value()));
        }
        let positive = self.is_positive(false);
        if self.is_positive(true) || self.is_negative(true) {
            return Ok(match (self.is_inf(), positive) {
                (true, true) => Interval {
                    left: Bound::Finite(0.0),
                    right: self.left.recip(),
                },
                (true, false) => Interval {
                    left: self.right.recip(),
                    right: Bound::Finite(0.0),
                },
                (false, _) => Interval {
                    left: self.right.recip(),
                    right: self.left.recip(),
                },
            });
        }
        if self.left.is_zero() || self.right.is_zero() {
            return Ok(match (self.is_inf(), positive) {
                (true, true) => Interval::non_negative(),
                (true, false) => Interval {
                    left: Bound::MinusInf,
                    right: Bound::Finite(0.0),
                },
                (false, true) => Interval {
                    left: self.right.recip(),
                    right: Bound::PlusInf,
                },
                (false, false) => Interval {
                    left: Bound::MinusInf,
                    right: self.left.recip(),
                },
            });
        }
        Ok(Interval::real_line())
    }

    /// `[min(l1, l2), min(r1, r2)]`.
    pub fn min(&self, other: &Interval) -> Interval {
        Interval {
            left: self.left.min(other.left),
            right: self.right.min(other.right),
        }
    }

    /// `[max(l1, l2), max(r1, r2)]`.
    pub fn max(&self, other: &Interval) -> Interval {
        Interval {
            left: self.left.max(other.left),
            right: self.right.max(other.right),
        }
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        let left = match (self.left, rhs.left) {
            (Bound::MinusInf, _) | (_, Bound::MinusInf) => Bound::MinusInf,
            (a, b) => Bound::Finite(a.value() + b.value()),
        };
        let right = match (self.right, rhs.right) {
            (Bound::PlusInf, _) | (_, Bound::PlusInf) => Bound::PlusInf,
            (a, b) => Bound::Finite(a.value() + b.value()),
        };
        Interval { left, right }
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Interval {
        Interval {
            left: -self.right,
            right: -self.left,
        }
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        self + (-rhs)
    }
}

impl Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Interval) -> Interval {
        if self.is_zero() || rhs.is_zero() {
            return Interval::singleton(0.0);
        }
        let products = [
            self.left * rhs.left,
            self.left * rhs.right,
            self.right * rhs.left,
            self.right * rhs.right,
        ];
        let left = products.iter().fold(products[0], |acc, &b| acc.min(b));
        let right = products.iter().fold(products[0], |acc, &b| acc.max(b));
        Interval { left, right }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_singleton() {
            write!(f, "{{{}}}", self.left)
        } else {
            write!(f, "[{}, {}]", self.left, self.right)
        }
    }
}

/// Sorted set of disjoint intervals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Domain {
    intervals: Vec<Interval>,
}

impl Domain {
    /// No values.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single interval.
    pub fn from_interval(interval: Interval) -> Self {
        Self {
            intervals: vec![interval],
        }
    }

    /// `{v}`.
    pub fn singleton(v: f64) -> Self {
        Self::from_interval(Interval::singleton(v))
    }

    /// `(-∞, +∞)`.
    pub fn real_line() -> Self {
        Self::from_interval(Interval::real_line())
    }

    /// `[0, +∞)`.
    pub fn non_negative() -> Self {
        Self::from_interval(Interval::non_negative())
    }

    /// Intervals in increasing order.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Inserts an interval, merging every interval it touches.
    pub fn add_interval(&mut self, interval: Interval) {
        if interval.left.is_inf() && interval.right.is_inf() {
            self.intervals = vec![interval];
            return;
        }
        let mut merged = interval;
        while let Some(i) = self.intervals.iter().position(|iv| iv.intersects(&merged)) {
            let touched = self.intervals.remove(i);
            merged = merged.merge(&touched);
        }
        let at = self
            .intervals
            .iter()
            .position(|iv| merged.left.lt(iv.left))
            .unwrap_or(self.intervals.len());
        self.intervals.insert(at, merged);
    }

    /// Set union.
    pub fn union(&self, other: &Domain) -> Domain {
        let mut out = self.clone();
        for iv in &other.intervals {
            out.add_interval(*iv);
        }
        out
    }

    fn combine(&self, other: &Domain, f: impl Fn(Interval, Interval) -> Interval) -> Domain {
        let mut out = Domain::empty();
        for a in &self.intervals {
            for b in &other.intervals {
                out.add_interval(f(*a, *b));
            }
        }
        out
    }

    /// `self / other`.
    ///
    /// # Errors
    /// `Domain` when `other` contains the isolated value `0`.
    pub fn checked_div(&self, other: &Domain) -> ScriptResult<Domain> {
        let mut out = Domain::empty();
        for b in &other.intervals {
            let inv = b.inverse()?;
            for a in &self.intervals {
                out.add_interval(*a * inv);
            }
        }
        Ok(out)
    }

    /// Pairwise minimum.
    pub fn min(&self, other: &Domain) -> Domain {
        self.combine(other, |a, b| a.min(&b))
    }

    /// Pairwise maximum.
    pub fn max(&self, other: &Domain) -> Domain {
        self.combine(other, |a, b| a.max(&b))
    }

    /// Non-empty and every interval is a single value.
    pub fn is_discrete(&self) -> bool {
        !self.intervals.is_empty() && self.intervals.iter().all(Interval::is_singleton)
    }

    /// Values of a discrete domain, `None` otherwise.
    pub fn singletons(&self) -> Option<Vec<f64>> {
        if self.is_discrete() {
            Some(self.intervals.iter().map(|iv| iv.left.value()).collect())
        } else {
            None
        }
    }

    /// Smallest element, `-∞` when empty.
    pub fn min_bound(&self) -> Bound {
        self.intervals.first().map_or(Bound::MinusInf, |iv| iv.left)
    }

    /// Largest element, `+∞` when empty.
    pub fn max_bound(&self) -> Bound {
        self.intervals.last().map_or(Bound::PlusInf, |iv| iv.right)
    }

    /// Contains `x`, within tolerance.
    pub fn includes(&self, x: f64) -> bool {
        self.intervals.iter().any(|iv| iv.includes(x))
    }

    /// Contains zero.
    pub fn can_be_zero(&self) -> bool {
        self.includes(0.0)
    }

    /// Contains a value other than zero.
    pub fn can_be_non_zero(&self) -> bool {
        match self.intervals.as_slice() {
            [] => false,
            [only] => !only.is_zero(),
            _ => true,
        }
    }

    /// Zero is one of the isolated values.
    pub fn zero_is_discrete(&self) -> bool {
        self.intervals.iter().any(Interval::is_zero)
    }

    /// Contains a positive value.
    pub fn can_be_positive(&self, strict: bool) -> bool {
        self.intervals
            .last()
            .is_some_and(|iv| iv.right.is_positive(strict))
    }

    /// Contains a negative value.
    pub fn can_be_negative(&self, strict: bool) -> bool {
        self.intervals
            .first()
            .is_some_and(|iv| iv.left.is_negative(strict))
    }

    /// Left bound of the first interval lying entirely above zero.
    pub fn smallest_pos_lb(&self, strict: bool) -> Option<f64> {
        let last = self.intervals.last()?;
        if last.left.is_negative(!strict) {
            return None;
        }
        self.intervals
            .iter()
            .find(|iv| !iv.left.is_negative(!strict))
            .map(|iv| iv.left.value())
    }

    /// Right bound of the last interval lying entirely below zero.
    pub fn biggest_neg_rb(&self, strict: bool) -> Option<f64> {
        let first = self.intervals.first()?;
        if first.right.is_positive(!strict) {
            return None;
        }
        self.intervals
            .iter()
            .rev()
            .find(|iv| !iv.right.is_positive(!strict))
            .map(|iv| iv.right.value())
    }

    /// Image under `f` when discrete, `fallback` otherwise.
    ///
    /// # Errors
    /// Propagates errors of `f` on any of the isolated values.
    pub fn apply_func(
        &self,
        f: impl Fn(f64) -> ScriptResult<f64>,
        fallback: Domain,
    ) -> ScriptResult<Domain> {
        match self.singletons() {
            Some(values) => {
                let mut out = Domain::empty();
                for v in values {
                    out.add_interval(Interval::singleton(f(v)?));
                }
                Ok(out)
            }
            None => Ok(fallback),
        }
    }

    /// Image under `f` when both domains are discrete, `fallback` otherwise.
    ///
    /// # Errors
    /// Propagates errors of `f` on any pair of isolated values.
    pub fn apply_func2(
        &self,
        other: &Domain,
        f: impl Fn(f64, f64) -> ScriptResult<f64>,
        fallback: Domain,
    ) -> ScriptResult<Domain> {
        match (self.singletons(), other.singletons()) {
            (Some(xs), Some(ys)) => {
                let mut out = Domain::empty();
                for &x in &xs {
                    for &y in &ys {
                        out.add_interval(Interval::singleton(f(x, y)?));
                    }
                }
                Ok(out)
            }
            _ => Ok(fallback),
        }
    }
}

impl Add for &Domain {
    type Output = Domain;

    fn add(self, rhs: &Domain) -> Domain {
        self.combine(rhs, |a, b| a + b)
    }
}

impl Sub for &Domain {
    type Output = Domain;

    fn sub(self, rhs: &Domain) -> Domain {
        self.combine(rhs, |a, b| a - b)
    }
}

impl Mul for &Domain {
    type Output = Domain;

    fn mul(self, rhs: &Domain) -> Domain {
        self.combine(rhs, |a, b| a * b)
    }
}

impl Neg for &Domain {
    type Output = Domain;

    fn neg(self) -> Domain {
        let mut out = Domain::empty();
        for iv in &self.intervals {
            out.add_interval(-*iv);
        }
        out
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, iv) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", iv)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(l: f64, r: f64) -> Interval {
        Interval::new(Bound::Finite(l), Bound::Finite(r)).unwrap()
    }

    fn discrete(values: &[f64]) -> Domain {
        let mut d = Domain::empty();
        for &v in values {
            d.add_interval(Interval::singleton(v));
        }
        d
    }

    #[test]
    fn test_inconsistent_bounds_rejected() {
        assert!(Interval::new(Bound::Finite(2.0), Bound::Finite(1.0)).is_err());
        assert!(Interval::new(Bound::PlusInf, Bound::PlusInf).is_err());
        assert!(Interval::new(Bound::MinusInf, Bound::MinusInf).is_err());
    }

    #[test]
    fn test_bound_multiplication_with_infinity() {
        assert_eq!(Bound::PlusInf * Bound::Finite(2.0), Bound::PlusInf);
        assert_eq!(Bound::MinusInf * Bound::Finite(2.0), Bound::MinusInf);
        assert_eq!(Bound::MinusInf * Bound::MinusInf, Bound::PlusInf);
        assert_eq!(Bound::Finite(0.0) * Bound::PlusInf, Bound::PlusInf);
    }

    #[test]
    fn test_interval_arithmetic() {
        let a = interval(1.0, 2.0);
        let b = interval(-3.0, 4.0);
        assert_eq!(a + b, interval(-2.0, 6.0));
        assert_eq!(a - b, interval(-3.0, 5.0));
        assert_eq!(a * b, interval(-6.0, 8.0));
        assert_eq!(-a, interval(-2.0, -1.0));
        assert_eq!(Interval::real_line() + a, Interval::real_line());
    }

    #[test]
    fn test_interval_inverse_cases() {
        assert!(Interval::singleton(0.0).inverse().is_err());
        assert_eq!(Interval::singleton(4.0).inverse().unwrap(), Interval::singleton(0.25));
        assert_eq!(interval(2.0, 4.0).inverse().unwrap(), interval(0.25, 0.5));
        let pos_inf = Interval::new(Bound::Finite(2.0), Bound::PlusInf).unwrap();
        assert_eq!(pos_inf.inverse().unwrap(), interval(0.0, 0.5));
        assert_eq!(Interval::non_negative().inverse().unwrap(), Interval::non_negative());
        let zero_left = interval(0.0, 5.0).inverse().unwrap();
        assert_eq!(zero_left.left(), Bound::Finite(0.2));
        assert_eq!(zero_left.right(), Bound::PlusInf);
        assert_eq!(interval(-1.0, 1.0).inverse().unwrap(), Interval::real_line());
    }

    #[test]
    fn test_add_interval_merges_touching() {
        let mut d = Domain::empty();
        d.add_interval(interval(3.0, 4.0));
        d.add_interval(interval(0.0, 1.0));
        assert_eq!(d.intervals().len(), 2);
        assert_eq!(d.intervals()[0], interval(0.0, 1.0));
        d.add_interval(interval(1.0, 3.0));
        assert_eq!(d.intervals(), &[interval(0.0, 4.0)]);
        d.add_interval(Interval::real_line());
        assert_eq!(d, Domain::real_line());
    }

    #[test]
    fn test_discrete_domain_arithmetic() {
        let d = &discrete(&[0.0, 1.0]) + &discrete(&[10.0]);
        assert_eq!(d.singletons(), Some(vec![10.0, 11.0]));
        let p = &discrete(&[-1.0, 2.0]) * &discrete(&[3.0]);
        assert_eq!(p.singletons(), Some(vec![-3.0, 6.0]));
    }

    #[test]
    fn test_sign_predicates() {
        let d = discrete(&[-1.0, 0.0, 1.0]);
        assert!(d.can_be_zero());
        assert!(d.zero_is_discrete());
        assert!(d.can_be_non_zero());
        assert_eq!(d.smallest_pos_lb(true), Some(1.0));
        assert_eq!(d.biggest_neg_rb(true), Some(-1.0));

        let z = Domain::singleton(0.0);
        assert!(!z.can_be_non_zero());
        assert!(!z.can_be_positive(true));
        assert!(z.can_be_positive(false));

        let r = Domain::real_line();
        assert_eq!(r.smallest_pos_lb(true), None);
        assert_eq!(r.biggest_neg_rb(true), None);
        assert!(!r.zero_is_discrete());
    }

    #[test]
    fn test_apply_func() {
        let d = discrete(&[1.0, 4.0]);
        let s = d.apply_func(|x| Ok(x.sqrt()), Domain::non_negative()).unwrap();
        assert_eq!(s.singletons(), Some(vec![1.0, 2.0]));
        let r = Domain::real_line()
            .apply_func(|x| Ok(x.sqrt()), Domain::non_negative())
            .unwrap();
        assert_eq!(r, Domain::non_negative());
        let err = discrete(&[-1.0])
            .apply_func(|x| Err(ScriptError::domain("SQRT", x)), Domain::non_negative())
            .unwrap_err();
        assert!(matches!(err, ScriptError::Domain { .. }));
    }

    #[test]
    fn test_display() {
        let mut d = discrete(&[1.0]);
        d.add_interval(Interval::new(Bound::Finite(2.0), Bound::PlusInf).unwrap());
        assert_eq!(d.to_string(), "{{1}, [2, +inf]}");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_interval() -> impl Strategy<Value = Interval> {
            (-50.0..50.0_f64, 0.0..20.0_f64).prop_map(|(l, w)| interval(l, l + w))
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn test_interval_ops_contain_pointwise_results(
                a in arb_interval(),
                b in arb_interval(),
                s in 0.0..1.0_f64,
                t in 0.0..1.0_f64,
            ) {
                let x = a.left().value() + s * (a.right().value() - a.left().value());
                let y = b.left().value() + t * (b.right().value() - b.left().value());
                let contains = |iv: Interval, v: f64| {
                    let tol = 1e-9 * (1.0 + v.abs());
                    iv.left().value() <= v + tol && v <= iv.right().value() + tol
                };
                prop_assert!(contains(a + b, x + y));
                prop_assert!(contains(a - b, x - y));
                prop_assert!(contains(a * b, x * y));
                if !b.includes(0.0) {
                    prop_assert!(contains(a * b.inverse().unwrap(), x / y));
                }
            }

            #[test]
            fn test_add_interval_keeps_sorted_disjoint(ivs in proptest::collection::vec(arb_interval(), 1..12)) {
                let mut d = Domain::empty();
                for iv in &ivs {
                    d.add_interval(*iv);
                }
                for w in d.intervals().windows(2) {
                    prop_assert!(w[0].right().lt(w[1].left()));
                }
                for iv in &ivs {
                    prop_assert!(d.includes(iv.left().value()));
                    prop_assert!(d.includes(iv.right().value()));
                }
            }
        }
    }
}
