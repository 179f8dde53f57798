//! Dupire local volatility model.
//!
//! The log-spot follows an Euler scheme on a simulation timeline that
//! contains every event time and has no step longer than `max_dt`:
//!
//! ```text
//! x(t + Δt) = x(t) + (r - q) Δt + σ(x, t) √Δt · (z - σ(x, t) √Δt / 2)
//! ```
//!
//! The local volatility `σ(x, t)` is bilinear on a grid of spots and times,
//! flat outside it. Time interpolation happens once in `init`, at the start
//! of every step; spot interpolation happens per step along the path.
//! Numeraire, forwards and discounts use the flat `rate` and `div`, as in
//! [`BlackScholes`](super::BlackScholes).

use pricer_core::traits::Real;
use pricer_core::types::{SampleDef, Scenario, ScenarioError};

use super::error::ModelError;
use super::model::{Model, ModelPrototype};

/// Default longest simulation step, in years.
pub const DEFAULT_MAX_DT: f64 = 0.25;

/// Linear interpolation of `ys` over the increasing grid `xs`, flat outside.
fn interpolate<T: Real>(xs: &[f64], ys: &[T], x: T) -> T {
    let last = xs.len() - 1;
    let xv = x.value();
    if xv <= xs[0] {
        return ys[0];
    }
    if xv >= xs[last] {
        return ys[last];
    }
    let i = xs.partition_point(|&g| g <= xv);
    let (x0, x1) = (xs[i - 1], xs[i]);
    ys[i - 1] + (ys[i] - ys[i - 1]) * ((x - x0) / (x1 - x0))
}

/// Event quantities fixed by the timeline.
#[derive(Clone, Debug)]
struct EventFill<T> {
    /// Simulation steps completed when the event is observed
    step: usize,
    numeraire: T,
    forward_factors: Vec<T>,
    discounts: Vec<T>,
}

/// Local volatility model on a spot × time grid.
///
/// # Examples
///
/// ```rust
/// use pricer_core::types::{allocate_path, SampleDef};
/// use pricer_pricing::mc::{Dupire, Model};
///
/// // Flat 20% surface
/// let mut model = Dupire::new(100.0, 0.0, 0.0, vec![80.0, 120.0], vec![0.0, 1.0], vec![0.2; 4])
///     .unwrap()
///     .max_dt(0.5)
///     .unwrap();
/// let timeline = [1.0];
/// let defline = [SampleDef::at(1.0)];
/// model.allocate(&timeline, &defline);
/// model.init(&timeline, &defline).unwrap();
/// assert_eq!(model.sim_dim(), 2);
///
/// let mut path = allocate_path(&defline);
/// model.generate_path(&[0.0, 0.0], &mut path).unwrap();
/// assert!((path[0].spot - 100.0 * (-0.02_f64).exp()).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct Dupire<T> {
    spot: T,
    rate: T,
    div: T,
    spots: Vec<f64>,
    log_spots: Vec<f64>,
    times: Vec<f64>,
    /// Row per grid spot, column per grid time
    vols: Vec<T>,
    max_dt: f64,
    /// Simulation step lengths
    dts: Vec<f64>,
    /// `σ √Δt` per step (row) and grid spot (column)
    step_vols: Vec<T>,
    /// `(r - q) Δt` per step
    step_drifts: Vec<T>,
    events: Vec<EventFill<T>>,
    initialised: bool,
}

fn strictly_increasing(grid: &[f64]) -> bool {
    grid.windows(2).all(|w| w[0] < w[1]) && grid.iter().all(|g| g.is_finite())
}

impl<T: Real> Dupire<T> {
    /// Model with spot, flat rate and dividend yield, and a local volatility
    /// surface given row-major by spot: `vols[i * times.len() + j]` is the
    /// volatility at `spots[i]`, `times[j]`.
    ///
    /// # Errors
    /// `InvalidParameter` for a non-positive or non-finite spot, a grid that
    /// is empty, unsorted or non-positive, a surface of the wrong size, or a
    /// negative volatility.
    pub fn new(
        spot: T,
        rate: T,
        div: T,
        spots: Vec<f64>,
        times: Vec<f64>,
        vols: Vec<T>,
    ) -> Result<Self, ModelError> {
        let invalid = |name, value, reason| {
            Err(ModelError::InvalidParameter {
                name,
                value,
                reason,
            })
        };
        if !(spot.value() > 0.0) || !spot.value().is_finite() {
            return invalid("spot", spot.value(), "must be positive");
        }
        for (name, value) in [("rate", rate.value()), ("div", div.value())] {
            if !value.is_finite() {
                return invalid(name, value, "must be finite");
            }
        }
        if spots.is_empty() || !strictly_increasing(&spots) || spots[0] <= 0.0 {
            return invalid(
                "spots",
                spots.first().copied().unwrap_or(f64::NAN),
                "must be positive and strictly increasing",
            );
        }
        if times.is_empty() || !strictly_increasing(&times) || times[0] < 0.0 {
            return invalid(
                "times",
                times.first().copied().unwrap_or(f64::NAN),
                "must be non-negative and strictly increasing",
            );
        }
        if vols.len() != spots.len() * times.len() {
            return invalid("vols", vols.len() as f64, "must have spots x times values");
        }
        if let Some(v) = vols.iter().find(|v| !(v.value() >= 0.0) || !v.value().is_finite()) {
            return invalid("vols", v.value(), "must be non-negative");
        }

        Ok(Self {
            spot,
            rate,
            div,
            log_spots: spots.iter().map(|s| s.ln()).collect(),
            spots,
            times,
            vols,
            max_dt: DEFAULT_MAX_DT,
            dts: Vec::new(),
            step_vols: Vec::new(),
            step_drifts: Vec::new(),
            events: Vec::new(),
            initialised: false,
        })
    }

    /// Sets the longest simulation step.
    ///
    /// # Errors
    /// `InvalidParameter` unless `max_dt` is positive and finite.
    pub fn max_dt(mut self, max_dt: f64) -> Result<Self, ModelError> {
        if !(max_dt > 0.0) || !max_dt.is_finite() {
            return Err(ModelError::InvalidParameter {
                name: "max_dt",
                value: max_dt,
                reason: "must be positive",
            });
        }
        self.max_dt = max_dt;
        self.initialised = false;
        Ok(self)
    }

    /// Initial spot.
    pub fn spot(&self) -> T {
        self.spot
    }

    /// Spot grid of the surface.
    pub fn spots(&self) -> &[f64] {
        &self.spots
    }

    /// Time grid of the surface.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Surface values, row-major by spot.
    pub fn vols(&self) -> &[T] {
        &self.vols
    }

    /// Local volatility at `spot`, `time`.
    pub fn local_vol(&self, spot: f64, time: f64) -> T {
        let column: Vec<T> = self
            .vol_rows()
            .map(|row| interpolate(&self.times, row, T::from_f64(time)))
            .collect();
        interpolate(&self.log_spots, &column, T::from_f64(spot.ln()))
    }

    fn vol_rows(&self) -> std::slice::Chunks<'_, T> {
        self.vols.chunks(self.times.len())
    }
}

impl<T: Real> Model<T> for Dupire<T> {
    fn allocate(&mut self, timeline: &[f64], defline: &[SampleDef]) {
        self.events = defline
            .iter()
            .take(timeline.len())
            .map(|def| EventFill {
                step: 0,
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
        if self.events.len() != timeline.len() {
            self.allocate(timeline, defline);
        }

        // Simulation timeline: event times, with long gaps split evenly
        self.dts.clear();
        let mut starts = Vec::new();
        let mut previous = 0.0;
        for ((&t, def), event) in timeline.iter().zip(defline).zip(self.events.iter_mut()) {
            if !t.is_finite() || t < previous {
                return Err(ModelError::InvalidTimeline(format!(
                    "event time {} after {}",
                    t, previous
                )));
            }
            def.validate(t)?;

            let gap = t - previous;
            if gap > 0.0 {
                let n = (gap / self.max_dt).ceil().max(1.0) as usize;
                let dt = gap / n as f64;
                for k in 0..n {
                    starts.push(previous + k as f64 * dt);
                    self.dts.push(dt);
                }
            }

            let carry = self.rate - self.div;
            event.step = self.dts.len();
            event.numeraire = if def.numeraire {
                (self.rate * t).exp()
            } else {
                T::one()
            };
            event.forward_factors.clear();
            event
                .forward_factors
                .extend(def.forward_mats.iter().map(|&m| (carry * (m - t)).exp()));
            event.discounts.clear();
            event
                .discounts
                .extend(def.discount_mats.iter().map(|&m| (-(self.rate * (m - t))).exp()));
            previous = t;
        }

        let n_spots = self.spots.len();
        self.step_vols.clear();
        self.step_vols.reserve(self.dts.len() * n_spots);
        self.step_drifts.clear();
        for (&start, &dt) in starts.iter().zip(&self.dts) {
            let sqrt_dt = dt.sqrt();
            let row_vols: Vec<T> = self
                .vol_rows()
                .map(|row| interpolate(&self.times, row, T::from_f64(start)) * sqrt_dt)
                .collect();
            self.step_vols.extend(row_vols);
            self.step_drifts.push((self.rate - self.div) * dt);
        }
        self.initialised = true;
        Ok(())
    }

    fn sim_dim(&self) -> usize {
        self.dts.len()
    }

    fn generate_path(&self, gaussians: &[f64], path: &mut Scenario<T>) -> Result<(), ModelError> {
        if !self.initialised {
            return Err(ModelError::NotInitialised);
        }
        if gaussians.len() < self.dts.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dts.len(),
                actual: gaussians.len(),
            });
        }
        if path.len() != self.events.len() {
            return Err(ScenarioError::LengthMismatch {
                expected: self.events.len(),
                actual: path.len(),
            }
            .into());
        }

        let n_spots = self.spots.len();
        let mut log_spot = self.spot.ln();
        let mut step = 0;
        for (sample, event) in path.iter_mut().zip(&self.events) {
            while step < event.step {
                let row = &self.step_vols[step * n_spots..(step + 1) * n_spots];
                let vol = interpolate(&self.log_spots, row, log_spot);
                log_spot += self.step_drifts[step] + vol * (vol * -0.5 + gaussians[step]);
                step += 1;
            }
            let spot = log_spot.exp();
            sample.spot = spot;
            sample.numeraire = event.numeraire;
            for (forward, &factor) in sample.forwards.iter_mut().zip(&event.forward_factors) {
                *forward = spot * factor;
            }
            for (discount, &df) in sample.discounts.iter_mut().zip(&event.discounts) {
                *discount = df;
            }
        }
        Ok(())
    }

    fn parameters(&self) -> Vec<T> {
        let mut params = vec![self.spot, self.rate, self.div];
        params.extend_from_slice(&self.vols);
        params
    }

    fn parameter_labels(&self) -> Vec<String> {
        let mut labels = vec!["spot".to_string(), "rate".to_string(), "div".to_string()];
        for s in &self.spots {
            for t in &self.times {
                labels.push(format!("lvol {:.2} {:.2}", s, t));
            }
        }
        labels
    }
}

impl ModelPrototype for Dupire<f64> {
    type Lifted<T: Real> = Dupire<T>;

    fn lift<T: Real>(&self, mut f: impl FnMut(f64) -> T) -> Dupire<T> {
        let spot = f(self.spot);
        let rate = f(self.rate);
        let div = f(self.div);
        Dupire {
            spot,
            rate,
            div,
            spots: self.spots.clone(),
            log_spots: self.log_spots.clone(),
            times: self.times.clone(),
            vols: self.vols.iter().map(|&v| f(v)).collect(),
            max_dt: self.max_dt,
            dts: Vec::new(),
            step_vols: Vec::new(),
            step_drifts: Vec::new(),
            events: Vec::new(),
            initialised: false,
        }
    }
}
