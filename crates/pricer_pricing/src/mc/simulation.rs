//! Parallel Monte Carlo driver.
//!
//! Paths are split into batches of consecutive indices. Workers pull batch
//! indices from a shared counter, reposition their own random stream on the
//! first path of the batch and write the payoffs into the batch's slot, so
//! the per-path results do not depend on which thread ran which batch.
//!
//! In [`AdMode::Reverse`] each worker owns a [`Tape`]. The model parameters
//! and the model's path-independent setup are recorded once and the tape is
//! marked; every path is then recorded after the mark, propagated back to
//! it and rewound. Parameter adjoints accumulate in the pre-mark section,
//! which is propagated once when the worker runs out of batches.

use std::cell::RefCell;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use pricer_core::aad::{Number, Tape};
use pricer_core::traits::Real;
use pricer_core::types::{allocate_path, initialize_path, Sample, Scenario};
use pricer_script::{
    CompiledEvaluator, Evaluator, FuzzyEvaluator, PayoffEvaluator, ScriptProduct, ScriptResult,
};
use rayon::prelude::*;
use tracing::{info, trace, warn};

use super::config::{AdMode, EvaluatorKind, SimulationConfig};
use super::error::SimulationError;
use super::model::{Model, ModelPrototype};
use crate::rng::RandomStream;

/// Sensitivity of the price to one model parameter.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sensitivity {
    /// Parameter label, as reported by the model.
    pub label: String,
    /// Derivative of the price.
    pub value: f64,
}

/// Outcome of a simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SimulationResult {
    /// Discounted payoff of every path, in path order.
    pub payoffs: Vec<f64>,
    /// Mean of `payoffs`.
    pub price: f64,
    /// Standard error of the mean.
    pub std_error: f64,
    /// Parameter sensitivities; empty without adjoints.
    pub risks: Vec<Sensitivity>,
    /// Number of paths.
    pub paths: usize,
    /// Number of batches.
    pub batches: usize,
    /// Number of workers that ran.
    pub workers: usize,
}

impl SimulationResult {
    /// Half-width of the 95% confidence interval.
    #[inline]
    pub fn confidence_95(&self) -> f64 {
        1.96 * self.std_error
    }

    /// Sensitivity labelled `label`.
    pub fn risk(&self, label: &str) -> Option<f64> {
        self.risks
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.value)
    }
}

/// Evaluator selected by [`EvaluatorKind`].
enum WorkerEvaluator<T: Real> {
    Exact(Evaluator<T>),
    Fuzzy(FuzzyEvaluator<T>),
    Compiled(CompiledEvaluator<T>),
}

impl<T: Real> WorkerEvaluator<T> {
    fn new(product: &ScriptProduct, config: &SimulationConfig) -> ScriptResult<Self> {
        Ok(match config.evaluator() {
            EvaluatorKind::Exact => Self::Exact(product.evaluator()),
            EvaluatorKind::Fuzzy => Self::Fuzzy(product.fuzzy_evaluator(config.fuzzy_epsilon())?),
            EvaluatorKind::Compiled => Self::Compiled(product.compiled_evaluator()),
        })
    }
}

impl<T: Real> PayoffEvaluator<T> for WorkerEvaluator<T> {
    fn evaluate(&mut self, product: &ScriptProduct, scenario: &[Sample<T>]) -> ScriptResult<()> {
        match self {
            Self::Exact(e) => e.evaluate(product, scenario),
            Self::Fuzzy(e) => e.evaluate(product, scenario),
            Self::Compiled(e) => e.evaluate(product, scenario),
        }
    }

    fn variables(&self) -> &[T] {
        match self {
            Self::Exact(e) => e.variables(),
            Self::Fuzzy(e) => e.variables(),
            Self::Compiled(e) => e.variables(),
        }
    }

    fn payoff(&self) -> T {
        match self {
            Self::Exact(e) => e.payoff(),
            Self::Fuzzy(e) => e.payoff(),
            Self::Compiled(e) => e.payoff(),
        }
    }
}

/// Shared batch counter.
struct BatchQueue {
    next: AtomicUsize,
    n_batches: usize,
    batch_size: usize,
    n_paths: usize,
}

impl BatchQueue {
    fn new(n_paths: usize, batch_size: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            n_batches: n_paths.div_ceil(batch_size),
            batch_size,
            n_paths,
        }
    }

    /// Claims the next batch: its index and path range.
    fn pop(&self) -> Option<(usize, Range<usize>)> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        if index >= self.n_batches {
            return None;
        }
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.n_paths);
        Some((index, start..end))
    }
}

/// What one worker hands back to the reduction.
#[derive(Default)]
struct WorkerOutput {
    batches: Vec<(usize, Vec<f64>)>,
    gradient: Vec<f64>,
}

/// Read-only state shared by the workers.
struct Job<'a, P, R> {
    product: &'a ScriptProduct,
    model: &'a P,
    rng: &'a R,
    config: &'a SimulationConfig,
    queue: BatchQueue,
    dim: usize,
}

/// Per-worker buffers.
struct Workspace<T: Real, R> {
    rng: R,
    gaussians: Vec<f64>,
    path: Scenario<T>,
    evaluator: WorkerEvaluator<T>,
}

impl<T: Real, R: RandomStream> Workspace<T, R> {
    fn new<P>(job: &Job<'_, P, R>) -> Result<Self, SimulationError> {
        let mut rng = job.rng.clone();
        rng.init(job.dim);
        let mut path = allocate_path(job.product.defline());
        initialize_path(&mut path);
        Ok(Self {
            rng,
            gaussians: vec![0.0; job.dim],
            path,
            evaluator: WorkerEvaluator::new(job.product, job.config)?,
        })
    }

    /// Simulates the next path and returns its payoff.
    fn next_payoff<M: Model<T>>(
        &mut self,
        model: &M,
        product: &ScriptProduct,
    ) -> Result<T, SimulationError> {
        self.rng.fill_normal(&mut self.gaussians);
        model.generate_path(&self.gaussians, &mut self.path)?;
        self.evaluator.evaluate(product, &self.path)?;
        Ok(self.evaluator.payoff())
    }
}

fn init_model<T: Real, M: Model<T>>(
    model: &mut M,
    product: &ScriptProduct,
) -> Result<(), SimulationError> {
    model.allocate(product.event_times(), product.defline());
    model.init(product.event_times(), product.defline())?;
    Ok(())
}

fn run_plain<P: ModelPrototype, R: RandomStream>(
    job: &Job<'_, P, R>,
) -> Result<WorkerOutput, SimulationError> {
    let mut model = job.model.lift(|v| v);
    init_model(&mut model, job.product)?;
    let mut ws = Workspace::<f64, R>::new(job)?;

    let mut output = WorkerOutput::default();
    while let Some((index, paths)) = job.queue.pop() {
        trace!(batch = index, first_path = paths.start, "simulating batch");
        ws.rng.skip_to(paths.start);
        let mut payoffs = Vec::with_capacity(paths.len());
        for _ in paths {
            payoffs.push(ws.next_payoff(&model, job.product)?);
        }
        output.batches.push((index, payoffs));
    }
    Ok(output)
}

/// Seeds one path's payoff and propagates it back to the checkpoint.
fn backpropagate_path(tape: &RefCell<Tape>, payoff: &Number<'_>) {
    let Some(node) = payoff.node() else {
        return;
    };
    let mut tape = tape.borrow_mut();
    if node.position() >= tape.mark_position() {
        tape.set_adjoint(node, 1.0);
        tape.propagate_to_mark(node);
    } else {
        // Payoff is a setup node: accumulate, it is propagated with the rest.
        *tape.adjoint_mut(node, 0) += 1.0;
    }
}

fn run_reverse<P: ModelPrototype, R: RandomStream>(
    job: &Job<'_, P, R>,
) -> Result<WorkerOutput, SimulationError> {
    let tape = RefCell::new(Tape::new());
    let mut model = job.model.lift(|v| Number::new(&tape, v));
    let parameters = model.parameters();
    init_model(&mut model, job.product)?;
    tape.borrow_mut().mark();

    let mut ws = Workspace::<Number<'_>, R>::new(job)?;
    let mut output = WorkerOutput::default();
    while let Some((index, paths)) = job.queue.pop() {
        trace!(batch = index, first_path = paths.start, "simulating batch with adjoints");
        ws.rng.skip_to(paths.start);
        let mut payoffs = Vec::with_capacity(paths.len());
        for _ in paths {
            tape.borrow_mut().rewind_to_mark();
            let payoff = ws.next_payoff(&model, job.product)?;
            payoffs.push(payoff.value());
            backpropagate_path(&tape, &payoff);
        }
        output.batches.push((index, payoffs));
    }

    tape.borrow_mut().propagate_mark_to_start();
    output.gradient = parameters.iter().map(|p| p.adjoint()).collect();
    Ok(output)
}

fn mean_and_error(payoffs: &[f64]) -> (f64, f64) {
    let n = payoffs.len() as f64;
    let mean = payoffs.iter().sum::<f64>() / n;
    if payoffs.len() < 2 {
        return (mean, 0.0);
    }
    let variance = payoffs.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / (n - 1.0);
    (mean, (variance / n).sqrt())
}

/// Prices `product` under `model` by Monte Carlo.
///
/// The run is reproducible for a given random stream and configuration:
/// per-path payoffs, and therefore the price, do not depend on the number
/// of threads. Risks agree across thread counts up to summation order.
///
/// # Errors
///
/// - [`SimulationError::Config`] for an invalid configuration
/// - [`SimulationError::Model`] when the model rejects the product timeline
///   or fails to generate a path
/// - [`SimulationError::Script`] when evaluation fails on any path
/// - [`SimulationError::ThreadPool`] when a dedicated pool cannot be built
///
/// No partial result is returned.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::mc::{simulate, BlackScholes, SimulationConfig};
/// use pricer_pricing::rng::FixedGaussians;
/// use pricer_script::ScriptProduct;
///
/// let product = ScriptProduct::builder()
///     .event(1.0, "CALL PAYS MAX(SPOT() - 100, 0)")
///     .payoff("CALL")
///     .build()
///     .unwrap();
/// let model = BlackScholes::new(100.0, 0.0, 0.0, 0.0).unwrap();
/// let config = SimulationConfig::builder().n_paths(4).build().unwrap();
///
/// let result = simulate(&product, &model, &FixedGaussians::zeros(), &config).unwrap();
/// assert_eq!(result.price, 0.0);
/// ```
pub fn simulate<P, R>(
    product: &ScriptProduct,
    model: &P,
    rng: &R,
    config: &SimulationConfig,
) -> Result<SimulationResult, SimulationError>
where
    P: ModelPrototype,
    R: RandomStream + Sync,
{
    config.validate()?;
    if config.evaluator() == EvaluatorKind::Fuzzy && !product.is_fuzzy() {
        warn!("fuzzy evaluation of a product built without discrete-domain analysis");
    }

    let mut template = model.lift(|v| v);
    init_model(&mut template, product)?;
    let labels = template.parameter_labels();

    let threads = config.effective_threads();
    let batch_size = config.effective_batch_size(threads);
    let job = Job {
        product,
        model,
        rng,
        config,
        queue: BatchQueue::new(config.n_paths(), batch_size),
        dim: template.sim_dim(),
    };
    let n_batches = job.queue.n_batches;
    let workers = threads.min(n_batches);

    info!(
        paths = config.n_paths(),
        batches = n_batches,
        workers,
        evaluator = %config.evaluator(),
        ad = %config.ad_mode(),
        "simulation started"
    );
    let started = Instant::now();

    let run = || -> Result<Vec<WorkerOutput>, SimulationError> {
        (0..workers)
            .into_par_iter()
            .map(|_| match config.ad_mode() {
                AdMode::NoAd => run_plain(&job),
                AdMode::Reverse => run_reverse(&job),
            })
            .collect()
    };
    let outputs = match config.threads() {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| SimulationError::ThreadPool(e.to_string()))?
            .install(run)?,
        None => run()?,
    };

    let mut payoffs = vec![0.0; config.n_paths()];
    let mut gradient = match config.ad_mode() {
        AdMode::NoAd => Vec::new(),
        AdMode::Reverse => vec![0.0; labels.len()],
    };
    for output in outputs {
        for (index, values) in output.batches {
            let start = index * batch_size;
            payoffs[start..start + values.len()].copy_from_slice(&values);
        }
        for (total, g) in gradient.iter_mut().zip(&output.gradient) {
            *total += g;
        }
    }

    let (price, std_error) = mean_and_error(&payoffs);
    let n = config.n_paths() as f64;
    let risks = labels
        .into_iter()
        .zip(gradient)
        .map(|(label, g)| Sensitivity { label, value: g / n })
        .collect();

    info!(
        price,
        std_error,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "simulation finished"
    );

    Ok(SimulationResult {
        payoffs,
        price,
        std_error,
        risks,
        paths: config.n_paths(),
        batches: n_batches,
        workers,
    })
}
