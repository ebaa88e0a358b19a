//! Candidate-proposing oracles for sequential black-box minimization.
//!
//! An oracle proposes points of a [`SearchSpace`] with `ask` and learns their
//! objective values through `tell`. Lower objectives are better. Both oracles here are
//! seeded, so a fixed seed and the same sequence of `tell`s reproduce the same
//! proposals.
//!
//! - **RandomSearchOracle**: uniform sampling, ignores feedback.
//! - **TpeOracle**: Tree-structured Parzen Estimators. After a uniform warm-up it
//!   splits the history into a good and a bad group and proposes the candidate that
//!   maximizes the density ratio `l(x) / g(x)`.

use crate::error::OracleError;
use crate::space::{Candidate, SearchSpace};
use core_types::{ParamSpec, ParamValue};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use rand_pcg::Pcg64;
use std::cmp::Ordering;

pub trait Oracle: Send {
    fn name(&self) -> &'static str;

    /// Proposes the next point to evaluate.
    fn ask(&mut self) -> Result<Candidate, OracleError>;

    /// Proposes `k` points at once, for evaluating them in parallel before any `tell`.
    fn ask_batch(&mut self, k: usize) -> Result<Vec<Candidate>, OracleError> {
        (0..k).map(|_| self.ask()).collect()
    }

    /// Reports the objective of an evaluated point.
    fn tell(&mut self, candidate: Candidate, objective: f64) -> Result<(), OracleError>;

    /// The lowest-objective point told so far. Ties keep the earliest.
    fn best(&self) -> Option<(&[ParamValue], f64)>;

    /// Number of points told so far.
    fn observed(&self) -> usize;
}

/// Evaluated points in the order they were told.
#[derive(Debug, Clone, Default)]
struct Observations {
    points: Vec<(Candidate, f64)>,
}

impl Observations {
    fn record(&mut self, dims: usize, candidate: Candidate, objective: f64) -> Result<(), OracleError> {
        if candidate.len() != dims {
            return Err(OracleError::DimensionMismatch {
                expected: dims,
                got: candidate.len(),
            });
        }
        if !objective.is_finite() {
            return Err(OracleError::NonFiniteObjective(objective));
        }
        self.points.push((candidate, objective));
        Ok(())
    }

    fn best(&self) -> Option<(&[ParamValue], f64)> {
        let mut best: Option<&(Candidate, f64)> = None;
        for point in &self.points {
            if best.is_none_or(|b| point.1 < b.1) {
                best = Some(point);
            }
        }
        best.map(|(c, v)| (c.as_slice(), *v))
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

fn sample_uniform(spec: &ParamSpec, rng: &mut Pcg64) -> Result<ParamValue, OracleError> {
    match spec {
        ParamSpec::Integer { low, high } => Ok(ParamValue::Int(rng.gen_range(*low..=*high))),
        ParamSpec::Real { low, high } => Ok(ParamValue::Real(rng.gen_range(*low..=*high))),
        ParamSpec::Categorical { values } => {
            if values.is_empty() {
                return Err(OracleError::Sampling("categorical dimension is empty".to_string()));
            }
            Ok(values[rng.gen_range(0..values.len())].clone())
        }
    }
}

/// Uniform sampling over the space.
pub struct RandomSearchOracle {
    specs: Vec<ParamSpec>,
    rng: Pcg64,
    history: Observations,
}

impl RandomSearchOracle {
    pub fn new(space: &SearchSpace, seed: u64) -> Self {
        Self {
            specs: space.specs(),
            rng: Pcg64::seed_from_u64(seed),
            history: Observations::default(),
        }
    }
}

impl Oracle for RandomSearchOracle {
    fn name(&self) -> &'static str {
        "random"
    }

    fn ask(&mut self) -> Result<Candidate, OracleError> {
        self.specs
            .iter()
            .map(|spec| sample_uniform(spec, &mut self.rng))
            .collect()
    }

    fn tell(&mut self, candidate: Candidate, objective: f64) -> Result<(), OracleError> {
        self.history.record(self.specs.len(), candidate, objective)
    }

    fn best(&self) -> Option<(&[ParamValue], f64)> {
        self.history.best()
    }

    fn observed(&self) -> usize {
        self.history.len()
    }
}

/// Bayesian search with Tree-structured Parzen Estimators.
pub struct TpeOracle {
    specs: Vec<ParamSpec>,
    rng: Pcg64,
    history: Observations,
    n_initial_points: usize,
    /// Share of the history treated as "good".
    gamma: f64,
    /// Candidates drawn per dimension and proposal.
    n_candidates: usize,
}

impl TpeOracle {
    pub fn new(space: &SearchSpace, seed: u64, n_initial_points: usize) -> Self {
        Self {
            specs: space.specs(),
            rng: Pcg64::seed_from_u64(seed),
            history: Observations::default(),
            n_initial_points: n_initial_points.max(1),
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(f64::EPSILON, 1.0);
        self
    }
}

/// History split into (good, bad) by objective, best first.
fn split(history: &Observations, gamma: f64) -> (Vec<&Candidate>, Vec<&Candidate>) {
    let mut sorted: Vec<&(Candidate, f64)> = history.points.iter().collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    let n_good = ((sorted.len() as f64 * gamma).ceil() as usize).clamp(1, sorted.len());
    let (good, bad) = sorted.split_at(n_good);
    (
        good.iter().map(|(c, _)| c).collect(),
        bad.iter().map(|(c, _)| c).collect(),
    )
}

fn sample_numerical(
    rng: &mut Pcg64,
    n_candidates: usize,
    dim: usize,
    spec: &ParamSpec,
    good: &[&Candidate],
    bad: &[&Candidate],
) -> Result<ParamValue, OracleError> {
    let (low, high, min_sigma) = match spec {
        ParamSpec::Integer { low, high } => (*low as f64, *high as f64, 0.5),
        ParamSpec::Real { low, high } => (*low, *high, 1e-9),
        ParamSpec::Categorical { .. } => return sample_uniform(spec, rng),
    };
    let good_vals: Vec<f64> = good.iter().filter_map(|c| c[dim].as_f64()).collect();
    let bad_vals: Vec<f64> = bad.iter().filter_map(|c| c[dim].as_f64()).collect();
    if good_vals.is_empty() {
        return sample_uniform(spec, rng);
    }

    let sigma = (0.1 * (high - low)).max(min_sigma);
    let mut best_val = good_vals[0];
    let mut best_ratio = f64::NEG_INFINITY;

    for _ in 0..n_candidates {
        // Perturb a random member of the good group.
        let base = good_vals[rng.gen_range(0..good_vals.len())];
        let normal = Normal::new(base, sigma).map_err(|e| OracleError::Sampling(e.to_string()))?;
        let candidate = normal.sample(rng).clamp(low, high);

        let lx = mean_pdf(candidate, &good_vals, sigma);
        let gx = mean_pdf(candidate, &bad_vals, sigma);
        let ratio = lx / (gx + 1e-10);
        if ratio > best_ratio {
            best_ratio = ratio;
            best_val = candidate;
        }
    }

    Ok(match spec {
        ParamSpec::Integer { .. } => ParamValue::Int(best_val.round() as i64),
        _ => ParamValue::Real(best_val),
    })
}

fn sample_categorical(
    rng: &mut Pcg64,
    dim: usize,
    options: &[ParamValue],
    good: &[&Candidate],
    bad: &[&Candidate],
) -> Result<ParamValue, OracleError> {
    // Laplace smoothing keeps unseen options reachable.
    let mut good_counts = vec![1.0; options.len()];
    let mut bad_counts = vec![1.0; options.len()];
    for (group, counts) in [(good, &mut good_counts), (bad, &mut bad_counts)] {
        for candidate in group {
            if let Some(idx) = options.iter().position(|o| *o == candidate[dim]) {
                counts[idx] += 1.0;
            }
        }
    }
    let weights: Vec<f64> = good_counts
        .iter()
        .zip(&bad_counts)
        .map(|(g, b)| g / b)
        .collect();
    let dist = WeightedIndex::new(&weights).map_err(|e| OracleError::Sampling(e.to_string()))?;
    Ok(options[dist.sample(rng)].clone())
}

fn mean_pdf(x: f64, samples: &[f64], sigma: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&m| gaussian_pdf(x, m, sigma)).sum::<f64>() / samples.len() as f64
}

fn gaussian_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let exponent = -0.5 * ((x - mean) / sigma).powi(2);
    (1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt())) * exponent.exp()
}

impl Oracle for TpeOracle {
    fn name(&self) -> &'static str {
        "tpe"
    }

    fn ask(&mut self) -> Result<Candidate, OracleError> {
        if self.history.len() < self.n_initial_points {
            return self
                .specs
                .iter()
                .map(|spec| sample_uniform(spec, &mut self.rng))
                .collect();
        }

        let (good, bad) = split(&self.history, self.gamma);
        let rng = &mut self.rng;
        let n_candidates = self.n_candidates;
        self.specs
            .iter()
            .enumerate()
            .map(|(dim, spec)| match spec {
                ParamSpec::Categorical { values } => sample_categorical(rng, dim, values, &good, &bad),
                _ => sample_numerical(rng, n_candidates, dim, spec, &good, &bad),
            })
            .collect()
    }

    fn tell(&mut self, candidate: Candidate, objective: f64) -> Result<(), OracleError> {
        self.history.record(self.specs.len(), candidate, objective)
    }

    fn best(&self) -> Option<(&[ParamValue], f64)> {
        self.history.best()
    }

    fn observed(&self) -> usize {
        self.history.len()
    }
}
