//! Heteroscedastic errors-in-variables (HEIV) refinement.
//!
//! With isotropic noise on the normals, the tangency residual `aᵢᵗ θ` of sample `i`
//! has variance proportional to `θᵗ Bᵢᵗ Bᵢ θ = |v(pᵢ)|²`. Each iteration reweights
//! the samples by the inverse of that variance under the current estimate, rebuilds
//! `M` and `N`, and resolves. Only estimates that lower the residual are accepted,
//! so the reported residual history never increases.

use log::{debug, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::eigen::{rayleigh_quotient, select_eigenvector, GeneralizedEigensolver, SelectionMode};
use crate::error::FitResult;
use crate::fields::normalize_parameters;
use crate::fit::fit_once;
use crate::system::{build_reweighted_normal_equations, NormalEquations};
use crate::traits::KinematicField;
use crate::types::SurfaceSample;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeivSettings {
    pub max_iterations: usize,
    /// Convergence threshold on the change of the unit-length parameter vector.
    pub tolerance: f64,
    /// Lower bound on a sample's variance, relative to the mean variance.
    pub variance_floor: f64,
}

impl Default for HeivSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-8,
            variance_floor: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeivOutcome {
    Converged,
    MaxIterationsReached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeivFit {
    /// Best estimate, scaled to unit length with a positive dominant entry.
    pub params: Vec<f64>,
    /// HEIV residual of `params`.
    pub residual: f64,
    /// Number of reweighting iterations performed.
    pub iterations: usize,
    pub converged: bool,
    pub outcome: HeivOutcome,
    /// Residuals of the accepted estimates, starting with the initial fit.
    pub residual_history: Vec<f64>,
}

enum HeivState {
    Init,
    Iterate(usize, NormalEquations),
    Done(HeivOutcome),
}

/// Per-sample residual variances `|v(pᵢ)|²` under `params`, floored at
/// `variance_floor` times their mean. Returns `None` when the field vanishes on
/// every sample.
pub fn sample_variances<F>(
    field: &F,
    samples: &[SurfaceSample],
    params: &[f64],
    variance_floor: f64,
) -> Option<Vec<f64>>
where
    F: KinematicField + ?Sized,
{
    let mut variances: Vec<f64> = samples
        .iter()
        .map(|s| field.velocity(params, &s.position).norm_squared())
        .collect();
    let mean = variances.iter().sum::<f64>() / variances.len().max(1) as f64;
    if !(mean.is_finite() && mean > 0.0) {
        return None;
    }
    let floor = mean * variance_floor;
    for variance in &mut variances {
        *variance = variance.max(floor) / mean;
    }
    Some(variances)
}

/// Weight factors (inverse variances) applied to the squared sample weights.
/// Falls back to uniform factors when the field vanishes everywhere.
pub fn heiv_weights<F>(
    field: &F,
    samples: &[SurfaceSample],
    params: &[f64],
    variance_floor: f64,
) -> Vec<f64>
where
    F: KinematicField + ?Sized,
{
    match sample_variances(field, samples, params, variance_floor) {
        Some(variances) => variances.into_iter().map(|v| 1.0 / v).collect(),
        None => vec![1.0; samples.len()],
    }
}

/// Builds the reweighted system for `params` and evaluates the estimate against it.
fn evaluate<F>(
    field: &F,
    samples: &[SurfaceSample],
    params: &[f64],
    variance_floor: f64,
) -> FitResult<(NormalEquations, f64)>
where
    F: KinematicField + ?Sized,
{
    let weights = heiv_weights(field, samples, params, variance_floor);
    let eqs = build_reweighted_normal_equations(field, samples, &weights)?;
    let theta = DVector::from_column_slice(params);
    let residual = rayleigh_quotient(&eqs.m, &eqs.n, &theta)
        .map(f64::abs)
        .unwrap_or(f64::INFINITY);
    Ok((eqs, residual))
}

/// HEIV residual of `params`: the Rayleigh quotient against the system reweighted
/// by `params` itself.
pub fn heiv_residual<F>(
    field: &F,
    samples: &[SurfaceSample],
    params: &[f64],
    variance_floor: f64,
) -> FitResult<f64>
where
    F: KinematicField + ?Sized,
{
    evaluate(field, samples, params, variance_floor).map(|(_, residual)| residual)
}

/// Distance between two unit vectors, ignoring their sign.
fn parameter_change(a: &[f64], b: &[f64]) -> f64 {
    let (mut minus, mut plus) = (0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        minus += (x - y) * (x - y);
        plus += (x + y) * (x + y);
    }
    minus.min(plus).sqrt()
}

pub(crate) fn refine<F, S>(
    field: &F,
    solver: &S,
    settings: &HeivSettings,
    samples: &[SurfaceSample],
) -> FitResult<HeivFit>
where
    F: KinematicField + ?Sized,
    S: GeneralizedEigensolver + ?Sized,
{
    let mut state = HeivState::Init;
    let mut current: Vec<f64> = Vec::new();
    let mut current_residual = f64::INFINITY;
    let mut history = Vec::new();
    let mut iterations = 0usize;

    let outcome = loop {
        state = match state {
            HeivState::Init => {
                let initial = fit_once(field, solver, samples)?;
                current = initial.params;
                normalize_parameters(&mut current);
                let (initial_eqs, residual) =
                    evaluate(field, samples, &current, settings.variance_floor)?;
                current_residual = residual;
                history.push(residual);
                debug!("{} HEIV init: residual {:.3e}", field.name(), residual);
                HeivState::Iterate(1, initial_eqs)
            }
            HeivState::Iterate(iteration, _) if iteration > settings.max_iterations => {
                HeivState::Done(HeivOutcome::MaxIterationsReached)
            }
            HeivState::Iterate(iteration, system) => {
                iterations = iteration;

                let pairs = solver
                    .solve(&system.m, &system.n)
                    .map_err(|e| e.at_heiv_iteration(iteration))?;
                let selected = select_eigenvector(
                    &system.m,
                    &system.n,
                    &pairs,
                    SelectionMode::RecomputedResidual,
                )
                .map_err(|e| e.at_heiv_iteration(iteration))?;

                let mut candidate: Vec<f64> = selected.vector.iter().copied().collect();
                normalize_parameters(&mut candidate);
                let (candidate_eqs, candidate_residual) =
                    evaluate(field, samples, &candidate, settings.variance_floor)
                        .map_err(|e| e.at_heiv_iteration(iteration))?;

                if candidate_residual.is_nan() || candidate_residual > current_residual {
                    debug!(
                        "{} HEIV iteration {}: residual {:.3e} did not improve on {:.3e}",
                        field.name(),
                        iteration,
                        candidate_residual,
                        current_residual
                    );
                    HeivState::Done(HeivOutcome::Converged)
                } else {
                    let change = parameter_change(&current, &candidate);
                    debug!(
                        "{} HEIV iteration {}: residual {:.3e}, change {:.3e}",
                        field.name(),
                        iteration,
                        candidate_residual,
                        change
                    );
                    current = candidate;
                    current_residual = candidate_residual;
                    history.push(candidate_residual);
                    if change < settings.tolerance {
                        HeivState::Done(HeivOutcome::Converged)
                    } else {
                        HeivState::Iterate(iteration + 1, candidate_eqs)
                    }
                }
            }
            HeivState::Done(outcome) => break outcome,
        };
    };

    if outcome == HeivOutcome::MaxIterationsReached {
        warn!(
            "{} HEIV stopped after {} iterations without converging (residual {:.3e})",
            field.name(),
            settings.max_iterations,
            current_residual
        );
    }

    Ok(HeivFit {
        params: current,
        residual: current_residual,
        iterations,
        converged: outcome == HeivOutcome::Converged,
        outcome,
        residual_history: history,
    })
}
