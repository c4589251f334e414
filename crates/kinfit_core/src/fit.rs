//! Total-least-squares fitting of a single kinematic field.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::eigen::{
    select_eigenvector, EigenSettings, GeneralizedEigensolver, SelectionMode,
    SymmetricReductionSolver,
};
use crate::error::{FitError, FitResult};
use crate::fields::{normalize_parameters, FieldKind};
use crate::heiv::{self, HeivFit, HeivSettings};
use crate::system::build_normal_equations;
use crate::traits::KinematicField;
use crate::types::SurfaceSample;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FitSettings {
    #[serde(default)]
    pub eigen: EigenSettings,
    #[serde(default)]
    pub heiv: HeivSettings,
}

impl FitSettings {
    pub fn validate(&self) -> FitResult<()> {
        let invalid = |msg: &str| Err(FitError::InvalidSettings(msg.to_string()));
        if !is_positive(self.eigen.tolerance) {
            return invalid("eigen.tolerance must be positive.");
        }
        if !is_positive(self.eigen.rank_tolerance) || self.eigen.rank_tolerance >= 1.0 {
            return invalid("eigen.rank_tolerance must lie in (0, 1).");
        }
        if self.heiv.max_iterations == 0 {
            return invalid("heiv.max_iterations must be greater than zero.");
        }
        if !is_positive(self.heiv.tolerance) {
            return invalid("heiv.tolerance must be positive.");
        }
        if !is_positive(self.heiv.variance_floor) || self.heiv.variance_floor > 1.0 {
            return invalid("heiv.variance_floor must lie in (0, 1].");
        }
        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Output of an ordinary (non-reweighted) fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFit {
    /// Selected eigenvector, in the scale produced by the solver.
    pub params: Vec<f64>,
    /// `|θᵗ M θ / θᵗ N θ|` of the selected vector.
    pub residual: f64,
}

impl FieldFit {
    /// Parameters scaled to unit length with a positive dominant entry.
    pub fn normalized(&self) -> Vec<f64> {
        let mut params = self.params.clone();
        normalize_parameters(&mut params);
        params
    }
}

/// Fits one field model to a set of surface samples.
///
/// The solver is a type parameter so a different dense backend can replace the
/// default symmetric reduction without touching the fitting code.
#[derive(Debug, Clone)]
pub struct KinematicFieldFitter<F, S = SymmetricReductionSolver> {
    field: F,
    solver: S,
    settings: FitSettings,
}

impl<F: KinematicField> KinematicFieldFitter<F> {
    pub fn new(field: F) -> Self {
        Self::with_settings(field, FitSettings::default())
    }

    pub fn with_settings(field: F, settings: FitSettings) -> Self {
        Self {
            field,
            solver: SymmetricReductionSolver::new(settings.eigen),
            settings,
        }
    }
}

impl<F: KinematicField, S: GeneralizedEigensolver> KinematicFieldFitter<F, S> {
    pub fn with_solver(field: F, solver: S, settings: FitSettings) -> Self {
        Self {
            field,
            solver,
            settings,
        }
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    /// Solves the uniformly weighted problem and keeps the eigenvector with the
    /// smallest admissible eigenvalue.
    pub fn fit(&self, samples: &[SurfaceSample]) -> FitResult<FieldFit> {
        self.settings.validate()?;
        fit_once(&self.field, &self.solver, samples)
    }

    /// Runs the ordinary fit, then refines it with HEIV reweighting.
    pub fn fit_heiv(&self, samples: &[SurfaceSample]) -> FitResult<HeivFit> {
        self.settings.validate()?;
        heiv::refine(&self.field, &self.solver, &self.settings.heiv, samples)
    }
}

pub(crate) fn fit_once<F, S>(
    field: &F,
    solver: &S,
    samples: &[SurfaceSample],
) -> FitResult<FieldFit>
where
    F: KinematicField + ?Sized,
    S: GeneralizedEigensolver + ?Sized,
{
    let eqs = build_normal_equations(field, samples)?;
    let pairs = solver.solve(&eqs.m, &eqs.n)?;
    let selected =
        select_eigenvector(&eqs.m, &eqs.n, &pairs, SelectionMode::SmallestEigenvalue)?;
    debug!(
        "{} fit over {} samples: residual {:.3e}",
        field.name(),
        eqs.samples_used,
        selected.residual
    );
    Ok(FieldFit {
        params: selected.vector.iter().copied().collect(),
        residual: selected.residual,
    })
}

/// Fits the field selected at runtime by `kind`.
pub fn fit_field(
    kind: FieldKind,
    samples: &[SurfaceSample],
    settings: FitSettings,
) -> FitResult<FieldFit> {
    KinematicFieldFitter::with_settings(kind, settings).fit(samples)
}

/// HEIV-refined fit of the field selected at runtime by `kind`.
pub fn fit_field_heiv(
    kind: FieldKind,
    samples: &[SurfaceSample],
    settings: FitSettings,
) -> FitResult<HeivFit> {
    KinematicFieldFitter::with_settings(kind, settings).fit_heiv(samples)
}
