//! Accumulation of the flow-tangency normal equations.
//!
//! Every sample `(p, n, w)` contributes the residual `r = n · v(p) = aᵗ θ` with
//! `a = B(p)ᵗ n`. The fitted parameters minimize `θᵗ M θ / θᵗ N θ` where
//! `M = Σ w² a aᵗ` and `N = Σ w² B(p)ᵗ B(p)`, so `θᵗ N θ = Σ w² |v(p)|²`.

use nalgebra::DMatrix;

use crate::error::{FitError, FitResult};
use crate::traits::KinematicField;
use crate::types::SurfaceSample;

/// The pair of symmetric matrices handed to the generalized eigensolver.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    pub m: DMatrix<f64>,
    pub n: DMatrix<f64>,
    /// Number of samples with a positive, finite effective weight.
    pub samples_used: usize,
}

impl NormalEquations {
    pub fn dimension(&self) -> usize {
        self.m.nrows()
    }
}

/// Builds `M` and `N` using each sample's own weight.
pub fn build_normal_equations<F>(field: &F, samples: &[SurfaceSample]) -> FitResult<NormalEquations>
where
    F: KinematicField + ?Sized,
{
    accumulate(field, samples, None)
}

/// Builds `M` and `N` with every squared sample weight multiplied by `factors[i]`.
pub(crate) fn build_reweighted_normal_equations<F>(
    field: &F,
    samples: &[SurfaceSample],
    factors: &[f64],
) -> FitResult<NormalEquations>
where
    F: KinematicField + ?Sized,
{
    debug_assert_eq!(factors.len(), samples.len());
    accumulate(field, samples, Some(factors))
}

fn accumulate<F>(
    field: &F,
    samples: &[SurfaceSample],
    factors: Option<&[f64]>,
) -> FitResult<NormalEquations>
where
    F: KinematicField + ?Sized,
{
    let dim = field.num_params();
    let required = dim.max(1);
    if samples.len() < required {
        return Err(FitError::InsufficientData {
            samples: samples.len(),
            required,
        });
    }

    let mut m = DMatrix::zeros(dim, dim);
    let mut n = DMatrix::zeros(dim, dim);
    let mut samples_used = 0usize;

    for (i, sample) in samples.iter().enumerate() {
        let mut w2 = sample.weight * sample.weight;
        if let Some(factors) = factors {
            w2 *= factors[i];
        }
        if !(w2.is_finite() && w2 > 0.0) {
            continue;
        }

        let basis = field.basis(&sample.position);
        let a = basis.tr_mul(&sample.normal);
        m.ger(w2, &a, &a, 1.0);
        n.gemm_tr(w2, &basis, &basis, 1.0);
        samples_used += 1;
    }

    if samples_used < required {
        return Err(FitError::InsufficientData {
            samples: samples_used,
            required,
        });
    }

    Ok(NormalEquations {
        m,
        n,
        samples_used,
    })
}
