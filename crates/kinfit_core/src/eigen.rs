//! Generalized eigenproblem `M x = λ N x` and eigenvector selection.
//!
//! The solver sits behind [`GeneralizedEigensolver`] so a different dense backend can
//! be dropped in. Pairs follow the `ggev` convention: `λ = alpha / beta`, with
//! `beta == 0` marking an infinite eigenvalue.

use log::debug;
use nalgebra::{DMatrix, DVector, Dyn, SymmetricEigen};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{
    FitError, FitResult, CODE_DIMENSION_MISMATCH, CODE_NON_FINITE_INPUT,
    CODE_NORMALIZER_NO_CONVERGENCE, CODE_REDUCED_NO_CONVERGENCE,
};

/// Imaginary parts below this are treated as zero when screening eigenvalues.
pub const IMAGINARY_TOLERANCE: f64 = 1e-5;

/// Denominators `xᵗ N x` below this fraction of `trace(N) |x|²` are treated as zero.
const DENOMINATOR_FLOOR: f64 = 1e-13;

#[derive(Debug, Clone)]
pub struct GeneralizedEigenpair {
    pub alpha: Complex<f64>,
    pub beta: f64,
    pub vector: DVector<f64>,
}

impl GeneralizedEigenpair {
    /// Real eigenvalue with a strictly positive denominator.
    pub fn is_admissible(&self) -> bool {
        self.alpha.im.abs() < IMAGINARY_TOLERANCE && self.beta > 0.0
    }

    pub fn eigenvalue(&self) -> Option<Complex<f64>> {
        if self.beta == 0.0 {
            None
        } else {
            Some(self.alpha / self.beta)
        }
    }
}

/// Dense solver for symmetric-definite pencils `(M, N)`.
pub trait GeneralizedEigensolver {
    /// Returns every eigenpair of the pencil. An empty pencil yields no pairs.
    fn solve(
        &self,
        m: &DMatrix<f64>,
        n: &DMatrix<f64>,
    ) -> FitResult<Vec<GeneralizedEigenpair>>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EigenSettings {
    /// Convergence threshold passed to the symmetric QR iteration.
    pub tolerance: f64,
    /// Iteration cap for each symmetric decomposition; zero means unbounded.
    pub max_iterations: usize,
    /// Eigenvalues of `N` below `rank_tolerance * max eigenvalue` span its null space.
    /// Values under `f64::EPSILON` are raised to it.
    pub rank_tolerance: f64,
}

impl Default for EigenSettings {
    fn default() -> Self {
        Self {
            tolerance: f64::EPSILON,
            max_iterations: 1000,
            rank_tolerance: 1e-12,
        }
    }
}

/// Reduces the pencil to a standard symmetric problem by whitening with `N`.
///
/// `N = V D Vᵗ` is decomposed first. On the range of `N` the problem becomes
/// `Wᵗ M W y = λ y` with `W = V_r D_r^{-1/2}`, giving finite pairs with `beta = 1`
/// and `xᵗ N x = 1`. Null directions of `N` are returned with `beta = 0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricReductionSolver {
    pub settings: EigenSettings,
}

impl SymmetricReductionSolver {
    pub fn new(settings: EigenSettings) -> Self {
        Self { settings }
    }

    fn decompose(
        &self,
        matrix: DMatrix<f64>,
        code: i32,
        what: &str,
    ) -> FitResult<SymmetricEigen<f64, Dyn>> {
        SymmetricEigen::try_new(matrix, self.settings.tolerance, self.settings.max_iterations)
            .ok_or_else(|| FitError::EigensolveFailed {
                code,
                reason: format!(
                    "{what} decomposition did not converge within {} iterations",
                    self.settings.max_iterations
                ),
            })
    }
}

impl GeneralizedEigensolver for SymmetricReductionSolver {
    fn solve(
        &self,
        m: &DMatrix<f64>,
        n: &DMatrix<f64>,
    ) -> FitResult<Vec<GeneralizedEigenpair>> {
        let dim = m.nrows();
        if m.ncols() != dim || n.nrows() != dim || n.ncols() != dim {
            return Err(FitError::EigensolveFailed {
                code: CODE_DIMENSION_MISMATCH,
                reason: format!(
                    "expected square matrices of equal size, got {}x{} and {}x{}",
                    m.nrows(),
                    m.ncols(),
                    n.nrows(),
                    n.ncols()
                ),
            });
        }
        if dim == 0 {
            return Ok(Vec::new());
        }
        if m.iter().chain(n.iter()).any(|v| !v.is_finite()) {
            return Err(FitError::EigensolveFailed {
                code: CODE_NON_FINITE_INPUT,
                reason: "matrix entries must be finite".into(),
            });
        }

        let normalizer =
            self.decompose(n.clone(), CODE_NORMALIZER_NO_CONVERGENCE, "normalizer")?;
        let scale = normalizer
            .eigenvalues
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        let cutoff = scale * self.settings.rank_tolerance.max(f64::EPSILON);

        let (range, null): (Vec<usize>, Vec<usize>) =
            (0..dim).partition(|&i| scale > 0.0 && normalizer.eigenvalues[i] > cutoff);
        if !null.is_empty() {
            debug!("normalizer has rank {} of {}", range.len(), dim);
        }

        let mut pairs = Vec::with_capacity(dim);

        if !range.is_empty() {
            let mut whitening = DMatrix::zeros(dim, range.len());
            for (col, &idx) in range.iter().enumerate() {
                let inv_sqrt = 1.0 / normalizer.eigenvalues[idx].sqrt();
                whitening.set_column(col, &(normalizer.eigenvectors.column(idx) * inv_sqrt));
            }

            let reduced = whitening.transpose() * m * &whitening;
            let reduced = (&reduced + reduced.transpose()) * 0.5;
            let eig = self.decompose(reduced, CODE_REDUCED_NO_CONVERGENCE, "reduced problem")?;

            for k in 0..range.len() {
                pairs.push(GeneralizedEigenpair {
                    alpha: Complex::new(eig.eigenvalues[k], 0.0),
                    beta: 1.0,
                    vector: &whitening * eig.eigenvectors.column(k),
                });
            }
        }

        for &idx in &null {
            let vector = normalizer.eigenvectors.column(idx).into_owned();
            let alpha = vector.dot(&(m * &vector));
            pairs.push(GeneralizedEigenpair {
                alpha: Complex::new(alpha, 0.0),
                beta: 0.0,
                vector,
            });
        }

        Ok(pairs)
    }
}

/// How the best-fit eigenvector is picked out of the solver output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Smallest `|λ|` among real pairs with a positive denominator.
    SmallestEigenvalue,
    /// Smallest `|xᵗ M x / xᵗ N x|`, recomputed from the matrices for every vector.
    RecomputedResidual,
}

#[derive(Debug, Clone)]
pub struct SelectedEigenvector {
    pub index: usize,
    pub vector: DVector<f64>,
    /// `|xᵗ M x / xᵗ N x|` of the selected vector.
    pub residual: f64,
}

/// Returns `xᵗ M x / xᵗ N x`, or `None` when the denominator vanishes relative to `N`.
pub fn rayleigh_quotient(m: &DMatrix<f64>, n: &DMatrix<f64>, x: &DVector<f64>) -> Option<f64> {
    let numerator = x.dot(&(m * x));
    let denominator = x.dot(&(n * x));
    let floor = DENOMINATOR_FLOOR * n.trace().abs() * x.norm_squared();
    if !(denominator.is_finite() && denominator > floor) {
        return None;
    }
    let quotient = numerator / denominator;
    quotient.is_finite().then_some(quotient)
}

pub fn select_eigenvector(
    m: &DMatrix<f64>,
    n: &DMatrix<f64>,
    pairs: &[GeneralizedEigenpair],
    mode: SelectionMode,
) -> FitResult<SelectedEigenvector> {
    let candidates = pairs.len();
    if candidates == 0 || m.nrows() == 0 {
        return Err(FitError::NoValidSolution { candidates });
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, pair) in pairs.iter().enumerate() {
        let score = match mode {
            SelectionMode::SmallestEigenvalue => {
                if !pair.is_admissible() {
                    continue;
                }
                pair.alpha.re.abs() / pair.beta
            }
            SelectionMode::RecomputedResidual => match rayleigh_quotient(m, n, &pair.vector) {
                Some(q) => q.abs(),
                None => continue,
            },
        };
        if !score.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, current)| score < current) {
            best = Some((i, score));
        }
    }

    let (index, score) = best.ok_or(FitError::NoValidSolution { candidates })?;
    let vector = pairs[index].vector.clone();
    let residual = rayleigh_quotient(m, n, &vector)
        .map(f64::abs)
        .unwrap_or(score);

    Ok(SelectedEigenvector {
        index,
        vector,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve(m: &DMatrix<f64>, n: &DMatrix<f64>) -> Vec<GeneralizedEigenpair> {
        SymmetricReductionSolver::default()
            .solve(m, n)
            .expect("eigensolve should succeed")
    }

    #[test]
    fn pairs_satisfy_the_generalized_relation() {
        let m = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0]);
        let n = DMatrix::from_row_slice(3, 3, &[2.0, 0.3, 0.0, 0.3, 1.0, 0.1, 0.0, 0.1, 1.5]);
        let pairs = solve(&m, &n);
        assert_eq!(pairs.len(), 3);
        for pair in &pairs {
            let lambda = pair.eigenvalue().expect("finite eigenvalue").re;
            let lhs = &m * &pair.vector;
            let rhs = &n * &pair.vector * lambda;
            assert!((lhs - rhs).norm() < 1e-10);
            assert!((pair.vector.dot(&(&n * &pair.vector)) - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn rounding_level_normalizer_directions_are_not_whitened() {
        let solver = SymmetricReductionSolver::new(EigenSettings {
            rank_tolerance: 0.0,
            ..EigenSettings::default()
        });
        let m = DMatrix::identity(2, 2);
        let n = DMatrix::from_diagonal(&DVector::from_column_slice(&[1.0, 1e-20]));
        let pairs = solver.solve(&m, &n).expect("eigensolve should succeed");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.iter().filter(|p| p.beta == 0.0).count(), 1);
        for pair in &pairs {
            assert!(pair.vector.iter().all(|v| v.is_finite()));
            assert!(pair.vector.norm() < 10.0);
        }
    }

    #[test]
    fn smallest_eigenvalue_mode_picks_minimum_ratio() {
        let m = DMatrix::from_diagonal(&DVector::from_column_slice(&[3.0, 1.0, 2.0]));
        let n = DMatrix::identity(3, 3);
        let pairs = solve(&m, &n);
        let selected =
            select_eigenvector(&m, &n, &pairs, SelectionMode::SmallestEigenvalue).unwrap();
        assert!((selected.vector[1].abs() - 1.0).abs() < 1e-12);
        assert!((selected.residual - 1.0).abs() < 1e-12);
    }

    #[test]
    fn singular_normalizer_yields_infinite_pairs() {
        let m = DMatrix::identity(3, 3);
        let n = DMatrix::from_diagonal(&DVector::from_column_slice(&[1.0, 2.0, 0.0]));
        let pairs = solve(&m, &n);
        assert_eq!(pairs.len(), 3);
        let infinite: Vec<_> = pairs.iter().filter(|p| p.beta == 0.0).collect();
        assert_eq!(infinite.len(), 1);
        assert!(infinite[0].eigenvalue().is_none());
        assert!(!infinite[0].is_admissible());

        for mode in [SelectionMode::SmallestEigenvalue, SelectionMode::RecomputedResidual] {
            let selected = select_eigenvector(&m, &n, &pairs, mode).unwrap();
            assert!(selected.vector[2].abs() < 1e-12);
            assert!((selected.residual - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn recomputed_mode_ignores_reported_eigenvalues() {
        let m = DMatrix::from_diagonal(&DVector::from_column_slice(&[5.0, 0.5]));
        let n = DMatrix::identity(2, 2);
        let pairs = vec![
            GeneralizedEigenpair {
                alpha: Complex::new(0.0, 0.0),
                beta: 1.0,
                vector: DVector::from_column_slice(&[1.0, 0.0]),
            },
            GeneralizedEigenpair {
                alpha: Complex::new(9.0, 0.0),
                beta: 1.0,
                vector: DVector::from_column_slice(&[0.0, 2.0]),
            },
        ];

        let fast = select_eigenvector(&m, &n, &pairs, SelectionMode::SmallestEigenvalue).unwrap();
        assert_eq!(fast.index, 0);

        let recomputed =
            select_eigenvector(&m, &n, &pairs, SelectionMode::RecomputedResidual).unwrap();
        assert_eq!(recomputed.index, 1);
        assert!((recomputed.residual - 0.5).abs() < 1e-12);
    }

    #[test]
    fn complex_or_improper_pairs_are_not_admissible() {
        let m = DMatrix::identity(2, 2);
        let n = DMatrix::identity(2, 2);
        let pairs = vec![
            GeneralizedEigenpair {
                alpha: Complex::new(1.0, 0.5),
                beta: 1.0,
                vector: DVector::from_column_slice(&[1.0, 0.0]),
            },
            GeneralizedEigenpair {
                alpha: Complex::new(1.0, 0.0),
                beta: -1.0,
                vector: DVector::from_column_slice(&[0.0, 1.0]),
            },
        ];
        let err =
            select_eigenvector(&m, &n, &pairs, SelectionMode::SmallestEigenvalue).unwrap_err();
        assert!(matches!(err, FitError::NoValidSolution { candidates: 2 }));
    }

    #[test]
    fn empty_problem_has_no_solution() {
        let empty = DMatrix::<f64>::zeros(0, 0);
        let pairs = solve(&empty, &empty);
        assert!(pairs.is_empty());
        let err = select_eigenvector(&empty, &empty, &pairs, SelectionMode::SmallestEigenvalue)
            .unwrap_err();
        assert!(matches!(err, FitError::NoValidSolution { candidates: 0 }));
    }

    #[test]
    fn non_finite_entries_fail_with_diagnostic_code() {
        let mut m = DMatrix::identity(2, 2);
        m[(0, 1)] = f64::NAN;
        let err = SymmetricReductionSolver::default()
            .solve(&m, &DMatrix::identity(2, 2))
            .unwrap_err();
        match err {
            FitError::EigensolveFailed { code, .. } => assert_eq!(code, CODE_NON_FINITE_INPUT),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn mismatched_shapes_fail_with_diagnostic_code() {
        let err = SymmetricReductionSolver::default()
            .solve(&DMatrix::identity(2, 2), &DMatrix::identity(3, 3))
            .unwrap_err();
        assert!(matches!(
            err,
            FitError::EigensolveFailed {
                code: CODE_DIMENSION_MISMATCH,
                ..
            }
        ));
    }
}
