//! Error taxonomy for the fitting pipeline.

use thiserror::Error;

/// Negative codes flag bad input, positive codes flag a decomposition that did not converge.
pub const CODE_NON_FINITE_INPUT: i32 = -1;
pub const CODE_DIMENSION_MISMATCH: i32 = -2;
pub const CODE_NORMALIZER_NO_CONVERGENCE: i32 = 1;
pub const CODE_REDUCED_NO_CONVERGENCE: i32 = 2;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("insufficient data: {samples} usable samples, at least {required} required")]
    InsufficientData { samples: usize, required: usize },

    #[error("no admissible eigenpair among {candidates} candidates")]
    NoValidSolution { candidates: usize },

    #[error("generalized eigensolve failed (code {code}): {reason}")]
    EigensolveFailed { code: i32, reason: String },

    #[error("HEIV iteration {iteration} failed: {source}")]
    HeivIteration {
        iteration: usize,
        #[source]
        source: Box<FitError>,
    },

    #[error("invalid fit settings: {0}")]
    InvalidSettings(String),
}

impl FitError {
    pub(crate) fn at_heiv_iteration(self, iteration: usize) -> Self {
        FitError::HeivIteration {
            iteration,
            source: Box::new(self),
        }
    }

    /// Returns the underlying error with any HEIV iteration annotations removed.
    pub fn root(&self) -> &FitError {
        match self {
            FitError::HeivIteration { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type FitResult<T> = Result<T, FitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_strips_nested_iteration_annotations() {
        let err = FitError::EigensolveFailed {
            code: CODE_REDUCED_NO_CONVERGENCE,
            reason: "stalled".into(),
        }
        .at_heiv_iteration(2)
        .at_heiv_iteration(3);

        match err.root() {
            FitError::EigensolveFailed { code, .. } => {
                assert_eq!(*code, CODE_REDUCED_NO_CONVERGENCE)
            }
            other => panic!("unexpected root {other:?}"),
        }
        let message = format!("{err}");
        assert!(message.contains("HEIV iteration 3"));
        assert!(message.contains("code 2"));
    }
}
