pub mod eigen;
pub mod error;
pub mod fields;
pub mod fit;
pub mod heiv;
pub mod motion;
pub mod system;
pub mod types;
/// The `kinfit_core` crate fits instantaneous velocity fields (translation, scaling,
/// helical and spiral motions) to oriented surface samples.
/// Motion data is never observed directly: a field fits well when its velocity is
/// tangent to the surface everywhere.
///
/// Key components:
/// - **Traits**: `KinematicField` (linear-in-parameters velocity model).
/// - **Fields**: the four concrete field models and the `FieldKind` selector.
/// - **System**: accumulation of the normal-equation matrices `M` and `N`.
/// - **Eigen**: the generalized eigensolver seam and eigenvector selection.
/// - **Fit / HEIV**: the plain total-least-squares fit and its heteroscedastic refinement.
pub mod traits;

pub use error::{FitError, FitResult};
pub use fields::{FieldKind, Helical, Scaling, Spiral, Translation};
pub use fit::{fit_field, fit_field_heiv, FieldFit, FitSettings, KinematicFieldFitter};
pub use heiv::{HeivFit, HeivOutcome, HeivSettings};
pub use traits::KinematicField;
pub use types::SurfaceSample;
