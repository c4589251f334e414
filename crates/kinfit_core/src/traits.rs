use nalgebra::{Matrix3xX, Vector3};

/// A velocity field over 3D space that is linear in its parameters.
///
/// Implementors must satisfy `velocity(params, p) == basis(p) * params` for every
/// point and parameter vector; the fitting code only ever looks at `basis`.
pub trait KinematicField {
    /// Returns the length of the parameter vector.
    fn num_params(&self) -> usize;

    /// Short lowercase name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Returns the 3 x `num_params` matrix whose j-th column is the velocity
    /// produced at `point` by the j-th unit parameter.
    fn basis(&self, point: &Vector3<f64>) -> Matrix3xX<f64>;

    /// Evaluates the field at `point`.
    /// params: slice of exactly `num_params` values
    fn velocity(&self, params: &[f64], point: &Vector3<f64>) -> Vector3<f64>;
}
