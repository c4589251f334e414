//! Surface data consumed by the fitting pipeline.

use nalgebra::Vector3;

/// A mesh vertex with its unit normal and a non-negative confidence weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub weight: f64,
}

impl SurfaceSample {
    /// Builds a sample, normalizing `normal` and clamping negative weights to zero.
    /// A zero normal is kept as is; the sample then contributes nothing to `M`.
    pub fn new(position: Vector3<f64>, normal: Vector3<f64>, weight: f64) -> Self {
        let norm = normal.norm();
        let normal = if norm > 0.0 { normal / norm } else { normal };
        Self {
            position,
            normal,
            weight: if weight > 0.0 { weight } else { 0.0 },
        }
    }

    pub fn unweighted(position: Vector3<f64>, normal: Vector3<f64>) -> Self {
        Self::new(position, normal, 1.0)
    }
}
