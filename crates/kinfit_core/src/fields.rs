//! The four kinematic field models.
//!
//! Parameter layouts:
//! - `Translation`: `[tx, ty, tz]`, `v = t`
//! - `Scaling`: `[s, tx, ty, tz]`, `v = s p + t`
//! - `Helical`: `[rx, ry, rz, tx, ty, tz]`, `v = r × p + t`
//! - `Spiral`: `[rx, ry, rz, tx, ty, tz, s]`, `v = r × p + t + s p`

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3xX, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::KinematicField;

/// Constant velocity everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Translation;

/// Uniform expansion or contraction about a center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scaling;

/// Rigid screw motion: rotation about an axis plus translation along it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Helical;

/// Helical motion combined with uniform scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spiral;

fn vec3(params: &[f64], offset: usize) -> Vector3<f64> {
    Vector3::new(params[offset], params[offset + 1], params[offset + 2])
}

/// Columns `e_x × p`, `e_y × p`, `e_z × p`, so that `r × p = Σ r_j (e_j × p)`.
fn rotation_columns(point: &Vector3<f64>) -> [Vector3<f64>; 3] {
    [
        Vector3::x().cross(point),
        Vector3::y().cross(point),
        Vector3::z().cross(point),
    ]
}

impl KinematicField for Translation {
    fn num_params(&self) -> usize {
        3
    }

    fn name(&self) -> &'static str {
        "translation"
    }

    fn basis(&self, _point: &Vector3<f64>) -> Matrix3xX<f64> {
        Matrix3xX::from_columns(&[Vector3::x(), Vector3::y(), Vector3::z()])
    }

    fn velocity(&self, params: &[f64], _point: &Vector3<f64>) -> Vector3<f64> {
        vec3(params, 0)
    }
}

impl KinematicField for Scaling {
    fn num_params(&self) -> usize {
        4
    }

    fn name(&self) -> &'static str {
        "scaling"
    }

    fn basis(&self, point: &Vector3<f64>) -> Matrix3xX<f64> {
        Matrix3xX::from_columns(&[*point, Vector3::x(), Vector3::y(), Vector3::z()])
    }

    fn velocity(&self, params: &[f64], point: &Vector3<f64>) -> Vector3<f64> {
        point * params[0] + vec3(params, 1)
    }
}

impl KinematicField for Helical {
    fn num_params(&self) -> usize {
        6
    }

    fn name(&self) -> &'static str {
        "helical"
    }

    fn basis(&self, point: &Vector3<f64>) -> Matrix3xX<f64> {
        let [rx, ry, rz] = rotation_columns(point);
        Matrix3xX::from_columns(&[rx, ry, rz, Vector3::x(), Vector3::y(), Vector3::z()])
    }

    fn velocity(&self, params: &[f64], point: &Vector3<f64>) -> Vector3<f64> {
        vec3(params, 0).cross(point) + vec3(params, 3)
    }
}

impl KinematicField for Spiral {
    fn num_params(&self) -> usize {
        7
    }

    fn name(&self) -> &'static str {
        "spiral"
    }

    fn basis(&self, point: &Vector3<f64>) -> Matrix3xX<f64> {
        let [rx, ry, rz] = rotation_columns(point);
        Matrix3xX::from_columns(&[
            rx,
            ry,
            rz,
            Vector3::x(),
            Vector3::y(),
            Vector3::z(),
            *point,
        ])
    }

    fn velocity(&self, params: &[f64], point: &Vector3<f64>) -> Vector3<f64> {
        vec3(params, 0).cross(point) + vec3(params, 3) + point * params[6]
    }
}

/// Runtime selector over the four field models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Translation,
    Scaling,
    Helical,
    Spiral,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::Translation,
        FieldKind::Scaling,
        FieldKind::Helical,
        FieldKind::Spiral,
    ];
}

impl KinematicField for FieldKind {
    fn num_params(&self) -> usize {
        match self {
            FieldKind::Translation => Translation.num_params(),
            FieldKind::Scaling => Scaling.num_params(),
            FieldKind::Helical => Helical.num_params(),
            FieldKind::Spiral => Spiral.num_params(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::Translation => Translation.name(),
            FieldKind::Scaling => Scaling.name(),
            FieldKind::Helical => Helical.name(),
            FieldKind::Spiral => Spiral.name(),
        }
    }

    fn basis(&self, point: &Vector3<f64>) -> Matrix3xX<f64> {
        match self {
            FieldKind::Translation => Translation.basis(point),
            FieldKind::Scaling => Scaling.basis(point),
            FieldKind::Helical => Helical.basis(point),
            FieldKind::Spiral => Spiral.basis(point),
        }
    }

    fn velocity(&self, params: &[f64], point: &Vector3<f64>) -> Vector3<f64> {
        match self {
            FieldKind::Translation => Translation.velocity(params, point),
            FieldKind::Scaling => Scaling.velocity(params, point),
            FieldKind::Helical => Helical.velocity(params, point),
            FieldKind::Spiral => Spiral.velocity(params, point),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("unknown field kind \"{0}\" (expected translation, scaling, helical or spiral)")]
pub struct ParseFieldKindError(String);

impl FromStr for FieldKind {
    type Err = ParseFieldKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "translation" => Ok(FieldKind::Translation),
            "scaling" => Ok(FieldKind::Scaling),
            "helical" => Ok(FieldKind::Helical),
            "spiral" => Ok(FieldKind::Spiral),
            _ => Err(ParseFieldKindError(s.to_string())),
        }
    }
}

/// Scales `params` to unit length and flips the sign so that the entry with the
/// largest magnitude is positive. A zero vector is left untouched.
pub fn normalize_parameters(params: &mut [f64]) {
    let norm = params.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    let mut pivot = 0.0f64;
    for &value in params.iter() {
        if value.abs() > pivot.abs() {
            pivot = value;
        }
    }
    let scale = if pivot < 0.0 { -1.0 / norm } else { 1.0 / norm };
    for value in params.iter_mut() {
        *value *= scale;
    }
}
