//! Geometric interpretation of fitted parameter vectors.
//!
//! Parameter vectors are only defined up to scale (and sign), so speeds and rates
//! below are relative; ratios such as the helical pitch and the scaling center are
//! scale-invariant.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Rotation or scaling magnitudes below this are treated as absent.
const NEGLIGIBLE: f64 = 1e-12;

fn vec3(params: &[f64], offset: usize) -> Vector3<f64> {
    Vector3::new(params[offset], params[offset + 1], params[offset + 2])
}

fn to_array(v: Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranslationMotion {
    /// Unit direction, zero when the translation vanishes.
    pub direction: [f64; 3],
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingMotion {
    pub rate: f64,
    /// Fixed point of the field, absent when the rate is negligible.
    pub center: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelicalMotion {
    pub axis_direction: [f64; 3],
    /// Point on the axis closest to the origin.
    pub axis_point: [f64; 3],
    pub angular_speed: f64,
    /// Translation speed along `axis_direction`.
    pub axial_speed: f64,
    /// Axial travel per radian of rotation.
    pub pitch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralMotion {
    pub axis_direction: [f64; 3],
    /// Fixed point of the spiral when it scales, otherwise the axis point
    /// closest to the origin.
    pub center: [f64; 3],
    pub angular_speed: f64,
    pub axial_speed: f64,
    pub scale_rate: f64,
}

/// Interprets `[tx, ty, tz]`.
pub fn translation_motion(params: &[f64]) -> TranslationMotion {
    let t = vec3(params, 0);
    let speed = t.norm();
    let direction = if speed > 0.0 { t / speed } else { Vector3::zeros() };
    TranslationMotion {
        direction: to_array(direction),
        speed,
    }
}

/// Interprets `[s, tx, ty, tz]`; the center solves `s c + t = 0`.
pub fn scaling_motion(params: &[f64]) -> ScalingMotion {
    let rate = params[0];
    let t = vec3(params, 1);
    let center = if rate.abs() > NEGLIGIBLE * t.norm().max(1.0) {
        Some(to_array(-t / rate))
    } else {
        None
    };
    ScalingMotion { rate, center }
}

/// Interprets `[rx, ry, rz, tx, ty, tz]`. Returns `None` for a pure translation.
pub fn helical_motion(params: &[f64]) -> Option<HelicalMotion> {
    let r = vec3(params, 0);
    let t = vec3(params, 3);
    screw_decomposition(&r, &t).map(|(axis, point, angular, axial)| HelicalMotion {
        axis_direction: to_array(axis),
        axis_point: to_array(point),
        angular_speed: angular,
        axial_speed: axial,
        pitch: axial / angular,
    })
}

/// Interprets `[rx, ry, rz, tx, ty, tz, s]`. Returns `None` without rotation.
pub fn spiral_motion(params: &[f64]) -> Option<SpiralMotion> {
    let r = vec3(params, 0);
    let t = vec3(params, 3);
    let s = params[6];
    let (axis, axis_point, angular, axial) = screw_decomposition(&r, &t)?;

    if s.abs() > NEGLIGIBLE * angular {
        let system = r.cross_matrix() + Matrix3::identity() * s;
        if let Some(center) = system.lu().solve(&(-t)) {
            return Some(SpiralMotion {
                axis_direction: to_array(axis),
                center: to_array(center),
                angular_speed: angular,
                axial_speed: 0.0,
                scale_rate: s,
            });
        }
    }

    Some(SpiralMotion {
        axis_direction: to_array(axis),
        center: to_array(axis_point),
        angular_speed: angular,
        axial_speed: axial,
        scale_rate: s,
    })
}

/// Splits `v = r × p + t` into axis direction, axis point, angular and axial speed.
fn screw_decomposition(
    r: &Vector3<f64>,
    t: &Vector3<f64>,
) -> Option<(Vector3<f64>, Vector3<f64>, f64, f64)> {
    let angular = r.norm();
    if angular <= NEGLIGIBLE * t.norm().max(1.0) {
        return None;
    }
    let axis = r / angular;
    let point = r.cross(t) / (angular * angular);
    Some((axis, point, angular, t.dot(&axis)))
}
