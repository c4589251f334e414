//! Conversion of flat JS arrays into surface samples.

use anyhow::{bail, Context, Result};
use kinfit_core::{FieldKind, KinematicField, SurfaceSample};
use nalgebra::Vector3;
use wasm_bindgen::JsValue;

/// Builds samples from `x y z` triples. An empty `weights` slice means unit weights.
pub(crate) fn samples_from_flat(
    positions: &[f64],
    normals: &[f64],
    weights: &[f64],
) -> Result<Vec<SurfaceSample>> {
    if positions.len() % 3 != 0 {
        bail!(
            "Position array length {} is not a multiple of 3.",
            positions.len()
        );
    }
    if normals.len() != positions.len() {
        bail!(
            "Normal array length mismatch. Expected {}, got {}.",
            positions.len(),
            normals.len()
        );
    }
    let count = positions.len() / 3;
    if !weights.is_empty() && weights.len() != count {
        bail!(
            "Weight array length mismatch. Expected {} or 0, got {}.",
            count,
            weights.len()
        );
    }

    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let position = point_at(positions, i);
        let normal = point_at(normals, i);
        if position.iter().chain(normal.iter()).any(|v| !v.is_finite()) {
            bail!("Sample {} has a non-finite position or normal.", i);
        }
        if normal.norm_squared() == 0.0 {
            bail!("Sample {} has a zero normal.", i);
        }
        let weight = weights.get(i).copied().unwrap_or(1.0);
        samples.push(SurfaceSample::new(position, normal, weight));
    }
    Ok(samples)
}

pub(crate) fn point_at(flat: &[f64], index: usize) -> Vector3<f64> {
    Vector3::new(flat[3 * index], flat[3 * index + 1], flat[3 * index + 2])
}

pub(crate) fn check_param_count(kind: FieldKind, params: &[f64]) -> Result<()> {
    if params.len() != kind.num_params() {
        bail!(
            "A {} field takes {} parameters, got {}.",
            kind,
            kind.num_params(),
            params.len()
        );
    }
    Ok(())
}

pub(crate) fn parse_kind(kind: &str) -> Result<FieldKind> {
    kind.parse::<FieldKind>()
        .with_context(|| format!("Cannot fit field \"{kind}\"."))
}

pub(crate) fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}
