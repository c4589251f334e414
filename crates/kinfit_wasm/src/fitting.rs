//! Fitting entry points exposed to the viewer.

use crate::samples::{check_param_count, parse_kind, point_at, samples_from_flat, to_js_error};
use kinfit_core::{FieldKind, FitSettings, KinematicField, KinematicFieldFitter, SurfaceSample};
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// Result payload for a single fit.
#[derive(Serialize)]
struct FitReport {
    field: FieldKind,
    heiv: bool,
    params: Vec<f64>,
    residual: f64,
    iterations: usize,
    converged: bool,
}

#[wasm_bindgen]
pub struct WasmFieldFitter {
    samples: Vec<SurfaceSample>,
    settings: FitSettings,
}

impl WasmFieldFitter {
    fn run(&self, kind: FieldKind, use_heiv: bool) -> anyhow::Result<FitReport> {
        let fitter = KinematicFieldFitter::with_settings(kind, self.settings);
        let report = if use_heiv {
            let fit = fitter.fit_heiv(&self.samples)?;
            FitReport {
                field: kind,
                heiv: true,
                params: fit.params,
                residual: fit.residual,
                iterations: fit.iterations,
                converged: fit.converged,
            }
        } else {
            let fit = fitter.fit(&self.samples)?;
            FitReport {
                field: kind,
                heiv: false,
                params: fit.normalized(),
                residual: fit.residual,
                iterations: 0,
                converged: true,
            }
        };
        Ok(report)
    }
}

#[wasm_bindgen]
impl WasmFieldFitter {
    #[wasm_bindgen(constructor)]
    pub fn new(
        positions: Vec<f64>,
        normals: Vec<f64>,
        weights: Vec<f64>,
    ) -> Result<WasmFieldFitter, JsValue> {
        console_error_panic_hook::set_once();

        let samples = samples_from_flat(&positions, &normals, &weights).map_err(to_js_error)?;
        Ok(WasmFieldFitter {
            samples,
            settings: FitSettings::default(),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn set_heiv_settings(&mut self, max_iterations: u32, tolerance: f64) {
        self.settings.heiv.max_iterations = max_iterations as usize;
        self.settings.heiv.tolerance = tolerance;
    }

    /// Fits one field. Plain fits report unit-length parameters like HEIV fits do.
    pub fn fit(&self, kind: &str, use_heiv: bool) -> Result<JsValue, JsValue> {
        let kind = parse_kind(kind).map_err(to_js_error)?;
        let report = self
            .run(kind, use_heiv)
            .map_err(|e| to_js_error(e.context(format!("Fitting {kind} field failed."))))?;
        to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Fits every field type with and without HEIV refinement, in the order
    /// translation, scaling, helical, spiral.
    pub fn fit_all(&self) -> Result<JsValue, JsValue> {
        let mut reports = Vec::with_capacity(2 * FieldKind::ALL.len());
        for kind in FieldKind::ALL {
            for use_heiv in [false, true] {
                let report = self
                    .run(kind, use_heiv)
                    .map_err(|e| to_js_error(e.context(format!("Fitting {kind} field failed."))))?;
                reports.push(report);
            }
        }
        to_value(&reports).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

#[wasm_bindgen]
pub fn evaluate_velocity(
    kind: &str,
    params: Vec<f64>,
    point: Vec<f64>,
) -> Result<Vec<f64>, JsValue> {
    if point.len() != 3 {
        return Err(JsValue::from_str("Point must have exactly 3 coordinates."));
    }
    evaluate_velocities(kind, params, point)
}

/// Evaluates the field at every `x y z` triple of `points`, returning flat velocities.
#[wasm_bindgen]
pub fn evaluate_velocities(
    kind: &str,
    params: Vec<f64>,
    points: Vec<f64>,
) -> Result<Vec<f64>, JsValue> {
    let kind = parse_kind(kind).map_err(to_js_error)?;
    check_param_count(kind, &params).map_err(to_js_error)?;
    if points.len() % 3 != 0 {
        return Err(JsValue::from_str("Point array length must be a multiple of 3."));
    }

    let mut out = Vec::with_capacity(points.len());
    for i in 0..points.len() / 3 {
        let v = kind.velocity(&params, &point_at(&points, i));
        out.extend_from_slice(&[v.x, v.y, v.z]);
    }
    Ok(out)
}
