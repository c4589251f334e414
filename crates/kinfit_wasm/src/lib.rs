//! WASM bridge for the kinfit core library.
//!
//! The viewer loads a mesh, derives per-vertex samples, and hands them over as flat
//! arrays. Fitting runs here; streamline drawing stays on the JS side and calls
//! back into `evaluate_velocities`.

mod fitting;
mod samples;

pub use fitting::{evaluate_velocities, evaluate_velocity, WasmFieldFitter};
