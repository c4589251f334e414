//! Analytic surfaces whose normals are exactly orthogonal to a known motion.

#![allow(dead_code)]

use std::f64::consts::TAU;

use kinfit_core::SurfaceSample;
use nalgebra::{Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Two unit vectors completing `d` to a right-handed orthonormal frame.
fn frame(d: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if d.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let e1 = d.cross(&helper).normalize();
    let e2 = d.cross(&e1);
    (e1, e2)
}

/// Elliptic cylinder extruded along `direction`; invariant under translation along it.
pub fn extruded_ellipse(
    direction: Vector3<f64>,
    rings: usize,
    per_ring: usize,
) -> Vec<SurfaceSample> {
    let d = direction.normalize();
    let (e1, e2) = frame(&d);
    let (a, b) = (0.8, 0.5);
    let mut samples = Vec::with_capacity(rings * per_ring);
    for i in 0..rings {
        let s = -0.5 + i as f64 / (rings - 1) as f64;
        for j in 0..per_ring {
            let theta = j as f64 * TAU / per_ring as f64;
            let position = e1 * (a * theta.cos()) + e2 * (b * theta.sin()) + d * s;
            let normal = e1 * (theta.cos() / a) + e2 * (theta.sin() / b);
            samples.push(SurfaceSample::unweighted(position, normal));
        }
    }
    samples
}

/// Circular cone with its apex at `apex`, opening along +z; invariant under scaling
/// about the apex.
pub fn cone(apex: Vector3<f64>, slope: f64, rings: usize, per_ring: usize) -> Vec<SurfaceSample> {
    let mut samples = Vec::with_capacity(rings * per_ring);
    for i in 0..rings {
        let s = 0.2 + 0.8 * i as f64 / (rings - 1) as f64;
        for j in 0..per_ring {
            let theta = j as f64 * TAU / per_ring as f64;
            let ray = Vector3::new(theta.cos(), theta.sin(), slope);
            let normal = Vector3::new(theta.cos(), theta.sin(), -1.0 / slope);
            samples.push(SurfaceSample::unweighted(apex + ray * s, normal));
        }
    }
    samples
}

/// A coil spring: a circular tube swept along one turn of a helix.
///
/// In its local frame the sweep rotates about +z at unit angular speed while
/// advancing `pitch` per radian. The local frame is then rotated so that +z maps to
/// `axis` and shifted by `offset`.
pub struct HelicalSweep {
    pub axis: Vector3<f64>,
    pub offset: Vector3<f64>,
    pub pitch: f64,
    pub samples: Vec<SurfaceSample>,
}

impl HelicalSweep {
    pub fn new(axis: Vector3<f64>, offset: Vector3<f64>, pitch: f64) -> Self {
        let axis = axis.normalize();
        let rotation =
            Rotation3::rotation_between(&Vector3::z(), &axis).unwrap_or_else(Rotation3::identity);
        let (major, minor) = (1.0, 0.4);
        let (tube_steps, sweep_steps) = (24, 64);

        let mut samples = Vec::with_capacity(tube_steps * sweep_steps);
        for j in 0..sweep_steps {
            let theta = j as f64 * TAU / sweep_steps as f64;
            let (sin_t, cos_t) = theta.sin_cos();
            for i in 0..tube_steps {
                let u = i as f64 * TAU / tube_steps as f64;
                let (sin_u, cos_u) = u.sin_cos();
                let radial = major + minor * cos_u;
                let position = Vector3::new(
                    cos_t * radial,
                    sin_t * radial,
                    minor * sin_u + pitch * theta,
                );
                let d_u = Vector3::new(
                    -minor * sin_u * cos_t,
                    -minor * sin_u * sin_t,
                    minor * cos_u,
                );
                let d_theta = Vector3::new(-sin_t * radial, cos_t * radial, pitch);
                let normal = d_u.cross(&d_theta);
                samples.push(SurfaceSample::unweighted(
                    rotation * position + offset,
                    rotation * normal,
                ));
            }
        }

        Self {
            axis,
            offset,
            pitch,
            samples,
        }
    }

    /// Helical parameters `[r, t]` of the generating motion at unit angular speed.
    pub fn true_params(&self) -> [f64; 6] {
        let r = self.axis;
        let t = -r.cross(&self.offset) + self.axis * self.pitch;
        [r.x, r.y, r.z, t.x, t.y, t.z]
    }
}

/// Perturbs every normal by uniform noise whose amplitude is `sigma(position)`.
pub fn with_normal_noise<F>(
    samples: &[SurfaceSample],
    seed: u64,
    sigma: F,
) -> Vec<SurfaceSample>
where
    F: Fn(&Vector3<f64>) -> f64,
{
    let mut rng = StdRng::seed_from_u64(seed);
    samples
        .iter()
        .map(|s| {
            let amplitude = sigma(&s.position);
            let noise = Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            ) * amplitude;
            SurfaceSample::new(s.position, s.normal + noise, s.weight)
        })
        .collect()
}

/// Multiplies every position by `factor`; normals are unchanged.
pub fn scaled(samples: &[SurfaceSample], factor: f64) -> Vec<SurfaceSample> {
    samples
        .iter()
        .map(|s| SurfaceSample::new(s.position * factor, s.normal, s.weight))
        .collect()
}

pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let cos = (a.dot(b) / (a.norm() * b.norm())).clamp(-1.0, 1.0);
    cos.acos()
}
