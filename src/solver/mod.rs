mod binned;
mod direct;

pub use binned::*;
pub use direct::*;

use nalgebra::SVector;

use crate::{
    backend::Backend,
    shared::{Float, Particle, SimulationSettings, to_f64},
};

/// One full force evaluation over a fixed set of bodies.
pub trait ForceSolver<F: Float, const D: usize> {
    fn name(&self) -> &'static str;
    fn settings(&self) -> &SimulationSettings<F>;
    fn accelerations<P, B>(&self, bodies: &[P], backend: &B) -> Vec<SVector<F, D>>
    where
        P: Particle<F, D> + Sync,
        B: Backend;
}

/// Relative deviation of one set of accelerations from a reference set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ErrorStats {
    pub max: f64,
    pub mean: f64,
    /// Index of the body with the largest deviation.
    pub worst: usize,
}

impl ErrorStats {
    /// Per body `|a - e| / |e|`, falling back to `|a - e|` where the reference vanishes.
    pub fn compare<F: Float, const D: usize>(
        approx: &[SVector<F, D>],
        exact: &[SVector<F, D>],
    ) -> Self {
        let mut stats = Self::default();
        let mut sum = 0.0;
        let mut n = 0usize;
        for (i, (a, e)) in approx.iter().zip(exact).enumerate() {
            let diff = to_f64((a - e).norm());
            let norm = to_f64(e.norm());
            let err = if norm > 0.0 { diff / norm } else { diff };
            if err > stats.max || err.is_nan() {
                stats.max = err;
                stats.worst = i;
            }
            sum += err;
            n += 1;
        }
        if n > 0 {
            stats.mean = sum / n as f64;
        }
        stats
    }
}
