use log::info;
use nalgebra::SVector;
use web_time::Instant;

use super::ForceSolver;
use crate::{
    backend::Backend,
    error::ConfigError,
    shared::{Float, Particle, SimulationSettings, scale_accelerations, softened_interaction},
};

/// Exact all-pairs summation with the same softened law, O(N^2).
///
/// Each body sums over every source including itself; the softening makes
/// the self term vanish.
#[derive(Clone, Debug, Default)]
pub struct DirectSolver<F: Float> {
    settings: SimulationSettings<F>,
}

impl<F: Float> DirectSolver<F> {
    pub fn new(settings: SimulationSettings<F>) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self { settings })
    }
}

impl<F: Float, const D: usize> ForceSolver<F, D> for DirectSolver<F> {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn settings(&self) -> &SimulationSettings<F> {
        &self.settings
    }

    fn accelerations<P, B>(&self, bodies: &[P], backend: &B) -> Vec<SVector<F, D>>
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        let start = Instant::now();
        let softening = self.settings.softening;

        let mut accelerations = backend.map(bodies.len(), |i| {
            let target = bodies[i].position();
            let mut acc = SVector::<F, D>::zeros();
            for source in bodies {
                acc += softened_interaction(target, source.position(), source.get_mass(), softening);
            }
            acc
        });
        scale_accelerations(&mut accelerations, self.settings.g);

        info!(
            "direct pass over {} bodies took {:?} on {}",
            bodies.len(),
            start.elapsed(),
            backend.name()
        );
        accelerations
    }
}
