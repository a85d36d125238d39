use log::{debug, info};
use nalgebra::SVector;
use web_time::Instant;

use super::ForceSolver;
use crate::{
    backend::Backend,
    error::ConfigError,
    force::ForceEvaluator,
    grid::{BinGrid, BinningStrategy, CellMembership, GridSpec},
    shared::{Float, Particle, SimulationSettings, scale_accelerations},
};

/// Everything one binned force pass produced.
#[derive(Clone, Debug)]
pub struct ForcePass<F: Float, const D: usize> {
    pub grid: BinGrid<F, D>,
    pub membership: CellMembership<F, D>,
    pub accelerations: Vec<SVector<F, D>>,
}

/// Grid-binned near/far force evaluation.
///
/// Each pass rebuilds the grid aggregates, then the membership index, then
/// evaluates every body. A phase starts only once the previous one has
/// returned in full.
#[derive(Clone, Debug)]
pub struct BinnedSolver<F: Float, const D: usize> {
    spec: GridSpec<F, D>,
    settings: SimulationSettings<F>,
    strategy: BinningStrategy,
}

impl<F: Float, const D: usize> BinnedSolver<F, D> {
    pub fn new(spec: GridSpec<F, D>, settings: SimulationSettings<F>) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            spec,
            settings,
            strategy: BinningStrategy::default(),
        })
    }

    pub fn with_strategy(mut self, strategy: BinningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn spec(&self) -> &GridSpec<F, D> {
        &self.spec
    }

    pub fn strategy(&self) -> BinningStrategy {
        self.strategy
    }

    pub fn pass<P, B>(&self, bodies: &[P], backend: &B) -> ForcePass<F, D>
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        let start = Instant::now();

        let grid = BinGrid::build(&self.spec, bodies, backend, self.strategy);
        let binned = start.elapsed();
        debug!("cell aggregates built in {:?}", binned);

        let membership = CellMembership::build(&grid, bodies, backend, self.strategy);
        let indexed = start.elapsed();
        debug!("membership index built in {:?}", indexed - binned);

        let evaluator = ForceEvaluator::new(&grid, &membership, self.settings.softening);
        let mut accelerations = evaluator.evaluate(bodies, backend);
        scale_accelerations(&mut accelerations, self.settings.g);
        debug!("forces evaluated in {:?}", start.elapsed() - indexed);

        info!(
            "binned pass over {} bodies and {} cells took {:?} on {}",
            bodies.len(),
            self.spec.num_cells(),
            start.elapsed(),
            backend.name()
        );

        ForcePass {
            grid,
            membership,
            accelerations,
        }
    }
}

impl<F: Float, const D: usize> ForceSolver<F, D> for BinnedSolver<F, D> {
    fn name(&self) -> &'static str {
        "binned"
    }

    fn settings(&self) -> &SimulationSettings<F> {
        &self.settings
    }

    fn accelerations<P, B>(&self, bodies: &[P], backend: &B) -> Vec<SVector<F, D>>
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        self.pass(bodies, backend).accelerations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::Sequential, shared::PointParticle};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn rejects_invalid_settings() {
        let spec = GridSpec::<f32, 3>::new(2, 1.0).unwrap();
        let settings = SimulationSettings {
            g: 1.0,
            softening: -1.0,
        };
        assert!(BinnedSolver::new(spec, settings).is_err());
    }

    #[test]
    fn gravitational_constant_scales_the_result() {
        let spec = GridSpec::new(1, 100.0).unwrap();
        let bodies = vec![
            PointParticle::new(Vector3::new(0.0f32, 0.0, 0.0), 1.0),
            PointParticle::new(Vector3::new(10.0, 0.0, 0.0), 1.0),
        ];
        let settings = SimulationSettings {
            g: 2.0,
            ..SimulationSettings::default()
        };
        let solver = BinnedSolver::new(spec, settings).unwrap();
        let pass = solver.pass(&bodies, &Sequential);

        assert_eq!(pass.grid.total_count(), 2);
        assert_eq!(pass.membership.len(), 2);
        assert_relative_eq!(pass.accelerations[0], Vector3::new(0.02, 0.0, 0.0), epsilon = 1e-6);
    }
}
