//! Near/far force decomposition over a built grid.
//!
//! Every cell first acts on the target as a point mass at its centre of mass.
//! For the cells in the target's 3^D neighborhood that approximation is then
//! removed again by a mirror point, `2 * target - center_of_mass` with the
//! same mass: its separation from the target is the exact negation of the
//! cell's, so its contribution cancels the cell's monopole term. The cell's
//! members are finally summed one by one. The result is exact over the
//! neighborhood and a monopole approximation everywhere else.

use nalgebra::SVector;

use crate::{
    backend::Backend,
    grid::{BinGrid, CellMembership},
    shared::{Float, Particle, real, softened_interaction},
};

pub struct ForceEvaluator<'a, F: Float, const D: usize> {
    grid: &'a BinGrid<F, D>,
    membership: &'a CellMembership<F, D>,
    softening: F,
}

impl<'a, F: Float, const D: usize> ForceEvaluator<'a, F, D> {
    pub fn new(grid: &'a BinGrid<F, D>, membership: &'a CellMembership<F, D>, softening: F) -> Self {
        Self {
            grid,
            membership,
            softening,
        }
    }

    /// Monopole pull of every cell in the grid.
    pub fn far_field(&self, target: &SVector<F, D>) -> SVector<F, D> {
        let mut acc = SVector::<F, D>::zeros();
        self.accumulate_far_field(target, &mut acc);
        acc
    }

    /// Mirror-point term that cancels `cell`'s contribution to [`Self::far_field`].
    pub fn mirror_correction(&self, target: &SVector<F, D>, cell: usize) -> SVector<F, D> {
        let aggregate = self.grid.cell(cell);
        let mirror = target * real::<F>(2.0) - aggregate.center_of_mass;
        softened_interaction(target, &mirror, aggregate.mass, self.softening)
    }

    /// Mirror corrections plus exact member sums over the target's neighborhood.
    pub fn near_field(&self, target: &SVector<F, D>) -> SVector<F, D> {
        let mut acc = SVector::<F, D>::zeros();
        self.accumulate_near_field(target, &mut acc);
        acc
    }

    pub fn acceleration(&self, target: &SVector<F, D>) -> SVector<F, D> {
        // One running sum, far field first, so the rounding order is fixed.
        let mut acc = SVector::<F, D>::zeros();
        self.accumulate_far_field(target, &mut acc);
        self.accumulate_near_field(target, &mut acc);
        acc
    }

    /// Accelerations of every body, one independent work unit per body.
    pub fn evaluate<P, B>(&self, bodies: &[P], backend: &B) -> Vec<SVector<F, D>>
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        backend.map(bodies.len(), |i| self.acceleration(bodies[i].position()))
    }

    fn accumulate_far_field(&self, target: &SVector<F, D>, acc: &mut SVector<F, D>) {
        for cell in self.grid.cells() {
            *acc += softened_interaction(target, &cell.center_of_mass, cell.mass, self.softening);
        }
    }

    fn accumulate_near_field(&self, target: &SVector<F, D>, acc: &mut SVector<F, D>) {
        for cell in self.grid.spec().neighborhood(target) {
            *acc += self.mirror_correction(target, cell);
            for body in self.membership.cell_bodies(cell) {
                *acc += softened_interaction(target, &body.position, body.mass, self.softening);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::Sequential,
        grid::{BinningStrategy, GridSpec},
        shared::PointParticle,
    };
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Vector3;

    type Body = PointParticle<f32, 3>;

    fn build(spec: &GridSpec<f32, 3>, bodies: &[Body]) -> (BinGrid<f32, 3>, CellMembership<f32, 3>) {
        let grid = BinGrid::build(spec, bodies, &Sequential, BinningStrategy::Partition);
        let membership = CellMembership::build(&grid, bodies, &Sequential, BinningStrategy::Partition);
        (grid, membership)
    }

    #[test]
    fn mirror_cancels_the_monopole_of_a_single_cell() {
        let spec = GridSpec::new(1, 100.0).unwrap();
        let bodies = vec![
            Body::new(Vector3::new(10.0, 20.0, 30.0), 1.0),
            Body::new(Vector3::new(40.0, 50.0, 60.0), 1.0),
        ];
        let (grid, membership) = build(&spec, &bodies);
        let evaluator = ForceEvaluator::new(&grid, &membership, 1e-10);

        let target = Vector3::new(3.0, 7.0, 2.0);
        let far = evaluator.far_field(&target);
        let mirror = evaluator.mirror_correction(&target, 0);
        assert!(far.norm() > 0.0);
        assert_abs_diff_eq!(far + mirror, Vector3::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn two_bodies_in_one_cell() {
        let spec = GridSpec::new(1, 100.0).unwrap();
        let bodies = vec![
            Body::new(Vector3::new(0.0, 0.0, 0.0), 1.0),
            Body::new(Vector3::new(10.0, 0.0, 0.0), 1.0),
        ];
        let (grid, membership) = build(&spec, &bodies);
        let accs = ForceEvaluator::new(&grid, &membership, 1e-10).evaluate(&bodies, &Sequential);

        assert_relative_eq!(accs[0], Vector3::new(0.01, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(accs[1], Vector3::new(-0.01, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn empty_cells_contribute_nothing() {
        let spec = GridSpec::new(5, 10.0).unwrap();
        let bodies = vec![
            Body::new(Vector3::new(21.0, 22.0, 23.0), 1.0),
            Body::new(Vector3::new(24.0, 25.0, 26.0), 1.0),
        ];
        let (grid, membership) = build(&spec, &bodies);
        let evaluator = ForceEvaluator::new(&grid, &membership, 1e-10);

        let target = Vector3::new(1.0, 1.0, 1.0);
        let empty = spec.linear_index([0, 0, 0]);
        assert!(grid.cell(empty).is_empty());
        assert_eq!(evaluator.mirror_correction(&target, empty), Vector3::zeros());

        let accs = evaluator.evaluate(&bodies, &Sequential);
        assert!(accs.iter().all(|a| a.iter().all(|x| x.is_finite())));
        // the far corner sees only the occupied cell, as a monopole
        let a = evaluator.acceleration(&target);
        assert!(a.iter().all(|x| x.is_finite() && *x > 0.0));
    }

    #[test]
    fn distant_cells_act_as_point_masses() {
        let spec = GridSpec::new(4, 10.0).unwrap();
        let mut bodies = vec![Body::new(Vector3::new(1.0, 1.0, 1.0), 1.0)];
        for (dx, dy, dz) in [(-0.5, 0.0, 0.0), (0.5, 0.0, 0.0), (0.0, -0.5, 0.5), (0.0, 0.5, -0.5)] {
            bodies.push(Body::new(Vector3::new(35.0 + dx, 35.0 + dy, 35.0 + dz), 1.0));
        }
        let (grid, membership) = build(&spec, &bodies);
        let evaluator = ForceEvaluator::new(&grid, &membership, 1e-10);

        let target = bodies[0].position;
        assert!(!spec.neighborhood(&target).contains(&spec.cell_of(&bodies[1].position).unwrap()));

        let exact: Vector3<f32> = bodies[1..]
            .iter()
            .map(|b| softened_interaction(&target, &b.position, b.mass, 1e-10))
            .sum();
        assert_relative_eq!(evaluator.acceleration(&target), exact, max_relative = 1e-3);
    }
}
