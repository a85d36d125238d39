use log::{debug, warn};
use nalgebra::SVector;
use num_traits::Zero;

use super::GridSpec;
use crate::{
    backend::Backend,
    shared::{Float, Particle},
};

/// Monopole summary of one cell.
///
/// `mass` is the gravitational weight and `count` the bucket size. They only
/// coincide numerically when every member has unit mass. An empty cell (or
/// one whose members weigh nothing) reports a zero position and zero mass
/// rather than an undefined mean.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellAggregate<F: Float, const D: usize> {
    pub center_of_mass: SVector<F, D>,
    pub mass: F,
    pub count: usize,
}

impl<F: Float, const D: usize> CellAggregate<F, D> {
    pub fn empty() -> Self {
        Self {
            center_of_mass: SVector::<F, D>::zeros(),
            mass: F::zero(),
            count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<F: Float, const D: usize> Default for CellAggregate<F, D> {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone, Copy)]
struct Accumulator<F: Float, const D: usize> {
    weighted_sum: SVector<F, D>,
    mass: F,
    count: usize,
}

impl<F: Float, const D: usize> Accumulator<F, D> {
    fn new() -> Self {
        Self {
            weighted_sum: SVector::<F, D>::zeros(),
            mass: F::zero(),
            count: 0,
        }
    }

    #[inline]
    fn add(&mut self, position: &SVector<F, D>, mass: F) {
        self.weighted_sum += position * mass;
        self.mass += mass;
        self.count += 1;
    }

    fn finish(self) -> CellAggregate<F, D> {
        if self.count == 0 || self.mass.is_zero() {
            return CellAggregate {
                count: self.count,
                ..CellAggregate::empty()
            };
        }
        CellAggregate {
            center_of_mass: self.weighted_sum / self.mass,
            mass: self.mass,
            count: self.count,
        }
    }
}

/// How bodies are matched to cells while building the grid and its membership index.
///
/// Both strategies visit each cell's members in body order, so they produce
/// bit-identical aggregates and buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BinningStrategy {
    /// Every cell rescans the full body array with the bounds predicate.
    /// O(cells x bodies), one independent work unit per cell.
    Scan,
    /// One pass assigns each body its cell, then a stable pass accumulates
    /// and scatters. O(cells + bodies).
    #[default]
    Partition,
}

/// Cell index of every body, `None` for bodies outside the grid.
pub(crate) fn assign_cells<F, const D: usize, P, B>(
    spec: &GridSpec<F, D>,
    bodies: &[P],
    backend: &B,
) -> Vec<Option<usize>>
where
    F: Float,
    P: Particle<F, D> + Sync,
    B: Backend,
{
    backend.map(bodies.len(), |i| spec.cell_of(bodies[i].position()))
}

/// Per-cell centre of mass, mass and occupancy over a uniform grid.
#[derive(Clone, Debug)]
pub struct BinGrid<F: Float, const D: usize> {
    spec: GridSpec<F, D>,
    cells: Vec<CellAggregate<F, D>>,
    excluded: usize,
}

impl<F: Float, const D: usize> BinGrid<F, D> {
    pub fn build<P, B>(
        spec: &GridSpec<F, D>,
        bodies: &[P],
        backend: &B,
        strategy: BinningStrategy,
    ) -> Self
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        let cells = match strategy {
            BinningStrategy::Scan => Self::scan(spec, bodies, backend),
            BinningStrategy::Partition => {
                Self::partition(spec, bodies, &assign_cells(spec, bodies, backend))
            }
        };

        let binned: usize = cells.iter().map(|c| c.count).sum();
        let excluded = bodies.len() - binned;
        if excluded > 0 {
            warn!(
                "{} of {} bodies lie outside the grid and belong to no cell",
                excluded,
                bodies.len()
            );
        }
        debug!(
            "binned {} bodies into {} cells ({} occupied, {:?})",
            binned,
            cells.len(),
            cells.iter().filter(|c| !c.is_empty()).count(),
            strategy
        );

        Self {
            spec: spec.clone(),
            cells,
            excluded,
        }
    }

    fn scan<P, B>(spec: &GridSpec<F, D>, bodies: &[P], backend: &B) -> Vec<CellAggregate<F, D>>
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        backend.map(spec.num_cells(), |cell| {
            let mut acc = Accumulator::new();
            for body in bodies {
                if spec.contains(cell, body.position()) {
                    acc.add(body.position(), body.get_mass());
                }
            }
            acc.finish()
        })
    }

    fn partition<P>(
        spec: &GridSpec<F, D>,
        bodies: &[P],
        assignments: &[Option<usize>],
    ) -> Vec<CellAggregate<F, D>>
    where
        P: Particle<F, D>,
    {
        let mut accs = vec![Accumulator::new(); spec.num_cells()];
        for (body, cell) in bodies.iter().zip(assignments) {
            if let Some(acc) = cell.and_then(|cell| accs.get_mut(cell)) {
                acc.add(body.position(), body.get_mass());
            }
        }
        accs.into_iter().map(Accumulator::finish).collect()
    }

    pub fn spec(&self) -> &GridSpec<F, D> {
        &self.spec
    }

    pub fn cells(&self) -> &[CellAggregate<F, D>] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> &CellAggregate<F, D> {
        &self.cells[index]
    }

    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().map(|c| c.count)
    }

    /// Bodies that fell in some cell.
    pub fn total_count(&self) -> usize {
        self.counts().sum()
    }

    /// Bodies that fell in no cell.
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn total_mass(&self) -> F {
        self.cells
            .iter()
            .fold(F::zero(), |total, cell| total + cell.mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{Rayon, Sequential},
        shared::PointParticle,
    };
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn body(x: f32, y: f32, z: f32) -> PointParticle<f32, 3> {
        PointParticle::new(Vector3::new(x, y, z), 1.0)
    }

    fn sample() -> Vec<PointParticle<f32, 3>> {
        vec![
            body(10.0, 10.0, 10.0),
            body(150.0, 10.0, 10.0),
            body(30.0, 20.0, 40.0),
            body(199.0, 199.0, 199.0),
            body(100.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn counts_and_centroids() {
        let spec = GridSpec::new(2, 100.0).unwrap();
        let grid = BinGrid::build(&spec, &sample(), &Sequential, BinningStrategy::Scan);

        assert_eq!(grid.total_count(), 5);
        assert_eq!(grid.excluded(), 0);

        let origin_cell = grid.cell(spec.linear_index([0, 0, 0]));
        assert_eq!(origin_cell.count, 2);
        assert_relative_eq!(origin_cell.mass, 2.0);
        assert_relative_eq!(origin_cell.center_of_mass, Vector3::new(20.0, 15.0, 25.0));

        let x_cell = grid.cell(spec.linear_index([1, 0, 0]));
        assert_eq!(x_cell.count, 2);
        assert_relative_eq!(x_cell.center_of_mass, Vector3::new(125.0, 5.0, 5.0));

        assert_eq!(grid.cell(spec.linear_index([1, 1, 1])).count, 1);
    }

    #[test]
    fn empty_cells_are_zero_not_nan() {
        let spec = GridSpec::new(3, 100.0).unwrap();
        let grid = BinGrid::build(&spec, &sample(), &Rayon::new(), BinningStrategy::Partition);

        let empty = grid.cell(spec.linear_index([2, 2, 2]));
        assert!(empty.is_empty());
        assert_eq!(*empty, CellAggregate::empty());
        assert!(
            grid.cells()
                .iter()
                .all(|c| c.center_of_mass.iter().all(|x| x.is_finite()))
        );
    }

    #[test]
    fn center_of_mass_is_weighted_by_mass() {
        let spec = GridSpec::new(1, 100.0).unwrap();
        let bodies = vec![
            PointParticle::new(Vector3::new(10.0f64, 0.0, 0.0), 3.0),
            PointParticle::new(Vector3::new(50.0, 0.0, 0.0), 1.0),
        ];
        let grid = BinGrid::build(&spec, &bodies, &Sequential, BinningStrategy::Partition);
        let cell = grid.cell(0);
        assert_eq!(cell.count, 2);
        assert_relative_eq!(cell.mass, 4.0);
        assert_relative_eq!(cell.center_of_mass, Vector3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn massless_members_still_count() {
        let spec = GridSpec::new(1, 100.0).unwrap();
        let bodies = vec![PointParticle::new(Vector3::new(10.0f32, 0.0, 0.0), 0.0)];
        let grid = BinGrid::build(&spec, &bodies, &Sequential, BinningStrategy::Scan);
        assert_eq!(grid.cell(0).count, 1);
        assert_eq!(grid.cell(0).mass, 0.0);
        assert_eq!(grid.cell(0).center_of_mass, Vector3::zeros());
    }

    #[test]
    fn outside_bodies_are_excluded() {
        let spec = GridSpec::new(2, 100.0).unwrap();
        let mut bodies = sample();
        bodies.push(body(-1.0, 50.0, 50.0));
        bodies.push(body(200.0, 50.0, 50.0));
        bodies.push(body(f32::NAN, 50.0, 50.0));

        for strategy in [BinningStrategy::Scan, BinningStrategy::Partition] {
            let grid = BinGrid::build(&spec, &bodies, &Sequential, strategy);
            assert_eq!(grid.total_count(), 5);
            assert_eq!(grid.excluded(), 3);
            assert_relative_eq!(grid.total_mass(), 5.0);
        }
    }

    #[test]
    fn strategies_agree_bit_for_bit() {
        let spec = GridSpec::new(4, 50.0).unwrap();
        let bodies: Vec<_> = (0..500)
            .map(|i| {
                let t = i as f32;
                body((t * 7.31) % 200.0, (t * 3.17) % 200.0, (t * 11.9) % 200.0)
            })
            .collect();

        let scan = BinGrid::build(&spec, &bodies, &Rayon::new(), BinningStrategy::Scan);
        let partition = BinGrid::build(&spec, &bodies, &Sequential, BinningStrategy::Partition);
        assert_eq!(scan.cells(), partition.cells());
        assert_eq!(scan.total_count(), 500);
    }
}
