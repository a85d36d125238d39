use std::ops::Range;

use log::debug;

use super::{BinGrid, BinningStrategy, GridSpec, assign_cells};
use crate::{
    backend::Backend,
    shared::{Float, Particle, PointParticle},
};

/// Exclusive prefix sum of per-cell counts with the grand total appended, so
/// cell `i` owns `offsets[i]..offsets[i + 1]`.
pub fn prefix_offsets(counts: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let counts = counts.into_iter();
    let mut offsets = Vec::with_capacity(counts.size_hint().0 + 1);
    let mut total = 0;
    offsets.push(total);
    for count in counts {
        total += count;
        offsets.push(total);
    }
    offsets
}

/// Splits `data` into consecutive disjoint runs delimited by `offsets`.
fn split_by_offsets<'a, T>(mut data: &'a mut [T], offsets: &[usize]) -> Vec<&'a mut [T]> {
    offsets
        .windows(2)
        .map(|w| {
            let len = (w[1] - w[0]).min(data.len());
            let (run, rest) = std::mem::take(&mut data).split_at_mut(len);
            data = rest;
            run
        })
        .collect()
}

/// Bodies regrouped so that each cell's members are contiguous.
///
/// Within a run, bodies keep the order they had in the input array.
#[derive(Clone, Debug)]
pub struct CellMembership<F: Float, const D: usize> {
    offsets: Vec<usize>,
    indices: Vec<usize>,
    bodies: Vec<PointParticle<F, D>>,
}

impl<F: Float, const D: usize> CellMembership<F, D> {
    /// `grid` must have been built from the same `bodies`.
    pub fn build<P, B>(
        grid: &BinGrid<F, D>,
        bodies: &[P],
        backend: &B,
        strategy: BinningStrategy,
    ) -> Self
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        let spec = grid.spec();
        let offsets = prefix_offsets(grid.counts());
        let indices = match strategy {
            BinningStrategy::Scan => Self::scan(spec, &offsets, bodies, backend),
            BinningStrategy::Partition => {
                Self::scatter(&offsets, &assign_cells(spec, bodies, backend))
            }
        };
        let bucketed = indices
            .iter()
            .map(|&i| PointParticle::from_particle(&bodies[i]))
            .collect::<Vec<_>>();

        debug!(
            "bucketed {} bodies over {} cells ({:?})",
            bucketed.len(),
            offsets.len() - 1,
            strategy
        );

        Self {
            offsets,
            indices,
            bodies: bucketed,
        }
    }

    /// Each cell rescans the body array and fills only its own reserved run.
    fn scan<P, B>(spec: &GridSpec<F, D>, offsets: &[usize], bodies: &[P], backend: &B) -> Vec<usize>
    where
        P: Particle<F, D> + Sync,
        B: Backend,
    {
        let total = offsets.last().copied().unwrap_or(0);
        let mut indices = vec![0usize; total];
        let mut runs = split_by_offsets(&mut indices, offsets);
        backend.for_each_mut(&mut runs, |cell, run| {
            let members = (0..bodies.len()).filter(|&i| spec.contains(cell, bodies[i].position()));
            for (slot, member) in run.iter_mut().zip(members) {
                *slot = member;
            }
        });
        indices
    }

    /// Stable scatter of pre-assigned bodies through per-cell cursors.
    fn scatter(offsets: &[usize], assignments: &[Option<usize>]) -> Vec<usize> {
        let total = offsets.last().copied().unwrap_or(0);
        let mut indices = vec![0usize; total];
        let mut cursors = offsets[..offsets.len() - 1].to_vec();
        for (body, cell) in assignments.iter().enumerate() {
            let Some(cursor) = cell.and_then(|cell| cursors.get_mut(cell)) else {
                continue;
            };
            if let Some(slot) = indices.get_mut(*cursor) {
                *slot = body;
                *cursor += 1;
            }
        }
        indices
    }

    pub fn num_cells(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of bucketed bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Per-cell start offsets followed by the total.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn offset(&self, cell: usize) -> usize {
        self.offsets[cell]
    }

    pub fn range(&self, cell: usize) -> Range<usize> {
        self.offsets[cell]..self.offsets[cell + 1]
    }

    pub fn cell_bodies(&self, cell: usize) -> &[PointParticle<F, D>] {
        &self.bodies[self.range(cell)]
    }

    /// Original indices of the bodies in a cell's run.
    pub fn cell_indices(&self, cell: usize) -> &[usize] {
        &self.indices[self.range(cell)]
    }

    pub fn bodies(&self) -> &[PointParticle<F, D>] {
        &self.bodies
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}
