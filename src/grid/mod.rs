//! Uniform cell grid over the simulation domain.
//!
//! [`GridSpec`] is the single definition of cell geometry. Binning, the
//! membership index and the force evaluator all go through its
//! [`GridSpec::cell_of`], [`GridSpec::linear_index`] and
//! [`GridSpec::neighborhood`], so the three phases cannot disagree on which
//! cell a body belongs to or on how cells are enumerated.

mod aggregate;
mod membership;

pub use aggregate::*;
pub use membership::*;

use nalgebra::SVector;
use num_traits::{ToPrimitive, Zero};
use smallvec::SmallVec;

use crate::{
    error::ConfigError,
    shared::{Float, real, to_f64},
};

/// Linear indices of the cells around a target, in ascending order.
pub type Neighborhood = SmallVec<[usize; 27]>;

#[derive(Clone, Debug, PartialEq)]
pub struct GridSpec<F: Float, const D: usize> {
    origin: SVector<F, D>,
    cells_per_axis: usize,
    cell_length: F,
    num_cells: usize,
}

impl<F: Float, const D: usize> GridSpec<F, D> {
    /// Grid whose lowest corner sits at the origin.
    pub fn new(cells_per_axis: usize, cell_length: F) -> Result<Self, ConfigError> {
        Self::with_origin(SVector::<F, D>::zeros(), cells_per_axis, cell_length)
    }

    pub fn with_origin(
        origin: SVector<F, D>,
        cells_per_axis: usize,
        cell_length: F,
    ) -> Result<Self, ConfigError> {
        if cells_per_axis == 0 {
            return Err(ConfigError::NoCells);
        }
        if !(cell_length > F::zero()) || !cell_length.is_finite() {
            return Err(ConfigError::InvalidCellLength(to_f64(cell_length)));
        }
        let too_many = ConfigError::TooManyCells {
            cells_per_axis,
            dims: D,
        };
        // signed cell coordinates must be able to hold the axis length
        if i64::try_from(cells_per_axis).is_err() {
            return Err(too_many);
        }
        let num_cells = u32::try_from(D)
            .ok()
            .and_then(|dims| cells_per_axis.checked_pow(dims))
            .ok_or(too_many)?;

        Ok(Self {
            origin,
            cells_per_axis,
            cell_length,
            num_cells,
        })
    }

    pub fn origin(&self) -> &SVector<F, D> {
        &self.origin
    }

    pub fn cells_per_axis(&self) -> usize {
        self.cells_per_axis
    }

    pub fn cell_length(&self) -> F {
        self.cell_length
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Edge length of the whole domain.
    pub fn extent(&self) -> F {
        self.cell_length * real::<F>(self.cells_per_axis as f64)
    }

    /// Half-open bounds `[min, max)` of slab `k` along one axis.
    fn axis_bounds(&self, axis: usize, k: i64) -> (F, F) {
        let min = self.origin[axis] + self.cell_length * real::<F>(k as f64);
        (min, min + self.cell_length)
    }

    /// Signed slab index along `axis`, or `None` for coordinates that are not finite
    /// or too large to index.
    fn axis_cell(&self, axis: usize, x: F) -> Option<i64> {
        let scaled = (x - self.origin[axis]) / self.cell_length;
        let mut k = ToPrimitive::to_i64(&scaled.floor())?;
        // Division can round across a slab boundary; the bounds test decides.
        let (min, max) = self.axis_bounds(axis, k);
        if x < min {
            k -= 1;
        } else if x >= max {
            k += 1;
        }
        Some(k)
    }

    /// Signed cell coordinate of a position, which may lie outside the grid.
    pub fn cell_coord(&self, position: &SVector<F, D>) -> Option<[i64; D]> {
        let mut coord = [0i64; D];
        for (axis, c) in coord.iter_mut().enumerate() {
            *c = self.axis_cell(axis, position[axis])?;
        }
        Some(coord)
    }

    fn in_grid(&self, coord: &[i64; D]) -> Option<[usize; D]> {
        let mut cell = [0usize; D];
        for (c, &k) in cell.iter_mut().zip(coord.iter()) {
            *c = usize::try_from(k).ok().filter(|&k| k < self.cells_per_axis)?;
        }
        Some(cell)
    }

    /// Linear index of the cell containing `position`, or `None` when the
    /// position is outside every cell or not finite.
    pub fn cell_of(&self, position: &SVector<F, D>) -> Option<usize> {
        let coord = self.cell_coord(position)?;
        self.in_grid(&coord).map(|cell| self.linear_index(cell))
    }

    /// The membership predicate shared by every phase.
    #[inline]
    pub fn contains(&self, cell: usize, position: &SVector<F, D>) -> bool {
        self.cell_of(position) == Some(cell)
    }

    /// Row-major flattening, axis 0 most significant.
    pub fn linear_index(&self, coord: [usize; D]) -> usize {
        coord
            .iter()
            .fold(0, |index, &c| index * self.cells_per_axis + c)
    }

    pub fn coord_of(&self, mut index: usize) -> [usize; D] {
        let mut coord = [0usize; D];
        for c in coord.iter_mut().rev() {
            *c = index % self.cells_per_axis;
            index /= self.cells_per_axis;
        }
        coord
    }

    /// Lower and upper corner of a cell.
    pub fn cell_bounds(&self, index: usize) -> (SVector<F, D>, SVector<F, D>) {
        let coord = self.coord_of(index);
        let mut min = SVector::<F, D>::zeros();
        let mut max = SVector::<F, D>::zeros();
        for axis in 0..D {
            (min[axis], max[axis]) = self.axis_bounds(axis, coord[axis] as i64);
        }
        (min, max)
    }

    /// Cells of the 3^D stencil centred on the cell of `position`, clipped to the grid.
    ///
    /// A position outside the grid keeps its unclamped coordinate, so only the
    /// stencil cells that still fall inside survive. Non-finite positions have
    /// no neighborhood.
    pub fn neighborhood(&self, position: &SVector<F, D>) -> Neighborhood {
        let mut cells = Neighborhood::new();
        let Some(center) = self.cell_coord(position) else {
            return cells;
        };

        let stencil = 3usize.pow(D as u32);
        'stencil: for s in 0..stencil {
            let mut rest = s;
            let mut coord = [0i64; D];
            for axis in (0..D).rev() {
                let offset = (rest % 3) as i64 - 1;
                rest /= 3;
                match center[axis].checked_add(offset) {
                    Some(k) => coord[axis] = k,
                    None => continue 'stencil,
                }
            }
            if let Some(cell) = self.in_grid(&coord) {
                cells.push(self.linear_index(cell));
            }
        }
        cells
    }
}
