//! Configuration errors.
//!
//! The force pass itself never fails; everything here is raised while a grid,
//! solver or backend is being set up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid needs at least one cell per axis")]
    NoCells,

    #[error("cell length must be positive and finite, got {0}")]
    InvalidCellLength(f64),

    #[error("{cells_per_axis} cells per axis in {dims} dimensions overflows the grid index")]
    TooManyCells { cells_per_axis: usize, dims: usize },

    #[error("softening must be positive and finite, got {0}")]
    InvalidSoftening(f64),

    #[error("gravitational constant must be finite, got {0}")]
    InvalidGravity(f64),

    #[error("domain extent must be positive and finite, got {0}")]
    InvalidSpace(f64),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
