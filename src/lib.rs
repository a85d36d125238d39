pub mod backend;
pub mod error;
pub mod force;
pub mod generate;
pub mod grid;
pub mod shared;
pub mod solver;
