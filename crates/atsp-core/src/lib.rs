//! Building blocks of the asymmetric TSP branch-and-bound engine.
//!
//! The [`CostMatrix`] is loaded once and shared read-only by every worker.
//! Each worker owns a [`TourPool`] and a [`SearchStack`]; partial [`Tour`]s
//! move between the two instead of being dropped and reallocated.

mod error;
mod matrix;
mod pool;
mod stack;
mod tour;

pub use error::{Error, Result};
pub use matrix::{City, Cost, CostMatrix, HOME};
pub use pool::TourPool;
pub use stack::SearchStack;
pub use tour::Tour;
