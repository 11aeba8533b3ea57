//! Statistical reductions over in-memory arrays
//!
//! # Organization
//!
//! - [`operations`]: Core statistical operations and traits
//! - [`parallel`]: Parallel NaN-skipping reductions along one axis
//! - [`summary`]: Min/max/area-weighted-mean summaries of map fields

pub mod operations;
pub mod parallel;
pub mod summary;

// Re-export the main types and functions for convenience
pub use operations::{StatOperation, StatisticalReduction};
pub use parallel::{parallel_max_axis, parallel_mean_axis, parallel_min_axis};
pub use summary::FieldStats;
