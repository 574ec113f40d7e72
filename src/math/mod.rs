//! Small dense matrix type used throughout the crate.
//!
//! `Array2` stores samples row-major: one row per sample, one column per
//! feature. The classifiers, the pool and the query strategies all exchange
//! feature batches through it.
pub mod matrix;

pub use matrix::{Array2, ShapeError};
