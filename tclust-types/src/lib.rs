//! Data types shared across the clustering workspace

pub mod assignment;
pub mod matrix;

pub use assignment::ClusterAssignment;
pub use matrix::{ExpressionMatrix, GeneComponentMatrix, KnownModeMatrix, LabeledMatrix, ReducedMatrix};
