/// differential expression algo
#[allow(clippy::module_inception)]
pub mod diff_exp;
/// distribution functions
pub mod dist;
/// DE separation score
pub mod score;
/// per-group statistics
pub mod stat;

pub use crate::diff_exp::{welch_differential_expression, DiffExpResult};
pub use crate::score::{de_score, DeScore, DeThresholds};
