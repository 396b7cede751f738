//! Remove components that track known artifact modes

use crate::error::ClusteringError;
use log::{debug, info};
use ndarray::{Array2, ArrayView1};
use tclust_types::{GeneComponentMatrix, KnownModeMatrix};

/// Components whose largest absolute correlation with any known mode exceeds this are dropped.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Pearson correlation of two equal-length vectors. A constant input correlates 0.
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mx = x.sum() / n;
    let my = y.sum() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y.iter()) {
        let (da, db) = (a - mx, b - my);
        sxy += da * db;
        sxx += da * da;
        syy += db * db;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    sxy / (sxx * syy).sqrt()
}

/// Correlation of every component column (rows of the result) with every known-mode column
/// (columns of the result). Both inputs must already share the same row order.
fn correlations(components: &GeneComponentMatrix, known_modes: &KnownModeMatrix) -> Array2<f64> {
    Array2::from_shape_fn((components.ncols(), known_modes.ncols()), |(c, m)| {
        pearson(components.column(c), known_modes.column(m))
    })
}

/// Restrict `components` and `known_modes` to their shared row identifiers, sorted ascending, and
/// drop every component column whose maximum absolute correlation with a known mode exceeds
/// `similarity_threshold`. Surviving columns keep their relative order. All columns may be
/// dropped; the result then has zero columns.
pub fn filter_known_modes(
    components: &GeneComponentMatrix,
    known_modes: &KnownModeMatrix,
    similarity_threshold: f64,
) -> Result<GeneComponentMatrix, ClusteringError> {
    let mode_index = known_modes.row_index();
    let mut shared = components
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(i, r)| mode_index.get(r.as_str()).map(|&j| (r.as_str(), i, j)))
        .collect::<Vec<_>>();
    if shared.is_empty() {
        return Err(ClusteringError::EmptyIntersection {
            components: components.nrows(),
            known_modes: known_modes.nrows(),
        });
    }
    shared.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let comp_rows = shared.iter().map(|s| s.1).collect::<Vec<_>>();
    let mode_rows = shared.iter().map(|s| s.2).collect::<Vec<_>>();
    let components = components.select_rows(&comp_rows);
    let known_modes = known_modes.select_rows(&mode_rows);

    let corr = correlations(&components, &known_modes);
    let keep = corr
        .outer_iter()
        .enumerate()
        .filter_map(|(c, row)| {
            let max_abs = row.iter().fold(0.0f64, |acc, r| acc.max(r.abs()));
            if max_abs > similarity_threshold {
                debug!(
                    "dropping component {} with |r| = {:.3} against known modes",
                    components.cols()[c],
                    max_abs
                );
                None
            } else {
                Some(c)
            }
        })
        .collect::<Vec<_>>();

    info!(
        "known modes: {} shared rows, kept {} of {} components",
        shared.len(),
        keep.len(),
        components.ncols()
    );
    Ok(components.select_cols(&keep))
}
