//! Per-gene summary statistics and median helpers

use crate::config::MeansVarsOptions;
use anyhow::{bail, Error};
use log::{info, warn};
use ndarray::prelude::*;
use ndarray::DataMut;
use ndarray_stats::errors::QuantileError;
use noisy_float::types::N64;
use tclust_types::ExpressionMatrix;

/// Per-gene means, unbiased variances and the mask of genes expressed in enough observations
#[derive(Debug, Clone)]
pub struct GeneStats {
    /// mean expression per gene
    pub means: Array1<f64>,
    /// variance per gene, one degree of freedom removed
    pub variances: Array1<f64>,
    /// genes expressed above `low_thresh` in at least `min_cells` observations
    pub gene_mask: Vec<bool>,
}

impl GeneStats {
    /// number of genes passing the mask
    pub fn num_selected(&self) -> usize {
        self.gene_mask.iter().filter(|&&m| m).count()
    }
}

/// Compute [`GeneStats`] over all observations of `expr`.
pub fn gene_statistics(expr: &ExpressionMatrix, opts: &MeansVarsOptions) -> Result<GeneStats, Error> {
    let (n_obs, n_genes) = expr.matrix.dim();
    if n_obs == 0 || n_genes == 0 {
        bail!("expression matrix is {} x {}", n_obs, n_genes);
    }
    let n = n_obs as f64;

    let means = expr.matrix.sum_axis(Axis(0)) / n;
    let mut variances = Array1::<f64>::zeros(n_genes);
    let mut expressed = vec![0usize; n_genes];
    for row in expr.matrix.outer_iter() {
        for (g, (&x, &m)) in row.iter().zip(means.iter()).enumerate() {
            variances[g] += (x - m) * (x - m);
            if x > opts.low_thresh {
                expressed[g] += 1;
            }
        }
    }
    if n_obs > 1 {
        variances /= n - 1.0;
    } else {
        variances.fill(0.0);
    }

    let gene_mask = expressed.iter().map(|&c| c >= opts.min_cells).collect::<Vec<_>>();
    let stats = GeneStats {
        means,
        variances,
        gene_mask,
    };
    if stats.num_selected() == 0 {
        warn!(
            "no gene is expressed above {} in {} or more observations",
            opts.low_thresh, opts.min_cells
        );
    }
    info!("gene statistics: {} of {} genes pass the expression mask", stats.num_selected(), n_genes);
    Ok(stats)
}

/// Return the median. Sorts its argument in place.
pub fn median_mut<S>(xs: &mut ArrayBase<S, Ix1>) -> Result<N64, QuantileError>
where
    S: DataMut<Elem = N64>,
{
    if xs.is_empty() {
        return Err(QuantileError::EmptyInput);
    }
    let n = xs.len();
    match xs.as_slice_mut() {
        Some(v) => v.sort_unstable(),
        None => {
            let mut v = xs.to_vec();
            v.sort_unstable();
            xs.assign(&Array1::from(v));
        }
    }
    Ok(if n % 2 == 0 {
        (xs[n / 2] + xs[n / 2 - 1]) / 2.0
    } else {
        xs[n / 2]
    })
}

/// Median of every row of `x`. Rows are sorted in place.
pub(crate) fn median_array_rows_mut<S>(x: &mut ArrayBase<S, Ix2>) -> Result<Vec<N64>, QuantileError>
where
    S: DataMut<Elem = N64>,
{
    x.axis_iter_mut(Axis(0)).map(|mut row| median_mut(&mut row)).collect()
}
