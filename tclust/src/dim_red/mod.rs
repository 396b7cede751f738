//! Principal components of the expression matrix, component pruning and projection
//!
//! PCA runs on the selected genes of a (possibly sub-sampled) set of observations. Centering uses
//! the gene means of the sampled observations, and the same means are subtracted again when all
//! observations are projected. The SVD is randomized: a seeded uniform test matrix, a few power
//! iterations, and an exact decomposition of the small projected problem.

use crate::config::{FilterPcsOptions, PcaOptions, ProjectOptions};
use anyhow::{bail, format_err, Error};
use log::{debug, info};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use tclust_types::{ExpressionMatrix, GeneComponentMatrix, LabeledMatrix, ReducedMatrix};

/// Randomized SVD method
pub mod rand_svd;

#[cfg(test)]
mod test;

use rand_svd::RandSvd;

/// Observations per parallel projection chunk when none is configured
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Result of [`compute_pca`]
#[derive(Debug, Clone)]
pub struct PcaOutput {
    /// selected genes x components, columns `PC1`, `PC2`, ...
    pub components: GeneComponentMatrix,
    /// fraction of the total variance of the selected genes explained by each component
    pub explained_variance_ratio: Array1<f64>,
    /// variance along each component
    pub explained_variance: Array1<f64>,
    /// per-gene means used for centering, aligned with the component rows
    pub means: Array1<f64>,
}

fn component_labels(k: usize) -> Vec<String> {
    (1..=k).map(|i| format!("PC{i}")).collect()
}

/// Compute principal components of `expr` restricted to the genes in `gene_mask`.
pub fn compute_pca(
    expr: &ExpressionMatrix,
    gene_mask: &[bool],
    seed: u64,
    opts: &PcaOptions,
) -> Result<PcaOutput, Error> {
    if gene_mask.len() != expr.n_genes() {
        bail!("gene mask has {} entries for {} genes", gene_mask.len(), expr.n_genes());
    }
    let genes = (0..expr.n_genes()).filter(|&g| gene_mask[g]).collect::<Vec<_>>();
    if genes.is_empty() {
        bail!("no genes selected for PCA");
    }

    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let n_obs = expr.n_obs();
    let cells = match opts.cell_select {
        Some(c) if c < n_obs => {
            let mut idx = rand::seq::index::sample(&mut rng, n_obs, c).into_vec();
            idx.sort_unstable();
            info!("sampled {} of {} observations for PCA", c, n_obs);
            idx
        }
        _ => (0..n_obs).collect(),
    };
    if cells.len() < 2 {
        bail!("PCA needs at least 2 observations, got {}", cells.len());
    }

    let mut x = expr.matrix.select(Axis(0), &cells).select(Axis(1), &genes);
    let means = x
        .mean_axis(Axis(0))
        .ok_or_else(|| format_err!("empty matrix in PCA"))?;
    x -= &means;

    let n_comps = opts.n_comps.min(cells.len() - 1).min(genes.len());
    if n_comps < opts.n_comps {
        debug!("clamped n_comps from {} to {}", opts.n_comps, n_comps);
    }
    info!("computing {} components on a {} x {} matrix", n_comps, cells.len(), genes.len());

    let svd = RandSvd {
        oversample: opts.oversample,
        n_iter: opts.n_iter,
    };
    let (_, sigma, vt) = svd.run(&x.view(), n_comps, &mut rng)?;
    let mut v = vt.reversed_axes();

    // largest-magnitude loading of every component is positive
    for mut col in v.axis_iter_mut(Axis(1)) {
        let pivot = col.iter().fold(0.0f64, |acc, &x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            col.mapv_inplace(|x| -x);
        }
    }

    let dof = (cells.len() - 1) as f64;
    let explained_variance = sigma.mapv(|s| s * s / dof);
    let total_variance = x.iter().map(|v| v * v).sum::<f64>() / dof;
    let explained_variance_ratio = if total_variance > 0.0 {
        &explained_variance / total_variance
    } else {
        Array1::zeros(n_comps)
    };

    let components = LabeledMatrix::new(
        genes.iter().map(|&g| expr.genes[g].clone()).collect(),
        component_labels(n_comps),
        v,
    )?;
    Ok(PcaOutput {
        components,
        explained_variance_ratio,
        explained_variance,
        means,
    })
}

/// Keep components whose explained variance has a z-score, standardized across all components,
/// above `zscore_threshold`. When every component explains the same variance, all of them are
/// kept. Components explaining no variance are always dropped. With `max_pcs` set, at most that
/// many of the leading survivors are kept.
pub fn filter_components(
    components: &GeneComponentMatrix,
    explained_variance: &Array1<f64>,
    explained_variance_ratio: &Array1<f64>,
    opts: &FilterPcsOptions,
) -> Result<GeneComponentMatrix, Error> {
    let k = components.ncols();
    if explained_variance.len() != k || explained_variance_ratio.len() != k {
        bail!(
            "{} components but {} explained variances and {} ratios",
            k,
            explained_variance.len(),
            explained_variance_ratio.len()
        );
    }

    let mut keep = Vec::new();
    if k > 0 {
        let mean = explained_variance.sum() / k as f64;
        let sd = if k > 1 {
            (explained_variance.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (k - 1) as f64).sqrt()
        } else {
            0.0
        };
        for j in 0..k {
            if !(explained_variance[j] > 0.0 && explained_variance_ratio[j] > 0.0) {
                continue;
            }
            if sd <= 0.0 || (explained_variance[j] - mean) / sd > opts.zscore_threshold {
                keep.push(j);
            }
        }
    }
    if let Some(max_pcs) = opts.max_pcs {
        keep.truncate(max_pcs);
    }
    info!("kept {} of {} components", keep.len(), k);
    Ok(components.select_cols(&keep))
}

/// Project every observation of `expr` onto `components` after subtracting `means`. Rows are
/// processed in chunks of `chunk_size` observations in parallel.
pub fn project(
    expr: &ExpressionMatrix,
    components: &GeneComponentMatrix,
    means: &Array1<f64>,
    opts: &ProjectOptions,
) -> Result<ReducedMatrix, Error> {
    if means.len() != components.nrows() {
        bail!("{} means for {} component genes", means.len(), components.nrows());
    }
    let gene_index = expr.gene_index();
    let genes = components
        .rows()
        .iter()
        .map(|g| {
            gene_index
                .get(g.as_str())
                .copied()
                .ok_or_else(|| format_err!("component gene {} not in the expression matrix", g))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let chunk = opts.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
    if chunk == 0 {
        bail!("projection chunk size must be at least 1");
    }
    let weights = components.values();
    let mut out = Array2::<f64>::zeros((expr.n_obs(), components.ncols()));
    if components.ncols() > 0 && expr.n_obs() > 0 {
        out.axis_chunks_iter_mut(Axis(0), chunk)
            .into_par_iter()
            .zip(expr.matrix.axis_chunks_iter(Axis(0), chunk).into_par_iter())
            .for_each(|(mut dst, src)| {
                let mut centered = src.select(Axis(1), &genes);
                centered -= means;
                dst.assign(&centered.dot(&weights));
            });
    }

    info!("projected {} observations onto {} components", expr.n_obs(), components.ncols());
    LabeledMatrix::new(expr.observations.clone(), components.cols().to_vec(), out)
}
