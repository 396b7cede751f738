//! Highly variable gene selection by binned, normalized dispersion

use crate::config::HighlyVariableOptions;
use crate::stats::GeneStats;
use anyhow::{bail, Error};
use log::info;
use noisy_float::types::n64;
use std::cmp::Reverse;

/// Normalized log dispersion of every candidate gene, `None` for genes that cannot be ranked
/// (masked out, zero mean or zero variance).
fn normalized_dispersion(stats: &GeneStats, n_bins: usize) -> Vec<Option<f64>> {
    let n_genes = stats.means.len();
    let log_disp = (0..n_genes)
        .map(|g| {
            let (m, v) = (stats.means[g], stats.variances[g]);
            (stats.gene_mask[g] && m > 0.0 && v > 0.0).then(|| (v / m).ln())
        })
        .collect::<Vec<_>>();

    let candidates = (0..n_genes).filter(|&g| log_disp[g].is_some()).collect::<Vec<_>>();
    if candidates.is_empty() {
        return log_disp;
    }
    let lo = candidates.iter().map(|&g| stats.means[g]).fold(f64::INFINITY, f64::min);
    let hi = candidates.iter().map(|&g| stats.means[g]).fold(f64::NEG_INFINITY, f64::max);
    let width = (hi - lo) / n_bins as f64;
    let bin_of = |g: usize| {
        if width > 0.0 {
            (((stats.means[g] - lo) / width) as usize).min(n_bins - 1)
        } else {
            0
        }
    };

    let mut bins = vec![Vec::new(); n_bins];
    for &g in &candidates {
        bins[bin_of(g)].push(g);
    }

    let mut out = vec![None; n_genes];
    for genes in bins.iter().filter(|b| !b.is_empty()) {
        let vals = genes.iter().filter_map(|&g| log_disp[g]).collect::<Vec<_>>();
        let n = vals.len() as f64;
        let mean = vals.iter().sum::<f64>() / n;
        let sd = if vals.len() > 1 {
            (vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        for (&g, &v) in genes.iter().zip(vals.iter()) {
            // a lone gene or a flat bin carries no relative information
            out[g] = Some(if sd > 0.0 { (v - mean) / sd } else { 0.0 });
        }
    }
    out
}

/// Choose up to `max_genes` genes of `stats.gene_mask` with the highest normalized dispersion.
/// Ties go to the lower gene index.
pub fn select_highly_variable(stats: &GeneStats, opts: &HighlyVariableOptions) -> Result<Vec<bool>, Error> {
    if opts.n_bins == 0 {
        bail!("highly variable gene selection needs at least one bin");
    }
    if stats.gene_mask.len() != stats.means.len() || stats.variances.len() != stats.means.len() {
        bail!(
            "gene statistics disagree on the gene count: {} means, {} variances, {} mask entries",
            stats.means.len(),
            stats.variances.len(),
            stats.gene_mask.len()
        );
    }

    let norm = normalized_dispersion(stats, opts.n_bins);
    let mut ranked = norm
        .iter()
        .enumerate()
        .filter_map(|(g, d)| d.map(|d| (g, d)))
        .collect::<Vec<_>>();
    ranked.sort_by_key(|&(g, d)| (Reverse(n64(d)), g));

    let mut mask = vec![false; norm.len()];
    for &(g, _) in ranked.iter().take(opts.max_genes) {
        mask[g] = true;
    }
    info!(
        "selected {} highly variable genes from {} candidates",
        ranked.len().min(opts.max_genes),
        ranked.len()
    );
    Ok(mask)
}
