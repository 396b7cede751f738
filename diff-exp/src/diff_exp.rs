//! Two-group differential expression on log-normalized data (Welch's t-test)
//!
use crate::dist;
use crate::stat::GroupSummary;
use anyhow::{bail, Error};
use ndarray::{Array1, ArrayView2, Zip};

/// Result of a pairwise differential expression test between groups `a` and `b`, one entry per gene
#[derive(Debug, Clone)]
pub struct DiffExpResult {
    /// mean expression in group a
    pub mean_a: Array1<f64>,
    /// mean expression in group b
    pub mean_b: Array1<f64>,
    /// fraction of group a observations expressing the gene
    pub frac_a: Array1<f64>,
    /// fraction of group b observations expressing the gene
    pub frac_b: Array1<f64>,
    /// difference of means; the input is already on a log scale
    pub log_fold_change: Array1<f64>,
    /// Welch t statistic
    pub t_statistic: Array1<f64>,
    /// two-sided p-values
    pub p_values: Array1<f64>,
    /// Benjamini-Hochberg adjusted p-values
    pub adjusted_p_values: Array1<f64>,
}

impl DiffExpResult {
    /// number of genes tested
    pub fn len(&self) -> usize {
        self.p_values.len()
    }

    /// true if no genes were tested
    pub fn is_empty(&self) -> bool {
        self.p_values.is_empty()
    }
}

/// Welch's unequal-variance t-test for every column of `mat` (observations x genes), comparing
/// rows `cond_a` against rows `cond_b`. An observation counts as expressing a gene when its value
/// is strictly above `low_thresh`.
pub fn welch_differential_expression(
    mat: &ArrayView2<f64>,
    cond_a: &[usize],
    cond_b: &[usize],
    low_thresh: f64,
) -> Result<DiffExpResult, Error> {
    if cond_a.is_empty() || cond_b.is_empty() {
        bail!(
            "differential expression needs two non-empty groups, got {} and {} observations",
            cond_a.len(),
            cond_b.len()
        );
    }
    let a = GroupSummary::new(mat, cond_a, low_thresh)?;
    let b = GroupSummary::new(mat, cond_b, low_thresh)?;

    let na = a.n as f64;
    let nb = b.n as f64;
    let pooled_df = (na + nb - 2.0).max(1.0);

    let n_genes = mat.ncols();
    let mut t_statistic = Array1::<f64>::zeros(n_genes);
    let mut p_values = Array1::<f64>::ones(n_genes);

    Zip::from(&mut t_statistic)
        .and(&mut p_values)
        .and(&a.mean)
        .and(&a.var)
        .and(&b.mean)
        .and(&b.var)
        .par_for_each(|t, pv, &ma, &va, &mb, &vb| {
            let diff = ma - mb;
            let sa = va / na;
            let sb = vb / nb;
            let se2 = sa + sb;
            if se2 <= 0.0 {
                // no spread in either group: identical means are no evidence, distinct ones are
                *t = if diff == 0.0 { 0.0 } else { diff.signum() * f64::INFINITY };
                *pv = if diff == 0.0 { 1.0 } else { 0.0 };
                return;
            }
            *t = diff / se2.sqrt();

            let mut denom = 0.0;
            if a.n > 1 {
                denom += sa * sa / (na - 1.0);
            }
            if b.n > 1 {
                denom += sb * sb / (nb - 1.0);
            }
            let df = if denom > 0.0 { se2 * se2 / denom } else { pooled_df };
            *pv = dist::student_t_two_sided(*t, df);
        });

    let indexed = p_values.iter().copied().enumerate().collect::<Vec<_>>();
    let mut adjusted_p_values = Array1::<f64>::ones(n_genes);
    for (i, q) in dist::adjusted_pvalue_bh(&indexed) {
        adjusted_p_values[i] = q;
    }

    let log_fold_change = &a.mean - &b.mean;

    Ok(DiffExpResult {
        mean_a: a.mean,
        mean_b: b.mean,
        frac_a: a.frac_expressed,
        frac_b: b.frac_expressed,
        log_fold_change,
        t_statistic,
        p_values,
        adjusted_p_values,
    })
}
