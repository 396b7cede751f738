//! Per-group summaries of an observations x genes matrix

use anyhow::{bail, Error};
use ndarray::{Array1, ArrayView2, Axis};

/// Mean, unbiased variance and fraction of observations above an expression threshold, per gene,
/// over a subset of rows.
#[derive(Debug, Clone)]
pub struct GroupSummary {
    /// number of observations in the group
    pub n: usize,
    /// per-gene mean
    pub mean: Array1<f64>,
    /// per-gene variance with one degree of freedom removed; zero for groups of one
    pub var: Array1<f64>,
    /// per-gene fraction of observations strictly above `low_thresh`
    pub frac_expressed: Array1<f64>,
}

impl GroupSummary {
    /// Summarize the rows `rows` of `mat`.
    pub fn new(mat: &ArrayView2<f64>, rows: &[usize], low_thresh: f64) -> Result<GroupSummary, Error> {
        if rows.is_empty() {
            bail!("cannot summarize an empty group");
        }
        let n_rows = mat.nrows();
        if let Some(&bad) = rows.iter().find(|&&r| r >= n_rows) {
            bail!("row index {} out of bounds for matrix with {} rows", bad, n_rows);
        }

        let sub = mat.select(Axis(0), rows);
        let n = rows.len();
        let nf = n as f64;

        let mean = sub.sum_axis(Axis(0)) / nf;
        let var = if n > 1 {
            let mut ss = Array1::<f64>::zeros(sub.ncols());
            for row in sub.axis_iter(Axis(0)) {
                ss.zip_mut_with(&row, |acc, &x| *acc += x * x);
            }
            // sum of squares minus n * mean^2, floored at zero against round-off
            (ss - &mean.mapv(|m| nf * m * m)).mapv(|v| (v / (nf - 1.0)).max(0.0))
        } else {
            Array1::zeros(sub.ncols())
        };
        let frac_expressed = sub.mapv(|x| f64::from(u8::from(x > low_thresh))).sum_axis(Axis(0)) / nf;

        Ok(GroupSummary {
            n,
            mean,
            var,
            frac_expressed,
        })
    }
}
