#![allow(non_snake_case)]

use anyhow::{bail, format_err, Error};
use nalgebra::{DMatrix, SVD};
use ndarray::{s, Array1, Array2, ArrayView2};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::Rng;

/// Left singular vectors, singular values and right singular vectors (as rows)
pub type SvdResult = (Array2<f64>, Array1<f64>, Array2<f64>);

/// Settings for randomized SVD
#[derive(Debug, Clone)]
pub struct RandSvd {
    /// Extra projection dimensions beyond the requested rank
    pub oversample: usize,

    /// Number of power iterations to perform
    pub n_iter: usize,
}

impl Default for RandSvd {
    fn default() -> Self {
        RandSvd {
            oversample: 10,
            n_iter: 4,
        }
    }
}

impl RandSvd {
    /// Rank `k` SVD of `A`, drawing the random test matrix from `rng`.
    pub fn run(&self, A: &ArrayView2<f64>, k: usize, rng: &mut impl Rng) -> Result<SvdResult, Error> {
        let (m, n) = A.dim();
        let l = (k + self.oversample).min(m.min(n));
        svd_rand(A, k, l, self.n_iter, rng)
    }
}

fn to_dmatrix(a: &ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

/// Orthonormal basis for the columns of a tall matrix, from a Householder QR.
fn orthonormal_basis(A: &Array2<f64>) -> Array2<f64> {
    from_dmatrix(&to_dmatrix(&A.view()).qr().q())
}

/// Exact SVD of a small matrix `B` with at least as many columns as rows, singular values in
/// descending order.
fn small_svd(B: &Array2<f64>) -> Result<SvdResult, Error> {
    let svd = SVD::new(to_dmatrix(&B.view()), true, true);
    let U = svd.u.ok_or_else(|| format_err!("SVD returned no left singular vectors"))?;
    let Vt = svd.v_t.ok_or_else(|| format_err!("SVD returned no right singular vectors"))?;
    let sv = svd.singular_values;

    let mut order = (0..sv.len()).collect::<Vec<_>>();
    order.sort_by(|&i, &j| sv[j].total_cmp(&sv[i]));

    Ok((
        Array2::from_shape_fn((U.nrows(), order.len()), |(i, j)| U[(i, order[j])]),
        order.iter().map(|&i| sv[i]).collect(),
        Array2::from_shape_fn((order.len(), Vt.ncols()), |(i, j)| Vt[(order[i], j)]),
    ))
}

/// Perform an SVD of matrix `A`, making a rank `k` approximation. Use `l` projection dimensions
/// and `n_iter` power iterations.
pub fn svd_rand(A: &ArrayView2<f64>, k: usize, l: usize, n_iter: usize, rng: &mut impl Rng) -> Result<SvdResult, Error> {
    let (m, n) = A.dim();

    if m < 2 || n < 1 {
        bail!("the input matrix must have at least 2 rows and 1 column, got {} x {}", m, n);
    }
    if k == 0 || k > l || l > m.min(n) {
        bail!("invalid rank {} with {} projection dimensions for a {} x {} matrix", k, l, m, n);
    }

    let unif = Uniform::new(-1.0, 1.0);

    if m >= n {
        let omega = Array2::random_using((n, l), unif, rng);
        let mut Q = orthonormal_basis(&A.dot(&omega));

        for _ in 0..n_iter {
            let P = orthonormal_basis(&A.t().dot(&Q));
            Q = orthonormal_basis(&A.dot(&P));
        }

        // B = Q^T A is l x n with l <= n
        let B = Q.t().dot(A);
        let (Ub, sigma, Vt) = small_svd(&B)?;
        let U = Q.dot(&Ub.slice(s![.., ..k]));
        Ok((U, sigma.slice(s![..k]).to_owned(), Vt.slice(s![..k, ..]).to_owned()))
    } else {
        let omega = Array2::random_using((l, m), unif, rng);
        let mut Q = orthonormal_basis(&omega.dot(A).reversed_axes());

        for _ in 0..n_iter {
            let P = orthonormal_basis(&A.dot(&Q));
            Q = orthonormal_basis(&A.t().dot(&P));
        }

        // B^T = (A Q)^T is l x m with l <= m
        let Bt = A.dot(&Q).reversed_axes();
        let (Vb, sigma, Ut) = small_svd(&Bt)?;
        let U = Ut.slice(s![..k, ..]).t().to_owned();
        let Vt = Q.dot(&Vb.slice(s![.., ..k])).reversed_axes();
        Ok((U, sigma.slice(s![..k]).to_owned(), Vt))
    }
}
