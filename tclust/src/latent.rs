//! Precomputed latent spaces as the reduced representation

use crate::config::LatentOptions;
use anyhow::{bail, format_err, Error};
use log::info;
use ndarray::s;
use tclust_types::{ExpressionMatrix, LabeledMatrix, ReducedMatrix};

/// Use the embedding named by `opts.latent_component` as the reduced matrix, keeping the leading
/// `opts.n_dims` dimensions when set. Dimensions are labelled `<name>_1`, `<name>_2`, ...
pub fn extract_latent(expr: &ExpressionMatrix, opts: &LatentOptions) -> Result<ReducedMatrix, Error> {
    let name = opts
        .latent_component
        .as_deref()
        .ok_or_else(|| format_err!("no latent component configured"))?;
    let emb = expr.latent.get(name).ok_or_else(|| {
        format_err!(
            "latent component {} not found; available: [{}]",
            name,
            expr.latent.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
        )
    })?;
    if emb.nrows() != expr.n_obs() {
        bail!("latent component {} has {} rows for {} observations", name, emb.nrows(), expr.n_obs());
    }

    let dims = match opts.n_dims {
        Some(n) => n.min(emb.ncols()),
        None => emb.ncols(),
    };
    info!("using {} of {} dimensions of latent component {}", dims, emb.ncols(), name);

    LabeledMatrix::new(
        expr.observations.clone(),
        (1..=dims).map(|i| format!("{name}_{i}")).collect(),
        emb.slice(s![.., ..dims]).to_owned(),
    )
}
