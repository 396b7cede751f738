//! Collaborator seams of the clustering pipeline
//!
//! Every stage the pipeline runs goes through [`ClusteringStages`]. Each method has a default
//! body that calls the implementation shipped in this crate, so an override replaces exactly the
//! stages it names.

use crate::cluster::{self, GraphClustering};
use crate::config::{
    ClusterOptions, FilterPcsOptions, HighlyVariableOptions, LatentOptions, MeansVarsOptions, MergeOptions,
    PcaOptions, ProjectOptions,
};
use crate::dim_red::{self, PcaOutput};
use crate::stats::GeneStats;
use crate::{highly_variable, latent, merge_clusters, stats};
use anyhow::Error;
use ndarray::Array1;
use std::collections::BTreeSet;
use tclust_types::{ClusterAssignment, ExpressionMatrix, GeneComponentMatrix, ReducedMatrix};

/// Stage implementations used by the pipeline
pub trait ClusteringStages {
    /// Per-gene means, variances and expression mask
    fn gene_statistics(&self, expr: &ExpressionMatrix, opts: &MeansVarsOptions) -> Result<GeneStats, Error> {
        stats::gene_statistics(expr, opts)
    }

    /// Mask of highly variable genes, a subset of `stats.gene_mask`
    fn select_highly_variable(
        &self,
        _expr: &ExpressionMatrix,
        stats: &GeneStats,
        opts: &HighlyVariableOptions,
    ) -> Result<Vec<bool>, Error> {
        highly_variable::select_highly_variable(stats, opts)
    }

    /// Principal components over the genes in `gene_mask`
    fn compute_pca(
        &self,
        expr: &ExpressionMatrix,
        gene_mask: &[bool],
        seed: u64,
        opts: &PcaOptions,
    ) -> Result<PcaOutput, Error> {
        dim_red::compute_pca(expr, gene_mask, seed, opts)
    }

    /// Subset of `components` worth projecting onto
    fn filter_components(
        &self,
        components: &GeneComponentMatrix,
        explained_variance: &Array1<f64>,
        explained_variance_ratio: &Array1<f64>,
        opts: &FilterPcsOptions,
    ) -> Result<GeneComponentMatrix, Error> {
        dim_red::filter_components(components, explained_variance, explained_variance_ratio, opts)
    }

    /// Observations x components
    fn project(
        &self,
        expr: &ExpressionMatrix,
        components: &GeneComponentMatrix,
        means: &Array1<f64>,
        opts: &ProjectOptions,
    ) -> Result<ReducedMatrix, Error> {
        dim_red::project(expr, components, means, opts)
    }

    /// Observations x latent dimensions
    fn extract_latent(&self, expr: &ExpressionMatrix, opts: &LatentOptions) -> Result<ReducedMatrix, Error> {
        latent::extract_latent(expr, opts)
    }

    /// Graph clustering of the reduced matrix with `k` neighbors
    fn cluster_graph(
        &self,
        reduced: &ReducedMatrix,
        k: usize,
        seed: u64,
        opts: &ClusterOptions,
    ) -> Result<GraphClustering, Error> {
        cluster::cluster_graph(reduced, k, seed, opts)
    }

    /// Merged assignment and marker genes
    fn merge_clusters(
        &self,
        expr: &ExpressionMatrix,
        reduced: &ReducedMatrix,
        assignment: &ClusterAssignment,
        cluster_by_obs: &[usize],
        opts: &MergeOptions,
    ) -> Result<(ClusterAssignment, BTreeSet<String>), Error> {
        merge_clusters::merge_clusters(expr, reduced, assignment, cluster_by_obs, opts)
    }
}

/// The stage implementations of this crate
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStages;

impl ClusteringStages for DefaultStages {}
