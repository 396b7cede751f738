//! One complete clustering pass over an expression matrix

use crate::config::{KnownModesOptions, PipelineConfig};
use crate::error::{ClusteringError, Stage, StageContext};
use crate::known_modes::filter_known_modes;
use crate::observe::{LogObserver, StageObserver};
use crate::stages::{ClusteringStages, DefaultStages};
use log::{debug, info};
use std::collections::BTreeSet;
use std::time::Instant;
use tclust_types::{ClusterAssignment, ExpressionMatrix, ReducedMatrix};

/// How the reduced matrix is obtained
#[derive(Debug, Clone, Copy)]
pub enum ReductionSource<'a> {
    /// gene statistics, highly variable genes, PCA, component filtering, projection, then known
    /// mode filtering when configured
    Computed {
        /// known modes to filter against, if any
        known_modes: Option<&'a KnownModesOptions>,
    },
    /// a precomputed embedding attached to the expression matrix
    Latent {
        /// name of the embedding
        component: &'a str,
    },
}

impl<'a> ReductionSource<'a> {
    /// A configured latent component takes precedence over computing a reduction.
    pub fn from_config(config: &'a PipelineConfig) -> ReductionSource<'a> {
        match config.latent.latent_component.as_deref() {
            Some(component) => ReductionSource::Latent { component },
            None => ReductionSource::Computed {
                known_modes: config.known_modes.as_ref(),
            },
        }
    }
}

/// Outcome of [`onestep_cluster`]
#[derive(Debug, Clone, PartialEq)]
pub struct OnestepResult {
    /// observation ids of every final cluster, in ascending cluster id
    pub clusters: Vec<Vec<String>>,
    /// marker genes found while merging, possibly empty
    pub markers: BTreeSet<String>,
    /// the final assignment keyed by cluster id
    pub assignment: ClusterAssignment,
}

fn timed<T, O>(
    observer: &mut O,
    stage: Stage,
    f: impl FnOnce() -> Result<T, ClusteringError>,
) -> Result<T, ClusteringError>
where
    O: StageObserver + ?Sized,
{
    observer.stage_started(stage);
    let start = Instant::now();
    let out = f();
    match &out {
        Ok(_) => observer.stage_finished(stage, start.elapsed()),
        Err(e) => observer.stage_failed(stage, e),
    }
    out
}

fn require_dimensions(reduced: &ReducedMatrix, stage: Stage) -> Result<(), ClusteringError> {
    if reduced.ncols() == 0 {
        return Err(ClusteringError::NoReducedDimensions { stage });
    }
    Ok(())
}

/// Run a full clustering pass with the stage implementations of this crate, logging progress.
/// A missing `random_seed` means seed 0.
pub fn onestep_cluster(
    expr: &ExpressionMatrix,
    config: &PipelineConfig,
    random_seed: Option<u64>,
) -> Result<OnestepResult, ClusteringError> {
    onestep_cluster_with(&DefaultStages, &mut LogObserver, expr, config, random_seed)
}

/// Run a full clustering pass with caller-supplied stages and observer.
///
/// The reduced matrix comes from the latent component named in `config.latent`, or else from
/// PCA on highly variable genes followed by projection and, if `config.known_modes` is set, known
/// mode filtering. The reduced matrix is clustered with `min(config.cluster.k, dimensions)`
/// neighbors and the clusters are merged. Every observation of `expr` ends up in exactly one
/// cluster. The first failing stage ends the pass.
pub fn onestep_cluster_with<S, O>(
    stages: &S,
    observer: &mut O,
    expr: &ExpressionMatrix,
    config: &PipelineConfig,
    random_seed: Option<u64>,
) -> Result<OnestepResult, ClusteringError>
where
    S: ClusteringStages + ?Sized,
    O: StageObserver + ?Sized,
{
    config.validate()?;
    let seed = random_seed.unwrap_or(0);
    info!(
        "starting one-step clustering of {} observations x {} genes",
        expr.n_obs(),
        expr.n_genes()
    );

    let reduced = match ReductionSource::from_config(config) {
        ReductionSource::Latent { component } => {
            info!("extracting latent dimensions from {}", component);
            let reduced = timed(observer, Stage::ExtractLatent, || {
                stages.extract_latent(expr, &config.latent).stage(Stage::ExtractLatent)
            })?;
            require_dimensions(&reduced, Stage::ExtractLatent)?;
            reduced
        }
        ReductionSource::Computed { known_modes } => {
            let stats = timed(observer, Stage::GeneStatistics, || {
                stages
                    .gene_statistics(expr, &config.means_vars)
                    .stage(Stage::GeneStatistics)
            })?;
            let hv_mask = timed(observer, Stage::HighlyVariable, || {
                stages
                    .select_highly_variable(expr, &stats, &config.highly_variable)
                    .stage(Stage::HighlyVariable)
            })?;
            let pca = timed(observer, Stage::Pca, || {
                stages.compute_pca(expr, &hv_mask, seed, &config.pca).stage(Stage::Pca)
            })?;
            info!("computed {} principal components", pca.components.ncols());

            let components = timed(observer, Stage::FilterComponents, || {
                stages
                    .filter_components(
                        &pca.components,
                        &pca.explained_variance,
                        &pca.explained_variance_ratio,
                        &config.filter_pcs,
                    )
                    .stage(Stage::FilterComponents)
            })?;
            info!("filtered to {} principal components", components.ncols());
            require_dimensions(&components, Stage::FilterComponents)?;

            let projected = timed(observer, Stage::Project, || {
                stages
                    .project(expr, &components, &pca.means, &config.project)
                    .stage(Stage::Project)
            })?;
            info!("projected matrix is {} x {}", projected.nrows(), projected.ncols());

            match known_modes {
                Some(km) => {
                    let reduced = timed(observer, Stage::FilterKnownModes, || {
                        let covered = km.known_modes.row_index();
                        let missing = projected
                            .rows()
                            .iter()
                            .filter(|r| !covered.contains_key(r.as_str()))
                            .count();
                        if missing > 0 {
                            return Err(ClusteringError::InputMismatch(format!(
                                "known modes are missing {} of {} projected observations",
                                missing,
                                projected.nrows()
                            )));
                        }
                        filter_known_modes(&projected, &km.known_modes, km.similarity_threshold)
                    })?;
                    info!(
                        "projected matrix after filtering known modes is {} x {}",
                        reduced.nrows(),
                        reduced.ncols()
                    );
                    require_dimensions(&reduced, Stage::FilterKnownModes)?;
                    reduced
                }
                None => {
                    info!("no known modes, skipping known mode filtering");
                    require_dimensions(&projected, Stage::Project)?;
                    projected
                }
            }
        }
    };

    let k = config.cluster.k.min(reduced.ncols());
    if k < config.cluster.k {
        debug!(
            "clamped k from {} to {} reduced dimensions",
            config.cluster.k,
            reduced.ncols()
        );
    }
    let clustering = timed(observer, Stage::Cluster, || {
        let c = stages
            .cluster_graph(&reduced, k, seed, &config.cluster)
            .stage(Stage::Cluster)?;
        c.observations_by_cluster
            .check_partition(&expr.observations)
            .stage(Stage::Cluster)?;
        Ok(c)
    })?;
    info!(
        "completed graph clustering, found {} clusters",
        clustering.observations_by_cluster.num_clusters()
    );

    let (assignment, markers) = timed(observer, Stage::Merge, || {
        let (merged, markers) = stages
            .merge_clusters(
                expr,
                &reduced,
                &clustering.observations_by_cluster,
                &clustering.cluster_by_observation,
                &config.merge,
            )
            .stage(Stage::Merge)?;
        merged.check_partition(&expr.observations).stage(Stage::Merge)?;
        Ok((merged, markers))
    })?;
    info!("completed one-step clustering with {} clusters", assignment.num_clusters());

    Ok(OnestepResult {
        clusters: assignment.clusters().values().cloned().collect(),
        markers,
        assignment,
    })
}
