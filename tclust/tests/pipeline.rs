use anyhow::{format_err, Error};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64Mcg;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::time::Duration;
use tclust::cluster::{self, GraphClustering};
use tclust::config::{ClusterOptions, PcaOptions};
use tclust::dim_red::PcaOutput;
use tclust::observe::{NoOpObserver, StageObserver};
use tclust::{
    onestep_cluster, onestep_cluster_with, ClusteringError, ClusteringStages, DefaultStages, KnownModesOptions,
    PipelineConfig, Stage,
};
use tclust_types::{ExpressionMatrix, LabeledMatrix, ReducedMatrix};

const GROUPS: [&str; 3] = ["A", "B", "C"];
const PER_GROUP: usize = 30;
const PLANTED: usize = 8;
const BACKGROUND: usize = 16;

fn observation_ids() -> Vec<String> {
    GROUPS
        .iter()
        .flat_map(|g| (0..PER_GROUP).map(move |i| format!("{g}-{i:02}")))
        .collect()
}

/// Three groups of observations, each expressing its own block of genes well above background.
fn grouped_expression() -> ExpressionMatrix {
    let n_obs = GROUPS.len() * PER_GROUP;
    let n_genes = GROUPS.len() * PLANTED + BACKGROUND;
    let mut rng = Pcg64Mcg::seed_from_u64(7);
    let noise = Normal::new(0.2f64, 0.3).unwrap();
    let mut x = Array2::from_shape_fn((n_obs, n_genes), |_| noise.sample(&mut rng).max(0.0));
    for obs in 0..n_obs {
        let group = obs / PER_GROUP;
        for g in group * PLANTED..(group + 1) * PLANTED {
            x[[obs, g]] += 3.0;
        }
    }
    let genes = (0..n_genes).map(|g| format!("gene{g:02}")).collect();
    ExpressionMatrix::new(observation_ids(), genes, x).unwrap()
}

/// The grouped expression with rows interleaved across groups, so ids are not in sorted order.
fn interleaved_expression() -> ExpressionMatrix {
    let expr = grouped_expression();
    let order = (0..PER_GROUP)
        .flat_map(|i| (0..GROUPS.len()).map(move |g| g * PER_GROUP + i))
        .collect::<Vec<_>>();
    let ids = order.iter().map(|&r| expr.observations[r].clone()).collect();
    ExpressionMatrix::new(ids, expr.genes.clone(), expr.matrix.select(Axis(0), &order)).unwrap()
}

/// The same expression plus a 4-dimensional embedding that separates the groups.
fn with_embedding(expr: ExpressionMatrix) -> ExpressionMatrix {
    let mut rng = Pcg64Mcg::seed_from_u64(11);
    let noise = Normal::new(0.0, 0.3).unwrap();
    let mut emb = Array2::from_shape_fn((expr.n_obs(), 4), |_| noise.sample(&mut rng));
    for obs in 0..expr.n_obs() {
        let group = obs / PER_GROUP;
        if group > 0 {
            emb[[obs, group - 1]] += 5.0;
        }
    }
    expr.with_latent("scvi", emb).unwrap()
}

fn test_config() -> PipelineConfig {
    PipelineConfig::default()
}

fn group_of(id: &str) -> &str {
    &id[..1]
}

#[derive(Default)]
struct StageLog {
    started: Vec<Stage>,
    finished: Vec<Stage>,
    failed: Vec<Stage>,
}

impl StageObserver for StageLog {
    fn stage_started(&mut self, stage: Stage) {
        self.started.push(stage);
    }

    fn stage_finished(&mut self, stage: Stage, _elapsed: Duration) {
        self.finished.push(stage);
    }

    fn stage_failed(&mut self, stage: Stage, _error: &ClusteringError) {
        self.failed.push(stage);
    }
}

/// Records the neighbor count handed to the clustering stage.
#[derive(Default)]
struct RecordNeighbors {
    k: Cell<Option<usize>>,
}

impl ClusteringStages for RecordNeighbors {
    fn cluster_graph(
        &self,
        reduced: &ReducedMatrix,
        k: usize,
        seed: u64,
        opts: &ClusterOptions,
    ) -> Result<GraphClustering, Error> {
        self.k.set(Some(k));
        cluster::cluster_graph(reduced, k, seed, opts)
    }
}

struct FailingPca;

impl ClusteringStages for FailingPca {
    fn compute_pca(
        &self,
        _expr: &ExpressionMatrix,
        _gene_mask: &[bool],
        _seed: u64,
        _opts: &PcaOptions,
    ) -> Result<PcaOutput, Error> {
        Err(format_err!("decomposition did not converge"))
    }
}

#[test]
fn separated_groups_are_recovered() {
    let expr = grouped_expression();
    let result = onestep_cluster(&expr, &test_config(), Some(3)).unwrap();

    assert_eq!(result.clusters.len(), 3);
    for cluster in &result.clusters {
        assert_eq!(cluster.len(), PER_GROUP);
        let groups = cluster.iter().map(|id| group_of(id)).collect::<BTreeSet<_>>();
        assert_eq!(groups.len(), 1, "mixed cluster {cluster:?}");
    }
    assert!(!result.markers.is_empty());
    for gene in &result.markers {
        let idx: usize = gene[4..].parse().unwrap();
        assert!(idx < GROUPS.len() * PLANTED, "background gene {gene} reported as marker");
    }
}

#[test]
fn every_observation_lands_in_one_cluster() {
    let expr = grouped_expression();
    let result = onestep_cluster(&expr, &test_config(), None).unwrap();

    let mut seen = result.clusters.iter().flatten().cloned().collect::<Vec<_>>();
    seen.sort();
    let mut expected = expr.observations.clone();
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(result.assignment.num_observations(), expr.n_obs());
    assert_eq!(
        result.clusters,
        result.assignment.clusters().values().cloned().collect::<Vec<_>>()
    );
}

#[test]
fn same_seed_same_result() {
    let expr = grouped_expression();
    let mut config = test_config();
    config.pca.cell_select = Some(60);

    let a = onestep_cluster(&expr, &config, Some(42)).unwrap();
    let b = onestep_cluster(&expr, &config, Some(42)).unwrap();
    assert_eq!(a, b);

    let unseeded = onestep_cluster(&expr, &config, None).unwrap();
    let zero = onestep_cluster(&expr, &config, Some(0)).unwrap();
    assert_eq!(unseeded, zero);
}

#[test]
fn computed_path_skips_known_modes_when_unset() {
    let expr = grouped_expression();
    let mut log = StageLog::default();
    onestep_cluster_with(&DefaultStages, &mut log, &expr, &test_config(), Some(1)).unwrap();

    assert_eq!(
        log.started,
        vec![
            Stage::GeneStatistics,
            Stage::HighlyVariable,
            Stage::Pca,
            Stage::FilterComponents,
            Stage::Project,
            Stage::Cluster,
            Stage::Merge,
        ]
    );
    assert_eq!(log.finished, log.started);
    assert!(log.failed.is_empty());
}

#[test]
fn latent_path_clamps_neighbors_to_dimensions() {
    let expr = with_embedding(grouped_expression());
    let mut config = test_config();
    config.latent.latent_component = Some("scvi".to_string());
    assert_eq!(config.cluster.k, 15);

    let stages = RecordNeighbors::default();
    let mut log = StageLog::default();
    let result = onestep_cluster_with(&stages, &mut log, &expr, &config, Some(5)).unwrap();

    assert_eq!(stages.k.get(), Some(4));
    assert_eq!(log.started, vec![Stage::ExtractLatent, Stage::Cluster, Stage::Merge]);
    assert_eq!(result.assignment.num_observations(), expr.n_obs());
    assert_eq!(result.clusters.len(), 3);
}

#[test]
fn latent_dimensions_can_be_truncated() {
    let expr = with_embedding(grouped_expression());
    let mut config = test_config();
    config.latent.latent_component = Some("scvi".to_string());
    config.latent.n_dims = Some(2);

    let stages = RecordNeighbors::default();
    onestep_cluster_with(&stages, &mut NoOpObserver, &expr, &config, Some(5)).unwrap();
    assert_eq!(stages.k.get(), Some(2));
}

#[test]
fn unknown_latent_component_fails_extraction() {
    let expr = grouped_expression();
    let mut config = test_config();
    config.latent.latent_component = Some("umap".to_string());

    let err = onestep_cluster(&expr, &config, None).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::ExtractLatent));
}

#[test]
fn uncorrelated_known_mode_leaves_result_unchanged() {
    let expr = grouped_expression();
    let mut rng = Pcg64Mcg::seed_from_u64(99);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let modes = Array2::from_shape_fn((expr.n_obs(), 1), |_| noise.sample(&mut rng));
    let known = LabeledMatrix::new(expr.observations.clone(), vec!["batch".to_string()], modes).unwrap();

    let plain = onestep_cluster(&expr, &test_config(), Some(8)).unwrap();

    let mut config = test_config();
    config.known_modes = Some(KnownModesOptions::new(known));
    let mut log = StageLog::default();
    let filtered = onestep_cluster_with(&DefaultStages, &mut log, &expr, &config, Some(8)).unwrap();

    assert!(log.finished.contains(&Stage::FilterKnownModes));
    assert_eq!(filtered, plain);
}

#[test]
fn known_mode_filter_keeps_unsorted_observations_aligned() {
    let expr = interleaved_expression();
    assert!(expr.observations.windows(2).any(|w| w[0] > w[1]));

    // known modes listed in reverse order of the expression rows
    let ids = expr.observations.iter().rev().cloned().collect::<Vec<_>>();
    let mut rng = Pcg64Mcg::seed_from_u64(99);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let modes = Array2::from_shape_fn((ids.len(), 1), |_| noise.sample(&mut rng));
    let known = LabeledMatrix::new(ids, vec!["batch".to_string()], modes).unwrap();

    let mut config = test_config();
    config.known_modes = Some(KnownModesOptions::new(known));
    let mut log = StageLog::default();
    let result = onestep_cluster_with(&DefaultStages, &mut log, &expr, &config, Some(8)).unwrap();

    assert!(log.finished.contains(&Stage::FilterKnownModes));
    let mut seen = result.clusters.iter().flatten().cloned().collect::<Vec<_>>();
    seen.sort();
    let mut expected = expr.observations.clone();
    expected.sort();
    assert_eq!(seen, expected);

    assert_eq!(result.clusters.len(), 3);
    for cluster in &result.clusters {
        assert_eq!(cluster.len(), PER_GROUP);
        let groups = cluster.iter().map(|id| group_of(id)).collect::<BTreeSet<_>>();
        assert_eq!(groups.len(), 1, "mixed cluster {cluster:?}");
    }
}

#[test]
fn zero_similarity_threshold_removes_every_dimension() {
    let expr = grouped_expression();
    let mut rng = Pcg64Mcg::seed_from_u64(99);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let modes = Array2::from_shape_fn((expr.n_obs(), 1), |_| noise.sample(&mut rng));
    let known = LabeledMatrix::new(expr.observations.clone(), vec!["batch".to_string()], modes).unwrap();

    let mut config = test_config();
    config.known_modes = Some(KnownModesOptions {
        known_modes: known,
        similarity_threshold: 0.0,
    });
    let mut log = StageLog::default();
    let err = onestep_cluster_with(&DefaultStages, &mut log, &expr, &config, None).unwrap_err();

    assert!(matches!(
        err,
        ClusteringError::NoReducedDimensions {
            stage: Stage::FilterKnownModes
        }
    ));
    assert!(!log.started.contains(&Stage::Cluster));
}

#[test]
fn known_modes_must_cover_every_observation() {
    let expr = grouped_expression();
    let ids = expr.observations[1..].to_vec();
    let modes = Array2::from_shape_fn((ids.len(), 1), |(i, _)| i as f64);
    let known = LabeledMatrix::new(ids, vec!["depth".to_string()], modes).unwrap();

    let mut config = test_config();
    config.known_modes = Some(KnownModesOptions::new(known));
    let mut log = StageLog::default();
    let err = onestep_cluster_with(&DefaultStages, &mut log, &expr, &config, None).unwrap_err();

    assert!(matches!(err, ClusteringError::InputMismatch(_)));
    assert_eq!(log.failed, vec![Stage::FilterKnownModes]);
}

#[test]
fn stage_failure_names_the_stage() {
    let expr = grouped_expression();
    let mut log = StageLog::default();
    let err = onestep_cluster_with(&FailingPca, &mut log, &expr, &test_config(), None).unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Pca));
    assert_eq!(err.to_string(), "PCA failed: decomposition did not converge");
    assert_eq!(log.failed, vec![Stage::Pca]);
    assert_eq!(log.started.last(), Some(&Stage::Pca));
}

#[test]
fn invalid_configuration_runs_no_stage() {
    let expr = grouped_expression();
    let mut config = test_config();
    config.cluster.k = 0;

    let mut log = StageLog::default();
    let err = onestep_cluster_with(&DefaultStages, &mut log, &expr, &config, None).unwrap_err();
    assert!(matches!(err, ClusteringError::Configuration(_)));
    assert!(log.started.is_empty());
}
