//! Per-stage option bundles for one clustering pass
//!
//! Every bundle has its own stage-local `Default`. With the `serde` feature every bundle can be
//! read from a partial document: missing bundles and missing fields keep their defaults.

use crate::error::ClusteringError;
use crate::known_modes::DEFAULT_SIMILARITY_THRESHOLD;
use diff_exp::DeThresholds;
use tclust_types::KnownModeMatrix;

/// Options for per-gene means and variances
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct MeansVarsOptions {
    /// expression above this counts as "expressed"
    pub low_thresh: f64,
    /// genes expressed in fewer observations are masked out
    pub min_cells: usize,
}

impl Default for MeansVarsOptions {
    fn default() -> Self {
        MeansVarsOptions {
            low_thresh: 1.0,
            min_cells: 4,
        }
    }
}

/// Options for highly variable gene selection
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct HighlyVariableOptions {
    /// number of genes to keep
    pub max_genes: usize,
    /// number of mean-expression bins used to normalize dispersion
    pub n_bins: usize,
}

impl Default for HighlyVariableOptions {
    fn default() -> Self {
        HighlyVariableOptions {
            max_genes: 3000,
            n_bins: 20,
        }
    }
}

/// Options for principal component computation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct PcaOptions {
    /// number of components to compute, clamped to what the data supports
    pub n_comps: usize,
    /// compute components on a random sample of this many observations
    pub cell_select: Option<usize>,
    /// power iterations of the randomized SVD
    pub n_iter: usize,
    /// extra projection dimensions of the randomized SVD
    pub oversample: usize,
}

impl Default for PcaOptions {
    fn default() -> Self {
        PcaOptions {
            n_comps: 50,
            cell_select: None,
            n_iter: 4,
            oversample: 10,
        }
    }
}

/// Options for variance-based component pruning
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct FilterPcsOptions {
    /// keep components whose explained-variance z-score exceeds this
    pub zscore_threshold: f64,
    /// keep at most this many leading components
    pub max_pcs: Option<usize>,
}

impl Default for FilterPcsOptions {
    fn default() -> Self {
        FilterPcsOptions {
            zscore_threshold: 2.0,
            max_pcs: None,
        }
    }
}

/// Known artifact directions to remove from the projected space. Absent means the stage is
/// skipped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize))]
pub struct KnownModesOptions {
    /// observations x modes
    pub known_modes: KnownModeMatrix,
    /// components whose max |correlation| with a mode exceeds this are dropped
    #[cfg_attr(any(feature = "serde", test), serde(default = "default_similarity_threshold"))]
    pub similarity_threshold: f64,
}

#[cfg(any(feature = "serde", test))]
fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

impl KnownModesOptions {
    /// Known modes with the default similarity threshold
    pub fn new(known_modes: KnownModeMatrix) -> Self {
        KnownModesOptions {
            known_modes,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Options for projecting observations into component space
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct ProjectOptions {
    /// observations per parallel work unit; `None` uses `DEFAULT_CHUNK_SIZE`
    pub chunk_size: Option<usize>,
}

/// Options for using a precomputed latent space instead of PCA
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct LatentOptions {
    /// name of the embedding attached to the expression matrix; setting it selects the latent path
    pub latent_component: Option<String>,
    /// keep only the leading dimensions of the embedding
    pub n_dims: Option<usize>,
}

/// Options for nearest-neighbor graph clustering
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct ClusterOptions {
    /// requested neighbors; the pipeline clamps it to the reduced dimension count
    pub k: usize,
    /// modularity resolution
    pub resolution: f64,
    /// maximum number of Louvain iterations
    pub max_iterations: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        ClusterOptions {
            k: 15,
            resolution: louvain::louvain::DEFAULT_RESOLUTION,
            max_iterations: 10,
        }
    }
}

/// Options for merging clusters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct MergeOptions {
    /// clusters smaller than this are folded into their nearest neighbor first
    pub min_cluster_size: usize,
    /// number of nearest clusters tested against each cluster
    pub k: usize,
    /// marker genes reported per direction per tested pair
    pub n_markers: usize,
    /// DE gene and separation criteria
    pub thresholds: DeThresholds,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            min_cluster_size: 4,
            k: 2,
            n_markers: 20,
            thresholds: DeThresholds::default(),
        }
    }
}

/// Options for every stage of one clustering pass
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Deserialize), serde(default))]
pub struct PipelineConfig {
    /// gene statistics
    pub means_vars: MeansVarsOptions,
    /// highly variable genes
    pub highly_variable: HighlyVariableOptions,
    /// PCA
    pub pca: PcaOptions,
    /// component pruning
    pub filter_pcs: FilterPcsOptions,
    /// known-mode filtering, skipped when absent
    pub known_modes: Option<KnownModesOptions>,
    /// projection
    pub project: ProjectOptions,
    /// latent path
    pub latent: LatentOptions,
    /// clustering
    pub cluster: ClusterOptions,
    /// merging
    pub merge: MergeOptions,
}

impl PipelineConfig {
    /// Reject option combinations no stage can run with.
    pub fn validate(&self) -> Result<(), ClusteringError> {
        let fail = |msg: String| Err(ClusteringError::Configuration(msg));

        if self.cluster.k == 0 {
            return fail("cluster.k must be at least 1".into());
        }
        if !(self.cluster.resolution > 0.0) {
            return fail(format!("cluster.resolution must be positive, got {}", self.cluster.resolution));
        }
        if self.highly_variable.max_genes == 0 || self.highly_variable.n_bins == 0 {
            return fail("highly_variable.max_genes and n_bins must be at least 1".into());
        }
        if self.pca.n_comps == 0 {
            return fail("pca.n_comps must be at least 1".into());
        }
        if self.pca.cell_select == Some(0) {
            return fail("pca.cell_select must be at least 1 when set".into());
        }
        if self.project.chunk_size == Some(0) {
            return fail("project.chunk_size must be at least 1 when set".into());
        }
        if self.latent.n_dims == Some(0) {
            return fail("latent.n_dims must be at least 1 when set".into());
        }
        if self.merge.min_cluster_size == 0 {
            return fail("merge.min_cluster_size must be at least 1".into());
        }
        if let Some(km) = &self.known_modes {
            if !(0.0..=1.0).contains(&km.similarity_threshold) {
                return fail(format!(
                    "known_modes.similarity_threshold must be in [0, 1], got {}",
                    km.similarity_threshold
                ));
            }
            if km.known_modes.ncols() == 0 {
                return fail("known_modes has no mode columns".into());
            }
        }
        Ok(())
    }
}
