//! Errors surfaced by the clustering pipeline

use std::fmt;
use thiserror::Error;

/// Stages of one clustering pass, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// per-gene means, variances and expression mask
    GeneStatistics,
    /// highly variable gene selection
    HighlyVariable,
    /// principal component computation
    Pca,
    /// variance-based component pruning
    FilterComponents,
    /// projection into component space
    Project,
    /// removal of components aligned with known modes
    FilterKnownModes,
    /// extraction of a precomputed latent space
    ExtractLatent,
    /// nearest-neighbor graph clustering
    Cluster,
    /// marker-gene based cluster merging
    Merge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::GeneStatistics => "gene statistics",
            Stage::HighlyVariable => "highly variable genes",
            Stage::Pca => "PCA",
            Stage::FilterComponents => "filter components",
            Stage::Project => "projection",
            Stage::FilterKnownModes => "filter known modes",
            Stage::ExtractLatent => "latent extraction",
            Stage::Cluster => "clustering",
            Stage::Merge => "merging",
        };
        f.write_str(name)
    }
}

/// Error type of the public pipeline entry points.
#[derive(Debug, Error)]
pub enum ClusteringError {
    /// The component and known-mode matrices share no row identifiers.
    #[error("no shared identifiers between components ({components} rows) and known modes ({known_modes} rows)")]
    EmptyIntersection {
        /// rows in the component matrix
        components: usize,
        /// rows in the known-mode matrix
        known_modes: usize,
    },

    /// Identifier sets that must line up do not.
    #[error("input mismatch: {0}")]
    InputMismatch(String),

    /// Reduction left nothing to cluster on.
    #[error("no reduced dimensions remain after {stage}")]
    NoReducedDimensions {
        /// stage that produced the empty reduction
        stage: Stage,
    },

    /// A stage collaborator failed; the original error is the source.
    #[error("{stage} failed: {source:#}")]
    StageFailure {
        /// the failing stage
        stage: Stage,
        /// the collaborator's error, unmodified
        source: anyhow::Error,
    },

    /// Options rejected before any stage ran.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ClusteringError {
    /// The stage a failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ClusteringError::StageFailure { stage, .. } | ClusteringError::NoReducedDimensions { stage } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

/// Attach a stage to collaborator results.
pub(crate) trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T, ClusteringError>;
}

impl<T> StageContext<T> for Result<T, anyhow::Error> {
    fn stage(self, stage: Stage) -> Result<T, ClusteringError> {
        self.map_err(|source| ClusteringError::StageFailure { stage, source })
    }
}
