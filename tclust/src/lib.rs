//! # tclust: one-step transcriptomic clustering in Rust
//!
//! [`onestep_cluster`] takes a log-normalized expression matrix through gene selection,
//! dimensionality reduction, optional removal of known artifact modes, graph clustering and
//! differential-expression based merging.

#![deny(missing_docs)]

/// Graph-based clustering
pub mod cluster;

/// Per-stage options
pub mod config;

/// Dimensionality reduction methods
pub mod dim_red;

/// Pipeline errors
pub mod error;

/// Highly variable genes
pub mod highly_variable;

/// Known-mode filtering
pub mod known_modes;

/// Latent space extraction
pub mod latent;

/// Merge clustering using differential expression
pub mod merge_clusters;

/// Nearest-neighbor graphs
pub mod nn;

/// Stage progress notifications
pub mod observe;

/// The clustering pipeline
pub mod pipeline;

/// Stage collaborators
pub mod stages;

/// Statistics functions
pub mod stats;

pub use config::{KnownModesOptions, PipelineConfig};
pub use error::{ClusteringError, Stage};
pub use known_modes::{filter_known_modes, DEFAULT_SIMILARITY_THRESHOLD};
pub use pipeline::{onestep_cluster, onestep_cluster_with, OnestepResult, ReductionSource};
pub use stages::{ClusteringStages, DefaultStages};
