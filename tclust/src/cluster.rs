//! Graph-based clustering of the reduced matrix

use crate::config::ClusterOptions;
use crate::nn::{knn, shared_neighbor_graph};
use anyhow::{bail, Error};
use itertools::Itertools;
use log::{debug, info};
use louvain::objective::modularity;
use louvain::{Louvain, Network, Partition};
use std::cmp::Reverse;
use std::collections::HashMap;
use tclust_types::{ClusterAssignment, ReducedMatrix};

/// Result of [`cluster_graph`]
#[derive(Debug, Clone)]
pub struct GraphClustering {
    /// cluster id of every row of the reduced matrix, in row order
    pub cluster_by_observation: Vec<usize>,
    /// the same partition keyed by cluster id
    pub observations_by_cluster: ClusterAssignment,
    /// the shared-nearest-neighbor graph that was clustered
    pub graph: Network,
    /// modularity of the partition on `graph`
    pub quality: f64,
}

/// Relabel a clustering from greatest cluster size to least. Equal sizes keep the order of their
/// previous labels.
pub fn relabel_by_size(labels: &[usize]) -> Vec<usize> {
    let map = labels
        .iter()
        .copied()
        .counts()
        .into_iter()
        .sorted_by_key(|&(label, size)| (Reverse(size), label))
        .enumerate()
        .map(|(new, (old, _))| (old, new))
        .collect::<HashMap<_, _>>();
    labels.iter().map(|l| map[l]).collect()
}

/// Cluster the rows of `reduced` with `k` nearest neighbors, a Jaccard-weighted shared-neighbor
/// graph and seeded Louvain. `k` is clamped to the number of other rows.
pub fn cluster_graph(
    reduced: &ReducedMatrix,
    k: usize,
    seed: u64,
    opts: &ClusterOptions,
) -> Result<GraphClustering, Error> {
    let n = reduced.nrows();
    if n == 0 {
        bail!("nothing to cluster");
    }
    if reduced.ncols() == 0 {
        bail!("reduced matrix has no dimensions");
    }
    if k == 0 {
        bail!("clustering needs at least one neighbor");
    }

    let (labels, graph) = if n == 1 {
        (vec![0], Network::from_edges(1, std::iter::empty()))
    } else {
        let k_eff = k.min(n - 1);
        if k_eff < k {
            debug!("clamped k from {} to {} for {} observations", k, k_eff, n);
        }
        let neighbors = knn(&reduced.values(), k_eff)?;
        let graph = shared_neighbor_graph(&neighbors);
        let partition = Louvain::new(opts.resolution, Some(seed)).run(&graph, opts.max_iterations);
        (relabel_by_size(partition.labels()), graph)
    };

    let quality = modularity(opts.resolution, &graph, &Partition::from_labels(&labels));
    let observations_by_cluster = ClusterAssignment::from_labels(reduced.rows(), &labels)?;
    info!(
        "found {} clusters among {} observations, modularity {:.4}",
        observations_by_cluster.num_clusters(),
        n,
        quality
    );

    Ok(GraphClustering {
        cluster_by_observation: labels,
        observations_by_cluster,
        graph,
        quality,
    })
}
