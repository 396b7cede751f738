use crate::Partition;
use fxhash::FxHashMap;

/// Weighted, undirected network. Each edge is stored once in the adjacency list of both of its
/// endpoints. Self-loops are tracked separately so that aggregated networks keep the total edge
/// weight of the network they were built from.
#[derive(Debug, Clone, Default)]
pub struct Network {
    node_weights: Vec<f64>,
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    total_edge_weight: f64,
}

impl Network {
    /// Build a network over `n_nodes` nodes from `(i, j, weight)` triples. Repeated pairs are
    /// summed, `(i, j)` and `(j, i)` are the same edge, and non-positive weights are ignored.
    /// Node weights are the weighted degree of each node.
    pub fn from_edges<I>(n_nodes: usize, edges: I) -> Network
    where
        I: IntoIterator<Item = (u32, u32, f64)>,
    {
        let mut memo: FxHashMap<(usize, usize), f64> = FxHashMap::default();
        let mut self_loops = vec![0.0; n_nodes];
        for (i, j, w) in edges {
            if w <= 0.0 {
                continue;
            }
            let (i, j) = (i as usize, j as usize);
            assert!(i < n_nodes && j < n_nodes, "edge ({i}, {j}) outside network of {n_nodes} nodes");
            if i == j {
                self_loops[i] += w;
            } else {
                *memo.entry((i.min(j), i.max(j))).or_insert(0.0) += w;
            }
        }
        Self::assemble(n_nodes, memo, self_loops, None)
    }

    // Edge insertion order is made canonical by sorting, so neighbor iteration order never
    // depends on hash map layout.
    fn assemble(
        n_nodes: usize,
        memo: FxHashMap<(usize, usize), f64>,
        self_loops: Vec<f64>,
        node_weights: Option<Vec<f64>>,
    ) -> Network {
        let mut edges = memo.into_iter().collect::<Vec<_>>();
        edges.sort_unstable_by_key(|&(pair, _)| pair);

        let mut adjacency = vec![Vec::new(); n_nodes];
        let mut degree = self_loops.iter().map(|&w| 2.0 * w).collect::<Vec<_>>();
        let mut total_edge_weight = self_loops.iter().sum::<f64>();
        for ((i, j), w) in edges {
            adjacency[i].push((j, w));
            adjacency[j].push((i, w));
            degree[i] += w;
            degree[j] += w;
            total_edge_weight += w;
        }

        Network {
            node_weights: node_weights.unwrap_or(degree),
            adjacency,
            self_loops,
            total_edge_weight,
        }
    }

    /// Number of nodes
    pub fn nodes(&self) -> usize {
        self.node_weights.len()
    }

    /// Number of distinct non-self edges
    pub fn edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Weight of `node`
    pub fn weight(&self, node: usize) -> f64 {
        self.node_weights[node]
    }

    /// Weight of the self-loop on `node`, zero if none
    pub fn self_loop(&self, node: usize) -> f64 {
        self.self_loops[node]
    }

    /// Pairs of (adjacent node, edge weight) for every neighbor of `node`
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.adjacency[node].iter().copied()
    }

    /// Sum of all node weights
    pub fn total_node_weight(&self) -> f64 {
        self.node_weights.iter().sum()
    }

    /// Sum of all edge weights, each edge counted once, self-loops included
    pub fn total_edge_weight(&self) -> f64 {
        self.total_edge_weight
    }

    /// Aggregate network with one node per cluster of `partition`. Node weights are summed; edges
    /// between clusters are summed; edges inside a cluster become a self-loop.
    pub fn create_reduced_network(&self, partition: &Partition) -> Network {
        let k = partition.num_clusters();
        let mut node_weights = vec![0.0; k];
        let mut self_loops = vec![0.0; k];
        let mut memo: FxHashMap<(usize, usize), f64> = FxHashMap::default();

        for i in 0..self.nodes() {
            let ci = partition.get(i);
            node_weights[ci] += self.node_weights[i];
            self_loops[ci] += self.self_loops[i];
            for &(j, w) in &self.adjacency[i] {
                if j <= i {
                    continue;
                }
                let cj = partition.get(j);
                if ci == cj {
                    self_loops[ci] += w;
                } else {
                    *memo.entry((ci.min(cj), ci.max(cj))).or_insert(0.0) += w;
                }
            }
        }

        Self::assemble(k, memo, self_loops, Some(node_weights))
    }
}
