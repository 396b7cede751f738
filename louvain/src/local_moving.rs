use crate::{Network, Partition, ZeroVec};
use rand::{seq::SliceRandom, Rng};

const MAX_PASSES: usize = 100;

/// Greedy node-moving phase of Louvain: visit nodes in random order and move each to the
/// neighboring cluster with the largest modularity gain, until a full pass makes no move.
#[derive(Default)]
pub(crate) struct LocalMoving {
    resolution: f64,
    cluster_weights: Vec<f64>,
    nodes_per_cluster: Vec<usize>,
    unused_clusters: Vec<usize>,
    node_order: Vec<usize>,
    edge_weight_per_cluster: Vec<f64>,
    neighboring_clusters: Vec<usize>,
}

impl LocalMoving {
    pub fn new(resolution: f64) -> Self {
        LocalMoving {
            resolution,
            ..LocalMoving::default()
        }
    }

    /// Returns true if any node changed cluster.
    pub fn iterate(&mut self, n: &Network, p: &mut Partition, rng: &mut impl Rng) -> bool {
        let nodes = n.nodes();
        if nodes == 0 {
            return false;
        }
        let two_m = 2.0 * n.total_edge_weight();
        if two_m == 0.0 {
            return false;
        }

        self.cluster_weights.zero_len(nodes);
        self.nodes_per_cluster.zero_len(nodes);
        for i in 0..nodes {
            self.cluster_weights[p.get(i)] += n.weight(i);
            self.nodes_per_cluster[p.get(i)] += 1;
        }

        self.unused_clusters.clear();
        for c in (0..nodes).rev() {
            if self.nodes_per_cluster[c] == 0 {
                self.unused_clusters.push(c);
            }
        }

        self.node_order.clear();
        self.node_order.extend(0..nodes);
        self.node_order.shuffle(rng);

        self.edge_weight_per_cluster.zero_len(nodes);
        self.neighboring_clusters.clear();

        let mut update = false;
        for _ in 0..MAX_PASSES {
            let mut moved = false;
            for idx in 0..nodes {
                let j = self.node_order[idx];
                moved |= self.move_node(n, p, j, two_m);
            }
            update |= moved;
            if !moved {
                break;
            }
        }

        if update {
            p.remove_empty_clusters();
        }
        update
    }

    // Move node `j` to the best neighboring cluster. Returns true if it changed cluster.
    fn move_node(&mut self, n: &Network, p: &mut Partition, j: usize, two_m: f64) -> bool {
        let current = p.get(j);
        let wj = n.weight(j);

        self.cluster_weights[current] -= wj;
        self.nodes_per_cluster[current] -= 1;
        if self.nodes_per_cluster[current] == 0 {
            self.unused_clusters.push(current);
        }

        // An empty cluster is always a candidate, so a node can leave to be alone.
        self.neighboring_clusters.clear();
        if let Some(&empty) = self.unused_clusters.last() {
            self.neighboring_clusters.push(empty);
        }
        for (target, w) in n.neighbors(j) {
            let c = p.get(target);
            if self.edge_weight_per_cluster[c] == 0.0 {
                self.neighboring_clusters.push(c);
            }
            self.edge_weight_per_cluster[c] += w;
        }

        let resolution = self.resolution;
        let gain = |ew: f64, cw: f64| ew - wj * cw * resolution / two_m;

        // Moving requires a strict gain over staying; ties between other clusters go to the
        // lower label.
        let mut best = current;
        let mut best_gain = gain(self.edge_weight_per_cluster[current], self.cluster_weights[current]);
        for &c in &self.neighboring_clusters {
            let g = gain(self.edge_weight_per_cluster[c], self.cluster_weights[c]);
            if g > best_gain || (g == best_gain && best != current && c < best) {
                best = c;
                best_gain = g;
            }
        }
        for &c in &self.neighboring_clusters {
            self.edge_weight_per_cluster[c] = 0.0;
        }
        self.edge_weight_per_cluster[current] = 0.0;

        self.cluster_weights[best] += wj;
        self.nodes_per_cluster[best] += 1;
        if self.nodes_per_cluster[best] == 1 {
            if let Some(pos) = self.unused_clusters.iter().rposition(|&c| c == best) {
                self.unused_clusters.remove(pos);
            }
        }

        if best != current {
            p.set(j, best);
            true
        } else {
            false
        }
    }
}
