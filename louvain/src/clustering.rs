/// Assignment of every node in a network to one integer cluster label.
/// Labels are kept dense: `0..num_clusters()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    labels: Vec<usize>,
    num_clusters: usize,
}

impl Partition {
    /// Every node in its own cluster
    pub fn singletons(num_nodes: usize) -> Partition {
        Partition {
            labels: (0..num_nodes).collect(),
            num_clusters: num_nodes,
        }
    }

    /// Wrap existing labels, compacting them to `0..k` while keeping their relative order
    pub fn from_labels(labels: &[usize]) -> Partition {
        let num_clusters = labels.iter().max().map_or(0, |&m| m + 1);
        let mut p = Partition {
            labels: labels.to_vec(),
            num_clusters,
        };
        p.remove_empty_clusters();
        p
    }

    /// Label of node `i`
    pub fn get(&self, i: usize) -> usize {
        self.labels[i]
    }

    /// Move node `i` to `cluster`. Labels may become sparse until `remove_empty_clusters`.
    pub fn set(&mut self, i: usize, cluster: usize) {
        self.labels[i] = cluster;
        self.num_clusters = self.num_clusters.max(cluster + 1);
    }

    /// Number of nodes
    pub fn nodes(&self) -> usize {
        self.labels.len()
    }

    /// Number of cluster labels in use (after compaction)
    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    /// Labels indexed by node
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Node lists for each cluster, in label order
    pub fn nodes_per_cluster(&self) -> Vec<Vec<usize>> {
        let mut lists = vec![Vec::new(); self.num_clusters];
        for (node, &label) in self.labels.iter().enumerate() {
            lists[label].push(node);
        }
        lists
    }

    /// Compact labels so that no label is unused. Relative label order is preserved.
    pub fn remove_empty_clusters(&mut self) {
        let mut counts = vec![0usize; self.num_clusters];
        for &l in &self.labels {
            counts[l] += 1;
        }
        let mut remap = vec![usize::MAX; self.num_clusters];
        let mut next = 0;
        for (old, &count) in counts.iter().enumerate() {
            if count > 0 {
                remap[old] = next;
                next += 1;
            }
        }
        for l in self.labels.iter_mut() {
            *l = remap[*l];
        }
        self.num_clusters = next;
    }

    /// Apply a clustering of this partition's clusters: node `i` moves to
    /// `coarse.get(self.get(i))`.
    pub fn merge_clusters(&mut self, coarse: &Partition) {
        for l in self.labels.iter_mut() {
            *l = coarse.get(*l);
        }
        self.num_clusters = coarse.num_clusters();
        self.remove_empty_clusters();
    }
}
