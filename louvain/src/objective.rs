use crate::{Network, Partition};

/// Newman-Girvan modularity of `partition` on `n`, generalized with a resolution parameter:
/// `Q = sum_c [ w_in(c) / m - resolution * (w_tot(c) / 2m)^2 ]`, where `w_in` is the weight of
/// edges inside cluster `c` (self-loops included), `w_tot` the sum of its node weights and `m`
/// the total edge weight.
pub fn modularity(resolution: f64, n: &Network, partition: &Partition) -> f64 {
    let m = n.total_edge_weight();
    if m == 0.0 {
        return 0.0;
    }

    let k = partition.num_clusters();
    let mut internal = vec![0.0; k];
    let mut totals = vec![0.0; k];

    for i in 0..n.nodes() {
        let ci = partition.get(i);
        totals[ci] += n.weight(i);
        internal[ci] += n.self_loop(i);
        for (j, w) in n.neighbors(i) {
            if j > i && partition.get(j) == ci {
                internal[ci] += w;
            }
        }
    }

    internal
        .iter()
        .zip(&totals)
        .map(|(&w_in, &w_tot)| w_in / m - resolution * (w_tot / (2.0 * m)).powi(2))
        .sum()
}
