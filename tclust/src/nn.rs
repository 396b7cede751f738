use anyhow::{bail, Error};
use ball_tree::{BallTree, Point};
use fxhash::FxHashSet;
use log::info;
use louvain::Network;
use ndarray::parallel::prelude::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use ndarray::{Array2, ArrayView2, Axis};
use std::collections::BTreeSet;

#[derive(PartialEq)]
struct Pt(Vec<f64>);

impl Point for Pt {
    fn distance(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|p| (p.1 - p.0).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    fn move_towards(&self, other: &Self, d: f64) -> Self {
        let total_dist = self.distance(other);
        let frac = if total_dist == 0.0 { 0.0 } else { d / total_dist };

        Pt(self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(&s, &o)| s + frac * (o - s))
            .collect())
    }
}

/// Compute the `k` nearest neighbors of each row in `v`, using Euclidean distance, excluding the
/// row itself. Requires `k < v.nrows()`.
pub fn knn(v: &ArrayView2<f64>, k: usize) -> Result<Array2<usize>, Error> {
    let (cells, _) = v.dim();
    if k >= cells {
        bail!("cannot find {} neighbors among {} points", k, cells);
    }

    info!("constructing ball tree of {} points", cells);
    let points = v.outer_iter().map(|row| Pt(row.to_vec())).collect::<Vec<_>>();
    let values = (0..cells).collect::<Vec<_>>();
    let ball_tree = BallTree::new(points, values);

    info!("querying points for {} neighbors", k);
    let mut output = Array2::from_elem((cells, k), usize::MAX);
    output.axis_iter_mut(Axis(0)).into_par_iter().enumerate().for_each_init(
        || ball_tree.query(),
        |query, (cell, mut output)| {
            let mut ind = 0;
            let pt = Pt(v.row(cell).to_vec());
            for (_, _, &other) in query.nn(&pt).take(k + 1) {
                if other != cell && ind < k {
                    output[ind] = other;
                    ind += 1;
                }
            }
        },
    );
    Ok(output)
}

/// Jaccard similarity of the closed neighborhoods (neighbors plus the point itself) of `i` and `j`
fn jaccard(neighbors: &[FxHashSet<usize>], i: usize, j: usize) -> f64 {
    let inter = neighbors[i].intersection(&neighbors[j]).count();
    let union = neighbors[i].len() + neighbors[j].len() - inter;
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

/// Shared-nearest-neighbor graph: every point is joined to each of its nearest neighbors with the
/// Jaccard similarity of their neighborhoods as the weight. Each pair appears once.
pub fn shared_neighbor_graph(knn: &Array2<usize>) -> Network {
    let n = knn.nrows();
    let neighbors = knn
        .outer_iter()
        .enumerate()
        .map(|(i, row)| row.iter().copied().chain(std::iter::once(i)).collect::<FxHashSet<_>>())
        .collect::<Vec<_>>();

    let pairs = knn
        .outer_iter()
        .enumerate()
        .flat_map(|(i, row)| row.iter().map(move |&j| (i.min(j), i.max(j))).collect::<Vec<_>>())
        .collect::<BTreeSet<_>>();

    let edges = pairs
        .into_iter()
        .map(|(i, j)| (i as u32, j as u32, jaccard(&neighbors, i, j)))
        .collect::<Vec<_>>();
    info!("shared neighbor graph: {} nodes, {} edges", n, edges.len());
    Network::from_edges(n, edges)
}
