use crate::cluster::relabel_by_size;
use crate::config::MergeOptions;
use crate::stats::median_array_rows_mut;
use anyhow::{bail, format_err, Error};
use diff_exp::{de_score, welch_differential_expression, DeScore};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1};
use noisy_float::types::{n64, N64};
use std::collections::{BTreeMap, BTreeSet};
use tclust_types::{ClusterAssignment, ExpressionMatrix, ReducedMatrix};

type Pair = (usize, usize);

/// Clusters under merge: cluster id -> reduced-matrix rows, plus the expression row of every
/// reduced row.
struct MergeState<'a> {
    expr: &'a ExpressionMatrix,
    reduced: &'a ReducedMatrix,
    expr_rows: Vec<usize>,
    clusters: BTreeMap<usize, Vec<usize>>,
    scores: BTreeMap<Pair, DeScore>,
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

impl<'a> MergeState<'a> {
    /// Per-dimension median of every cluster in reduced space, in cluster id order
    fn medioids(&self) -> Result<Vec<(usize, Array1<f64>)>, Error> {
        let values = self.reduced.values();
        let dims = values.ncols();
        self.clusters
            .iter()
            .map(|(&id, rows)| {
                let mut buf = Array2::<N64>::from_shape_fn((dims, rows.len()), |(c, j)| n64(values[[rows[j], c]]));
                let medioid = median_array_rows_mut(&mut buf).map_err(|e| format_err!("cluster {}: {}", id, e))?;
                Ok((id, medioid.into_iter().map(N64::raw).collect()))
            })
            .collect()
    }

    /// The `k` clusters nearest to every cluster by medioid distance, as ordered pairs
    fn candidate_pairs(&self, k: usize) -> Result<BTreeSet<Pair>, Error> {
        let centers = self.medioids()?;
        let mut pairs = BTreeSet::new();
        for (i, (a, ca)) in centers.iter().enumerate() {
            let mut others = centers
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, (b, cb))| (n64(distance(ca.view(), cb.view())), *b))
                .collect::<Vec<_>>();
            others.sort_unstable();
            let a = *a;
            for &(_, b) in others.iter().take(k) {
                pairs.insert((a.min(b), a.max(b)));
            }
        }
        Ok(pairs)
    }

    fn nearest(&self, id: usize) -> Result<Option<usize>, Error> {
        let centers = self.medioids()?;
        let Some((_, own)) = centers.iter().find(|(c, _)| *c == id) else {
            return Ok(None);
        };
        Ok(centers
            .iter()
            .filter(|(c, _)| *c != id)
            .map(|(c, center)| (n64(distance(own.view(), center.view())), *c))
            .min()
            .map(|(_, c)| c))
    }

    fn score(&mut self, pair: Pair, opts: &MergeOptions) -> Result<&DeScore, Error> {
        if !self.scores.contains_key(&pair) {
            let rows = |id: usize| -> Vec<usize> { self.clusters[&id].iter().map(|&r| self.expr_rows[r]).collect() };
            let (a, b) = (rows(pair.0), rows(pair.1));
            let de = welch_differential_expression(&self.expr.matrix.view(), &a, &b, opts.thresholds.low_thresh)?;
            let s = de_score(&de, &opts.thresholds);
            debug!(
                "clusters {} vs {} ({} vs {} cells): {} DE genes, score {:.1}",
                pair.0,
                pair.1,
                a.len(),
                b.len(),
                s.num_de_genes(),
                s.score
            );
            self.scores.insert(pair, s);
        }
        Ok(&self.scores[&pair])
    }

    /// Fold cluster `from` into cluster `into`
    fn merge(&mut self, into: usize, from: usize) {
        if let Some(mut rows) = self.clusters.remove(&from) {
            if let Some(target) = self.clusters.get_mut(&into) {
                target.append(&mut rows);
                target.sort_unstable();
            }
        }
        self.scores
            .retain(|&(a, b), _| a != into && b != into && a != from && b != from);
    }

    fn merge_small(&mut self, min_cluster_size: usize) -> Result<(), Error> {
        while self.clusters.len() > 1 {
            let smallest = self
                .clusters
                .iter()
                .filter(|(_, rows)| rows.len() < min_cluster_size)
                .min_by_key(|&(id, rows)| (rows.len(), *id))
                .map(|(&id, _)| id);
            let Some(small) = smallest else { break };
            let Some(target) = self.nearest(small)? else { break };
            debug!(
                "merging small cluster {} ({} cells) into {}",
                small,
                self.clusters[&small].len(),
                target
            );
            self.merge(target, small);
        }
        Ok(())
    }

    fn merge_by_de(&mut self, opts: &MergeOptions) -> Result<(), Error> {
        while self.clusters.len() > 1 {
            let mut weakest: Option<(N64, Pair)> = None;
            for pair in self.candidate_pairs(opts.k)? {
                let s = self.score(pair, opts)?;
                if !s.is_separable(&opts.thresholds) {
                    let cand = (n64(s.score), pair);
                    if weakest.map_or(true, |w| cand < w) {
                        weakest = Some(cand);
                    }
                }
            }
            let Some((score, (a, b))) = weakest else { break };
            info!("merging clusters {} and {} with DE score {:.1}", a, b, score);
            self.merge(a, b);
        }
        Ok(())
    }

    fn markers(&mut self, opts: &MergeOptions) -> Result<BTreeSet<String>, Error> {
        let mut genes = BTreeSet::new();
        if self.clusters.len() < 2 {
            return Ok(genes);
        }
        for pair in self.candidate_pairs(opts.k)? {
            let s = self.score(pair, opts)?;
            let top = s
                .up_genes
                .iter()
                .take(opts.n_markers)
                .chain(s.down_genes.iter().take(opts.n_markers))
                .copied()
                .collect::<Vec<_>>();
            genes.extend(top.into_iter().map(|g| self.expr.genes[g].clone()));
        }
        Ok(genes)
    }
}

/// Merge clusters of `assignment` that cannot be told apart by differential expression.
///
/// `cluster_by_obs` gives the cluster of every row of `reduced`. Clusters smaller than
/// `min_cluster_size` are first folded into the cluster with the nearest medioid. Then each
/// cluster is tested against its `k` nearest clusters, and the pair with the lowest DE score that
/// is not separable is merged, until every tested pair is separable. Returns the relabelled
/// assignment (largest cluster first) and the union of the top `n_markers` DE genes in each
/// direction over the final tested pairs.
pub fn merge_clusters(
    expr: &ExpressionMatrix,
    reduced: &ReducedMatrix,
    assignment: &ClusterAssignment,
    cluster_by_obs: &[usize],
    opts: &MergeOptions,
) -> Result<(ClusterAssignment, BTreeSet<String>), Error> {
    if cluster_by_obs.len() != reduced.nrows() {
        bail!(
            "{} cluster labels for {} reduced observations",
            cluster_by_obs.len(),
            reduced.nrows()
        );
    }
    if assignment.cluster_by_observation(reduced.rows())? != cluster_by_obs {
        bail!("cluster labels disagree with the cluster assignment");
    }
    if reduced.nrows() == 0 {
        return Ok((ClusterAssignment::default(), BTreeSet::new()));
    }

    let obs_index = expr.observation_index();
    let expr_rows = reduced
        .rows()
        .iter()
        .map(|o| {
            obs_index
                .get(o.as_str())
                .copied()
                .ok_or_else(|| format_err!("observation {} is not in the expression matrix", o))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut clusters = BTreeMap::<usize, Vec<usize>>::new();
    for (row, &c) in cluster_by_obs.iter().enumerate() {
        clusters.entry(c).or_default().push(row);
    }
    let before = clusters.len();

    let mut state = MergeState {
        expr,
        reduced,
        expr_rows,
        clusters,
        scores: BTreeMap::new(),
    };
    state.merge_small(opts.min_cluster_size)?;
    state.merge_by_de(opts)?;
    let markers = state.markers(opts)?;

    let mut labels = vec![0; reduced.nrows()];
    for (new, rows) in state.clusters.values().enumerate() {
        for &r in rows {
            labels[r] = new;
        }
    }
    let labels = relabel_by_size(&labels);
    let merged = ClusterAssignment::from_labels(reduced.rows(), &labels)?;
    info!(
        "merged {} clusters into {}, {} marker genes",
        before,
        merged.num_clusters(),
        markers.len()
    );
    Ok((merged, markers))
}
