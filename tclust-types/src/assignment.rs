use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Partition of observations into clusters, keyed by cluster id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    clusters: BTreeMap<usize, Vec<String>>,
}

impl ClusterAssignment {
    pub fn new(clusters: BTreeMap<usize, Vec<String>>) -> ClusterAssignment {
        ClusterAssignment { clusters }
    }

    /// Group `observations` by their per-observation `labels`. Observation order within a
    /// cluster follows the input order.
    pub fn from_labels(observations: &[String], labels: &[usize]) -> Result<ClusterAssignment, Error> {
        if observations.len() != labels.len() {
            bail!(
                "{} observations but {} cluster labels",
                observations.len(),
                labels.len()
            );
        }
        let mut clusters: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (obs, &label) in observations.iter().zip(labels) {
            clusters.entry(label).or_default().push(obs.clone());
        }
        Ok(ClusterAssignment { clusters })
    }

    pub fn clusters(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.clusters
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn num_observations(&self) -> usize {
        self.clusters.values().map(Vec::len).sum()
    }

    /// Cluster label of each of `observations`, or an error if one is unassigned.
    pub fn cluster_by_observation(&self, observations: &[String]) -> Result<Vec<usize>, Error> {
        let mut lookup = std::collections::HashMap::with_capacity(self.num_observations());
        for (&label, members) in &self.clusters {
            for m in members {
                lookup.insert(m.as_str(), label);
            }
        }
        observations
            .iter()
            .map(|o| match lookup.get(o.as_str()) {
                Some(&l) => Ok(l),
                None => bail!("observation {} has no cluster", o),
            })
            .collect()
    }

    /// Verify that this assignment partitions exactly `observations`: no duplicates, no
    /// omissions, nothing extra.
    pub fn check_partition(&self, observations: &[String]) -> Result<(), Error> {
        let expected: HashSet<&str> = observations.iter().map(String::as_str).collect();
        let mut seen = HashSet::with_capacity(expected.len());
        for (label, members) in &self.clusters {
            for m in members {
                if !seen.insert(m.as_str()) {
                    bail!("observation {} assigned twice (again in cluster {})", m, label);
                }
                if !expected.contains(m.as_str()) {
                    bail!("cluster {} contains unknown observation {}", label, m);
                }
            }
        }
        if seen.len() != expected.len() {
            bail!(
                "{} of {} observations are unassigned",
                expected.len() - seen.len(),
                expected.len()
            );
        }
        Ok(())
    }
}
