use crate::local_moving::LocalMoving;
use crate::{Network, Partition};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Default resolution for Louvain
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Multi-level Louvain community detection. All randomness (node visiting order) comes from a
/// single seeded generator, so a given seed and network always produce the same partition.
pub struct Louvain {
    rng: ChaCha20Rng,
    local_moving: LocalMoving,
}

impl Louvain {
    /// Create a Louvain optimizer with the given resolution. A missing seed means seed 0.
    pub fn new(resolution: f64, seed: Option<u64>) -> Louvain {
        Louvain {
            rng: ChaCha20Rng::seed_from_u64(seed.unwrap_or_default()),
            local_moving: LocalMoving::new(resolution),
        }
    }

    /// Run one full Louvain step on `p`: local moving, then recursively on the aggregate network.
    /// Returns true if any label changed.
    pub fn iterate(&mut self, n: &Network, p: &mut Partition) -> bool {
        let mut update = self.local_moving.iterate(n, p, &mut self.rng);

        if p.num_clusters() == n.nodes() {
            return update;
        }

        let reduced = n.create_reduced_network(p);
        let mut reduced_partition = Partition::singletons(reduced.nodes());
        update |= self.iterate(&reduced, &mut reduced_partition);
        p.merge_clusters(&reduced_partition);

        update
    }

    /// Start from singletons and iterate until nothing changes or `max_iterations` is reached.
    pub fn run(&mut self, n: &Network, max_iterations: usize) -> Partition {
        let mut p = Partition::singletons(n.nodes());
        for _ in 0..max_iterations {
            if !self.iterate(n, &mut p) {
                break;
            }
        }
        p
    }
}
