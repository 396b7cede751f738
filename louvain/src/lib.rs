//! Louvain community detection on weighted, undirected networks
#![deny(missing_docs)]

/// Node-to-cluster assignment
pub mod clustering;

/// Weighted, undirected network being clustered
pub mod network;

/// Louvain clustering algorithm
pub mod louvain;

/// Clustering objective functions
pub mod objective;

mod local_moving;

pub use clustering::Partition;
pub use louvain::Louvain;
pub use network::Network;

trait ZeroVec {
    fn zero_len(&mut self, len: usize);
}

impl<T: Default> ZeroVec for Vec<T> {
    fn zero_len(&mut self, len: usize) {
        self.clear();
        self.resize_with(len, T::default)
    }
}
