//! Process-wide cluster membership, modeled as an RCU'd snapshot rather than
//! ambient state captured by closures (spec.md §9 Design Notes).
//!
//! Every handler entry point calls [`ClusterMembership::snapshot`] once and
//! works from that [`ClusterView`] for the rest of its execution; a config
//! reload swaps in a new `Arc<ClusterView>` without blocking readers that
//! already hold the old one.

use std::sync::{Arc, RwLock};

use chronos_hash::{cluster_view_id, node_hashes as compute_node_hashes};
use chronos_types::NodeAddress;

use crate::config::ClusterFileConfig;

/// An immutable snapshot of cluster membership and the values derived from
/// it (spec.md §4.1: "process-global and read-copy-updated under a
/// reader-writer lock").
#[derive(Debug, Clone)]
pub struct ClusterView {
    pub localhost: NodeAddress,
    pub nodes: Vec<NodeAddress>,
    pub leaving: Vec<NodeAddress>,
    /// Precomputed once per view (spec.md §4.1: "Computed once per cluster
    /// view, not per request").
    pub node_hashes: Vec<u64>,
    pub leaving_hashes: Vec<u64>,
    pub cluster_view_id: u64,
}

impl ClusterView {
    fn build(localhost: NodeAddress, nodes: Vec<NodeAddress>, leaving: Vec<NodeAddress>) -> Self {
        let node_strings: Vec<String> = nodes.iter().map(ToString::to_string).collect();
        let leaving_strings: Vec<String> = leaving.iter().map(ToString::to_string).collect();
        let node_hashes = compute_node_hashes(&node_strings);
        let leaving_hashes = compute_node_hashes(&leaving_strings);
        let view_id = cluster_view_id(&node_strings);

        Self {
            localhost,
            nodes,
            leaving,
            node_hashes,
            leaving_hashes,
            cluster_view_id: view_id,
        }
    }

    pub fn from_file_config(cfg: &ClusterFileConfig) -> Self {
        Self::build(
            NodeAddress::new(cfg.localhost.as_str()),
            cfg.nodes.iter().map(|n| NodeAddress::new(n.as_str())).collect(),
            cfg.leaving.iter().map(|n| NodeAddress::new(n.as_str())).collect(),
        )
    }

    /// True if `node` is this process's own address (spec.md §3: pops only
    /// occur where local address equals `replicas[0]`).
    pub fn is_localhost(&self, node: &NodeAddress) -> bool {
        node == &self.localhost
    }

    /// True if `node` is a current or leaving cluster member (used by the
    /// resync server side to validate `node-for-replicas`, spec.md §4.9).
    pub fn is_known_node(&self, node: &NodeAddress) -> bool {
        self.nodes.contains(node) || self.leaving.contains(node)
    }

    pub fn replication_factor(&self, configured: usize) -> usize {
        configured.min(self.nodes.len())
    }
}

/// The process-wide handle: a `RwLock` around an `Arc<ClusterView>` so reads
/// never block on other reads, and a reload only ever swaps the pointer.
pub struct ClusterMembership {
    current: RwLock<Arc<ClusterView>>,
}

impl ClusterMembership {
    pub fn new(view: ClusterView) -> Self {
        Self {
            current: RwLock::new(Arc::new(view)),
        }
    }

    /// Takes a cheap, brief read-lock, clones the `Arc`, and releases the
    /// lock — the returned snapshot is then used without holding any lock
    /// (spec.md §5: "all reads are brief snapshots").
    pub fn snapshot(&self) -> Arc<ClusterView> {
        Arc::clone(&self.current.read().expect("cluster membership lock poisoned"))
    }

    /// Installs a freshly parsed configuration as the current view
    /// (spec.md §6: "Cluster-config changes trigger `update_config`").
    pub fn reload(&self, cfg: &ClusterFileConfig) -> Arc<ClusterView> {
        let view = Arc::new(ClusterView::from_file_config(cfg));
        *self.current.write().expect("cluster membership lock poisoned") = Arc::clone(&view);
        view
    }
}
