//! Replica selection (spec.md §4.1): rendezvous-hash assignment of a timer
//! to the current cluster view's top-*R* nodes, plus the bookkeeping needed
//! during a view transition (`extra_replicas`) and primary classification.

use std::collections::HashSet;

use chronos_cluster::ClusterView;
use chronos_hash::murmur3::hash128_x64;
use chronos_hash::top_n_replicas;
use chronos_types::{NodeAddress, TimerId};

/// The first 8 bytes of `MurmurHash3_128(concat(replicas))`, embedded in
/// every timer URL so a `PUT`/`DELETE` path can be validated against the
/// replica set it claims to be for (spec.md §6 "Timer URL").
pub fn replica_hash(replicas: &[NodeAddress]) -> u64 {
    let mut concatenated = String::new();
    for replica in replicas {
        concatenated.push_str(replica.as_str());
    }
    let (h1, _) = hash128_x64(concatenated.as_bytes(), 0);
    h1
}

/// The outcome of resolving a timer's replicas under the current view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaResolution {
    /// `replicas[0]` is the primary (spec.md §3).
    pub replicas: Vec<NodeAddress>,
    /// Old-view nodes (still responsible or on their way out) that must be
    /// told to drop their copy (spec.md §4.1).
    pub extra_replicas: Vec<NodeAddress>,
    pub cluster_view_id: u64,
}

impl ReplicaResolution {
    /// Whether `node` is the primary for this resolution.
    pub fn is_primary(&self, node: &NodeAddress) -> bool {
        self.replicas.first() == Some(node)
    }
}

/// Ranks the current view's nodes by rendezvous score for `id` and returns
/// the top `replication_factor` of them (capped at cluster size, spec.md
/// §3/§4.1).
pub fn rendezvous_replicas(
    view: &ClusterView,
    id: TimerId,
    replication_factor: usize,
) -> Vec<NodeAddress> {
    let r = view.replication_factor(replication_factor);
    let indices = top_n_replicas(u64::from(id), &view.node_hashes, r);
    indices.into_iter().map(|i| view.nodes[i].clone()).collect()
}

/// `(old_replicas ∪ leaving) \ new_replicas` — the nodes that used to be
/// responsible for a timer and must now be told to drop it (spec.md §4.1).
pub fn compute_extra_replicas(
    old_replicas: &[NodeAddress],
    leaving: &[NodeAddress],
    new_replicas: &[NodeAddress],
) -> Vec<NodeAddress> {
    let new_set: HashSet<&NodeAddress> = new_replicas.iter().collect();
    let mut seen = HashSet::new();
    let mut extra = Vec::new();

    for node in old_replicas.iter().chain(leaving.iter()) {
        if !new_set.contains(node) && seen.insert(node.clone()) {
            extra.push(node.clone());
        }
    }
    extra
}

/// Resolves a timer's full replica picture under the current view: the new
/// replica set, plus `extra_replicas` carried over from whatever replica
/// set (if any) it previously had.
pub fn resolve(
    view: &ClusterView,
    id: TimerId,
    replication_factor: usize,
    old_replicas: &[NodeAddress],
) -> ReplicaResolution {
    let replicas = rendezvous_replicas(view, id, replication_factor);
    let extra_replicas = compute_extra_replicas(old_replicas, &view.leaving, &replicas);

    ReplicaResolution {
        replicas,
        extra_replicas,
        cluster_view_id: view.cluster_view_id,
    }
}

/// True if `node` is the primary (`replicas[0]`) within `replicas`
/// (spec.md §3: "pops only occur on the node whose local address equals
/// `replicas[0]`").
pub fn is_local_primary(replicas: &[NodeAddress], node: &NodeAddress) -> bool {
    replicas.first() == Some(node)
}
