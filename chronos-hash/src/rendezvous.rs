//! Rendezvous (highest-random-weight) hashing over a node list.
//!
//! For a given key, each candidate node is scored independently; the top
//! *R* scorers are the replicas for that key. Because the score only
//! depends on `(key, node)`, not on the rest of the node list, membership
//! changes elsewhere in the cluster never reshuffle keys that didn't move
//! — only keys whose top-R actually changes are affected.

use crate::murmur3::hash32;

/// Per-node hash used as the second input to the per-request rendezvous
/// score. Computed once per cluster view (§4.1), not per request.
///
/// Collisions between two nodes' hashes are a configuration artefact (not
/// a per-request event): when detected, the later node's hash is
/// decremented until it is distinct from every earlier one.
pub fn node_hashes(nodes: &[String]) -> Vec<u64> {
    let mut seen = std::collections::HashSet::new();
    let mut hashes = Vec::with_capacity(nodes.len());

    for node in nodes {
        let (h1, _) = crate::murmur3::hash128_x64(node.as_bytes(), 0);
        let mut h = h1;
        while seen.contains(&h) {
            h = h.wrapping_sub(1);
        }
        seen.insert(h);
        hashes.push(h);
    }

    hashes
}

/// The rendezvous score of `id` against one node's precomputed hash.
///
/// Higher scores win. Ties (which are astronomically unlikely for
/// well-distributed inputs) are broken by node index, handled by the
/// caller's stable sort.
pub fn score(id: u64, node_hash: u64) -> u32 {
    let mut buf = [0u8; 16];
    buf[0..8].copy_from_slice(&id.to_le_bytes());
    buf[8..16].copy_from_slice(&node_hash.to_le_bytes());
    hash32(&buf, 0)
}

/// Returns the indices of the top `r` nodes (into `nodes`/`node_hashes`)
/// for `id`, ranked by descending rendezvous score.
///
/// If `r` exceeds `nodes.len()`, all nodes are returned (capped at cluster
/// size, per spec.md §3).
pub fn top_n(id: u64, node_hashes: &[u64], r: usize) -> Vec<usize> {
    let mut scored: Vec<(u32, usize)> = node_hashes
        .iter()
        .enumerate()
        .map(|(idx, &h)| (score(id, h), idx))
        .collect();

    // Descending score, ties broken by ascending index for determinism.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    scored
        .into_iter()
        .take(r.min(node_hashes.len()))
        .map(|(_, idx)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.0.{i}:7253")).collect()
    }

    #[test]
    fn deterministic_for_fixed_input() {
        let ns = nodes(5);
        let hashes = node_hashes(&ns);
        let a = top_n(123_456, &hashes, 3);
        let b = top_n(123_456, &hashes, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn node_hashes_are_unique() {
        let ns = nodes(20);
        let hashes = node_hashes(&ns);
        let unique: std::collections::HashSet<_> = hashes.iter().collect();
        assert_eq!(unique.len(), hashes.len());
    }

    #[test]
    fn top_n_caps_at_node_count() {
        let ns = nodes(2);
        let hashes = node_hashes(&ns);
        let replicas = top_n(1, &hashes, 5);
        assert_eq!(replicas.len(), 2);
    }

    #[test]
    fn top_n_returns_distinct_indices() {
        let ns = nodes(8);
        let hashes = node_hashes(&ns);
        let replicas = top_n(42, &hashes, 4);
        let unique: std::collections::HashSet<_> = replicas.iter().collect();
        assert_eq!(unique.len(), replicas.len());
        assert_eq!(replicas.len(), 4);
    }

    #[test]
    fn stability_across_unrelated_membership_growth() {
        // Adding a node at the end shouldn't change the *set* of nodes
        // that previously didn't rank in the top-1, unless the new node
        // itself displaces one of them -- but the relative order among
        // the untouched nodes must stay identical.
        let small = nodes(4);
        let mut big = small.clone();
        big.push("10.0.0.99:7253".to_string());

        let small_hashes = node_hashes(&small);
        let big_hashes = node_hashes(&big);

        for id in [1u64, 77, 999_999] {
            let small_top = top_n(id, &small_hashes, 2);
            let big_top = top_n(id, &big_hashes, 2);
            // Every member of small_top that survives in big_top must
            // keep the same relative rank among themselves.
            let small_surviving: Vec<_> =
                small_top.iter().filter(|i| big_top.contains(i)).collect();
            let big_surviving: Vec<_> =
                big_top.iter().filter(|i| small_top.contains(i)).collect();
            assert_eq!(small_surviving, big_surviving);
        }
    }
}
