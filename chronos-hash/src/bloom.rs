//! 64-bit cluster-view-id bloom construction (spec.md §6).
//!
//! A cluster view is summarized into a single `u64` bitmask so that a
//! timer can carry "which view was I created under" cheaply, and so two
//! views can be compared for overlap without comparing node lists
//! directly. Each node address contributes three bits (via three Murmur3
//! x64-128 hashes seeded 0, 1, 2); the view's bitmask is the OR of every
//! node's bits, so it is independent of node ordering.

use crate::murmur3::hash128_x64;

const SEEDS: [u64; 3] = [0, 1, 2];

/// Returns the bit positions (each in `0..64`) that one node address
/// contributes to a cluster-view-id bloom.
fn node_bits(address: &str) -> [u32; 6] {
    let mut bits = [0u32; 6];
    for (i, seed) in SEEDS.iter().enumerate() {
        let (h1, h2) = hash128_x64(address.as_bytes(), *seed);
        bits[i * 2] = (h1 % 64) as u32;
        bits[i * 2 + 1] = (h2 % 64) as u32;
    }
    bits
}

/// Computes the cluster-view-id bitmask for a set of node addresses.
///
/// Order-independent: `view_id(&[a, b]) == view_id(&[b, a])`.
pub fn view_id(addresses: &[String]) -> u64 {
    let mut mask: u64 = 0;
    for address in addresses {
        for bit in node_bits(address) {
            mask |= 1u64 << bit;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_independent() {
        let a = vec!["10.0.0.1:7253".to_string(), "10.0.0.2:7253".to_string()];
        let b = vec!["10.0.0.2:7253".to_string(), "10.0.0.1:7253".to_string()];
        assert_eq!(view_id(&a), view_id(&b));
    }

    #[test]
    fn differs_on_membership_change() {
        let a = vec!["10.0.0.1:7253".to_string()];
        let b = vec!["10.0.0.1:7253".to_string(), "10.0.0.2:7253".to_string()];
        assert_ne!(view_id(&a), view_id(&b));
    }

    #[test]
    fn empty_cluster_is_zero() {
        assert_eq!(view_id(&[]), 0);
    }

    #[test]
    fn adding_then_removing_a_node_restores_bits_contributed_by_survivors() {
        let base = vec!["10.0.0.1:7253".to_string(), "10.0.0.2:7253".to_string()];
        let plus_one: Vec<String> = {
            let mut v = base.clone();
            v.push("10.0.0.3:7253".to_string());
            v
        };
        let base_mask = view_id(&base);
        let plus_one_mask = view_id(&plus_one);
        // Every bit set for the smaller cluster must still be set once a
        // node is added (OR is monotonic).
        assert_eq!(base_mask & plus_one_mask, base_mask);
    }
}
