//! Deterministic Merkle roots over committed state and block transactions.
//!
//! Entries are sorted by key, hashed into leaves, then combined pairwise into
//! a binary tree. The same set of entries always yields the same root,
//! regardless of insertion order.

use std::collections::BTreeMap;

use crate::crypto::hash_blake3;
use crate::types::{Hash, ZERO_HASH};

/// Domain separator for leaf nodes.
const LEAF_PREFIX: u8 = 0x00;
/// Domain separator for internal nodes.
const INTERNAL_PREFIX: u8 = 0x01;

/// Root of a key/value state. Empty state has the zero root.
pub fn state_root(entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> Hash {
    let leaves: Vec<Hash> = entries.iter().map(|(k, v)| hash_leaf(k, v)).collect();
    root_from_leaves(&leaves)
}

/// Root over an ordered list of transaction hashes. Position is part of the
/// leaf, so reordering changes the root.
pub fn tx_root(tx_hashes: &[Hash]) -> Hash {
    let leaves: Vec<Hash> = tx_hashes
        .iter()
        .enumerate()
        .map(|(i, h)| hash_leaf(&(i as u64).to_le_bytes(), h))
        .collect();
    root_from_leaves(&leaves)
}

/// H(LEAF_PREFIX || key_len_le32 || key || value)
fn hash_leaf(key: &[u8], value: &[u8]) -> Hash {
    let mut data = Vec::with_capacity(1 + 4 + key.len() + value.len());
    data.push(LEAF_PREFIX);
    data.extend_from_slice(&(key.len() as u32).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(value);
    hash_blake3(&data)
}

/// H(INTERNAL_PREFIX || left || right)
fn hash_internal(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 1 + 32 + 32];
    data[0] = INTERNAL_PREFIX;
    data[1..33].copy_from_slice(left);
    data[33..65].copy_from_slice(right);
    hash_blake3(&data)
}

/// Fold leaves level by level. An odd node is promoted unchanged.
fn root_from_leaves(leaves: &[Hash]) -> Hash {
    let mut level = leaves.to_vec();
    if level.is_empty() {
        return ZERO_HASH;
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_internal(left, right),
                _ => pair[0],
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&[u8], &[u8])]) -> BTreeMap<Vec<u8>, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(state_root(&BTreeMap::new()), ZERO_HASH);
        assert_eq!(tx_root(&[]), ZERO_HASH);
    }

    #[test]
    fn test_single_entry_root_is_leaf() {
        let e = entries(&[(b"k", b"v")]);
        assert_eq!(state_root(&e), hash_leaf(b"k", b"v"));
    }

    #[test]
    fn test_odd_leaf_promoted() {
        let e = entries(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let expected = hash_internal(
            &hash_internal(&hash_leaf(b"a", b"1"), &hash_leaf(b"b", b"2")),
            &hash_leaf(b"c", b"3"),
        );
        assert_eq!(state_root(&e), expected);
    }

    #[test]
    fn test_value_change_changes_root() {
        let a = entries(&[(b"a", b"1"), (b"b", b"2")]);
        let b = entries(&[(b"a", b"1"), (b"b", b"3")]);
        assert_ne!(state_root(&a), state_root(&b));
    }

    #[test]
    fn test_leaf_domain_separation() {
        // key "ab" + value "c" must not collide with key "a" + value "bc"
        assert_ne!(hash_leaf(b"ab", b"c"), hash_leaf(b"a", b"bc"));
    }

    #[test]
    fn test_tx_root_is_order_sensitive() {
        let h1 = [1u8; 32];
        let h2 = [2u8; 32];
        assert_ne!(tx_root(&[h1, h2]), tx_root(&[h2, h1]));
    }
}
