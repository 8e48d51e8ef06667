//! Certified key/value map
//!
//! The producing side of certification: a canister keeps its certified
//! values in a map, publishes the map's root hash as its certified data and
//! hands out pruned witnesses for individual keys.

use std::collections::BTreeMap;

use icv_types::cbor::encode_hash_tree;
use icv_types::{Digest, HashTree};
use sha2::{Digest as _, Sha256};
use tracing::debug;

/// A sorted map whose contents hash to a single root.
///
/// Entries are laid out as a balanced tree of forks over
/// `Labeled(key, Leaf(value))` nodes, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertifiedMap {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

type Entry<'a> = (&'a Vec<u8>, &'a Vec<u8>);

impl CertifiedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.entries.insert(key.into(), value.into())
    }

    /// Store the SHA-256 of `payload` under `key`
    pub fn insert_payload_hash(&mut self, key: impl Into<Vec<u8>>, payload: &[u8]) -> Digest {
        let digest = Digest::new(Sha256::digest(payload).into());
        self.entries.insert(key.into(), digest.as_bytes().to_vec());
        digest
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The full, unpruned tree
    pub fn as_hash_tree(&self) -> HashTree {
        let entries: Vec<Entry<'_>> = self.entries.iter().collect();
        build(&entries, None)
    }

    /// The digest to publish as certified data
    pub fn root_hash(&self) -> Digest {
        self.as_hash_tree().reconstruct()
    }

    /// A tree revealing only `key`, with every other subtree pruned.
    ///
    /// Returns `None` when the key is not in the map.
    pub fn witness(&self, key: &[u8]) -> Option<HashTree> {
        if !self.entries.contains_key(key) {
            return None;
        }
        let entries: Vec<Entry<'_>> = self.entries.iter().collect();
        Some(build(&entries, Some(key)))
    }

    /// The encoded witness for `key`
    pub fn witness_bytes(&self, key: &[u8]) -> icv_types::Result<Option<Vec<u8>>> {
        match self.witness(key) {
            Some(tree) => {
                let bytes = encode_hash_tree(&tree)?;
                debug!("Encoded witness of {} bytes for a {}-entry map", bytes.len(), self.len());
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> FromIterator<(K, V)> for CertifiedMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn contains(entries: &[Entry<'_>], key: &[u8]) -> bool {
    entries
        .binary_search_by(|(k, _)| k.as_slice().cmp(key))
        .is_ok()
}

// `keep` selects the one key left unpruned; `None` keeps everything
fn build(entries: &[Entry<'_>], keep: Option<&[u8]>) -> HashTree {
    if let Some(key) = keep {
        if !contains(entries, key) {
            return build(entries, None).prune();
        }
    }

    match entries {
        [] => HashTree::Empty,
        [(key, value)] => HashTree::labeled(key.to_vec(), HashTree::leaf(value.to_vec())),
        _ => {
            let (left, right) = entries.split_at(entries.len() / 2);
            HashTree::fork(build(left, keep), build(right, keep))
        }
    }
}
