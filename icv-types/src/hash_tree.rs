//! Labeled Merkle hash trees, root reconstruction and path lookup
//!
//! A hash tree commits to a set of labeled values. Canisters hand out
//! *witnesses*: copies of their tree in which every subtree irrelevant to the
//! answer is replaced by its digest (`Pruned`). Reconstructing the root of a
//! witness must yield the same digest as reconstructing the full tree.

use crate::primitives::Digest;
use serde::Serialize;
use sha2::{Digest as _, Sha256};

/// An edge label in a hash tree
pub type Label = Vec<u8>;

/// A labeled Merkle tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HashTree {
    Empty,
    Fork(Box<HashTree>, Box<HashTree>),
    Labeled(
        #[serde(serialize_with = "hex::serde::serialize")] Label,
        Box<HashTree>,
    ),
    Leaf(#[serde(serialize_with = "hex::serde::serialize")] Vec<u8>),
    /// A subtree whose contents were elided, represented by its root digest
    Pruned(Digest),
}

/// The outcome of looking up a path in a hash tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult<'a> {
    /// The path leads to a leaf holding this value
    Found(&'a [u8]),
    /// The tree proves that nothing is stored at the path
    Absent,
    /// A pruned subtree hides whether the path exists
    Unknown,
    /// The path ends at an interior node, so the tree does not have the expected shape
    Error,
}

impl<'a> LookupResult<'a> {
    pub fn found(self) -> Option<&'a [u8]> {
        match self {
            LookupResult::Found(value) => Some(value),
            _ => None,
        }
    }
}

const DOMAIN_EMPTY: &str = "ic-hashtree-empty";
const DOMAIN_FORK: &str = "ic-hashtree-fork";
const DOMAIN_LABELED: &str = "ic-hashtree-labeled";
const DOMAIN_LEAF: &str = "ic-hashtree-leaf";

/// A domain separator: one length byte followed by the ASCII bytes of `name`.
pub fn domain_separator(name: &str) -> Vec<u8> {
    debug_assert!(
        name.len() <= u8::MAX as usize,
        "domain separator name longer than 255 bytes"
    );
    let mut sep = Vec::with_capacity(1 + name.len());
    sep.push(name.len() as u8);
    sep.extend_from_slice(name.as_bytes());
    sep
}

fn domain_hasher(name: &str) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(domain_separator(name));
    hasher
}

impl HashTree {
    pub fn fork(left: HashTree, right: HashTree) -> Self {
        HashTree::Fork(Box::new(left), Box::new(right))
    }

    pub fn labeled(label: impl Into<Label>, subtree: HashTree) -> Self {
        HashTree::Labeled(label.into(), Box::new(subtree))
    }

    pub fn leaf(value: impl Into<Vec<u8>>) -> Self {
        HashTree::Leaf(value.into())
    }

    pub fn pruned(digest: Digest) -> Self {
        HashTree::Pruned(digest)
    }

    /// Compute the digest this tree commits to
    pub fn reconstruct(&self) -> Digest {
        let hash = match self {
            HashTree::Empty => domain_hasher(DOMAIN_EMPTY).finalize(),
            HashTree::Pruned(digest) => return *digest,
            HashTree::Leaf(value) => {
                let mut hasher = domain_hasher(DOMAIN_LEAF);
                hasher.update(value);
                hasher.finalize()
            }
            HashTree::Labeled(label, subtree) => {
                let mut hasher = domain_hasher(DOMAIN_LABELED);
                hasher.update(label);
                hasher.update(subtree.reconstruct().as_bytes());
                hasher.finalize()
            }
            HashTree::Fork(left, right) => {
                let mut hasher = domain_hasher(DOMAIN_FORK);
                hasher.update(left.reconstruct().as_bytes());
                hasher.update(right.reconstruct().as_bytes());
                hasher.finalize()
            }
        };
        Digest::new(hash.into())
    }

    /// Replace this whole tree by its digest
    pub fn prune(&self) -> HashTree {
        HashTree::Pruned(self.reconstruct())
    }

    pub fn lookup<P: AsRef<[u8]>>(&self, path: &[P]) -> LookupResult<'_> {
        lookup_path(path, self)
    }

    /// Every labeled path that ends in a leaf without crossing a pruned node
    pub fn list_paths(&self) -> Vec<(Vec<Label>, &[u8])> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        collect_paths(self, &mut prefix, &mut out);
        out
    }
}

fn collect_paths<'a>(
    tree: &'a HashTree,
    prefix: &mut Vec<Label>,
    out: &mut Vec<(Vec<Label>, &'a [u8])>,
) {
    match tree {
        HashTree::Empty | HashTree::Pruned(_) => {}
        HashTree::Leaf(value) => out.push((prefix.clone(), value.as_slice())),
        HashTree::Labeled(label, subtree) => {
            prefix.push(label.clone());
            collect_paths(subtree, prefix, out);
            prefix.pop();
        }
        HashTree::Fork(left, right) => {
            collect_paths(left, prefix, out);
            collect_paths(right, prefix, out);
        }
    }
}

/// Compute the digest a tree commits to
pub fn reconstruct_root(tree: &HashTree) -> Digest {
    tree.reconstruct()
}

/// Look up the value stored at `path`.
///
/// Fork nodes are searched on both sides; a labeled node consumes one path
/// segment when its label matches.
pub fn lookup_path<'a, P: AsRef<[u8]>>(path: &[P], tree: &'a HashTree) -> LookupResult<'a> {
    match path.split_first() {
        None => match tree {
            HashTree::Leaf(value) => LookupResult::Found(value),
            HashTree::Empty => LookupResult::Absent,
            HashTree::Pruned(_) => LookupResult::Unknown,
            HashTree::Fork(..) | HashTree::Labeled(..) => LookupResult::Error,
        },
        Some((head, rest)) => match tree {
            HashTree::Labeled(label, subtree) => {
                if label.as_slice() == head.as_ref() {
                    lookup_path(rest, subtree)
                } else {
                    LookupResult::Absent
                }
            }
            HashTree::Fork(left, right) => {
                combine(lookup_path(path, left), lookup_path(path, right))
            }
            HashTree::Pruned(_) => LookupResult::Unknown,
            HashTree::Empty | HashTree::Leaf(_) => LookupResult::Absent,
        },
    }
}

fn combine<'a>(left: LookupResult<'a>, right: LookupResult<'a>) -> LookupResult<'a> {
    use LookupResult::*;

    match (left, right) {
        (Found(value), _) | (_, Found(value)) => Found(value),
        (Error, _) | (_, Error) => Error,
        (Unknown, _) | (_, Unknown) => Unknown,
        (Absent, Absent) => Absent,
    }
}
