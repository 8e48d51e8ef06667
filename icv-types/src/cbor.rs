//! CBOR encoding of hash trees and certificates
//!
//! This is the only place that looks at wire bytes. Hash tree nodes are
//! arrays whose first element is a small integer tag:
//!
//! | node      | encoding                 |
//! |-----------|--------------------------|
//! | `Empty`   | `[0]`                    |
//! | `Fork`    | `[1, left, right]`       |
//! | `Labeled` | `[2, label, subtree]`    |
//! | `Leaf`    | `[3, value]`             |
//! | `Pruned`  | `[4, digest]`            |
//!
//! A certificate is a map with `tree`, `signature` and an optional
//! `delegation` (`subnet_id`, `certificate`). Encoders emit the self-describe
//! tag (55799) first, as canisters do; decoders accept input with or without it.

use crate::certificate::{Certificate, Delegation};
use crate::error::{Error, Result};
use crate::hash_tree::HashTree;
use crate::primitives::Digest;
use serde_cbor::Value;
use std::collections::BTreeMap;

/// Self-describe tag 55799 as it appears on the wire
pub const SELF_DESCRIBE_TAG: [u8; 3] = [0xd9, 0xd9, 0xf7];

const TAG_EMPTY: i128 = 0;
const TAG_FORK: i128 = 1;
const TAG_LABELED: i128 = 2;
const TAG_LEAF: i128 = 3;
const TAG_PRUNED: i128 = 4;

fn decode_value(bytes: &[u8]) -> Result<Value> {
    let body = bytes.strip_prefix(&SELF_DESCRIBE_TAG[..]).unwrap_or(bytes);
    Ok(serde_cbor::from_slice(body)?)
}

fn encode_value(value: &Value) -> Result<Vec<u8>> {
    let mut out = SELF_DESCRIBE_TAG.to_vec();
    out.extend_from_slice(&serde_cbor::to_vec(value)?);
    Ok(out)
}

fn untag(value: Value) -> Value {
    match value {
        Value::Tag(_, inner) => untag(*inner),
        other => other,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::Bytes(_) => "bytes",
        Value::Text(_) => "text",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Tag(..) => "tag",
        _ => "unknown",
    }
}

fn text_key(key: &str) -> Value {
    Value::Text(key.to_string())
}

fn malformed_tree(reason: impl Into<String>) -> Error {
    Error::MalformedHashTree(reason.into())
}

fn malformed_certificate(reason: impl Into<String>) -> Error {
    Error::MalformedCertificate(reason.into())
}

fn next_bytes(items: &mut impl Iterator<Item = Value>, what: &str) -> Result<Vec<u8>> {
    match items.next().map(untag) {
        Some(Value::Bytes(bytes)) => Ok(bytes),
        Some(other) => Err(malformed_tree(format!(
            "{} must be bytes, got {}",
            what,
            kind(&other)
        ))),
        None => Err(malformed_tree(format!("missing {}", what))),
    }
}

fn next_tree(items: &mut impl Iterator<Item = Value>, what: &str) -> Result<HashTree> {
    match items.next() {
        Some(value) => hash_tree_from_value(value),
        None => Err(malformed_tree(format!("missing {}", what))),
    }
}

fn hash_tree_from_value(value: Value) -> Result<HashTree> {
    let items = match untag(value) {
        Value::Array(items) => items,
        other => {
            return Err(malformed_tree(format!(
                "node must be an array, got {}",
                kind(&other)
            )))
        }
    };
    let mut items = items.into_iter();

    let tag = match items.next().map(untag) {
        Some(Value::Integer(tag)) => tag,
        Some(other) => {
            return Err(malformed_tree(format!(
                "node tag must be an integer, got {}",
                kind(&other)
            )))
        }
        None => return Err(malformed_tree("empty node")),
    };

    let node = match tag {
        TAG_EMPTY => HashTree::Empty,
        TAG_FORK => {
            let left = next_tree(&mut items, "left subtree")?;
            let right = next_tree(&mut items, "right subtree")?;
            HashTree::fork(left, right)
        }
        TAG_LABELED => {
            let label = next_bytes(&mut items, "label")?;
            let subtree = next_tree(&mut items, "labeled subtree")?;
            HashTree::labeled(label, subtree)
        }
        TAG_LEAF => HashTree::Leaf(next_bytes(&mut items, "leaf value")?),
        TAG_PRUNED => {
            let bytes = next_bytes(&mut items, "pruned digest")?;
            let digest = Digest::from_slice(&bytes).map_err(|_| {
                malformed_tree(format!("pruned digest has {} bytes", bytes.len()))
            })?;
            HashTree::Pruned(digest)
        }
        other => return Err(malformed_tree(format!("unknown node tag {}", other))),
    };

    if items.next().is_some() {
        return Err(malformed_tree(format!("trailing elements in node tag {}", tag)));
    }

    Ok(node)
}

fn hash_tree_to_value(tree: &HashTree) -> Value {
    let items = match tree {
        HashTree::Empty => vec![Value::Integer(TAG_EMPTY)],
        HashTree::Fork(left, right) => vec![
            Value::Integer(TAG_FORK),
            hash_tree_to_value(left),
            hash_tree_to_value(right),
        ],
        HashTree::Labeled(label, subtree) => vec![
            Value::Integer(TAG_LABELED),
            Value::Bytes(label.clone()),
            hash_tree_to_value(subtree),
        ],
        HashTree::Leaf(value) => vec![Value::Integer(TAG_LEAF), Value::Bytes(value.clone())],
        HashTree::Pruned(digest) => vec![
            Value::Integer(TAG_PRUNED),
            Value::Bytes(digest.as_bytes().to_vec()),
        ],
    };
    Value::Array(items)
}

/// Decode a hash tree (e.g. a witness)
pub fn decode_hash_tree(bytes: &[u8]) -> Result<HashTree> {
    hash_tree_from_value(decode_value(bytes)?)
}

/// Encode a hash tree, prefixed with the self-describe tag
pub fn encode_hash_tree(tree: &HashTree) -> Result<Vec<u8>> {
    encode_value(&hash_tree_to_value(tree))
}

fn take_bytes(map: &mut BTreeMap<Value, Value>, key: &str) -> Result<Vec<u8>> {
    match map.remove(&text_key(key)).map(untag) {
        Some(Value::Bytes(bytes)) => Ok(bytes),
        Some(other) => Err(malformed_certificate(format!(
            "'{}' must be bytes, got {}",
            key,
            kind(&other)
        ))),
        None => Err(malformed_certificate(format!("missing '{}'", key))),
    }
}

fn into_map(value: Value, what: &str) -> Result<BTreeMap<Value, Value>> {
    match untag(value) {
        Value::Map(map) => Ok(map),
        other => Err(malformed_certificate(format!(
            "{} must be a map, got {}",
            what,
            kind(&other)
        ))),
    }
}

/// Decode a certificate
pub fn decode_certificate(bytes: &[u8]) -> Result<Certificate> {
    let mut map = into_map(decode_value(bytes)?, "certificate")?;

    let tree = match map.remove(&text_key("tree")) {
        Some(value) => hash_tree_from_value(value)?,
        None => return Err(malformed_certificate("missing 'tree'")),
    };
    let signature = take_bytes(&mut map, "signature")?;

    let delegation = match map.remove(&text_key("delegation")) {
        Some(value) => {
            let mut delegation = into_map(value, "delegation")?;
            Some(Delegation {
                subnet_id: take_bytes(&mut delegation, "subnet_id")?,
                certificate: take_bytes(&mut delegation, "certificate")?,
            })
        }
        None => None,
    };

    Ok(Certificate {
        tree,
        signature,
        delegation,
    })
}

/// Encode a certificate, prefixed with the self-describe tag
pub fn encode_certificate(certificate: &Certificate) -> Result<Vec<u8>> {
    let mut map = BTreeMap::new();
    map.insert(text_key("tree"), hash_tree_to_value(&certificate.tree));
    map.insert(
        text_key("signature"),
        Value::Bytes(certificate.signature.clone()),
    );
    if let Some(delegation) = &certificate.delegation {
        let mut inner = BTreeMap::new();
        inner.insert(
            text_key("subnet_id"),
            Value::Bytes(delegation.subnet_id.clone()),
        );
        inner.insert(
            text_key("certificate"),
            Value::Bytes(delegation.certificate.clone()),
        );
        map.insert(text_key("delegation"), Value::Map(inner));
    }
    encode_value(&Value::Map(map))
}

/// Decode the canister id ranges a subnet is responsible for: an array of
/// `[start, end]` pairs of principal bytes, both ends inclusive.
pub fn decode_canister_ranges(bytes: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let ranges = match untag(decode_value(bytes)?) {
        Value::Array(ranges) => ranges,
        other => {
            return Err(malformed_certificate(format!(
                "canister ranges must be an array, got {}",
                kind(&other)
            )))
        }
    };

    ranges
        .into_iter()
        .map(|range| match untag(range) {
            Value::Array(bounds) => match <[Value; 2]>::try_from(bounds) {
                Ok([Value::Bytes(start), Value::Bytes(end)]) => Ok((start, end)),
                _ => Err(malformed_certificate(
                    "canister range must be a pair of byte strings",
                )),
            },
            other => Err(malformed_certificate(format!(
                "canister range must be an array, got {}",
                kind(&other)
            ))),
        })
        .collect()
}

/// Encode canister id ranges
pub fn encode_canister_ranges(ranges: &[(Vec<u8>, Vec<u8>)]) -> Result<Vec<u8>> {
    let value = Value::Array(
        ranges
            .iter()
            .map(|(start, end)| {
                Value::Array(vec![Value::Bytes(start.clone()), Value::Bytes(end.clone())])
            })
            .collect(),
    );
    encode_value(&value)
}
