//! Core types for certified response verification
//!
//! This crate defines the data model shared by the verifier and its callers:
//! labeled Merkle hash trees, state certificates, principals, and the CBOR
//! decoder that turns wire bytes into those types.

pub mod cbor;
pub mod certificate;
pub mod error;
pub mod hash_tree;
pub mod primitives;

pub use certificate::{Certificate, Delegation};
pub use error::{Error, Result};
pub use hash_tree::{lookup_path, reconstruct_root, HashTree, Label, LookupResult};
pub use primitives::{Digest, Principal, Timestamp};
