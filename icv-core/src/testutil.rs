//! Test utilities for producing signed certificates without a replica.
//!
//! Enabled via the `test-util` feature flag.

use ed25519_dalek::{Signer, SigningKey};
use icv_types::cbor::encode_canister_ranges;
use icv_types::{Certificate, Delegation, Digest, HashTree, Principal, Timestamp};

use crate::signature::signed_message;

/// Current wall-clock time in nanoseconds since the UNIX epoch
pub fn now_nanos() -> u64 {
    let now = Timestamp::now();
    now.seconds as u64 * 1_000_000_000 + now.nanos as u64
}

/// Encode `n` as unsigned LEB128, the encoding of certificate times
pub fn leb128_bytes(n: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    leb128::write::unsigned(&mut buf, n).expect("writing to a Vec cannot fail");
    buf
}

/// The state tree a subnet certifies for a single canister
pub fn canister_state_tree(canister_id: &Principal, certified_data: &Digest, time_nanos: u64) -> HashTree {
    HashTree::fork(
        HashTree::labeled(
            b"canister".to_vec(),
            HashTree::labeled(
                canister_id.as_slice().to_vec(),
                HashTree::labeled(
                    b"certified_data".to_vec(),
                    HashTree::leaf(certified_data.as_bytes().to_vec()),
                ),
            ),
        ),
        HashTree::labeled(b"time".to_vec(), HashTree::leaf(leb128_bytes(time_nanos))),
    )
}

fn sign_tree(key: &SigningKey, tree: &HashTree) -> Vec<u8> {
    key.sign(&signed_message(&tree.reconstruct()))
        .to_bytes()
        .to_vec()
}

/// A local network whose root key is an Ed25519 key.
pub struct TestNetwork {
    root_key: SigningKey,
}

impl TestNetwork {
    /// Create a network with a deterministic root key
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            root_key: SigningKey::from_bytes(&seed),
        }
    }

    /// The raw 32-byte root public key
    pub fn root_public_key(&self) -> Vec<u8> {
        self.root_key.verifying_key().to_bytes().to_vec()
    }

    /// Sign an arbitrary state tree with the root key
    pub fn certificate_for_tree(&self, tree: HashTree) -> Certificate {
        let signature = sign_tree(&self.root_key, &tree);
        Certificate {
            tree,
            signature,
            delegation: None,
        }
    }

    /// An encoded certificate stating that `canister_id` certified `certified_data` at `time_nanos`
    pub fn certify(&self, canister_id: &Principal, certified_data: &Digest, time_nanos: u64) -> Vec<u8> {
        self.certificate_for_tree(canister_state_tree(canister_id, certified_data, time_nanos))
            .encode()
            .expect("certificate encoding cannot fail")
    }

    /// Like [`TestNetwork::certify`], but signed by `subnet` under a delegation from the root key
    pub fn certify_delegated(
        &self,
        subnet: &TestSubnet,
        canister_id: &Principal,
        certified_data: &Digest,
        time_nanos: u64,
    ) -> Vec<u8> {
        let delegation = self.delegate(subnet, time_nanos);
        let tree = canister_state_tree(canister_id, certified_data, time_nanos);
        let signature = sign_tree(&subnet.key, &tree);
        Certificate {
            tree,
            signature,
            delegation: Some(delegation),
        }
        .encode()
        .expect("certificate encoding cannot fail")
    }

    /// A delegation in which the root key vouches for the subnet key
    pub fn delegate(&self, subnet: &TestSubnet, time_nanos: u64) -> Delegation {
        let mut subnet_entries = HashTree::labeled(
            b"public_key".to_vec(),
            HashTree::leaf(subnet.public_key()),
        );
        if let Some(ranges) = &subnet.canister_ranges {
            let encoded = encode_canister_ranges(ranges).expect("range encoding cannot fail");
            subnet_entries = HashTree::fork(
                HashTree::labeled(b"canister_ranges".to_vec(), HashTree::leaf(encoded)),
                subnet_entries,
            );
        }

        let tree = HashTree::fork(
            HashTree::labeled(
                b"subnet".to_vec(),
                HashTree::labeled(subnet.id.clone(), subnet_entries),
            ),
            HashTree::labeled(b"time".to_vec(), HashTree::leaf(leb128_bytes(time_nanos))),
        );

        let certificate = self
            .certificate_for_tree(tree)
            .encode()
            .expect("certificate encoding cannot fail");

        Delegation {
            subnet_id: subnet.id.clone(),
            certificate,
        }
    }
}

/// A subnet with its own Ed25519 signing key
pub struct TestSubnet {
    id: Vec<u8>,
    key: SigningKey,
    canister_ranges: Option<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl TestSubnet {
    pub fn from_seed(id: &[u8], seed: [u8; 32]) -> Self {
        Self {
            id: id.to_vec(),
            key: SigningKey::from_bytes(&seed),
            canister_ranges: None,
        }
    }

    /// Restrict the canisters this subnet may certify for (inclusive ranges)
    pub fn with_canister_ranges(mut self, ranges: Vec<(Principal, Principal)>) -> Self {
        self.canister_ranges = Some(
            ranges
                .into_iter()
                .map(|(start, end)| (start.as_slice().to_vec(), end.as_slice().to_vec()))
                .collect(),
        );
        self
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }
}
