//! Certified response verification
//!
//! Given a certificate, a witness tree and a canister id, check that:
//! 1. The certificate is signed by the root key (directly or via a delegation)
//! 2. The certificate time lies within the allowed clock offset
//! 3. The canister's certified data equals the root hash of the witness

use icv_types::cbor::decode_hash_tree;
use icv_types::{Certificate, HashTree, Principal, Timestamp};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

use crate::signature::{
    delegated_public_key, signed_message, DelegationError, SignatureError, SignatureVerifier,
};

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Decode error: {0}")]
    Decode(#[from] icv_types::Error),

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error("Invalid certificate signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("Invalid delegation: {0}")]
    Delegation(#[from] DelegationError),

    #[error("Could not find certified data in the certificate")]
    CertifiedDataMissing,

    #[error("Tree root hash did not match the certified data in the certificate")]
    RootHashMismatch,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid certificate: time {certificate_ms} is too far in the future (current time: {now_ms})")]
    TooFarInFuture { certificate_ms: u64, now_ms: u64 },

    #[error("Invalid certificate: time {certificate_ms} is too far in the past (current time: {now_ms})")]
    TooFarInPast { certificate_ms: u64, now_ms: u64 },
}

/// Inputs of a single verification
#[derive(Debug, Clone, Copy)]
pub struct VerificationParams<'a> {
    /// The canister whose certified data the witness must match
    pub canister_id: &'a Principal,
    /// The encoded certificate, as returned alongside the response
    pub encoded_certificate: &'a [u8],
    /// The encoded witness tree
    pub encoded_tree: &'a [u8],
    /// The trusted root public key
    pub root_key: &'a [u8],
    /// Maximum allowed distance between certificate time and local time
    pub max_certificate_time_offset_ms: u64,
}

/// Local wall-clock time in milliseconds since the UNIX epoch
pub fn now_millis() -> u64 {
    millis_since_epoch(&Timestamp::now())
}

// A clock set before 1970 saturates to 0 ms
fn millis_since_epoch(timestamp: &Timestamp) -> u64 {
    let millis = timestamp.as_millis();
    if millis < 0 {
        warn!("Local clock is before the UNIX epoch ({} ms); using 0", millis);
        return 0;
    }
    millis as u64
}

/// Verify a certified response against the local wall clock and return the
/// validated witness tree.
pub fn verify<V: SignatureVerifier + ?Sized>(
    params: &VerificationParams<'_>,
    verifier: &V,
) -> Result<HashTree, VerificationError> {
    verify_at(params, verifier, now_millis())
}

/// Verify a certified response, treating `now_ms` as the current time
pub fn verify_at<V: SignatureVerifier + ?Sized>(
    params: &VerificationParams<'_>,
    verifier: &V,
    now_ms: u64,
) -> Result<HashTree, VerificationError> {
    let certificate = Certificate::decode(params.encoded_certificate)?;
    verify_certificate_signature(&certificate, params.canister_id, params.root_key, verifier)?;

    let tree = decode_hash_tree(params.encoded_tree)?;

    validate_certificate_time(&certificate, params.max_certificate_time_offset_ms, now_ms)?;
    validate_tree(&tree, &certificate, params.canister_id)?;

    debug!("Verified witness for canister {}", params.canister_id);
    Ok(tree)
}

/// Check the certificate signature, following a delegation if present
pub fn verify_certificate_signature<V: SignatureVerifier + ?Sized>(
    certificate: &Certificate,
    canister_id: &Principal,
    root_key: &[u8],
    verifier: &V,
) -> Result<(), VerificationError> {
    let message = signed_message(&certificate.root_hash());

    match &certificate.delegation {
        Some(delegation) => {
            let subnet_key = delegated_public_key(delegation, canister_id, root_key, verifier)?;
            verifier.verify_signature(&message, &certificate.signature, &subnet_key)?;
        }
        None => verifier.verify_signature(&message, &certificate.signature, root_key)?,
    }

    Ok(())
}

/// Reject certificates whose time is more than `max_offset_ms` away from `now_ms`
pub fn validate_certificate_time(
    certificate: &Certificate,
    max_offset_ms: u64,
    now_ms: u64,
) -> Result<(), VerificationError> {
    let certificate_ms = certificate.time_nanos()? / 1_000_000;
    check_time_window(certificate_ms, max_offset_ms, now_ms)?;
    debug!(
        "Certificate time {} ms within {} ms of {}",
        certificate_ms, max_offset_ms, now_ms
    );
    Ok(())
}

fn check_time_window(certificate_ms: u64, max_offset_ms: u64, now_ms: u64) -> Result<(), TimeError> {
    let (cert, offset, now) = (certificate_ms as i128, max_offset_ms as i128, now_ms as i128);

    if cert - offset > now {
        return Err(TimeError::TooFarInFuture {
            certificate_ms,
            now_ms,
        });
    }

    if cert + offset < now {
        return Err(TimeError::TooFarInPast {
            certificate_ms,
            now_ms,
        });
    }

    Ok(())
}

/// Check that the certificate's certified data for `canister_id` is the root
/// hash of `tree`
pub fn validate_tree(
    tree: &HashTree,
    certificate: &Certificate,
    canister_id: &Principal,
) -> Result<(), VerificationError> {
    let tree_root_hash = tree.reconstruct();
    let certified_data = certificate
        .certified_data(canister_id)
        .found()
        .ok_or(VerificationError::CertifiedDataMissing)?;

    if !bool::from(certified_data.ct_eq(tree_root_hash.as_bytes().as_slice())) {
        return Err(VerificationError::RootHashMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Ed25519Verifier, NoSignatureCheck};
    use crate::testutil::{canister_state_tree, leb128_bytes, TestNetwork, TestSubnet};
    use icv_types::cbor::encode_hash_tree;
    use icv_types::Digest;

    const NOW_NANOS: u64 = 1_700_000_000_000_000_000;
    const NOW_MS: u64 = NOW_NANOS / 1_000_000;

    fn canister() -> Principal {
        Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 2, 1, 1]).unwrap()
    }

    fn witness() -> HashTree {
        HashTree::fork(
            HashTree::labeled(b"alice".to_vec(), HashTree::leaf(vec![1u8; 32])),
            HashTree::pruned(Digest::new([2u8; 32])),
        )
    }

    fn certificate_at(time_ms: u64) -> Certificate {
        Certificate {
            tree: HashTree::labeled(
                b"time".to_vec(),
                HashTree::leaf(leb128_bytes(time_ms * 1_000_000)),
            ),
            signature: vec![],
            delegation: None,
        }
    }

    #[test]
    fn test_time_window_boundaries() {
        assert_eq!(
            check_time_window(1051, 50, 1000),
            Err(TimeError::TooFarInFuture {
                certificate_ms: 1051,
                now_ms: 1000
            })
        );
        assert!(check_time_window(1050, 50, 1000).is_ok());
        assert_eq!(
            check_time_window(949, 50, 1000),
            Err(TimeError::TooFarInPast {
                certificate_ms: 949,
                now_ms: 1000
            })
        );
        assert!(check_time_window(950, 50, 1000).is_ok());
    }

    #[test]
    fn test_clock_before_epoch_saturates() {
        let before = Timestamp {
            seconds: -5,
            nanos: 0,
        };
        assert_eq!(millis_since_epoch(&before), 0);
        assert_eq!(millis_since_epoch(&Timestamp::from_unix_nanos(NOW_NANOS)), NOW_MS);
    }

    #[test]
    fn test_time_window_does_not_overflow() {
        assert!(check_time_window(u64::MAX, u64::MAX, 0).is_ok());
        assert!(check_time_window(0, u64::MAX, u64::MAX).is_ok());
        assert!(check_time_window(u64::MAX, 0, 0).is_err());
    }

    #[test]
    fn test_certificate_time_truncates_nanoseconds() {
        let mut certificate = certificate_at(0);
        // 1050.999999 ms is still 1050 ms
        certificate.tree = HashTree::labeled(
            b"time".to_vec(),
            HashTree::leaf(leb128_bytes(1_050_999_999)),
        );
        assert!(validate_certificate_time(&certificate, 50, 1000).is_ok());
        assert!(validate_certificate_time(&certificate_at(1051), 50, 1000).is_err());
    }

    #[test]
    fn test_missing_time_is_decode_error() {
        let certificate = Certificate {
            tree: HashTree::Empty,
            signature: vec![],
            delegation: None,
        };
        assert!(matches!(
            validate_certificate_time(&certificate, 50, 1000),
            Err(VerificationError::Decode(_))
        ));
    }

    #[test]
    fn test_validate_tree_matches() {
        let tree = witness();
        let certificate = Certificate {
            tree: canister_state_tree(&canister(), &tree.reconstruct(), NOW_NANOS),
            signature: vec![],
            delegation: None,
        };
        assert!(validate_tree(&tree, &certificate, &canister()).is_ok());
    }

    #[test]
    fn test_validate_tree_missing_certified_data() {
        let tree = witness();
        let certificate = certificate_at(NOW_MS);
        assert!(matches!(
            validate_tree(&tree, &certificate, &canister()),
            Err(VerificationError::CertifiedDataMissing)
        ));
    }

    #[test]
    fn test_validate_tree_pruned_certified_data() {
        let tree = witness();
        let certificate = Certificate {
            tree: HashTree::fork(HashTree::pruned(Digest::new([8u8; 32])), HashTree::Empty),
            signature: vec![],
            delegation: None,
        };
        assert!(matches!(
            validate_tree(&tree, &certificate, &canister()),
            Err(VerificationError::CertifiedDataMissing)
        ));
    }

    #[test]
    fn test_validate_tree_short_certified_data() {
        let tree = witness();
        let root = tree.reconstruct();
        let certificate = Certificate {
            tree: HashTree::labeled(
                b"canister".to_vec(),
                HashTree::labeled(
                    canister().as_slice().to_vec(),
                    HashTree::labeled(
                        b"certified_data".to_vec(),
                        HashTree::leaf(root.as_bytes()[..31].to_vec()),
                    ),
                ),
            ),
            signature: vec![],
            delegation: None,
        };
        assert!(matches!(
            validate_tree(&tree, &certificate, &canister()),
            Err(VerificationError::RootHashMismatch)
        ));
    }

    #[test]
    fn test_validate_tree_other_canister() {
        let tree = witness();
        let certificate = Certificate {
            tree: canister_state_tree(&canister(), &tree.reconstruct(), NOW_NANOS),
            signature: vec![],
            delegation: None,
        };
        assert!(matches!(
            validate_tree(&tree, &certificate, &Principal::management_canister()),
            Err(VerificationError::CertifiedDataMissing)
        ));
    }

    #[test]
    fn test_end_to_end_verification() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let tree = witness();
        let encoded_tree = encode_hash_tree(&tree).unwrap();
        let encoded_certificate = network.certify(&canister(), &tree.reconstruct(), NOW_NANOS);
        let root_key = network.root_public_key();

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        let verified = verify_at(&params, &Ed25519Verifier, NOW_MS).unwrap();
        assert_eq!(verified, tree);
        assert_eq!(verified.lookup(&["alice"]).found(), Some(&[1u8; 32][..]));

        // No hidden state: a second call gives the same answer
        assert_eq!(verify_at(&params, &Ed25519Verifier, NOW_MS).unwrap(), verified);
    }

    #[test]
    fn test_mutated_witness_is_rejected() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let tree = witness();
        let encoded_certificate = network.certify(&canister(), &tree.reconstruct(), NOW_NANOS);
        let root_key = network.root_public_key();

        let mut encoded_tree = encode_hash_tree(&tree).unwrap();
        // Flip the last byte, which belongs to the pruned digest
        let last = encoded_tree.len() - 1;
        encoded_tree[last] ^= 0x01;

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS),
            Err(VerificationError::RootHashMismatch)
        ));
    }

    #[test]
    fn test_stale_certificate_is_rejected() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let tree = witness();
        let encoded_tree = encode_hash_tree(&tree).unwrap();
        let encoded_certificate = network.certify(&canister(), &tree.reconstruct(), NOW_NANOS);
        let root_key = network.root_public_key();

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS + 50_001),
            Err(VerificationError::Time(TimeError::TooFarInPast { .. }))
        ));
        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS - 50_001),
            Err(VerificationError::Time(TimeError::TooFarInFuture { .. }))
        ));
    }

    #[test]
    fn test_wrong_root_key_is_rejected() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let impostor = TestNetwork::from_seed([2u8; 32]);
        let tree = witness();
        let encoded_tree = encode_hash_tree(&tree).unwrap();
        let encoded_certificate = impostor.certify(&canister(), &tree.reconstruct(), NOW_NANOS);
        let root_key = network.root_public_key();

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS),
            Err(VerificationError::Signature(SignatureError::InvalidSignature))
        ));

        // Structural checks alone accept it
        assert!(verify_at(&params, &NoSignatureCheck, NOW_MS).is_ok());
    }

    #[test]
    fn test_undecodable_inputs() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let root_key = network.root_public_key();
        let tree = witness();
        let encoded_certificate = network.certify(&canister(), &tree.reconstruct(), NOW_NANOS);

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: b"not a certificate",
            encoded_tree: &[0x81, 0x00],
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };
        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS),
            Err(VerificationError::Decode(_))
        ));

        let params = VerificationParams {
            encoded_certificate: &encoded_certificate,
            encoded_tree: &[0x81, 0x09],
            ..params
        };
        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS),
            Err(VerificationError::Decode(_))
        ));
    }

    #[test]
    fn test_delegated_certificate() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let subnet = TestSubnet::from_seed(b"subnet-1", [5u8; 32]).with_canister_ranges(vec![(
            Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 1, 1]).unwrap(),
            Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 9, 1, 1]).unwrap(),
        )]);
        let tree = witness();
        let encoded_tree = encode_hash_tree(&tree).unwrap();
        let encoded_certificate =
            network.certify_delegated(&subnet, &canister(), &tree.reconstruct(), NOW_NANOS);
        let root_key = network.root_public_key();

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        assert_eq!(verify_at(&params, &Ed25519Verifier, NOW_MS).unwrap(), tree);
    }

    #[test]
    fn test_delegation_outside_canister_range() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let subnet = TestSubnet::from_seed(b"subnet-1", [5u8; 32]).with_canister_ranges(vec![(
            Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 5, 1, 1]).unwrap(),
            Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 9, 1, 1]).unwrap(),
        )]);
        let tree = witness();
        let encoded_tree = encode_hash_tree(&tree).unwrap();
        let encoded_certificate =
            network.certify_delegated(&subnet, &canister(), &tree.reconstruct(), NOW_NANOS);
        let root_key = network.root_public_key();

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS),
            Err(VerificationError::Delegation(DelegationError::CanisterOutOfRange(_)))
        ));
    }

    #[test]
    fn test_delegation_signed_by_wrong_root() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let impostor = TestNetwork::from_seed([2u8; 32]);
        let subnet = TestSubnet::from_seed(b"subnet-1", [5u8; 32]);
        let tree = witness();
        let encoded_tree = encode_hash_tree(&tree).unwrap();
        let encoded_certificate =
            impostor.certify_delegated(&subnet, &canister(), &tree.reconstruct(), NOW_NANOS);
        let root_key = network.root_public_key();

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS),
            Err(VerificationError::Delegation(DelegationError::Signature(_)))
        ));
    }

    #[test]
    fn test_nested_delegation_rejected() {
        let network = TestNetwork::from_seed([1u8; 32]);
        let subnet = TestSubnet::from_seed(b"subnet-1", [5u8; 32]);
        let tree = witness();
        let encoded_tree = encode_hash_tree(&tree).unwrap();

        // A delegation whose own certificate is delegated
        let inner = network.delegate(&subnet, NOW_NANOS);
        let mut nested = Certificate::decode(&inner.certificate).unwrap();
        nested.delegation = Some(inner.clone());
        let outer_delegation = icv_types::Delegation {
            subnet_id: inner.subnet_id.clone(),
            certificate: nested.encode().unwrap(),
        };
        let mut certificate = Certificate::decode(&network.certify(
            &canister(),
            &tree.reconstruct(),
            NOW_NANOS,
        ))
        .unwrap();
        certificate.delegation = Some(outer_delegation);
        let encoded_certificate = certificate.encode().unwrap();
        let root_key = network.root_public_key();

        let params = VerificationParams {
            canister_id: &canister(),
            encoded_certificate: &encoded_certificate,
            encoded_tree: &encoded_tree,
            root_key: &root_key,
            max_certificate_time_offset_ms: 50_000,
        };

        assert!(matches!(
            verify_at(&params, &Ed25519Verifier, NOW_MS),
            Err(VerificationError::Delegation(DelegationError::Nested))
        ));
    }
}
