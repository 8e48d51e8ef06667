//! Certificate signature checking
//!
//! The platform signs `domain_separator("ic-state-root") || root_hash` with
//! either the root key or, through a delegation, a subnet key. The actual
//! signature scheme sits behind [`SignatureVerifier`].

use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};
use icv_types::cbor::decode_canister_ranges;
use icv_types::hash_tree::domain_separator;
use icv_types::{Certificate, Delegation, Digest, LookupResult, Principal};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signature verification failed")]
    InvalidSignature,
}

#[derive(Error, Debug)]
pub enum DelegationError {
    #[error("Delegation certificate is itself delegated")]
    Nested,

    #[error("Malformed delegation: {0}")]
    Malformed(#[from] icv_types::Error),

    #[error("Invalid delegation signature: {0}")]
    Signature(#[source] SignatureError),

    #[error("Subnet public key not found in delegation certificate")]
    MissingSubnetKey,

    #[error("Canister {0} is outside the canister ranges of the delegated subnet")]
    CanisterOutOfRange(Principal),
}

/// Domain separator of signed state roots
pub const STATE_ROOT_DOMAIN: &str = "ic-state-root";

/// DER SubjectPublicKeyInfo header of an Ed25519 key
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Build the message a certificate signature covers
pub fn signed_message(root_hash: &Digest) -> Vec<u8> {
    let mut msg = domain_separator(STATE_ROOT_DOMAIN);
    msg.extend_from_slice(root_hash.as_bytes());
    msg
}

/// A signature scheme able to check certificate signatures
pub trait SignatureVerifier: Send + Sync {
    fn verify_signature(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<(), SignatureError>;
}

/// Ed25519 signatures, as used by local test networks.
///
/// Accepts a raw 32-byte key or a DER-wrapped (SubjectPublicKeyInfo) one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    fn verifying_key(public_key: &[u8]) -> Result<VerifyingKey, SignatureError> {
        let raw = if public_key.len() == ED25519_DER_PREFIX.len() + 32 {
            public_key
                .strip_prefix(&ED25519_DER_PREFIX[..])
                .ok_or_else(|| SignatureError::InvalidPublicKey("unknown DER header".to_string()))?
        } else {
            public_key
        };

        let bytes = <[u8; 32]>::try_from(raw).map_err(|_| {
            SignatureError::InvalidPublicKey(format!("expected 32 bytes, got {}", raw.len()))
        })?;

        VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify_signature(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<(), SignatureError> {
        let verifying_key = Self::verifying_key(public_key)?;
        let sig = Ed25519Signature::from_slice(signature)
            .map_err(|e| SignatureError::InvalidSignatureFormat(e.to_string()))?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| SignatureError::InvalidSignature)
    }
}

/// Accepts every signature.
///
/// Only the structural and time checks run; use it when the root key is
/// trusted through some other channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignatureCheck;

impl SignatureVerifier for NoSignatureCheck {
    fn verify_signature(
        &self,
        _message: &[u8],
        _signature: &[u8],
        _public_key: &[u8],
    ) -> Result<(), SignatureError> {
        warn!("Certificate signature not checked");
        Ok(())
    }
}

/// Check the delegation and return the subnet public key it authorizes
/// for `canister_id`.
pub fn delegated_public_key<V: SignatureVerifier + ?Sized>(
    delegation: &Delegation,
    canister_id: &Principal,
    root_key: &[u8],
    verifier: &V,
) -> Result<Vec<u8>, DelegationError> {
    let certificate = Certificate::decode(&delegation.certificate)?;
    if certificate.delegation.is_some() {
        return Err(DelegationError::Nested);
    }

    verifier
        .verify_signature(
            &signed_message(&certificate.root_hash()),
            &certificate.signature,
            root_key,
        )
        .map_err(DelegationError::Signature)?;

    let subnet_id = delegation.subnet_id.as_slice();

    let ranges_path: [&[u8]; 3] = [b"subnet", subnet_id, b"canister_ranges"];
    if let LookupResult::Found(encoded) = certificate.lookup(&ranges_path) {
        let ranges = decode_canister_ranges(encoded)?;
        let id = canister_id.as_slice();
        let in_range = ranges
            .iter()
            .any(|(start, end)| start.as_slice() <= id && id <= end.as_slice());
        if !in_range {
            return Err(DelegationError::CanisterOutOfRange(canister_id.clone()));
        }
    }

    let key_path: [&[u8]; 3] = [b"subnet", subnet_id, b"public_key"];
    match certificate.lookup(&key_path) {
        LookupResult::Found(key) => {
            debug!("Using delegated subnet key ({} bytes)", key.len());
            Ok(key.to_vec())
        }
        _ => Err(DelegationError::MissingSubnetKey),
    }
}
