//! Certified responses
//!
//! A query answer travels with the certificate and the witness that prove it.
//! The witness commits to `SHA-256(payload)` under the response key.

use icv_types::{HashTree, LookupResult, Principal};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

use crate::signature::SignatureVerifier;
use crate::verify::{verify_at, VerificationError, VerificationParams};

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Response key not found in the witness")]
    NotFound,

    #[error("Response payload does not match the certified hash")]
    HashMismatch,
}

/// A response together with its certificate and witness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedResponse<T> {
    pub response: T,
    #[serde(with = "hex::serde")]
    pub certificate: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub witness: Vec<u8>,
}

impl<T> CertifiedResponse<T> {
    /// Verification inputs for this response
    pub fn params<'a>(
        &'a self,
        canister_id: &'a Principal,
        root_key: &'a [u8],
        max_certificate_time_offset_ms: u64,
    ) -> VerificationParams<'a> {
        VerificationParams {
            canister_id,
            encoded_certificate: &self.certificate,
            encoded_tree: &self.witness,
            root_key,
            max_certificate_time_offset_ms,
        }
    }
}

/// Verify the certificate and witness, then check that the witness certifies
/// `expected_payload` under `key`
pub fn verify_certified_response<V: SignatureVerifier + ?Sized>(
    params: &VerificationParams<'_>,
    key: &[u8],
    expected_payload: &[u8],
    verifier: &V,
    now_ms: u64,
) -> Result<HashTree, ResponseError> {
    let tree = verify_at(params, verifier, now_ms)?;
    verify_response_payload(&tree, key, expected_payload)?;
    Ok(tree)
}

/// Check that `tree` stores the SHA-256 of `payload` at `[key]`
pub fn verify_response_payload(
    tree: &HashTree,
    key: &[u8],
    payload: &[u8],
) -> Result<(), ResponseError> {
    let certified = match tree.lookup(&[key]) {
        LookupResult::Found(value) => value,
        other => {
            debug!("Response key lookup returned {:?}", other);
            return Err(ResponseError::NotFound);
        }
    };

    let payload_hash = Sha256::digest(payload);
    if !bool::from(certified.ct_eq(payload_hash.as_slice())) {
        return Err(ResponseError::HashMismatch);
    }

    Ok(())
}
