//! Verification of certified canister responses
//!
//! This crate provides:
//! - Certificate signature checking, including subnet delegations
//! - Certificate time validation
//! - Witness validation against a canister's certified data
//! - A certified map for producing witnesses

pub mod certified_map;
pub mod response;
pub mod signature;
pub mod verify;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use certified_map::CertifiedMap;
pub use response::{verify_certified_response, verify_response_payload, CertifiedResponse, ResponseError};
pub use signature::{DelegationError, Ed25519Verifier, NoSignatureCheck, SignatureError, SignatureVerifier};
pub use verify::{
    validate_certificate_time, validate_tree, verify, verify_at, verify_certificate_signature,
    TimeError, VerificationError, VerificationParams,
};
