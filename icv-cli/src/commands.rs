//! Command implementations

use icv_core::verify::now_millis;
use icv_core::{verify_at, verify_response_payload, SignatureVerifier, VerificationParams};
use icv_types::cbor::decode_hash_tree;
use icv_types::{Certificate, Digest, LookupResult, Principal, Timestamp};
use tracing::{debug, info};

use crate::config::{CliConfig, SignatureScheme};
use crate::input::format_label;
use crate::report::{CertificateSummary, PathEntry, VerifyReport};
use crate::{CliError, Result};

/// Payload that must be certified under `key` in the witness
#[derive(Debug, Clone)]
pub struct ResponseCheck {
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Inputs of `icv verify`; unset options fall back to the configuration
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub certificate: Vec<u8>,
    pub witness: Vec<u8>,
    pub canister_id: Option<Principal>,
    pub root_key: Option<Vec<u8>>,
    pub max_certificate_time_offset_ms: Option<u64>,
    /// Overrides the local clock
    pub now_ms: Option<u64>,
    pub response: Option<ResponseCheck>,
}

pub fn verify(request: &VerifyRequest, config: &CliConfig) -> Result<VerifyReport> {
    let canister_id = request
        .canister_id
        .clone()
        .or_else(|| config.verification.canister_id.clone())
        .ok_or(CliError::MissingCanisterId)?;

    let signature_checked = config.trust.signature_scheme != SignatureScheme::None;
    let root_key = match request.root_key.clone() {
        Some(key) => key,
        None => match config.root_key_bytes()? {
            Some(key) => key,
            None if !signature_checked => Vec::new(),
            None => return Err(CliError::MissingRootKey),
        },
    };

    let max_offset = request
        .max_certificate_time_offset_ms
        .unwrap_or(config.verification.max_certificate_time_offset_ms);
    let now_ms = request.now_ms.unwrap_or_else(now_millis);

    let params = VerificationParams {
        canister_id: &canister_id,
        encoded_certificate: &request.certificate,
        encoded_tree: &request.witness,
        root_key: &root_key,
        max_certificate_time_offset_ms: max_offset,
    };

    let verifier: Box<dyn SignatureVerifier> = config.verifier();
    debug!("Verifying for canister {} at {} ms", canister_id, now_ms);
    let tree = verify_at(&params, verifier.as_ref(), now_ms)?;

    if let Some(check) = &request.response {
        verify_response_payload(&tree, &check.key, &check.payload)?;
    }

    let certificate = Certificate::decode(&request.certificate)?;
    let certificate_time_ns = certificate.time_nanos()?;

    info!("Verified certified data of canister {}", canister_id);

    Ok(VerifyReport {
        canister_id: canister_id.to_text(),
        certificate_time_ns,
        certificate_time: Timestamp::from_unix_nanos(certificate_time_ns).to_string(),
        certified_data: tree.reconstruct().to_hex(),
        subnet_id: certificate
            .delegation
            .as_ref()
            .map(|d| hex::encode(&d.subnet_id)),
        signature_checked,
        response_key: request.response.as_ref().map(|c| format_label(&c.key)),
        witness_paths: PathEntry::list(&tree),
    })
}

/// Root hash of an encoded witness
pub fn witness_root_hash(witness: &[u8]) -> Result<Digest> {
    Ok(decode_hash_tree(witness)?.reconstruct())
}

/// Look up `path` in an encoded witness; the value is hex-encoded when found
pub fn lookup(witness: &[u8], path: &[Vec<u8>]) -> Result<String> {
    let tree = decode_hash_tree(witness)?;
    Ok(match tree.lookup(path) {
        LookupResult::Found(value) => hex::encode(value),
        LookupResult::Absent => "absent".to_string(),
        LookupResult::Unknown => "unknown".to_string(),
        LookupResult::Error => "error".to_string(),
    })
}

pub fn inspect_certificate(certificate: &[u8]) -> Result<CertificateSummary> {
    let certificate = Certificate::decode(certificate)?;
    Ok(CertificateSummary::new(&certificate))
}
